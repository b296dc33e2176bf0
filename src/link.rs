/// Deep links that open a box's detail page
///
/// A box QR code carries `whatsinthebox://box/<id>`. Scanning it hands the URL
/// back to the app, which turns it into a navigation action.

use tracing::debug;
use url::Url;
use uuid::Uuid;

/// Scheme registered for the app
pub const DEFAULT_SCHEME: &str = "whatsinthebox";

/// Host segment used for box links
const BOX_HOST: &str = "box";

/// What a recognized link asks the app to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkAction {
    /// Show the detail page for this box. The id is passed through untouched,
    /// the detail lookup decides whether it exists.
    OpenBox(String),
}

/// Build and recognize box deep links for one URL scheme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeepLinks {
    scheme: String,
}

impl Default for DeepLinks {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEME)
    }
}

impl DeepLinks {
    pub fn new(scheme: impl Into<String>) -> Self {
        Self {
            scheme: scheme.into().to_ascii_lowercase(),
        }
    }

    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// `<scheme>://box/<id>`
    pub fn box_link(&self, id: Uuid) -> String {
        format!("{}://{}/{}", self.scheme, BOX_HOST, id)
    }

    /// Recognize a box link. Anything else is ignored without an error.
    pub fn parse(&self, link: &str) -> Option<LinkAction> {
        let url = match Url::parse(link) {
            Ok(url) => url,
            Err(e) => {
                debug!("🔗 Ignoring unparsable link {:?}: {}", link, e);
                return None;
            }
        };

        if url.scheme() != self.scheme || url.host_str() != Some(BOX_HOST) {
            debug!("🔗 Ignoring link {}", url);
            return None;
        }

        let box_id = url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())?;

        Some(LinkAction::OpenBox(box_id.to_string()))
    }
}
