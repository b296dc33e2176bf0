/// Screen history
///
/// A plain stack of routes. The front end renders whatever sits on top,
/// with `Home` implied when the stack is empty.

use tracing::debug;

use crate::link::{DeepLinks, LinkAction};

/// Every screen the app can show
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    BoxDetail(String),
    Settings,
    AddBox,
    EditBox(String),
}

static HOME: Route = Route::Home;

#[derive(Debug, Clone, Default)]
pub struct Router {
    path: Vec<Route>,
    links: DeepLinks,
}

impl Router {
    pub fn new(links: DeepLinks) -> Self {
        Self {
            path: Vec::new(),
            links,
        }
    }

    pub fn navigate(&mut self, route: Route) {
        debug!("🧭 Push {:?}", route);
        self.path.push(route);
    }

    /// Pop the top route. Does nothing on an empty stack.
    pub fn navigate_back(&mut self) {
        if let Some(route) = self.path.pop() {
            debug!("🧭 Pop {:?}", route);
        }
    }

    pub fn navigate_to_root(&mut self) {
        self.path.clear();
    }

    /// Swap the top route. On an empty stack this is a plain push.
    pub fn replace(&mut self, route: Route) {
        self.path.pop();
        self.path.push(route);
    }

    /// Follow a deep link. Unrecognized links are ignored.
    /// Returns true if navigation happened.
    pub fn handle_url(&mut self, url: &str) -> bool {
        match self.links.parse(url) {
            Some(LinkAction::OpenBox(box_id)) => {
                self.navigate(Route::BoxDetail(box_id));
                true
            }
            None => false,
        }
    }

    pub fn path(&self) -> &[Route] {
        &self.path
    }

    /// The route on screen. An empty stack shows `Home`.
    pub fn current(&self) -> &Route {
        self.path.last().unwrap_or(&HOME)
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.path.is_empty()
    }
}
