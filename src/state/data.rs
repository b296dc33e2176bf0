/// Shared data structures for the catalog
///
/// These structs represent the data model that flows between
/// the database layer and the front end.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::error::BoxError;

/// How an item was identified when it was added to a box
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecognitionSource {
    Ai,
    #[default]
    Manual,
}

impl RecognitionSource {
    /// Label stored in the database and shown to the user
    pub fn as_str(&self) -> &'static str {
        match self {
            RecognitionSource::Ai => "AI Recognition",
            RecognitionSource::Manual => "Manual Entry",
        }
    }

    /// Parse a stored label. Unknown labels fall back to manual entry.
    pub fn from_label(label: &str) -> Self {
        match label {
            "AI Recognition" => RecognitionSource::Ai,
            _ => RecognitionSource::Manual,
        }
    }
}

/// A single thing recorded as living inside a box
#[derive(Debug, Clone, PartialEq)]
pub struct BoxItem {
    pub id: Uuid,
    pub name: String,
    pub recognized_by: RecognitionSource,
    /// 0.0 to 1.0
    pub confidence: f64,
    pub added_at: DateTime<Utc>,
    /// Back-reference to the owning box. Set by `StorageBox::add_item`.
    pub box_id: Option<Uuid>,
}

impl BoxItem {
    /// Create a detached item.
    ///
    /// Fails if `confidence` is not a finite number in `[0.0, 1.0]`.
    pub fn new(
        name: impl Into<String>,
        recognized_by: RecognitionSource,
        confidence: f64,
    ) -> Result<Self, BoxError> {
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            return Err(BoxError::InvalidConfidence(confidence));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            name: name.into(),
            recognized_by,
            confidence,
            added_at: now(),
            box_id: None,
        })
    }

    /// A manually entered item with full confidence
    pub fn manual(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            recognized_by: RecognitionSource::Manual,
            confidence: 1.0,
            added_at: now(),
            box_id: None,
        }
    }
}

/// A named storage container and everything recorded inside it
#[derive(Debug, Clone, PartialEq)]
pub struct StorageBox {
    pub id: Uuid,
    pub name: String,
    /// Trimmed, lower-cased copy of `name` used for uniqueness checks
    pub(crate) name_key: String,
    /// Absolute path of the JPEG on disk, stored verbatim
    pub photo_path: Option<String>,
    pub location_hint: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub items: Vec<BoxItem>,
}

impl StorageBox {
    /// Create an unsaved box. Call `save` to validate and persist it.
    pub fn new(
        name: impl Into<String>,
        photo_path: Option<String>,
        location_hint: impl Into<String>,
    ) -> Self {
        let name = name.into();
        let created = now();

        Self {
            id: Uuid::new_v4(),
            name_key: name_key(&name),
            name,
            photo_path,
            location_hint: location_hint.into(),
            created_at: created,
            updated_at: created,
            items: Vec::new(),
        }
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn has_photo(&self) -> bool {
        self.photo_path.is_some()
    }

    /// Key used for the duplicate-name check
    pub fn name_key(&self) -> &str {
        &self.name_key
    }

    pub(crate) fn set_name(&mut self, name: &str) {
        self.name = name.trim().to_string();
        self.name_key = name_key(name);
    }
}

/// Current time truncated to the millisecond precision the catalog stores
pub(crate) fn now() -> DateTime<Utc> {
    let now = Utc::now();
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

/// Normalize a box name for case- and whitespace-insensitive comparison
pub fn name_key(name: &str) -> String {
    name.trim().to_lowercase()
}

/// Field changes for `StorageBox::update`. `None` leaves the field alone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoxUpdate {
    pub name: Option<String>,
    pub location_hint: Option<String>,
    pub photo_path: Option<String>,
}

/// Sort orders for listing boxes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BoxSort {
    /// Alphabetical, case-insensitive
    #[default]
    Name,
    /// Most recently updated first
    RecentlyUpdated,
}

/// Predicates for finding boxes. Results are sorted by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BoxFilter {
    WithPhotos,
    Empty,
    /// Case-insensitive substring match on the box name
    NameContains(String),
}
