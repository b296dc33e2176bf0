/// Repository interface and the box lifecycle built on top of it
///
/// The store only persists rows. Name validation, the duplicate check and
/// timestamp bookkeeping live here so every backend enforces the same rules
/// before anything is written.

use chrono::{DateTime, Utc};
use std::path::Path;

use tracing::{debug, info};
use uuid::Uuid;

use super::data::{name_key, now, BoxFilter, BoxItem, BoxSort, BoxUpdate, StorageBox};
use super::error::BoxError;

/// Persistence operations for boxes and their items
pub trait BoxStore {
    /// Insert a box row together with every item it currently owns
    fn insert_box(&mut self, storage_box: &StorageBox) -> Result<(), BoxError>;

    /// Overwrite the box row (not its items). `NotFound` if the box was never saved.
    fn update_box(&mut self, storage_box: &StorageBox) -> Result<(), BoxError>;

    /// Delete a box and all of its items. Returns false if nothing was deleted.
    fn delete_box(&mut self, id: Uuid) -> Result<bool, BoxError>;

    /// Load a box with its items
    fn find_box(&self, id: Uuid) -> Result<Option<StorageBox>, BoxError>;

    fn find_boxes(&self, filter: &BoxFilter) -> Result<Vec<StorageBox>, BoxError>;

    fn list_boxes(&self, sort: BoxSort) -> Result<Vec<StorageBox>, BoxError>;

    /// True if a box other than `exclude` already uses `name_key`
    fn name_taken(&self, name_key: &str, exclude: Uuid) -> Result<bool, BoxError>;

    /// Insert an item owned by `box_id` and set the box's `updated_at`, atomically.
    /// `NotFound` if the box was never saved.
    fn attach_item(
        &mut self,
        box_id: Uuid,
        updated_at: DateTime<Utc>,
        item: &BoxItem,
    ) -> Result<(), BoxError>;

    /// Delete an item only if it belongs to `box_id`, and set the box's
    /// `updated_at` in the same write. Returns whether an item row went away.
    fn detach_item(
        &mut self,
        box_id: Uuid,
        updated_at: DateTime<Utc>,
        item_id: Uuid,
    ) -> Result<bool, BoxError>;

    fn find_item(&self, id: Uuid) -> Result<Option<BoxItem>, BoxError>;
}

impl StorageBox {
    /// Validate and insert a new box
    pub fn save(&mut self, store: &mut impl BoxStore) -> Result<(), BoxError> {
        let name = self.name.clone();
        ensure_name_available(&*store, &name, self.id)?;

        self.set_name(&name);
        self.updated_at = now();
        let id = self.id;
        for item in &mut self.items {
            item.box_id = Some(id);
        }

        store.insert_box(self)?;
        info!("📦 Saved box '{}' ({})", self.name, self.id);
        Ok(())
    }

    /// Apply field changes. A new name goes through the same validation as `save`,
    /// ignoring this box's own current name.
    pub fn update(&mut self, store: &mut impl BoxStore, changes: BoxUpdate) -> Result<(), BoxError> {
        // `self` only changes once the row is written
        let mut updated = self.clone();
        if let Some(name) = &changes.name {
            ensure_name_available(&*store, name, self.id)?;
            updated.set_name(name);
        }
        if let Some(location_hint) = changes.location_hint {
            updated.location_hint = location_hint;
        }
        if let Some(photo_path) = changes.photo_path {
            updated.photo_path = Some(photo_path);
        }
        updated.updated_at = now();

        store.update_box(&updated)?;
        *self = updated;
        debug!("✏️  Updated box {}", self.id);
        Ok(())
    }

    /// Attach an item to this box and persist it
    pub fn add_item(&mut self, store: &mut impl BoxStore, mut item: BoxItem) -> Result<(), BoxError> {
        item.box_id = Some(self.id);
        let touched = now();

        store.attach_item(self.id, touched, &item)?;

        debug!("➕ Added '{}' to box {}", item.name, self.id);
        self.updated_at = touched;
        self.items.push(item);
        Ok(())
    }

    /// Detach an item by id. Returns the detached item, if this box owned it.
    pub fn remove_item(
        &mut self,
        store: &mut impl BoxStore,
        item_id: Uuid,
    ) -> Result<Option<BoxItem>, BoxError> {
        let touched = now();
        store.detach_item(self.id, touched, item_id)?;
        self.updated_at = touched;

        let removed = self
            .items
            .iter()
            .position(|item| item.id == item_id)
            .map(|index| self.items.remove(index))
            .map(|mut item| {
                item.box_id = None;
                item
            });

        if let Some(item) = &removed {
            debug!("➖ Removed '{}' from box {}", item.name, self.id);
        }
        Ok(removed)
    }

    /// Delete this box and every item it owns
    pub fn delete(self, store: &mut impl BoxStore) -> Result<(), BoxError> {
        if !store.delete_box(self.id)? {
            return Err(BoxError::NotFound(self.id.to_string()));
        }
        info!("🗑️  Deleted box '{}' and {} items", self.name, self.items.len());
        Ok(())
    }

    /// Path of the box photo, if one is set and still on disk
    pub fn photo(&self) -> Result<&Path, BoxError> {
        let path = self
            .photo_path
            .as_deref()
            .map(Path::new)
            .ok_or(BoxError::PhotoNotFound)?;

        if !path.exists() {
            return Err(BoxError::PhotoNotFound);
        }
        Ok(path)
    }
}

fn ensure_name_available(store: &impl BoxStore, name: &str, own_id: Uuid) -> Result<(), BoxError> {
    let key = name_key(name);
    if key.is_empty() {
        return Err(BoxError::InvalidName);
    }
    if store.name_taken(&key, own_id)? {
        return Err(BoxError::DuplicateName);
    }
    Ok(())
}
