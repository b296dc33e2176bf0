use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Params, Row};
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

use super::data::{name_key, BoxFilter, BoxItem, BoxSort, RecognitionSource, StorageBox};
use super::error::BoxError;
use super::store::BoxStore;

const BOX_COLUMNS: &str =
    "id, name, name_key, photo_path, location_hint, created_at, updated_at";

const ITEM_COLUMNS: &str = "id, box_id, name, recognized_by, confidence, added_at";

/// The Library manages the SQLite catalog database.
/// It stores every box and the items recorded inside it.
pub struct Library {
    conn: Connection,
    db_path: PathBuf,
}

impl Library {
    /// Open (or create) the catalog at `db_path` and initialize the schema.
    pub fn open(db_path: &Path) -> Result<Self, BoxError> {
        // Ensure the parent directory exists
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        info!("📁 Database opened at: {}", db_path.display());

        Self::with_connection(conn, db_path.to_path_buf())
    }

    /// Open a throwaway catalog that lives only in memory
    pub fn open_in_memory() -> Result<Self, BoxError> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn, PathBuf::from(":memory:"))
    }

    fn with_connection(conn: Connection, db_path: PathBuf) -> Result<Self, BoxError> {
        conn.pragma_update(None, "foreign_keys", "ON")?;

        let mut library = Library { conn, db_path };
        library.init_schema()?;

        Ok(library)
    }

    /// Initialize the database schema.
    /// Creates all necessary tables and indexes if they don't exist.
    fn init_schema(&mut self) -> rusqlite::Result<()> {
        // Uniqueness of name_key is checked before every write, not by the table
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS boxes (
                id              TEXT PRIMARY KEY,
                name            TEXT NOT NULL,
                name_key        TEXT NOT NULL,
                photo_path      TEXT,
                location_hint   TEXT NOT NULL DEFAULT '',
                created_at      INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS items (
                id              TEXT PRIMARY KEY,
                box_id          TEXT NOT NULL,
                name            TEXT NOT NULL,
                recognized_by   TEXT NOT NULL DEFAULT 'Manual Entry',
                confidence      REAL NOT NULL DEFAULT 1.0,
                added_at        INTEGER NOT NULL,
                FOREIGN KEY(box_id) REFERENCES boxes(id) ON DELETE CASCADE
            )",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_boxes_name_key ON boxes(name_key)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_boxes_updated_at ON boxes(updated_at DESC)",
            [],
        )?;

        self.conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_items_box_id ON items(box_id)",
            [],
        )?;

        debug!("✅ Database schema initialized");
        Ok(())
    }

    /// Get the path to the database file
    pub fn path(&self) -> &PathBuf {
        &self.db_path
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Get a count of boxes in the catalog
    pub fn box_count(&self) -> Result<i64, BoxError> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM boxes", [], |row| row.get(0))?;
        Ok(count)
    }

    /// Run a box query and attach each box's items
    fn query_boxes<P: Params>(&self, clause: &str, params: P) -> Result<Vec<StorageBox>, BoxError> {
        let sql = format!("SELECT {BOX_COLUMNS} FROM boxes {clause}");
        let mut stmt = self.conn.prepare(&sql)?;

        let boxes = stmt
            .query_map(params, box_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        boxes
            .into_iter()
            .map(|mut storage_box| {
                storage_box.items = self.load_items(storage_box.id)?;
                Ok(storage_box)
            })
            .collect()
    }

    fn load_items(&self, box_id: Uuid) -> rusqlite::Result<Vec<BoxItem>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {ITEM_COLUMNS} FROM items WHERE box_id = ?1 ORDER BY added_at, name"
        ))?;

        let items = stmt
            .query_map([box_id.to_string()], item_from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(items)
    }
}

impl BoxStore for Library {
    fn insert_box(&mut self, storage_box: &StorageBox) -> Result<(), BoxError> {
        let tx = self.conn.transaction()?;

        tx.execute(
            &format!("INSERT INTO boxes ({BOX_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)"),
            params![
                storage_box.id.to_string(),
                storage_box.name,
                storage_box.name_key,
                storage_box.photo_path,
                storage_box.location_hint,
                storage_box.created_at.timestamp_millis(),
                storage_box.updated_at.timestamp_millis(),
            ],
        )?;

        for item in &storage_box.items {
            insert_item_row(&tx, item, storage_box.id)?;
        }

        tx.commit()?;
        Ok(())
    }

    fn update_box(&mut self, storage_box: &StorageBox) -> Result<(), BoxError> {
        let changed = self.conn.execute(
            "UPDATE boxes
             SET name = ?1, name_key = ?2, photo_path = ?3, location_hint = ?4, updated_at = ?5
             WHERE id = ?6",
            params![
                storage_box.name,
                storage_box.name_key,
                storage_box.photo_path,
                storage_box.location_hint,
                storage_box.updated_at.timestamp_millis(),
                storage_box.id.to_string(),
            ],
        )?;

        if changed == 0 {
            return Err(BoxError::NotFound(storage_box.id.to_string()));
        }
        Ok(())
    }

    fn delete_box(&mut self, id: Uuid) -> Result<bool, BoxError> {
        let id = id.to_string();
        let tx = self.conn.transaction()?;

        // Explicit cascade, the foreign key only backs it up
        let items = tx.execute("DELETE FROM items WHERE box_id = ?1", [&id])?;
        let boxes = tx.execute("DELETE FROM boxes WHERE id = ?1", [&id])?;

        tx.commit()?;

        if boxes > 0 {
            debug!("🧹 Cascade removed {} items of box {}", items, id);
        }
        Ok(boxes > 0)
    }

    fn find_box(&self, id: Uuid) -> Result<Option<StorageBox>, BoxError> {
        let mut found = self.query_boxes("WHERE id = ?1", [id.to_string()])?;
        Ok(found.pop())
    }

    fn find_boxes(&self, filter: &BoxFilter) -> Result<Vec<StorageBox>, BoxError> {
        match filter {
            BoxFilter::WithPhotos => self.query_boxes(
                "WHERE photo_path IS NOT NULL ORDER BY name_key ASC",
                [],
            ),
            BoxFilter::Empty => self.query_boxes(
                "WHERE NOT EXISTS (SELECT 1 FROM items WHERE items.box_id = boxes.id)
                 ORDER BY name_key ASC",
                [],
            ),
            BoxFilter::NameContains(fragment) => self.query_boxes(
                "WHERE instr(name_key, ?1) > 0 ORDER BY name_key ASC",
                [name_key(fragment)],
            ),
        }
    }

    fn list_boxes(&self, sort: BoxSort) -> Result<Vec<StorageBox>, BoxError> {
        let clause = match sort {
            BoxSort::Name => "ORDER BY name_key ASC",
            BoxSort::RecentlyUpdated => "ORDER BY updated_at DESC",
        };
        self.query_boxes(clause, [])
    }

    fn name_taken(&self, name_key: &str, exclude: Uuid) -> Result<bool, BoxError> {
        let existing: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM boxes WHERE name_key = ?1 AND id != ?2 LIMIT 1",
                params![name_key, exclude.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(existing.is_some())
    }

    fn attach_item(
        &mut self,
        box_id: Uuid,
        updated_at: DateTime<Utc>,
        item: &BoxItem,
    ) -> Result<(), BoxError> {
        let tx = self.conn.transaction()?;

        if touch_box(&tx, box_id, updated_at)? == 0 {
            return Err(BoxError::NotFound(box_id.to_string()));
        }
        insert_item_row(&tx, item, box_id)?;

        tx.commit()?;
        Ok(())
    }

    fn detach_item(
        &mut self,
        box_id: Uuid,
        updated_at: DateTime<Utc>,
        item_id: Uuid,
    ) -> Result<bool, BoxError> {
        let tx = self.conn.transaction()?;

        if touch_box(&tx, box_id, updated_at)? == 0 {
            return Err(BoxError::NotFound(box_id.to_string()));
        }
        let deleted = tx.execute(
            "DELETE FROM items WHERE id = ?1 AND box_id = ?2",
            params![item_id.to_string(), box_id.to_string()],
        )?;

        tx.commit()?;
        Ok(deleted > 0)
    }

    fn find_item(&self, id: Uuid) -> Result<Option<BoxItem>, BoxError> {
        let item = self
            .conn
            .query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = ?1"),
                [id.to_string()],
                item_from_row,
            )
            .optional()?;
        Ok(item)
    }
}

fn touch_box(conn: &Connection, box_id: Uuid, updated_at: DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE boxes SET updated_at = ?1 WHERE id = ?2",
        params![updated_at.timestamp_millis(), box_id.to_string()],
    )
}

fn insert_item_row(conn: &Connection, item: &BoxItem, box_id: Uuid) -> rusqlite::Result<usize> {
    conn.execute(
        &format!("INSERT INTO items ({ITEM_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6)"),
        params![
            item.id.to_string(),
            box_id.to_string(),
            item.name,
            item.recognized_by.as_str(),
            item.confidence,
            item.added_at.timestamp_millis(),
        ],
    )
}

fn box_from_row(row: &Row<'_>) -> rusqlite::Result<StorageBox> {
    Ok(StorageBox {
        id: uuid_column(row, 0)?,
        name: row.get(1)?,
        name_key: row.get(2)?,
        photo_path: row.get(3)?,
        location_hint: row.get(4)?,
        created_at: time_column(row, 5)?,
        updated_at: time_column(row, 6)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<BoxItem> {
    let label: String = row.get(3)?;
    Ok(BoxItem {
        id: uuid_column(row, 0)?,
        box_id: Some(uuid_column(row, 1)?),
        name: row.get(2)?,
        recognized_by: RecognitionSource::from_label(&label),
        confidence: row.get(4)?,
        added_at: time_column(row, 5)?,
    })
}

fn uuid_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let text: String = row.get(idx)?;
    Uuid::parse_str(&text)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Timestamps are stored as UTC milliseconds
fn time_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

// Implement Debug for better error messages
impl std::fmt::Debug for Library {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Library")
            .field("db_path", &self.db_path)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::data::BoxUpdate;
    use std::thread::sleep;
    use std::time::Duration;

    fn library() -> Library {
        Library::open_in_memory().unwrap()
    }

    fn saved_box(library: &mut Library, name: &str) -> StorageBox {
        let mut storage_box = StorageBox::new(name, None, "");
        storage_box.save(library).unwrap();
        storage_box
    }

    #[test]
    fn test_save_and_find_round_trip() {
        let mut library = library();
        let mut storage_box = StorageBox::new("Kitchen Drawer", None, "Under sink");
        storage_box.items.push(BoxItem::manual("USB-C Cable"));
        storage_box.save(&mut library).unwrap();

        let loaded = library.find_box(storage_box.id).unwrap().unwrap();
        assert_eq!(loaded, storage_box);
        assert_eq!(loaded.items[0].box_id, Some(storage_box.id));
        assert_eq!(library.box_count().unwrap(), 1);
    }

    #[test]
    fn test_empty_name_is_rejected() {
        let mut library = library();
        let mut storage_box = StorageBox::new("   ", None, "");
        assert!(matches!(
            storage_box.save(&mut library),
            Err(BoxError::InvalidName)
        ));
        assert_eq!(library.box_count().unwrap(), 0);
    }

    #[test]
    fn test_duplicate_name_ignores_case_and_whitespace() {
        let mut library = library();
        saved_box(&mut library, "n");

        for variant in [" N ", "N", "n", "\tn  "] {
            let mut duplicate = StorageBox::new(variant, None, "");
            assert!(
                matches!(duplicate.save(&mut library), Err(BoxError::DuplicateName)),
                "{variant:?} should collide"
            );
        }
        assert_eq!(library.box_count().unwrap(), 1);
    }

    #[test]
    fn test_rename_to_own_name_succeeds() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Garage");

        storage_box
            .update(
                &mut library,
                BoxUpdate {
                    name: Some("  garage ".to_string()),
                    ..BoxUpdate::default()
                },
            )
            .unwrap();

        let loaded = library.find_box(storage_box.id).unwrap().unwrap();
        assert_eq!(loaded.name, "garage");
    }

    #[test]
    fn test_rename_to_other_box_name_fails() {
        let mut library = library();
        saved_box(&mut library, "Garage");
        let mut attic = saved_box(&mut library, "Attic");

        let result = attic.update(
            &mut library,
            BoxUpdate {
                name: Some("GARAGE".to_string()),
                location_hint: Some("Top shelf".to_string()),
                ..BoxUpdate::default()
            },
        );

        assert!(matches!(result, Err(BoxError::DuplicateName)));
        assert_eq!(attic.name, "Attic");
        assert_eq!(attic.location_hint, "");
    }

    #[test]
    fn test_rename_to_blank_fails() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Garage");

        let result = storage_box.update(
            &mut library,
            BoxUpdate {
                name: Some(" ".to_string()),
                ..BoxUpdate::default()
            },
        );
        assert!(matches!(result, Err(BoxError::InvalidName)));
    }

    #[test]
    fn test_update_unsaved_box_is_not_found() {
        let mut library = library();
        let mut storage_box = StorageBox::new("Ghost", None, "");

        let result = storage_box.update(&mut library, BoxUpdate::default());
        assert!(matches!(result, Err(BoxError::NotFound(_))));
    }

    #[test]
    fn test_add_and_remove_item_bump_updated_at() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Desk");
        let created = storage_box.updated_at;

        sleep(Duration::from_millis(5));
        let item = BoxItem::new("Stapler", RecognitionSource::Ai, 0.72).unwrap();
        let item_id = item.id;
        storage_box.add_item(&mut library, item).unwrap();

        assert!(storage_box.updated_at > created);
        assert_eq!(storage_box.item_count(), 1);
        let stored = library.find_item(item_id).unwrap().unwrap();
        assert_eq!(stored.box_id, Some(storage_box.id));
        assert_eq!(stored.recognized_by, RecognitionSource::Ai);
        assert_eq!(stored.confidence, 0.72);

        let after_add = storage_box.updated_at;
        sleep(Duration::from_millis(5));
        let removed = storage_box.remove_item(&mut library, item_id).unwrap().unwrap();

        assert_eq!(removed.box_id, None);
        assert!(storage_box.is_empty());
        assert!(storage_box.updated_at > after_add);
        assert!(library.find_item(item_id).unwrap().is_none());

        let loaded = library.find_box(storage_box.id).unwrap().unwrap();
        assert_eq!(loaded.updated_at, storage_box.updated_at);
    }

    #[test]
    fn test_remove_unknown_item_is_noop() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Desk");
        storage_box
            .add_item(&mut library, BoxItem::manual("Pen"))
            .unwrap();

        let removed = storage_box.remove_item(&mut library, Uuid::new_v4()).unwrap();
        assert!(removed.is_none());
        assert_eq!(storage_box.item_count(), 1);
    }

    #[test]
    fn test_failed_update_keeps_fields() {
        let mut library = library();
        let mut storage_box = StorageBox::new("Ghost", None, "Basement");

        let result = storage_box.update(
            &mut library,
            BoxUpdate {
                name: Some("Spirit".to_string()),
                location_hint: Some("Attic".to_string()),
                photo_path: Some("/tmp/ghost.jpg".to_string()),
            },
        );

        assert!(matches!(result, Err(BoxError::NotFound(_))));
        assert_eq!(storage_box.name, "Ghost");
        assert_eq!(storage_box.name_key(), "ghost");
        assert_eq!(storage_box.location_hint, "Basement");
        assert!(storage_box.photo_path.is_none());
    }

    #[test]
    fn test_failed_add_item_writes_nothing() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Desk");
        let item = BoxItem::manual("Pen");
        storage_box.add_item(&mut library, item.clone()).unwrap();
        let stamped = storage_box.updated_at;

        sleep(Duration::from_millis(5));
        let result = storage_box.add_item(&mut library, item);

        assert!(matches!(result, Err(BoxError::Database(_))));
        assert_eq!(storage_box.item_count(), 1);
        assert_eq!(storage_box.updated_at, stamped);
        let loaded = library.find_box(storage_box.id).unwrap().unwrap();
        assert_eq!(loaded.updated_at, stamped);
        assert_eq!(loaded.item_count(), 1);
    }

    #[test]
    fn test_add_item_to_unsaved_box_is_not_found() {
        let mut library = library();
        let mut storage_box = StorageBox::new("Ghost", None, "");

        let result = storage_box.add_item(&mut library, BoxItem::manual("Chain"));
        assert!(matches!(result, Err(BoxError::NotFound(_))));
        assert!(storage_box.is_empty());
    }

    #[test]
    fn test_delete_cascades_to_items() {
        let mut library = library();
        let mut storage_box = saved_box(&mut library, "Closet");
        let mut item_ids = Vec::new();
        for name in ["Scarf", "Hat", "Gloves"] {
            let item = BoxItem::manual(name);
            item_ids.push(item.id);
            storage_box.add_item(&mut library, item).unwrap();
        }
        let box_id = storage_box.id;

        storage_box.delete(&mut library).unwrap();

        assert!(library.find_box(box_id).unwrap().is_none());
        for id in item_ids {
            assert!(library.find_item(id).unwrap().is_none());
        }
        let count: i64 = library
            .conn
            .query_row("SELECT COUNT(*) FROM items", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_delete_missing_box_is_not_found() {
        let mut library = library();
        let storage_box = StorageBox::new("Never saved", None, "");
        assert!(matches!(
            storage_box.delete(&mut library),
            Err(BoxError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_sorted_by_name_and_recency() {
        let mut library = library();
        let mut zebra = saved_box(&mut library, "zebra");
        saved_box(&mut library, "Apple");
        saved_box(&mut library, "mango");

        let names: Vec<_> = library
            .list_boxes(BoxSort::Name)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, ["Apple", "mango", "zebra"]);

        sleep(Duration::from_millis(5));
        zebra
            .update(
                &mut library,
                BoxUpdate {
                    location_hint: Some("Hall".to_string()),
                    ..BoxUpdate::default()
                },
            )
            .unwrap();

        let recent = library.list_boxes(BoxSort::RecentlyUpdated).unwrap();
        assert_eq!(recent[0].name, "zebra");
    }

    #[test]
    fn test_filters() {
        let mut library = library();
        let mut with_photo = StorageBox::new("Photos", Some("/tmp/a.jpg".to_string()), "");
        with_photo.save(&mut library).unwrap();
        let mut full = saved_box(&mut library, "Tools");
        full.add_item(&mut library, BoxItem::manual("Hammer")).unwrap();
        saved_box(&mut library, "Toys");

        let photos = library.find_boxes(&BoxFilter::WithPhotos).unwrap();
        assert_eq!(photos.len(), 1);
        assert!(photos[0].has_photo());

        let empty: Vec<_> = library
            .find_boxes(&BoxFilter::Empty)
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(empty, ["Photos", "Toys"]);

        let matches = library
            .find_boxes(&BoxFilter::NameContains(" TOO".to_string()))
            .unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].name, "Tools");
    }

    #[test]
    fn test_catalog_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join("catalog.db");

        let id = {
            let mut library = Library::open(&db_path).unwrap();
            let mut storage_box = StorageBox::new("Basement", None, "Left corner");
            storage_box.items.push(BoxItem::manual("Paint"));
            storage_box.save(&mut library).unwrap();
            storage_box.id
        };

        let library = Library::open(&db_path).unwrap();
        let loaded = library.find_box(id).unwrap().unwrap();
        assert_eq!(loaded.location_hint, "Left corner");
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(library.path(), &db_path);
    }

    #[test]
    fn test_photo_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let photo = dir.path().join("box.jpg");
        std::fs::write(&photo, b"jpeg").unwrap();

        let with_photo = StorageBox::new("A", Some(photo.to_string_lossy().to_string()), "");
        assert_eq!(with_photo.photo().unwrap(), photo.as_path());

        let missing = StorageBox::new("B", Some("/nonexistent/x.jpg".to_string()), "");
        assert!(matches!(missing.photo(), Err(BoxError::PhotoNotFound)));

        let none = StorageBox::new("C", None, "");
        assert!(matches!(none.photo(), Err(BoxError::PhotoNotFound)));
    }
}
