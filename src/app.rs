use image::{DynamicImage, RgbaImage};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::link::DeepLinks;
use crate::photos::{self, PhotoError};
use crate::qr::{BoxQrFeature, QrError, QrService};
use crate::router::{Route, Router};
use crate::state::{
    BoxError, BoxItem, BoxSort, BoxStore, BoxUpdate, Library, RecognitionSource, StorageBox,
};

/// Anything a user action can fail with. Shown to the user, never fatal.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Catalog(#[from] BoxError),

    #[error(transparent)]
    Qr(#[from] QrError),

    #[error(transparent)]
    Photo(#[from] PhotoError),
}

/// User actions
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Create a box. Uses the photo from the last `load_photo`, if any.
    SaveBox {
        name: String,
        location_hint: String,
    },
    UpdateBox {
        id: String,
        changes: BoxUpdate,
    },
    DeleteBox(String),
    AddItem {
        box_id: String,
        name: String,
        recognized_by: RecognitionSource,
        confidence: f64,
    },
    RemoveItem {
        box_id: String,
        item_id: String,
    },
    /// A deep link handed to the app by the OS or a scanner
    OpenUrl(String),
    Navigate(Route),
    NavigateBack,
    NavigateHome,
}

/// What the front end should draw for the current route
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    Home(Vec<StorageBox>),
    BoxDetail(StorageBox),
    /// The route named a box that does not exist
    NotFound(String),
    Settings,
    AddBox,
    EditBox(StorageBox),
}

/// Main application state
pub struct App {
    library: Library,
    router: Router,
    qr: QrService,
    links: DeepLinks,
    config: AppConfig,
    /// Status message to display to the user
    status: String,
    /// Photo picked for the box being edited, already saved to disk
    pending_photo: Option<String>,
}

impl App {
    /// Open the catalog named by `config`
    pub fn new(config: AppConfig) -> Result<Self, BoxError> {
        let library = Library::open(&config.database_path())?;
        Ok(Self::with_library(config, library))
    }

    pub fn with_library(config: AppConfig, library: Library) -> Self {
        let links = config.deep_links();
        let status = match library.box_count() {
            Ok(count) => {
                info!("📦 Catalog ready with {} boxes", count);
                format!("Ready. {} boxes in catalog.", count)
            }
            Err(e) => {
                warn!("⚠️  Could not count boxes: {}", e);
                format!("Ready. Could not count boxes: {}", e)
            }
        };

        Self {
            library,
            router: Router::new(links.clone()),
            qr: config.qr_service(),
            links,
            config,
            status,
            pending_photo: None,
        }
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn router(&self) -> &Router {
        &self.router
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pending_photo(&self) -> Option<&str> {
        self.pending_photo.as_deref()
    }

    /// Handle a user action. Failures end up in `status`.
    /// Returns true if the action succeeded.
    pub fn update(&mut self, message: Message) -> bool {
        match self.apply(message) {
            Ok(Some(status)) => {
                self.status = status;
                true
            }
            Ok(None) => true,
            Err(e) => {
                warn!("⚠️  {}", e);
                self.status = e.to_string();
                false
            }
        }
    }

    fn apply(&mut self, message: Message) -> Result<Option<String>, AppError> {
        match message {
            Message::SaveBox {
                name,
                location_hint,
            } => {
                let mut storage_box =
                    StorageBox::new(name, self.pending_photo.clone(), location_hint);
                storage_box.save(&mut self.library)?;

                self.pending_photo = None;
                self.router.navigate_back();
                Ok(Some(format!(
                    "Saved box '{}' ({})",
                    storage_box.name, storage_box.id
                )))
            }
            Message::UpdateBox { id, mut changes } => {
                let mut storage_box = self.require_box(&id)?;
                if changes.photo_path.is_none() {
                    changes.photo_path = self.pending_photo.clone();
                }
                storage_box.update(&mut self.library, changes)?;

                self.pending_photo = None;
                self.router.navigate_back();
                Ok(Some(format!("Updated box '{}'", storage_box.name)))
            }
            Message::DeleteBox(id) => {
                let storage_box = self.require_box(&id)?;
                let name = storage_box.name.clone();
                storage_box.delete(&mut self.library)?;

                self.router.navigate_back();
                Ok(Some(format!("Deleted box '{}'", name)))
            }
            Message::AddItem {
                box_id,
                name,
                recognized_by,
                confidence,
            } => {
                let item = BoxItem::new(name, recognized_by, confidence)?;
                let item_id = item.id;
                let mut storage_box = self.require_box(&box_id)?;
                storage_box.add_item(&mut self.library, item)?;

                Ok(Some(format!(
                    "Added item {} to '{}' ({} items)",
                    item_id,
                    storage_box.name,
                    storage_box.item_count()
                )))
            }
            Message::RemoveItem { box_id, item_id } => {
                let mut storage_box = self.require_box(&box_id)?;
                let removed = match Uuid::parse_str(&item_id) {
                    Ok(item_id) => storage_box.remove_item(&mut self.library, item_id)?,
                    Err(_) => None,
                };

                Ok(Some(match removed {
                    Some(item) => format!("Removed '{}' from '{}'", item.name, storage_box.name),
                    None => format!("No item {} in '{}'", item_id, storage_box.name),
                }))
            }
            Message::OpenUrl(url) => {
                // Unrecognized links are dropped without telling the user
                self.router.handle_url(&url);
                Ok(None)
            }
            Message::Navigate(route) => {
                self.router.navigate(route);
                Ok(None)
            }
            Message::NavigateBack => {
                self.router.navigate_back();
                Ok(None)
            }
            Message::NavigateHome => {
                self.router.navigate_to_root();
                Ok(None)
            }
        }
    }

    /// Save picked photo bytes and remember the path for the next save/update.
    /// On failure the previously picked photo is kept.
    pub async fn load_photo(&mut self, bytes: Vec<u8>) -> bool {
        match photos::import_photo(bytes, self.config.documents_dir()).await {
            Ok(path) => {
                self.pending_photo = Some(path);
                self.status = "Photo ready.".to_string();
                true
            }
            Err(e) => {
                warn!("⚠️  Photo import failed: {}", e);
                self.status = "Failed to load photo".to_string();
                false
            }
        }
    }

    /// Resolve the current route into something drawable
    pub fn screen(&self) -> Result<Screen, BoxError> {
        let screen = match self.router.current() {
            Route::Home => Screen::Home(self.library.list_boxes(BoxSort::Name)?),
            Route::Settings => Screen::Settings,
            Route::AddBox => Screen::AddBox,
            Route::BoxDetail(id) => match self.find_box(id)? {
                Some(storage_box) => Screen::BoxDetail(storage_box),
                None => Screen::NotFound(id.clone()),
            },
            Route::EditBox(id) => match self.find_box(id)? {
                Some(storage_box) => Screen::EditBox(storage_box),
                None => Screen::NotFound(id.clone()),
            },
        };
        Ok(screen)
    }

    /// Render the QR code for a box, with an optional center logo
    pub fn box_qr(&self, id: &str, logo: Option<&DynamicImage>) -> Result<RgbaImage, AppError> {
        let storage_box = self.require_box(id)?;
        let feature = BoxQrFeature::new(&self.qr, &self.links);

        let image = match logo {
            Some(logo) => feature.execute_with_logo(&storage_box, logo)?,
            None => feature.execute(&storage_box)?,
        };
        Ok(image)
    }

    /// Write a box's QR code to `dest`, or to the downloads directory
    pub fn export_box_qr(
        &self,
        id: &str,
        logo: Option<&DynamicImage>,
        dest: Option<&Path>,
    ) -> Result<PathBuf, AppError> {
        let image = self.box_qr(id, logo)?;

        match dest {
            Some(path) => {
                // JPEG has no alpha channel
                DynamicImage::ImageRgba8(image)
                    .to_rgb8()
                    .save(path)
                    .map_err(PhotoError::from)?;
                info!("💾 QR code saved to {}", path.display());
                Ok(path.to_path_buf())
            }
            None => Ok(photos::export_qr(&image, &self.config.downloads_dir())?),
        }
    }

    /// Ids in routes and links are opaque strings. Anything that is not a
    /// UUID simply matches no box.
    fn find_box(&self, id: &str) -> Result<Option<StorageBox>, BoxError> {
        match Uuid::parse_str(id) {
            Ok(uuid) => self.library.find_box(uuid),
            Err(_) => Ok(None),
        }
    }

    fn require_box(&self, id: &str) -> Result<StorageBox, BoxError> {
        self.find_box(id)?
            .ok_or_else(|| BoxError::NotFound(id.to_string()))
    }
}

impl std::fmt::Debug for App {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("App")
            .field("library", &self.library)
            .field("route", self.router.current())
            .field("status", &self.status)
            .finish()
    }
}
