//! What's in the box? Catalog storage boxes and their contents.
//!
//! - `state`: boxes, items and the SQLite catalog
//! - `qr`: QR code rendering and box QR codes
//! - `link`: `whatsinthebox://box/<id>` deep links
//! - `router`: screen history
//! - `photos`: JPEG photo files
//! - `app`: the controller a front end drives

pub mod app;
pub mod config;
pub mod link;
pub mod photos;
pub mod qr;
pub mod router;
pub mod state;

pub use app::{App, AppError, Message, Screen};
pub use config::AppConfig;
