/// State management module
///
/// This module handles the persistent catalog:
/// - Shared data structures (data.rs)
/// - The repository interface and box lifecycle rules (store.rs)
/// - The SQLite-backed catalog (library.rs)
/// - Error types (error.rs)

pub mod data;
pub mod error;
pub mod library;
pub mod store;

pub use data::{BoxFilter, BoxItem, BoxSort, BoxUpdate, RecognitionSource, StorageBox};
pub use error::BoxError;
pub use library::Library;
pub use store::BoxStore;
