use thiserror::Error;

/// Errors raised by box and item operations
#[derive(Debug, Error)]
pub enum BoxError {
    #[error("A box with this name already exists")]
    DuplicateName,

    #[error("Box name cannot be empty")]
    InvalidName,

    #[error("Photo not found")]
    PhotoNotFound,

    #[error("Box not found: {0}")]
    NotFound(String),

    #[error("Confidence must be between 0.0 and 1.0, got {0}")]
    InvalidConfidence(f64),

    #[error("Could not prepare catalog directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}
