/// QR code module
///
/// This module handles:
/// - Rendering payloads as QR images, plain, recolored or with a logo (service.rs)
/// - Standard payload formats for URLs, contacts and WiFi (payload.rs)
/// - QR codes that deep link to a box (feature.rs)

pub mod feature;
pub mod payload;
pub mod service;

pub use feature::BoxQrFeature;
pub use payload::WifiSecurity;
pub use service::{CorrectionLevel, QrError, QrService, DEFAULT_LOGO_SIZE, DEFAULT_SIZE};
