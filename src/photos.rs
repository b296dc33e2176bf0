/// Photo files on disk
///
/// Box photos and exported QR codes are written as JPEGs named after a fresh
/// UUID. The box record keeps the returned path verbatim.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageError, RgbaImage};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

/// JPEG quality for saved photos (0.8 on a 0-1 scale)
const JPEG_QUALITY: u8 = 80;

#[derive(Debug, Error)]
pub enum PhotoError {
    #[error("Photo not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to write photo: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to decode or encode photo: {0}")]
    Image(#[from] ImageError),

    #[error("Photo task failed: {0}")]
    Task(String),
}

/// Encode `image` as `<dir>/<uuid>.jpg` and return the path
pub fn save_jpeg(image: &DynamicImage, dir: &Path) -> Result<PathBuf, PhotoError> {
    write_jpeg(image, dir, &format!("{}.jpg", Uuid::new_v4()))
}

/// Save a QR code as `<dir>/QRCode-<uuid>.jpg`
pub fn export_qr(image: &RgbaImage, dir: &Path) -> Result<PathBuf, PhotoError> {
    let path = write_jpeg(
        &DynamicImage::ImageRgba8(image.clone()),
        dir,
        &format!("QRCode-{}.jpg", Uuid::new_v4()),
    )?;
    info!("💾 QR code saved to {}", path.display());
    Ok(path)
}

fn write_jpeg(image: &DynamicImage, dir: &Path, filename: &str) -> Result<PathBuf, PhotoError> {
    fs::create_dir_all(dir)?;
    let path = dir.join(filename);

    // JPEG has no alpha channel
    let rgb = image.to_rgb8();
    let mut writer = BufWriter::new(File::create(&path)?);
    let encoded = JpegEncoder::new_with_quality(&mut writer, JPEG_QUALITY).encode_image(&rgb);
    let written = match encoded {
        Ok(()) => writer.flush().map_err(PhotoError::from),
        Err(e) => Err(PhotoError::from(e)),
    };
    drop(writer);

    // Never leave a truncated file behind
    if let Err(e) = written {
        if let Err(cleanup) = fs::remove_file(&path) {
            warn!("⚠️  Could not remove partial photo {}: {}", path.display(), cleanup);
        }
        return Err(e);
    }
    Ok(path)
}

/// Decode picked photo bytes and store them under `dir`.
///
/// Runs on the blocking pool. The caller assigns the returned path once this
/// resolves, so no state changes while the photo is being written.
pub async fn import_photo(bytes: Vec<u8>, dir: PathBuf) -> Result<String, PhotoError> {
    tokio::task::spawn_blocking(move || -> Result<String, PhotoError> {
        let image = image::load_from_memory(&bytes)?;
        let path = save_jpeg(&image, &dir)?;
        info!("📸 Saved photo: {}", path.display());
        Ok(path.to_string_lossy().to_string())
    })
    .await
    .map_err(|e| PhotoError::Task(e.to_string()))?
}

/// Decode a stored photo
pub fn load_photo(path: &Path) -> Result<DynamicImage, PhotoError> {
    if !path.exists() {
        return Err(PhotoError::NotFound(path.to_path_buf()));
    }
    Ok(image::open(path)?)
}
