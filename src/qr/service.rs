/// QR code rendering
///
/// The matrix comes from the `qrcode` encoder, one pixel per module.
/// Everything after that (quiet zone, upscaling, recoloring, logo
/// compositing) happens here with the `image` crate.

use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, Luma, Pixel, Rgba, RgbaImage};
use qrcode::{Color as Module, EcLevel, QrCode};
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use super::payload::{contact_payload, url_payload, wifi_payload, WifiSecurity};

/// Default output size in pixels (square)
pub const DEFAULT_SIZE: u32 = 512;

/// Default fraction of the image covered by a center logo
pub const DEFAULT_LOGO_SIZE: f64 = 0.2;

/// Above this a logo hides enough modules that scanners start failing
const MAX_RECOMMENDED_LOGO_SIZE: f64 = 0.3;

/// Light modules around the symbol, as required by ISO/IEC 18004
const QUIET_ZONE: u32 = 4;

/// Padding of the white backdrop behind a logo, and its corner radius
const LOGO_PADDING: i64 = 8;
const LOGO_CORNER_RADIUS: f64 = 8.0;

const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QrError {
    #[error("Invalid QR code data")]
    InvalidInput,

    #[error("Failed to generate QR code")]
    GenerationFailed,

    #[error("Failed to create image from QR code")]
    ImageFailed,
}

/// QR error-correction tier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CorrectionLevel {
    /// ~7% recovery
    Low,
    /// ~15% recovery
    #[default]
    Medium,
    /// ~25% recovery
    Quartile,
    /// ~30% recovery
    High,
}

impl CorrectionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorrectionLevel::Low => "L",
            CorrectionLevel::Medium => "M",
            CorrectionLevel::Quartile => "Q",
            CorrectionLevel::High => "H",
        }
    }

    /// Largest payload, in bytes, that fits a version 40 symbol in byte mode
    pub fn byte_capacity(&self) -> usize {
        match self {
            CorrectionLevel::Low => 2953,
            CorrectionLevel::Medium => 2331,
            CorrectionLevel::Quartile => 1663,
            CorrectionLevel::High => 1273,
        }
    }

    fn ec_level(&self) -> EcLevel {
        match self {
            CorrectionLevel::Low => EcLevel::L,
            CorrectionLevel::Medium => EcLevel::M,
            CorrectionLevel::Quartile => EcLevel::Q,
            CorrectionLevel::High => EcLevel::H,
        }
    }
}

/// Renders QR codes. Build one per process and hand it to whoever needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QrService {
    default_size: u32,
}

impl Default for QrService {
    fn default() -> Self {
        Self::new(DEFAULT_SIZE)
    }
}

impl QrService {
    pub fn new(default_size: u32) -> Self {
        Self { default_size }
    }

    /// Size used by the convenience generators
    pub fn default_size(&self) -> u32 {
        self.default_size
    }

    /// Render `data` as a black-on-white QR code of `size × size` pixels
    pub fn generate(
        &self,
        data: &str,
        size: u32,
        level: CorrectionLevel,
    ) -> Result<RgbaImage, QrError> {
        if data.is_empty() {
            return Err(QrError::InvalidInput);
        }
        if data.len() > level.byte_capacity() {
            debug!(
                "📏 Payload of {} bytes exceeds level {} capacity",
                data.len(),
                level.as_str()
            );
            return Err(QrError::GenerationFailed);
        }
        if size == 0 {
            return Err(QrError::ImageFailed);
        }

        let code = QrCode::with_error_correction_level(data.as_bytes(), level.ec_level())
            .map_err(|e| {
                debug!("❌ QR encoder rejected payload: {}", e);
                QrError::GenerationFailed
            })?;

        let matrix = module_image(&code)?;

        // Nearest keeps module edges sharp, anything else would blur them
        let scaled = imageops::resize(&matrix, size, size, FilterType::Nearest);
        let image = DynamicImage::ImageLuma8(scaled).to_rgba8();

        debug!(
            "🔳 Generated {}x{} QR ({} modules, level {})",
            size,
            size,
            code.width(),
            level.as_str()
        );
        Ok(image)
    }

    /// Render `data` with dark modules in `foreground` and light ones in `background`
    pub fn generate_colored(
        &self,
        data: &str,
        size: u32,
        foreground: Rgba<u8>,
        background: Rgba<u8>,
        level: CorrectionLevel,
    ) -> Result<RgbaImage, QrError> {
        let mut image = self.generate(data, size, level)?;
        false_color(&mut image, foreground, background);
        Ok(image)
    }

    /// Render `data` with `logo` drawn over the center on a white rounded backdrop.
    ///
    /// `logo_size` is the fraction of the image side the logo covers. Use
    /// `CorrectionLevel::High` so the hidden modules can be recovered.
    pub fn generate_with_logo(
        &self,
        data: &str,
        size: u32,
        logo: &DynamicImage,
        logo_size: f64,
        level: CorrectionLevel,
    ) -> Result<RgbaImage, QrError> {
        if !logo_size.is_finite() || !(0.0..=1.0).contains(&logo_size) {
            return Err(QrError::InvalidInput);
        }
        if logo_size > MAX_RECOMMENDED_LOGO_SIZE {
            warn!(
                "⚠️  Logo covers {:.0}% of the QR code, scanning may fail",
                logo_size * 100.0
            );
        }
        if logo.width() == 0 || logo.height() == 0 {
            return Err(QrError::ImageFailed);
        }

        let mut image = self.generate(data, size, level)?;

        let region = logo_region(size, logo_size);
        let origin = i64::from(region.x);
        let side = i64::from(region.side);

        fill_rounded_rect(
            &mut image,
            origin - LOGO_PADDING,
            origin - LOGO_PADDING,
            side + 2 * LOGO_PADDING,
            side + 2 * LOGO_PADDING,
            LOGO_CORNER_RADIUS,
            WHITE,
        );

        if region.side > 0 {
            let scaled = logo
                .resize_exact(region.side, region.side, FilterType::Lanczos3)
                .to_rgba8();
            imageops::overlay(&mut image, &scaled, origin, origin);
        }

        Ok(image)
    }

    pub fn generate_for_url(&self, url: &Url, size: u32) -> Result<RgbaImage, QrError> {
        self.generate(&url_payload(url), size, CorrectionLevel::Medium)
    }

    pub fn generate_for_contact(
        &self,
        name: &str,
        phone: Option<&str>,
        email: Option<&str>,
        size: u32,
    ) -> Result<RgbaImage, QrError> {
        self.generate(
            &contact_payload(name, phone, email),
            size,
            CorrectionLevel::Medium,
        )
    }

    /// Always `DEFAULT_SIZE` pixels with `CorrectionLevel::High`
    pub fn generate_for_wifi(
        &self,
        ssid: &str,
        password: &str,
        security: WifiSecurity,
    ) -> Result<RgbaImage, QrError> {
        self.generate(
            &wifi_payload(ssid, password, security),
            DEFAULT_SIZE,
            CorrectionLevel::High,
        )
    }
}

/// Where a center logo lands, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogoRegion {
    /// Top-left corner (same on both axes)
    pub x: u32,
    pub side: u32,
}

/// Centered square covering `logo_size` of a `size` pixel image
pub fn logo_region(size: u32, logo_size: f64) -> LogoRegion {
    let side = (f64::from(size) * logo_size).round().clamp(0.0, f64::from(size)) as u32;
    LogoRegion {
        x: (size - side) / 2,
        side,
    }
}

/// One pixel per module, with the quiet zone around it
fn module_image(code: &QrCode) -> Result<GrayImage, QrError> {
    let modules = u32::try_from(code.width()).map_err(|_| QrError::ImageFailed)?;
    let colors = code.to_colors();
    if colors.len() != (modules * modules) as usize {
        return Err(QrError::ImageFailed);
    }

    let side = modules + 2 * QUIET_ZONE;
    Ok(GrayImage::from_fn(side, side, |x, y| {
        let inside = (QUIET_ZONE..QUIET_ZONE + modules).contains(&x)
            && (QUIET_ZONE..QUIET_ZONE + modules).contains(&y);
        let dark = inside
            && colors[((y - QUIET_ZONE) * modules + (x - QUIET_ZONE)) as usize] == Module::Dark;
        Luma([if dark { 0 } else { 255 }])
    }))
}

/// Map luma 0 to `dark` and luma 255 to `light`, interpolating in between
fn false_color(image: &mut RgbaImage, dark: Rgba<u8>, light: Rgba<u8>) {
    for pixel in image.pixels_mut() {
        let t = f32::from(pixel.to_luma()[0]) / 255.0;
        let mut mapped = [0u8; 4];
        for (channel, out) in mapped.iter_mut().enumerate() {
            let from = f32::from(dark[channel]);
            let to = f32::from(light[channel]);
            *out = (from + (to - from) * t).round() as u8;
        }
        *pixel = Rgba(mapped);
    }
}

/// Fill a rounded rectangle, clipped to the image
fn fill_rounded_rect(
    image: &mut RgbaImage,
    x: i64,
    y: i64,
    width: i64,
    height: i64,
    radius: f64,
    color: Rgba<u8>,
) {
    if width <= 0 || height <= 0 {
        return;
    }
    let radius = radius.min(width as f64 / 2.0).min(height as f64 / 2.0);

    let (left, top) = (x as f64 + radius, y as f64 + radius);
    let (right, bottom) = ((x + width) as f64 - radius, (y + height) as f64 - radius);

    let x_range = x.max(0)..(x + width).min(i64::from(image.width()));
    let y_range = y.max(0)..(y + height).min(i64::from(image.height()));

    for py in y_range {
        for px in x_range.clone() {
            // Distance from the pixel center to the rectangle shrunk by the radius
            let cx = px as f64 + 0.5;
            let cy = py as f64 + 0.5;
            let dx = cx - cx.clamp(left, right);
            let dy = cy - cy.clamp(top, bottom);
            if dx * dx + dy * dy <= radius * radius {
                image.put_pixel(px as u32, py as u32, color);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(image: &RgbaImage) -> String {
        let gray = DynamicImage::ImageRgba8(image.clone()).to_luma8();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            gray.width() as usize,
            gray.height() as usize,
            |x, y| gray.get_pixel(x as u32, y as u32)[0],
        );
        let grids = prepared.detect_grids();
        assert_eq!(grids.len(), 1, "expected exactly one QR code");
        let (_meta, content) = grids[0].decode().unwrap();
        content
    }

    #[test]
    fn test_generate_decodes_back() {
        let service = QrService::default();
        for payload in [
            "hello",
            "whatsinthebox://box/6f1c2a9e-3b1d-4c55-9a4e-2f0d8f2b7c11",
            "Garage shelf 3, bottom row",
        ] {
            let image = service
                .generate(payload, DEFAULT_SIZE, CorrectionLevel::Medium)
                .unwrap();
            assert_eq!(image.dimensions(), (DEFAULT_SIZE, DEFAULT_SIZE));
            assert_eq!(decode(&image), payload);
        }
    }

    #[test]
    fn test_generate_is_two_tone() {
        let image = QrService::default()
            .generate("crisp edges", 300, CorrectionLevel::Low)
            .unwrap();
        assert!(image.pixels().all(|p| *p == BLACK || *p == WHITE));
        // Quiet zone
        assert_eq!(*image.get_pixel(0, 0), WHITE);
    }

    #[test]
    fn test_empty_payload_is_invalid() {
        let service = QrService::default();
        assert_eq!(
            service.generate("", DEFAULT_SIZE, CorrectionLevel::Medium),
            Err(QrError::InvalidInput)
        );
        assert_eq!(
            service.generate_colored("", 64, BLACK, WHITE, CorrectionLevel::Low),
            Err(QrError::InvalidInput)
        );
    }

    #[test]
    fn test_zero_size_fails_to_render() {
        assert_eq!(
            QrService::default().generate("data", 0, CorrectionLevel::Medium),
            Err(QrError::ImageFailed)
        );
    }

    #[test]
    fn test_capacity_depends_on_level() {
        let service = QrService::default();
        let payload = "a".repeat(1300);

        assert!(service.generate(&payload, 256, CorrectionLevel::Low).is_ok());
        assert_eq!(
            service.generate(&payload, 256, CorrectionLevel::High),
            Err(QrError::GenerationFailed)
        );

        let too_long = "a".repeat(CorrectionLevel::Medium.byte_capacity() + 1);
        assert_eq!(
            service.generate(&too_long, 256, CorrectionLevel::Medium),
            Err(QrError::GenerationFailed)
        );
    }

    #[test]
    fn test_colored_remaps_palette() {
        let navy = Rgba([10, 20, 90, 255]);
        let cream = Rgba([250, 240, 220, 255]);
        let service = QrService::default();

        let plain = service.generate("colors", 200, CorrectionLevel::Medium).unwrap();
        let colored = service
            .generate_colored("colors", 200, navy, cream, CorrectionLevel::Medium)
            .unwrap();

        for (p, c) in plain.pixels().zip(colored.pixels()) {
            if *p == BLACK {
                assert_eq!(*c, navy);
            } else {
                assert_eq!(*c, cream);
            }
        }
        assert_eq!(decode(&colored), "colors");
    }

    #[test]
    fn test_logo_region_geometry() {
        let region = logo_region(512, 0.2);
        assert_eq!(region, LogoRegion { x: 205, side: 102 });
        assert_eq!(logo_region(512, 0.0), LogoRegion { x: 256, side: 0 });
    }

    #[test]
    fn test_logo_is_centered_on_padded_backdrop() {
        let service = QrService::default();
        let red = Rgba([255, 0, 0, 255]);
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(40, 40, red));
        let data = "whatsinthebox://box/abc123";

        let plain = service
            .generate(data, 512, CorrectionLevel::High)
            .unwrap();
        let image = service
            .generate_with_logo(data, 512, &logo, DEFAULT_LOGO_SIZE, CorrectionLevel::High)
            .unwrap();

        let is_red = |x: u32, y: u32| {
            let p = image.get_pixel(x, y);
            p[0] > 200 && p[1] < 50 && p[2] < 50
        };

        // Logo covers (205,205)..(307,307)
        assert!(is_red(205, 205));
        assert!(is_red(306, 306));
        assert!(is_red(256, 256));
        assert!(!is_red(204, 256));
        assert!(!is_red(307, 256));

        // Backdrop spans 118px starting at 197
        for (x, y) in [(197, 256), (314, 256), (256, 197), (256, 314), (204, 204), (307, 307)] {
            assert_eq!(*image.get_pixel(x, y), WHITE, "({x},{y}) should be backdrop");
        }

        // Rounded corners leave the code untouched, as does everything outside the backdrop
        assert_eq!(image.get_pixel(197, 197), plain.get_pixel(197, 197));
        assert_eq!(image.get_pixel(314, 314), plain.get_pixel(314, 314));
        for (x, y) in [(196, 256), (315, 256), (0, 0), (100, 400)] {
            assert_eq!(image.get_pixel(x, y), plain.get_pixel(x, y));
        }
    }

    #[test]
    fn test_logo_code_still_scans() {
        let service = QrService::default();
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(16, 16, Rgba([0, 120, 255, 255])));
        let data = "whatsinthebox://box/abc123";

        let image = service
            .generate_with_logo(data, 512, &logo, DEFAULT_LOGO_SIZE, CorrectionLevel::High)
            .unwrap();
        assert_eq!(decode(&image), data);
    }

    #[test]
    fn test_logo_size_is_validated() {
        let service = QrService::default();
        let logo = DynamicImage::ImageRgba8(RgbaImage::from_pixel(4, 4, BLACK));

        for bad in [-0.1, 1.5, f64::NAN] {
            assert_eq!(
                service.generate_with_logo("x", 128, &logo, bad, CorrectionLevel::High),
                Err(QrError::InvalidInput)
            );
        }

        let empty = DynamicImage::ImageRgba8(RgbaImage::new(0, 0));
        assert_eq!(
            service.generate_with_logo("x", 128, &empty, 0.2, CorrectionLevel::High),
            Err(QrError::ImageFailed)
        );
    }

    #[test]
    fn test_convenience_generators_decode() {
        let service = QrService::new(400);

        let url = Url::parse("https://example.com/boxes?id=7").unwrap();
        let image = service.generate_for_url(&url, 400).unwrap();
        assert_eq!(decode(&image), "https://example.com/boxes?id=7");

        let wifi = service
            .generate_for_wifi("Garage", "hunter2", WifiSecurity::Wpa)
            .unwrap();
        assert_eq!(wifi.width(), DEFAULT_SIZE);
        assert_eq!(wifi.height(), DEFAULT_SIZE);
        assert_eq!(decode(&wifi), "WIFI:T:WPA;S:Garage;P:hunter2;;");

        let contact = service
            .generate_for_contact("Ada", Some("555-0100"), None, 400)
            .unwrap();
        assert_eq!(
            decode(&contact),
            "BEGIN:VCARD\nVERSION:3.0\nFN:Ada\nTEL:555-0100\nEND:VCARD"
        );
    }
}
