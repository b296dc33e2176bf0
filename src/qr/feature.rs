/// QR codes that open a box when scanned

use image::{DynamicImage, Rgba, RgbaImage};

use super::service::{CorrectionLevel, QrError, QrService, DEFAULT_LOGO_SIZE};
use crate::link::DeepLinks;
use crate::state::StorageBox;

pub struct BoxQrFeature<'a> {
    service: &'a QrService,
    links: &'a DeepLinks,
}

impl<'a> BoxQrFeature<'a> {
    pub fn new(service: &'a QrService, links: &'a DeepLinks) -> Self {
        Self { service, links }
    }

    /// Black on white code for the box's deep link
    pub fn execute(&self, storage_box: &StorageBox) -> Result<RgbaImage, QrError> {
        self.service.generate_colored(
            &self.links.box_link(storage_box.id),
            self.service.default_size(),
            Rgba([0, 0, 0, 255]),
            Rgba([255, 255, 255, 255]),
            CorrectionLevel::Medium,
        )
    }

    /// Same link with `logo` in the center
    pub fn execute_with_logo(
        &self,
        storage_box: &StorageBox,
        logo: &DynamicImage,
    ) -> Result<RgbaImage, QrError> {
        self.service.generate_with_logo(
            &self.links.box_link(storage_box.id),
            self.service.default_size(),
            logo,
            DEFAULT_LOGO_SIZE,
            CorrectionLevel::High,
        )
    }
}
