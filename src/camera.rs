// src/camera.rs
use std::io::Write;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use image::DynamicImage;
use image::codecs::jpeg::JpegEncoder;
use log::{error, info, warn};

use crate::error::{BridgeError, Result};
use crate::types::{CAMERA_NO_IMAGE_MESSAGE, CAMERA_PROCESSING_MESSAGE, OutgoingMessage};

/// Starts an OS-level capture. The image (or `None`) arrives later as a separate event.
pub trait CameraTrigger {
    fn request_capture(&self) -> Result<()>;
}

pub struct CameraAdapter {
    quality: u8,
}

impl CameraAdapter {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn on_image(&self, image: Option<&DynamicImage>) -> OutgoingMessage {
        let Some(image) = image else {
            warn!("Camera returned no image");
            return OutgoingMessage::CameraError {
                message: CAMERA_NO_IMAGE_MESSAGE.into(),
            };
        };

        match self.encode(image) {
            Ok(encoded) => {
                info!("Camera result sent to web ({} base64 chars)", encoded.len());
                OutgoingMessage::CameraResult { image: encoded }
            }
            Err(e) => {
                error!("Compress error: {}", e);
                OutgoingMessage::CameraError {
                    message: CAMERA_PROCESSING_MESSAGE.into(),
                }
            }
        }
    }

    /// JPEG at the configured quality, then base64 without line breaks.
    pub fn encode(&self, image: &DynamicImage) -> Result<String> {
        let mut jpeg = Vec::new();
        self.compress(image, &mut jpeg)?;
        Ok(STANDARD.encode(jpeg))
    }

    pub fn compress<W: Write>(&self, image: &DynamicImage, out: W) -> Result<()> {
        // JPEG has no alpha channel
        let rgb = image.to_rgb8();
        JpegEncoder::new_with_quality(out, self.quality)
            .encode_image(&rgb)
            .map_err(|e| BridgeError::CaptureFailure(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgba, RgbaImage};

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(8, 6, Rgba([200, 30, 30, 128])))
    }

    #[test]
    fn missing_image_reports_error() {
        let msg = CameraAdapter::new(85).on_image(None);
        assert_eq!(
            msg,
            OutgoingMessage::CameraError {
                message: CAMERA_NO_IMAGE_MESSAGE.into()
            }
        );
    }

    #[test]
    fn image_is_sent_as_base64_jpeg() {
        let msg = CameraAdapter::new(85).on_image(Some(&sample()));
        let OutgoingMessage::CameraResult { image } = msg else {
            panic!("expected CAMERA_RESULT, got {msg:?}");
        };
        assert!(!image.contains('\n'));

        let bytes = STANDARD.decode(image).unwrap();
        assert_eq!(image::guess_format(&bytes).unwrap(), ImageFormat::Jpeg);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (8, 6));
    }

    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::other("no space left"))
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_failure_is_a_capture_failure() {
        let result = CameraAdapter::new(85).compress(&sample(), FullDisk);
        assert!(matches!(result, Err(BridgeError::CaptureFailure(_))));
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(CameraAdapter::new(0).quality, 1);
        assert_eq!(CameraAdapter::new(255).quality, 100);
    }
}
