// src/file_camera.rs
use std::path::{Path, PathBuf};

use crossbeam_channel::Sender;
use image::DynamicImage;
use log::{info, warn};

use crate::camera::CameraTrigger;
use crate::error::{BridgeError, Result};
use crate::event_loop::BridgeEvent;

/// Desktop stand-in for the system camera: each capture loads a fixed image file.
pub struct FileCamera {
    path: Option<PathBuf>,
    events: Sender<BridgeEvent>,
}

impl FileCamera {
    pub fn new(path: Option<PathBuf>, events: Sender<BridgeEvent>) -> Self {
        Self { path, events }
    }
}

impl CameraTrigger for FileCamera {
    fn request_capture(&self) -> Result<()> {
        let path = self.path.clone();
        let events = self.events.clone();

        std::thread::Builder::new()
            .name("camera-capture".into())
            .spawn(move || {
                let image = capture(path.as_deref());
                let _ = events.send(BridgeEvent::CameraImage(image));
            })
            .map_err(|e| BridgeError::CaptureFailure(e.to_string()))?;
        Ok(())
    }
}

/// `None` plays the part of a cancelled capture.
fn capture(path: Option<&Path>) -> Option<DynamicImage> {
    let Some(path) = path else {
        warn!("No camera image configured");
        return None;
    };

    match image::open(path) {
        Ok(image) => {
            info!("Captured {} ({}x{})", path.display(), image.width(), image.height());
            Some(image)
        }
        Err(e) => {
            warn!("Could not load {}: {}", path.display(), e);
            None
        }
    }
}
