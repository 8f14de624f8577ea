use std::path::{Path, PathBuf};

use crate::pipeline::frame_display::FrameDisplay;
use crate::shared::frame::Frame;

/// Keeps an image file updated with the latest annotated frame, so any
/// auto-reloading image viewer works as a live preview.
///
/// Each frame goes to a sibling temp file first and is renamed over the
/// target, so viewers never see a half-written image.
pub struct ImageFileDisplay {
    path: PathBuf,
    every_nth: usize,
    shown: usize,
}

impl ImageFileDisplay {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_interval(path, 1)
    }

    /// Writes only every `every_nth` frame; encoding large PNGs per frame is slow.
    pub fn with_interval(path: impl Into<PathBuf>, every_nth: usize) -> Self {
        Self {
            path: path.into(),
            every_nth: every_nth.max(1),
            shown: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl FrameDisplay for ImageFileDisplay {
    fn show(&mut self, frame: &Frame) -> Result<(), Box<dyn std::error::Error>> {
        let due = self.shown % self.every_nth == 0;
        self.shown += 1;
        if !due {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .ok_or("Failed to create image from frame data")?;

        let extension = self
            .path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("png");
        let temp_path = self.path.with_extension(format!("tmp.{extension}"));
        img.save(&temp_path)?;
        std::fs::rename(&temp_path, &self.path)?;
        Ok(())
    }

    fn finish(&mut self) {
        log::info!("Last annotated frame kept at {}", self.path.display());
    }
}
