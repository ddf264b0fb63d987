use crate::error::Result;
use halo_core::FrameBuffer;
use image::ImageFormat;
use std::path::{Path, PathBuf};

pub fn save_png(frame: &FrameBuffer, path: &Path) -> Result<()> {
    frame.save_with_format(path, ImageFormat::Png)?;
    tracing::info!(path = %path.display(), "screenshot written");
    Ok(())
}

/// Writes every rendered frame as `frame_NNNNN.png` into one directory.
#[derive(Debug)]
pub struct MovieRecorder {
    dir: PathBuf,
    frames: u64,
}

impl MovieRecorder {
    pub fn start(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        tracing::info!(dir = %dir.display(), "movie capture started");
        Ok(Self { dir, frames: 0 })
    }

    pub fn record(&mut self, frame: &FrameBuffer) -> Result<PathBuf> {
        let path = self.dir.join(format!("frame_{:05}.png", self.frames));
        frame.save_with_format(&path, ImageFormat::Png)?;
        self.frames += 1;
        Ok(path)
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
