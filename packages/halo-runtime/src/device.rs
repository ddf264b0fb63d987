//! Narrow interfaces to the display panel and the touch controller.

use crate::error::DeviceError;
use halo_core::{FrameBuffer, Vec2};
use halo_gesture::TouchSample;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Mounting orientation of the panel, applied to both display and touch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    pub fn swaps_axes(self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }

    /// Logical extent of a panel whose native extent is `native`.
    pub fn logical_size(self, native: (u32, u32)) -> (u32, u32) {
        if self.swaps_axes() {
            (native.1, native.0)
        } else {
            native
        }
    }

    /// Maps a point in native panel coordinates to logical coordinates.
    pub fn map_point(self, p: Vec2, native: Vec2) -> Vec2 {
        match self {
            Self::Deg0 => p,
            Self::Deg90 => Vec2::new(native.y - p.y, p.x),
            Self::Deg180 => Vec2::new(native.x - p.x, native.y - p.y),
            Self::Deg270 => Vec2::new(p.y, native.x - p.x),
        }
    }
}

pub trait Display: Send {
    /// Logical size in pixels, rotation already applied.
    fn size(&self) -> (u32, u32);

    fn draw(&mut self, frame: &FrameBuffer) -> Result<(), DeviceError>;

    fn close(&mut self);
}

pub trait TouchSource: Send {
    /// Blocks for at most `timeout`. `Ok(None)` means nothing arrived.
    fn next_sample(&mut self, timeout: Duration) -> Result<Option<TouchSample>, DeviceError>;

    fn close(&mut self);
}

/// Opens the device handles a Screen runs on.
pub trait Driver {
    fn open_display(&mut self, rotation: Rotation) -> Result<Box<dyn Display>, DeviceError>;

    fn open_touch(&mut self, rotation: Rotation) -> Result<Box<dyn TouchSource>, DeviceError>;
}
