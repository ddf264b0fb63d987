use glam::Vec2;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Raw contact phase as reported by the touch controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    Press,
    Drag,
    Release,
}

/// One device-native touch sample, already mapped to display coordinates.
///
/// `timestamp` is measured from an arbitrary, driver-defined epoch; only
/// differences between samples are meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchSample {
    pub kind: SampleKind,
    pub pos: Vec2,
    pub timestamp: Duration,
}

impl TouchSample {
    pub fn new(kind: SampleKind, x: f32, y: f32, timestamp: Duration) -> Self {
        Self {
            kind,
            pos: Vec2::new(x, y),
            timestamp,
        }
    }

    pub fn press(x: f32, y: f32, timestamp: Duration) -> Self {
        Self::new(SampleKind::Press, x, y, timestamp)
    }

    pub fn drag(x: f32, y: f32, timestamp: Duration) -> Self {
        Self::new(SampleKind::Drag, x, y, timestamp)
    }

    pub fn release(x: f32, y: f32, timestamp: Duration) -> Self {
        Self::new(SampleKind::Release, x, y, timestamp)
    }
}
