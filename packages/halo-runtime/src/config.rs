use crate::device::Rotation;
use crate::error::{Result, RuntimeError};
use halo_core::Color;
use halo_gesture::GestureConfig;
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Runtime tunables. Every field has a default, so a config file only needs
/// to name what it overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    pub rotation: Rotation,
    /// Paint ticker period.
    pub paint_period_ms: u64,
    /// How long the ingestion thread blocks on the touch source before
    /// checking for shutdown.
    pub poll_interval_ms: u64,
    /// RGBA the frame buffer is cleared to before every render.
    pub background: [u8; 4],
    pub gesture: GestureConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            rotation: Rotation::default(),
            paint_period_ms: 33,
            poll_interval_ms: 20,
            background: [0, 0, 0, 255],
            gesture: GestureConfig::default(),
        }
    }
}

impl RuntimeConfig {
    pub fn from_json(text: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_json(&text)?;
        tracing::debug!(path = %path.display(), ?config, "config loaded");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.paint_period_ms == 0 {
            return Err(RuntimeError::Config("paint_period_ms must be positive".into()));
        }
        if self.poll_interval_ms == 0 {
            return Err(RuntimeError::Config("poll_interval_ms must be positive".into()));
        }
        if self.gesture.long_press_ms == 0 || self.gesture.double_tap_ms == 0 {
            return Err(RuntimeError::Config("gesture timings must be positive".into()));
        }
        let near = self.gesture.near_threshold;
        if near.is_nan() || near < 0.0 {
            return Err(RuntimeError::Config(
                "gesture.near_threshold must be a non-negative number".into(),
            ));
        }
        Ok(())
    }

    pub fn paint_period(&self) -> Duration {
        Duration::from_millis(self.paint_period_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn background_color(&self) -> Color {
        Rgba(self.background)
    }
}
