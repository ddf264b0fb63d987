use thiserror::Error;

/// Faults reported by display and touch drivers.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("failed to open display: {0}")]
    Display(String),
    #[error("failed to open touch input: {0}")]
    Touch(String),
    #[error("device closed")]
    Closed,
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Device(#[from] DeviceError),
    #[error("frame capture failed: {0}")]
    Capture(#[from] image::ImageError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("malformed config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("no active window")]
    NoWindow,
}

pub type Result<T, E = RuntimeError> = std::result::Result<T, E>;
