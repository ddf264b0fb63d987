//! Device-facing runtime: the [`Screen`] singleton with its paint ticker and
//! touch ingestion, and the per-window dispatch loop.

pub mod capture;
pub mod config;
pub mod device;
pub mod error;
pub mod router;
pub mod screen;
pub mod sim;
pub mod window;

pub use config::RuntimeConfig;
pub use device::{Display, Driver, Rotation, TouchSource};
pub use error::{DeviceError, Result, RuntimeError};
pub use router::Router;
pub use screen::Screen;
pub use sim::{FrameProbe, Injector, SimDriver};
pub use window::{Stage, Window, WindowState};
