pub mod event;
pub mod recognizer;
pub mod sample;

pub use event::{GestureEvent, GestureKind};
pub use recognizer::{GestureConfig, GestureRecognizer, LongPressTimer, Recognized};
pub use sample::{SampleKind, TouchSample};
