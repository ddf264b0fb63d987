//! Scene graph core: nodes, containers, transforms, hit-testing and the
//! software painter they render through.

pub mod flags;
pub mod geometry;
pub mod node;
pub mod paint;
pub mod scene;
pub mod widget;

pub use flags::DirtyFlags;
pub use geometry::{Affine2, Rect, Vec2};
pub use node::{NodeKind, SceneNode};
pub use paint::{Color, FrameBuffer, Painter};
pub use scene::{NodeId, Profiling, Scene, WindowId};
pub use widget::{EventCtx, Fill, Layout, Manual, Request, Widget};

pub use halo_gesture::{GestureEvent, GestureKind};
