use glam::Vec2;
use serde::Serialize;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GestureKind {
    Press,
    Drag,
    Release,
    Tap,
    DoubleTap,
    LongPress,
    Enter,
    Leave,
}

impl GestureKind {
    /// True for the three kinds that mirror raw samples one to one.
    pub fn is_raw(self) -> bool {
        matches!(self, Self::Press | Self::Drag | Self::Release)
    }
}

/// A gesture addressed to one scene node.
///
/// `pos` and `init_pos` start out in screen space. The window dispatch loop
/// rewrites them into the target's local space before delivery and keeps
/// the screen position in `screen_pos`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GestureEvent {
    pub kind: GestureKind,
    pub pos: Vec2,
    pub init_pos: Vec2,
    pub screen_pos: Vec2,
    pub time: Duration,
    pub seq: u64,
}

impl GestureEvent {
    pub fn new(kind: GestureKind, pos: Vec2, init_pos: Vec2, time: Duration, seq: u64) -> Self {
        Self {
            kind,
            pos,
            init_pos,
            screen_pos: pos,
            time,
            seq,
        }
    }

    /// Same event with a different kind, used for synthesized Enter/Leave.
    pub fn with_kind(mut self, kind: GestureKind) -> Self {
        self.kind = kind;
        self
    }

    /// Offset from where the contact started.
    pub fn delta(&self) -> Vec2 {
        self.pos - self.init_pos
    }
}
