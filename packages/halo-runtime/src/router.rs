use halo_core::{GestureEvent, GestureKind, NodeId, Scene};
use smallvec::{SmallVec, smallvec};

/// Deliveries produced for one inbound event.
pub type Routed = SmallVec<[(NodeId, GestureEvent); 2]>;

/// Target selection and Enter/Leave tracking for one window.
///
/// A `Press` re-resolves the target by hit-testing from the root. That
/// target then receives everything up to the next `Press`, including the
/// trailing `Tap`/`DoubleTap` of the contact, even when the contact has
/// moved off it.
#[derive(Debug, Default)]
pub struct Router {
    target: Option<NodeId>,
    inside: bool,
}

impl Router {
    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn route(&mut self, scene: &Scene, event: &GestureEvent) -> Routed {
        if event.kind == GestureKind::Press {
            self.target = scene
                .root()
                .and_then(|root| scene.select_target(root, event.pos));
            self.inside = self.target.is_some();
            tracing::debug!(target = ?self.target, pos = ?event.pos, "press target selected");
        }

        let Some(target) = self.target else {
            return SmallVec::new();
        };
        // Detached or removed since the press.
        if scene.get(target).is_none_or(|n| n.window().is_none()) {
            tracing::debug!(?target, "target left the window");
            self.target = None;
            return SmallVec::new();
        }

        let mut local = *event;
        local.pos = scene.screen_to_local(target, event.pos);
        local.init_pos = scene.screen_to_local(target, event.init_pos);
        local.screen_pos = event.pos;

        if event.kind != GestureKind::Drag {
            return smallvec![(target, local)];
        }

        let inside = scene.contains(target, scene.screen_to_parent(target, event.pos));
        if inside == self.inside {
            return smallvec![(target, local)];
        }
        self.inside = inside;
        let edge = if inside {
            GestureKind::Enter
        } else {
            GestureKind::Leave
        };
        smallvec![(target, local.with_kind(edge)), (target, local)]
    }
}
