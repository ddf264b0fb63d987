use crate::flags::DirtyFlags;
use crate::geometry::{Rect, Vec2};
use crate::paint::Painter;
use crate::node::SceneNode;
use crate::scene::{NodeId, Scene};
use halo_gesture::GestureEvent;

/// Capabilities a concrete widget plugs into a scene node.
///
/// Every method has a default so a widget only implements what it uses.
pub trait Widget: Send {
    /// Draws the node in its local coordinate space. The painter already
    /// carries the node's full transform.
    fn paint(&self, _node: &SceneNode, _painter: &mut Painter<'_>) {}

    /// Receives a gesture whose positions are in the node's local space.
    fn on_input(&mut self, _ctx: &mut EventCtx<'_>, _event: &GestureEvent) {}

    fn min_size(&self) -> Vec2 {
        Vec2::ZERO
    }

    /// Shape test for hit-testing, `local` is in the node's own space.
    fn contains(&self, local: Vec2, size: Vec2) -> bool {
        Rect::from_size(size).contains(local)
    }

    fn selectable(&self) -> bool {
        true
    }
}

/// Positions and sizes the children of a container.
pub trait Layout: Send {
    fn layout(&self, scene: &mut Scene, children: &[NodeId], size: Vec2);

    fn min_size(&self, _scene: &Scene, _children: &[NodeId]) -> Vec2 {
        Vec2::ZERO
    }
}

/// Leaves children wherever they were put.
#[derive(Debug, Default, Clone, Copy)]
pub struct Manual;

impl Layout for Manual {
    fn layout(&self, _scene: &mut Scene, _children: &[NodeId], _size: Vec2) {}
}

/// Stretches every child over the whole container.
#[derive(Debug, Default, Clone, Copy)]
pub struct Fill;

impl Layout for Fill {
    fn layout(&self, scene: &mut Scene, children: &[NodeId], size: Vec2) {
        for &child in children {
            scene.set_pos(child, Vec2::ZERO);
            scene.set_size(child, size);
        }
    }

    fn min_size(&self, scene: &Scene, children: &[NodeId]) -> Vec2 {
        children
            .iter()
            .fold(Vec2::ZERO, |acc, &c| acc.max(scene.node(c).min_size()))
    }
}

/// Side effects a handler asks of the surrounding runtime. They are carried
/// out after the handler returns and the window lock is released.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Quit,
    Repaint,
}

/// Handler-side view of the scene during one event delivery.
pub struct EventCtx<'a> {
    scene: &'a mut Scene,
    node: NodeId,
    requests: &'a mut Vec<Request>,
}

impl<'a> EventCtx<'a> {
    pub(crate) fn new(scene: &'a mut Scene, node: NodeId, requests: &'a mut Vec<Request>) -> Self {
        Self {
            scene,
            node,
            requests,
        }
    }

    /// The node the event was delivered to.
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn scene(&mut self) -> &mut Scene {
        &mut *self.scene
    }

    pub fn mark(&mut self, flags: DirtyFlags) {
        self.scene.mark(self.node, flags);
    }

    pub fn request_quit(&mut self) {
        self.requests.push(Request::Quit);
    }

    pub fn request_repaint(&mut self) {
        self.requests.push(Request::Repaint);
    }
}
