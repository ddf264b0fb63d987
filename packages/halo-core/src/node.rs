use crate::flags::DirtyFlags;
use crate::geometry::{Affine2, Rect, Vec2};
use crate::scene::{NodeId, WindowId};
use crate::widget::{Layout, Manual, Widget};
use smallvec::SmallVec;
use std::cell::Cell;

pub enum NodeKind {
    Leaf,
    Container(Container),
}

pub struct Container {
    pub(crate) children: SmallVec<[NodeId; 4]>,
    /// `None` only while the policy is running and has been lent out.
    pub(crate) layout: Option<Box<dyn Layout>>,
    pub(crate) selectable: bool,
}

/// A positionable, sizeable, transformable and paintable unit of the scene.
///
/// The translation component of the transform is the node position. Rotation
/// and scale are kept as separate matrices so each can be replaced without
/// touching the others; `matrix()` composes them lazily.
pub struct SceneNode {
    pos: Vec2,
    size: Vec2,
    min_size: Vec2,
    rotate: Affine2,
    scale: Affine2,
    matrix: Cell<Affine2>,
    flags: Cell<DirtyFlags>,
    recalcs: Cell<u64>,
    visible: bool,
    pub(crate) parent: Option<NodeId>,
    pub(crate) window: Option<WindowId>,
    pub(crate) kind: NodeKind,
    pub(crate) widget: Option<Box<dyn Widget>>,
}

impl SceneNode {
    fn with_kind(kind: NodeKind) -> Self {
        Self {
            pos: Vec2::ZERO,
            size: Vec2::ZERO,
            min_size: Vec2::ZERO,
            rotate: Affine2::IDENTITY,
            scale: Affine2::IDENTITY,
            matrix: Cell::new(Affine2::IDENTITY),
            flags: Cell::new(DirtyFlags::MEASURE | DirtyFlags::LAYOUT | DirtyFlags::PAINT),
            recalcs: Cell::new(0),
            visible: true,
            parent: None,
            window: None,
            kind,
            widget: None,
        }
    }

    /// A leaf without a widget: hit-testable, paints nothing.
    pub fn empty() -> Self {
        Self::with_kind(NodeKind::Leaf)
    }

    pub fn leaf(widget: impl Widget + 'static) -> Self {
        Self::empty().with_widget(widget)
    }

    /// A container with the no-op [`Manual`] layout that is transparent to
    /// hit-testing.
    pub fn container() -> Self {
        Self::with_kind(NodeKind::Container(Container {
            children: SmallVec::new(),
            layout: Some(Box::new(Manual)),
            selectable: false,
        }))
    }

    pub fn with_layout(mut self, layout: impl Layout + 'static) -> Self {
        if let NodeKind::Container(c) = &mut self.kind {
            c.layout = Some(Box::new(layout));
        }
        self
    }

    pub fn with_selectable(mut self, selectable: bool) -> Self {
        if let NodeKind::Container(c) = &mut self.kind {
            c.selectable = selectable;
        }
        self
    }

    pub fn with_widget(mut self, widget: impl Widget + 'static) -> Self {
        self.widget = Some(Box::new(widget));
        self
    }

    pub fn with_pos(mut self, pos: Vec2) -> Self {
        self.pos = pos;
        self.mark_local(DirtyFlags::RECALC);
        self
    }

    pub fn with_size(mut self, size: Vec2) -> Self {
        self.size = size;
        self
    }

    pub fn pos(&self) -> Vec2 {
        self.pos
    }

    /// Effective size: the requested size, floored by the measured minimum.
    pub fn size(&self) -> Vec2 {
        self.size.max(self.min_size)
    }

    pub fn requested_size(&self) -> Vec2 {
        self.size
    }

    pub fn min_size(&self) -> Vec2 {
        self.min_size
    }

    pub fn local_bounds(&self) -> Rect {
        Rect::from_size(self.size())
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn window(&self) -> Option<WindowId> {
        self.window
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub fn is_container(&self) -> bool {
        matches!(self.kind, NodeKind::Container(_))
    }

    pub fn children(&self) -> &[NodeId] {
        match &self.kind {
            NodeKind::Container(c) => &c.children,
            NodeKind::Leaf => &[],
        }
    }

    pub fn widget(&self) -> Option<&dyn Widget> {
        self.widget.as_deref()
    }

    /// Whether hit-testing may return this node itself.
    pub fn is_selectable(&self) -> bool {
        match &self.kind {
            NodeKind::Container(c) => c.selectable,
            NodeKind::Leaf => self.widget.as_ref().is_none_or(|w| w.selectable()),
        }
    }

    /// Shape test in local coordinates.
    pub fn hit(&self, local: Vec2) -> bool {
        match &self.widget {
            Some(w) => w.contains(local, self.size()),
            None => self.local_bounds().contains(local),
        }
    }

    pub fn flags(&self) -> DirtyFlags {
        self.flags.get()
    }

    /// Number of times the cached matrix has been rebuilt.
    pub fn recalc_count(&self) -> u64 {
        self.recalcs.get()
    }

    /// Combined `translate ∘ scale ∘ rotate` matrix, rebuilt only when stale.
    pub fn matrix(&self) -> Affine2 {
        let flags = self.flags.get();
        if flags.contains(DirtyFlags::RECALC) {
            self.matrix
                .set(Affine2::from_translation(self.pos) * self.scale * self.rotate);
            self.flags.set(flags - DirtyFlags::RECALC);
            self.recalcs.set(self.recalcs.get() + 1);
        }
        self.matrix.get()
    }

    /// ORs `flags` into the local set and returns the bits that changed.
    pub(crate) fn mark_local(&self, flags: DirtyFlags) -> DirtyFlags {
        let old = self.flags.get();
        let new = old | flags;
        self.flags.set(new);
        old ^ new
    }

    pub(crate) fn clear(&self, flags: DirtyFlags) {
        self.flags.set(self.flags.get() - flags);
    }

    pub(crate) fn set_pos(&mut self, pos: Vec2) -> bool {
        let changed = self.pos != pos;
        self.pos = pos;
        changed
    }

    pub(crate) fn set_size(&mut self, size: Vec2) -> bool {
        let changed = self.size != size;
        self.size = size;
        changed
    }

    pub(crate) fn set_min_size(&mut self, min: Vec2) -> bool {
        let changed = self.min_size != min;
        self.min_size = min;
        changed
    }

    pub(crate) fn set_rotate(&mut self, m: Affine2) {
        self.rotate = m;
    }

    pub(crate) fn set_scale(&mut self, m: Affine2) {
        self.scale = m;
    }

    pub(crate) fn set_visible(&mut self, visible: bool) -> bool {
        let changed = self.visible != visible;
        self.visible = visible;
        changed
    }

    pub(crate) fn as_container(&self) -> Option<&Container> {
        match &self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf => None,
        }
    }

    pub(crate) fn container_mut(&mut self) -> Option<&mut Container> {
        match &mut self.kind {
            NodeKind::Container(c) => Some(c),
            NodeKind::Leaf => None,
        }
    }
}

impl std::fmt::Debug for SceneNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneNode")
            .field("pos", &self.pos)
            .field("size", &self.size())
            .field("flags", &self.flags.get())
            .field("parent", &self.parent)
            .field("window", &self.window)
            .field("children", &self.children())
            .finish()
    }
}

/// `m` applied with `p` as its fixed point.
pub(crate) fn about(p: Vec2, m: Affine2) -> Affine2 {
    Affine2::from_translation(p) * m * Affine2::from_translation(-p)
}
