use crate::flags::DirtyFlags;
use crate::geometry::{Affine2, Vec2};
use crate::node::{SceneNode, about};
use crate::paint::Painter;
use crate::widget::{EventCtx, Request, Widget};
use halo_gesture::GestureEvent;
use slotmap::{SlotMap, new_key_type};
use smallvec::SmallVec;

new_key_type! {
    pub struct NodeId;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct WindowId(pub u32);

#[derive(Default, Debug, Clone)]
pub struct Profiling {
    pub render_count: u64,
    pub layout_count: u64,
    pub nodes_painted: u64,
    pub nodes_culled: u64,
    pub deliveries: u64,
}

/// Arena holding one window's scene graph.
///
/// Containers own their children through the arena; the parent link stored
/// on each node is a plain handle used for traversal only.
pub struct Scene {
    nodes: SlotMap<NodeId, SceneNode>,
    window: WindowId,
    root: Option<NodeId>,
    pub profiling: Profiling,
}

impl Scene {
    pub fn new(window: WindowId) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            window,
            root: None,
            profiling: Profiling::default(),
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds a detached node to the arena.
    pub fn insert(&mut self, node: SceneNode) -> NodeId {
        self.nodes.insert(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&SceneNode> {
        self.nodes.get(id)
    }

    pub fn node(&self, id: NodeId) -> &SceneNode {
        match self.nodes.get(id) {
            Some(node) => node,
            None => panic!("unknown scene node {id:?}"),
        }
    }

    fn node_mut(&mut self, id: NodeId) -> &mut SceneNode {
        match self.nodes.get_mut(id) {
            Some(node) => node,
            None => panic!("unknown scene node {id:?}"),
        }
    }

    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Makes `id` the root of the window. The previous root, if any, is
    /// detached from the window but stays in the arena.
    pub fn set_root(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            panic!("root candidate {id:?} is attached to {parent:?}");
        }
        if let Some(old) = self.root.replace(id) {
            if old != id {
                self.assign_window(old, None);
            }
        }
        self.assign_window(id, Some(self.window));
        let pending = self.node(id).flags().propagating();
        self.mark(id, pending | DirtyFlags::LAYOUT | DirtyFlags::PAINT);
        tracing::debug!(?id, window = ?self.window, "scene root set");
    }

    // ---------------------------------------------------------------------
    // Geometry and transform
    // ---------------------------------------------------------------------

    pub fn pos(&self, id: NodeId) -> Vec2 {
        self.node(id).pos()
    }

    pub fn set_pos(&mut self, id: NodeId, pos: Vec2) {
        if self.node_mut(id).set_pos(pos) {
            self.mark(id, DirtyFlags::RECALC | DirtyFlags::PAINT);
        }
    }

    /// Moves the translation component to `pos + dp`.
    pub fn translate(&mut self, id: NodeId, dp: Vec2) {
        let pos = self.pos(id) + dp;
        self.set_pos(id, pos);
    }

    pub fn size(&self, id: NodeId) -> Vec2 {
        self.node(id).size()
    }

    pub fn set_size(&mut self, id: NodeId, size: Vec2) {
        if self.node_mut(id).set_size(size) {
            self.mark(id, DirtyFlags::LAYOUT | DirtyFlags::PAINT);
        }
    }

    pub fn min_size(&self, id: NodeId) -> Vec2 {
        self.node(id).min_size()
    }

    /// Replaces the rotation component with `angle` radians about the origin.
    pub fn rotate(&mut self, id: NodeId, angle: f32) {
        self.rotate_about(id, Vec2::ZERO, angle);
    }

    pub fn rotate_about(&mut self, id: NodeId, p: Vec2, angle: f32) {
        self.node_mut(id).set_rotate(about(p, Affine2::from_angle(angle)));
        self.mark(id, DirtyFlags::RECALC | DirtyFlags::PAINT);
    }

    /// Replaces the scale component.
    pub fn scale(&mut self, id: NodeId, sx: f32, sy: f32) {
        self.scale_about(id, Vec2::ZERO, sx, sy);
    }

    pub fn scale_about(&mut self, id: NodeId, p: Vec2, sx: f32, sy: f32) {
        self.node_mut(id)
            .set_scale(about(p, Affine2::from_scale(Vec2::new(sx, sy))));
        self.mark(id, DirtyFlags::RECALC | DirtyFlags::PAINT);
    }

    pub fn matrix(&self, id: NodeId) -> Affine2 {
        self.node(id).matrix()
    }

    pub fn set_visible(&mut self, id: NodeId, visible: bool) {
        if self.node_mut(id).set_visible(visible) {
            // The node's own flags may already hold PAINT; the parent is what
            // has to redraw.
            match self.node(id).parent {
                Some(parent) => self.mark(parent, DirtyFlags::PAINT),
                None => self.mark(id, DirtyFlags::PAINT),
            }
        }
    }

    pub fn set_widget(&mut self, id: NodeId, widget: impl Widget + 'static) {
        self.node_mut(id).widget = Some(Box::new(widget));
        self.mark(id, DirtyFlags::MEASURE | DirtyFlags::PAINT);
    }

    pub fn set_selectable(&mut self, id: NodeId, selectable: bool) {
        match self.node_mut(id).container_mut() {
            Some(c) => c.selectable = selectable,
            None => panic!("set_selectable on leaf node {id:?}"),
        }
    }

    // ---------------------------------------------------------------------
    // Dirty flags
    // ---------------------------------------------------------------------

    pub fn flags(&self, id: NodeId) -> DirtyFlags {
        self.node(id).flags()
    }

    /// ORs `flags` into the node and forwards whatever changed, minus
    /// `RECALC`, to the parent.
    pub fn mark(&self, id: NodeId, flags: DirtyFlags) {
        let node = self.node(id);
        let changed = node.mark_local(flags).propagating();
        if changed.is_empty() {
            return;
        }
        if let Some(parent) = node.parent {
            self.mark(parent, changed);
        }
    }

    /// Clears `flags` on every node of the arena.
    pub fn clear_flags(&self, flags: DirtyFlags) {
        for node in self.nodes.values() {
            node.clear(flags);
        }
    }

    // ---------------------------------------------------------------------
    // Tree structure
    // ---------------------------------------------------------------------

    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).parent
    }

    /// Parent of an attached node; asking for the parent of an unparented
    /// node is a programming error.
    pub fn parent(&self, id: NodeId) -> NodeId {
        match self.node(id).parent {
            Some(parent) => parent,
            None => panic!("node {id:?} has no parent"),
        }
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).children()
    }

    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if n == ancestor {
                return true;
            }
            cur = self.node(n).parent;
        }
        false
    }

    /// Attaches `nodes` to `container` in order and re-runs its layout.
    ///
    /// Panics if a node already has a parent, is the window root, or would
    /// close a cycle.
    pub fn add(&mut self, container: NodeId, nodes: &[NodeId]) {
        if !self.node(container).is_container() {
            panic!("add to leaf node {container:?}");
        }
        let window = self.node(container).window;
        let mut pending = DirtyFlags::LAYOUT | DirtyFlags::PAINT;

        for &id in nodes {
            let node = self.node(id);
            if let Some(parent) = node.parent {
                panic!("node {id:?} is already attached to {parent:?}");
            }
            if self.root == Some(id) {
                panic!("window root {id:?} cannot be attached to {container:?}");
            }
            if self.is_ancestor(id, container) {
                panic!("attaching {id:?} to {container:?} would create a cycle");
            }
            pending |= node.flags().propagating();

            self.node_mut(id).parent = Some(container);
            self.assign_window(id, window);
            if let Some(c) = self.node_mut(container).container_mut() {
                c.children.push(id);
            }
            tracing::debug!(?id, ?container, "node attached");
        }

        self.mark(container, pending | DirtyFlags::MEASURE);
        self.layout(container);
    }

    /// Detaches `id` from `container` and re-runs the container's layout.
    pub fn del(&mut self, container: NodeId, id: NodeId) {
        if self.node(id).parent != Some(container) {
            panic!("node {id:?} is not a child of {container:?}");
        }
        self.detach(container, id);
        self.mark(container, DirtyFlags::MEASURE | DirtyFlags::LAYOUT | DirtyFlags::PAINT);
        self.layout(container);
    }

    pub fn del_all(&mut self, container: NodeId) {
        let children: SmallVec<[NodeId; 8]> = self.children(container).iter().copied().collect();
        for id in children {
            self.detach(container, id);
        }
        self.mark(container, DirtyFlags::MEASURE | DirtyFlags::LAYOUT | DirtyFlags::PAINT);
        self.layout(container);
    }

    fn detach(&mut self, container: NodeId, id: NodeId) {
        if let Some(c) = self.node_mut(container).container_mut() {
            c.children.retain(|child| *child != id);
        }
        self.node_mut(id).parent = None;
        self.assign_window(id, None);
        tracing::debug!(?id, ?container, "node detached");
    }

    /// Frees a detached node and its whole subtree.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(parent) = self.node(id).parent {
            panic!("cannot remove {id:?} while attached to {parent:?}");
        }
        if self.root == Some(id) {
            self.root = None;
        }
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if let Some(node) = self.nodes.remove(n) {
                stack.extend_from_slice(node.children());
            }
        }
    }

    fn assign_window(&mut self, id: NodeId, window: Option<WindowId>) {
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            let node = self.node_mut(n);
            node.window = window;
            stack.extend_from_slice(node.children());
        }
    }

    /// Panics if a parent link, child list or window reference disagree.
    pub fn verify_integrity(&self) {
        for (id, node) in &self.nodes {
            if let Some(parent) = node.parent {
                let p = self
                    .nodes
                    .get(parent)
                    .unwrap_or_else(|| panic!("{id:?} points at missing parent {parent:?}"));
                assert!(
                    p.children().contains(&id),
                    "{parent:?} does not list its child {id:?}"
                );
                assert_eq!(
                    node.window, p.window,
                    "{id:?} window differs from its container {parent:?}"
                );
            }
            for &child in node.children() {
                let c = self
                    .nodes
                    .get(child)
                    .unwrap_or_else(|| panic!("{id:?} lists missing child {child:?}"));
                assert_eq!(c.parent, Some(id), "{child:?} parent link is stale");
            }
        }
    }

    // ---------------------------------------------------------------------
    // Measure and layout
    // ---------------------------------------------------------------------

    /// Recomputes the min size of `id` (and of any descendant still flagged
    /// `MEASURE`) and returns it.
    pub fn measure(&mut self, id: NodeId) -> Vec2 {
        let children: SmallVec<[NodeId; 8]> = self.children(id).iter().copied().collect();
        for &child in &children {
            if self.flags(child).contains(DirtyFlags::MEASURE) {
                self.measure(child);
            }
        }

        let node = self.node(id);
        let min = match (node.as_container(), node.widget()) {
            (Some(c), _) => c
                .layout
                .as_ref()
                .map_or(Vec2::ZERO, |l| l.min_size(self, &children)),
            (None, Some(w)) => w.min_size(),
            (None, None) => Vec2::ZERO,
        };
        self.node(id).clear(DirtyFlags::MEASURE);
        if self.node_mut(id).set_min_size(min) {
            match self.node(id).parent {
                Some(parent) => self.mark(parent, DirtyFlags::LAYOUT | DirtyFlags::PAINT),
                None => self.mark(id, DirtyFlags::LAYOUT | DirtyFlags::PAINT),
            }
        }
        min
    }

    /// Runs the layout policy of a container with its current size, then
    /// settles any child still flagged `LAYOUT`.
    pub fn layout(&mut self, id: NodeId) {
        let size = self.size(id);
        let lent = self.node_mut(id).container_mut().map(|c| {
            let children: SmallVec<[NodeId; 8]> = c.children.iter().copied().collect();
            (c.layout.take(), children)
        });
        let Some((layout, children)) = lent else {
            self.node(id).clear(DirtyFlags::LAYOUT);
            return;
        };
        let Some(layout) = layout else {
            panic!("layout of {id:?} re-entered");
        };

        layout.layout(self, &children, size);

        if let Some(c) = self.node_mut(id).container_mut() {
            c.layout = Some(layout);
        }
        self.node(id).clear(DirtyFlags::LAYOUT);
        self.profiling.layout_count += 1;

        for child in children {
            if self.flags(child).contains(DirtyFlags::LAYOUT) {
                self.layout(child);
            }
        }
    }

    /// Settles pending measure and layout work below the root.
    pub fn update(&mut self) {
        let Some(root) = self.root else {
            return;
        };
        if self.flags(root).contains(DirtyFlags::MEASURE) {
            self.measure(root);
        }
        if self.flags(root).contains(DirtyFlags::LAYOUT) {
            self.layout(root);
        }
    }

    // ---------------------------------------------------------------------
    // Hit-testing and coordinate conversion
    // ---------------------------------------------------------------------

    /// Whether `p`, given in the parent's space, falls on the node.
    pub fn contains(&self, id: NodeId, p: Vec2) -> bool {
        let node = self.node(id);
        node.hit(node.matrix().inverse().transform_point2(p))
    }

    /// Topmost node under `p` (parent space of `id`).
    ///
    /// Children are probed last-added first. A container only answers for
    /// itself when it is selectable, so layout-only groupings stay
    /// transparent.
    pub fn select_target(&self, id: NodeId, p: Vec2) -> Option<NodeId> {
        let node = self.node(id);
        let local = node.matrix().inverse().transform_point2(p);

        for &child in node.children().iter().rev() {
            if !self.node(child).is_visible() {
                continue;
            }
            if let Some(target) = self.select_target(child, local) {
                return Some(target);
            }
        }

        (node.is_selectable() && node.hit(local)).then_some(id)
    }

    fn require_parent_space(&self, id: NodeId) {
        let node = self.node(id);
        if node.parent.is_none() && self.root != Some(id) {
            panic!("node {id:?} has no parent coordinate space");
        }
    }

    pub fn local_to_parent(&self, id: NodeId, p: Vec2) -> Vec2 {
        self.require_parent_space(id);
        self.matrix(id).transform_point2(p)
    }

    pub fn parent_to_local(&self, id: NodeId, p: Vec2) -> Vec2 {
        self.require_parent_space(id);
        self.matrix(id).inverse().transform_point2(p)
    }

    /// Node-to-screen matrix: the product of every matrix from the root down.
    pub fn screen_matrix(&self, id: NodeId) -> Affine2 {
        if self.node(id).window.is_none() {
            panic!("node {id:?} is not attached to a window");
        }
        let mut m = self.matrix(id);
        let mut cur = self.node(id).parent;
        while let Some(n) = cur {
            m = self.matrix(n) * m;
            cur = self.node(n).parent;
        }
        m
    }

    pub fn local_to_screen(&self, id: NodeId, p: Vec2) -> Vec2 {
        self.screen_matrix(id).transform_point2(p)
    }

    pub fn screen_to_local(&self, id: NodeId, p: Vec2) -> Vec2 {
        self.screen_matrix(id).inverse().transform_point2(p)
    }

    /// Screen point expressed in the parent space of `id` (screen space for
    /// the root).
    pub fn screen_to_parent(&self, id: NodeId, p: Vec2) -> Vec2 {
        match self.node(id).parent {
            Some(parent) => self.screen_to_local(parent, p),
            None => p,
        }
    }

    // ---------------------------------------------------------------------
    // Painting and delivery
    // ---------------------------------------------------------------------

    /// Paints `id` and its subtree. The painter must already carry the
    /// node's screen matrix.
    pub fn paint(&self, id: NodeId, painter: &mut Painter<'_>) {
        let node = self.node(id);
        if let Some(widget) = node.widget() {
            widget.paint(node, painter);
        }
        painter.painted += 1;

        let bounds = node.local_bounds();
        for &child in node.children() {
            let c = self.node(child);
            if !c.is_visible() {
                continue;
            }
            let m = c.matrix();
            if !c.local_bounds().transformed_bounds(&m).intersects(&bounds) {
                painter.culled += 1;
                continue;
            }
            painter.push(m);
            self.paint(child, painter);
            painter.pop();
        }
    }

    /// Full render pass: settle layout, paint from the root, clear paint
    /// flags. The caller clears the frame beforehand.
    pub fn render(&mut self, painter: &mut Painter<'_>) {
        self.update();
        if let Some(root) = self.root {
            if self.node(root).is_visible() {
                painter.push(self.matrix(root));
                self.paint(root, painter);
                painter.pop();
            }
        }
        self.clear_flags(DirtyFlags::PAINT);

        self.profiling.render_count += 1;
        self.profiling.nodes_painted += painter.painted;
        self.profiling.nodes_culled += painter.culled;
        tracing::trace!(
            painted = painter.painted,
            culled = painter.culled,
            "scene rendered"
        );
        painter.painted = 0;
        painter.culled = 0;
    }

    /// Hands `event` to the widget of `id`. Returns false when the node has
    /// no widget or no longer exists.
    pub fn deliver(&mut self, id: NodeId, event: &GestureEvent, requests: &mut Vec<Request>) -> bool {
        let Some(mut widget) = self.nodes.get_mut(id).and_then(|n| n.widget.take()) else {
            return false;
        };
        {
            let mut ctx = EventCtx::new(self, id, requests);
            widget.on_input(&mut ctx, event);
        }
        // The handler may have removed the node or installed a new widget.
        if let Some(node) = self.nodes.get_mut(id) {
            if node.widget.is_none() {
                node.widget = Some(widget);
            }
        }
        self.profiling.deliveries += 1;
        true
    }
}
