use halo_core::{
    DirtyFlags, EventCtx, Fill, GestureEvent, GestureKind, NodeId, Request, Scene, SceneNode,
    Vec2, Widget, WindowId,
};
use std::sync::{Arc, Mutex};

fn scene() -> Scene {
    Scene::new(WindowId(7))
}

fn sized(x: f32, y: f32, w: f32, h: f32) -> SceneNode {
    SceneNode::empty()
        .with_pos(Vec2::new(x, y))
        .with_size(Vec2::new(w, h))
}

fn group(w: f32, h: f32) -> SceneNode {
    SceneNode::container().with_size(Vec2::new(w, h))
}

/// root -> mid -> leaf, everything freshly painted.
fn chain() -> (Scene, NodeId, NodeId, NodeId) {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    let mid = scene.insert(group(50.0, 50.0));
    let leaf = scene.insert(sized(0.0, 0.0, 10.0, 10.0));
    scene.set_root(root);
    scene.add(root, &[mid]);
    scene.add(mid, &[leaf]);
    scene.clear_flags(DirtyFlags::MEASURE | DirtyFlags::LAYOUT | DirtyFlags::PAINT);
    (scene, root, mid, leaf)
}

#[test]
fn test_mark_propagates_to_every_ancestor() {
    let (scene, root, mid, leaf) = chain();
    scene.mark(leaf, DirtyFlags::PAINT | DirtyFlags::RECALC);

    assert_eq!(scene.flags(leaf), DirtyFlags::PAINT | DirtyFlags::RECALC);
    assert_eq!(scene.flags(mid), DirtyFlags::PAINT);
    assert_eq!(scene.flags(root), DirtyFlags::PAINT);
}

#[test]
fn test_mark_recalc_only_stays_local() {
    let (scene, root, mid, leaf) = chain();
    scene.mark(leaf, DirtyFlags::RECALC);

    assert_eq!(scene.flags(leaf), DirtyFlags::RECALC);
    assert!(scene.flags(mid).is_empty());
    assert!(scene.flags(root).is_empty());
}

#[test]
fn test_mark_forwards_only_changed_bits() {
    let (scene, root, mid, leaf) = chain();
    scene.mark(mid, DirtyFlags::LAYOUT);
    scene.mark(leaf, DirtyFlags::LAYOUT | DirtyFlags::PAINT);

    assert_eq!(scene.flags(mid), DirtyFlags::LAYOUT | DirtyFlags::PAINT);
    assert_eq!(scene.flags(root), DirtyFlags::LAYOUT | DirtyFlags::PAINT);
}

#[test]
fn test_transform_change_marks_paint_upwards_but_not_recalc() {
    let (mut scene, root, mid, leaf) = chain();
    scene.rotate(leaf, 0.3);
    assert!(scene.flags(leaf).contains(DirtyFlags::RECALC));
    assert!(!scene.flags(mid).contains(DirtyFlags::RECALC));
    assert!(scene.flags(root).contains(DirtyFlags::PAINT));
}

#[test]
fn test_add_sets_parent_and_window() {
    let (scene, root, mid, leaf) = chain();
    assert_eq!(scene.parent(leaf), mid);
    assert_eq!(scene.parent(mid), root);
    assert_eq!(scene.node(leaf).window(), Some(WindowId(7)));
    assert_eq!(scene.children(root), &[mid]);
    scene.verify_integrity();
}

#[test]
fn test_subtree_built_detached_inherits_window_on_attach() {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);

    let panel = scene.insert(group(50.0, 50.0));
    let leaf = scene.insert(sized(0.0, 0.0, 5.0, 5.0));
    scene.add(panel, &[leaf]);
    assert_eq!(scene.node(leaf).window(), None);

    scene.add(root, &[panel]);
    assert_eq!(scene.node(leaf).window(), Some(WindowId(7)));
    scene.verify_integrity();
}

#[test]
#[should_panic(expected = "already attached")]
fn test_double_attach_is_fatal() {
    let mut scene = scene();
    let a = scene.insert(group(10.0, 10.0));
    let b = scene.insert(group(10.0, 10.0));
    let leaf = scene.insert(SceneNode::empty());
    scene.add(a, &[leaf]);
    scene.add(b, &[leaf]);
}

#[test]
#[should_panic(expected = "cycle")]
fn test_attaching_ancestor_is_fatal() {
    let mut scene = scene();
    let outer = scene.insert(group(10.0, 10.0));
    let inner = scene.insert(group(10.0, 10.0));
    scene.add(outer, &[inner]);
    scene.add(inner, &[outer]);
}

#[test]
#[should_panic(expected = "has no parent")]
fn test_parent_of_unparented_is_fatal() {
    let mut scene = scene();
    let id = scene.insert(SceneNode::empty());
    scene.parent(id);
}

#[test]
#[should_panic(expected = "no parent coordinate space")]
fn test_local_to_parent_on_detached_is_fatal() {
    let mut scene = scene();
    let id = scene.insert(SceneNode::empty());
    scene.local_to_parent(id, Vec2::ZERO);
}

#[test]
fn test_del_and_del_all_detach() {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);
    let a = scene.insert(SceneNode::empty());
    let b = scene.insert(SceneNode::empty());
    let c = scene.insert(SceneNode::empty());
    scene.add(root, &[a, b, c]);

    scene.del(root, b);
    assert_eq!(scene.children(root), &[a, c]);
    assert_eq!(scene.parent_of(b), None);
    assert_eq!(scene.node(b).window(), None);

    scene.del_all(root);
    assert!(scene.children(root).is_empty());
    assert_eq!(scene.parent_of(a), None);

    // Detached nodes can be attached again.
    scene.add(root, &[b]);
    assert_eq!(scene.parent(b), root);
    scene.verify_integrity();
}

#[test]
fn test_remove_frees_subtree() {
    let mut scene = scene();
    let panel = scene.insert(group(10.0, 10.0));
    let a = scene.insert(SceneNode::empty());
    scene.add(panel, &[a]);
    assert_eq!(scene.len(), 2);
    scene.remove(panel);
    assert!(scene.is_empty());
}

#[test]
fn test_select_target_prefers_last_added() {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);
    let below = scene.insert(sized(0.0, 0.0, 50.0, 50.0));
    let above = scene.insert(sized(25.0, 25.0, 50.0, 50.0));
    scene.add(root, &[below, above]);

    assert_eq!(scene.select_target(root, Vec2::new(30.0, 30.0)), Some(above));
    assert_eq!(scene.select_target(root, Vec2::new(10.0, 10.0)), Some(below));
    assert_eq!(scene.select_target(root, Vec2::new(90.0, 5.0)), None);
}

#[test]
fn test_non_selectable_container_is_transparent() {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);
    let row = scene.insert(group(100.0, 20.0));
    scene.add(root, &[row]);

    assert_eq!(scene.select_target(root, Vec2::new(5.0, 5.0)), None);

    scene.set_selectable(row, true);
    assert_eq!(scene.select_target(root, Vec2::new(5.0, 5.0)), Some(row));
    assert_eq!(scene.select_target(root, Vec2::new(5.0, 50.0)), None);

    scene.set_selectable(root, true);
    assert_eq!(scene.select_target(root, Vec2::new(5.0, 50.0)), Some(root));
}

#[test]
fn test_select_target_descends_through_transforms() {
    let mut scene = scene();
    let root = scene.insert(group(200.0, 200.0));
    scene.set_root(root);
    let panel = scene.insert(group(100.0, 100.0).with_pos(Vec2::new(50.0, 50.0)));
    let button = scene.insert(sized(10.0, 10.0, 20.0, 20.0));
    scene.add(root, &[panel]);
    scene.add(panel, &[button]);
    scene.scale(panel, 2.0, 2.0);

    // button spans [70, 110) on screen after the 2x scale.
    assert_eq!(scene.select_target(root, Vec2::new(100.0, 100.0)), Some(button));
    assert_eq!(scene.select_target(root, Vec2::new(65.0, 65.0)), None);
}

#[test]
fn test_invisible_children_are_not_hit() {
    let mut scene = scene();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);
    let leaf = scene.insert(sized(0.0, 0.0, 50.0, 50.0));
    scene.add(root, &[leaf]);
    scene.set_visible(leaf, false);
    assert_eq!(scene.select_target(root, Vec2::new(10.0, 10.0)), None);
}

#[test]
fn test_screen_conversions_round_trip() {
    let mut scene = scene();
    let root = scene.insert(group(200.0, 200.0));
    scene.set_root(root);
    let panel = scene.insert(group(100.0, 100.0).with_pos(Vec2::new(40.0, 30.0)));
    let leaf = scene.insert(sized(5.0, 5.0, 10.0, 10.0));
    scene.add(root, &[panel]);
    scene.add(panel, &[leaf]);
    scene.rotate(panel, 0.7);

    let local = Vec2::new(2.0, 3.0);
    let screen = scene.local_to_screen(leaf, local);
    assert!(scene.screen_to_local(leaf, screen).abs_diff_eq(local, 1e-4));

    let in_panel = scene.local_to_parent(leaf, local);
    assert_eq!(in_panel, Vec2::new(7.0, 8.0));
    assert!(scene.parent_to_local(leaf, in_panel).abs_diff_eq(local, 1e-5));
    assert!(
        scene
            .local_to_screen(panel, in_panel)
            .abs_diff_eq(screen, 1e-4)
    );
}

#[test]
fn test_fill_layout_runs_on_add_and_update() {
    let mut scene = scene();
    let root = scene.insert(group(120.0, 80.0).with_layout(Fill));
    scene.set_root(root);
    let a = scene.insert(SceneNode::empty().with_pos(Vec2::new(9.0, 9.0)));
    scene.add(root, &[a]);
    assert_eq!(scene.size(a), Vec2::new(120.0, 80.0));
    assert_eq!(scene.pos(a), Vec2::ZERO);

    scene.set_size(root, Vec2::new(60.0, 60.0));
    assert!(scene.flags(root).contains(DirtyFlags::LAYOUT));
    scene.update();
    assert_eq!(scene.size(a), Vec2::new(60.0, 60.0));
    assert!(!scene.flags(root).contains(DirtyFlags::LAYOUT));
}

struct Badge(Vec2);

impl Widget for Badge {
    fn min_size(&self) -> Vec2 {
        self.0
    }
}

#[test]
fn test_measure_asks_container_layout_for_min_size() {
    let mut scene = scene();
    let root = scene.insert(group(10.0, 10.0).with_layout(Fill));
    let inner = scene.insert(SceneNode::container());
    let small = scene.insert(SceneNode::leaf(Badge(Vec2::new(30.0, 5.0))));
    let tall = scene.insert(SceneNode::leaf(Badge(Vec2::new(4.0, 25.0))));
    scene.set_root(root);
    scene.add(root, &[small, tall]);

    assert_eq!(scene.measure(root), Vec2::new(30.0, 25.0));
    assert_eq!(scene.size(root), Vec2::new(30.0, 25.0));
    assert!(!scene.flags(root).contains(DirtyFlags::MEASURE));

    // Manual layout contributes no minimum of its own.
    let wide = scene.insert(SceneNode::leaf(Badge(Vec2::new(50.0, 50.0))));
    scene.add(inner, &[wide]);
    assert_eq!(scene.measure(inner), Vec2::ZERO);
}

#[derive(Clone, Default)]
struct Recorder {
    seen: Arc<Mutex<Vec<(GestureKind, Vec2)>>>,
}

impl Widget for Recorder {
    fn on_input(&mut self, ctx: &mut EventCtx<'_>, event: &GestureEvent) {
        self.seen.lock().unwrap().push((event.kind, event.pos));
        if event.kind == GestureKind::DoubleTap {
            ctx.request_quit();
        }
        ctx.mark(DirtyFlags::PAINT);
    }
}

#[test]
fn test_deliver_invokes_handler_and_collects_requests() {
    let mut scene = scene();
    let recorder = Recorder::default();
    let root = scene.insert(group(100.0, 100.0));
    scene.set_root(root);
    let leaf = scene.insert(SceneNode::leaf(recorder.clone()).with_size(Vec2::new(10.0, 10.0)));
    scene.add(root, &[leaf]);
    scene.clear_flags(DirtyFlags::MEASURE | DirtyFlags::LAYOUT | DirtyFlags::PAINT);

    let mut requests = Vec::new();
    let ev = GestureEvent::new(GestureKind::DoubleTap, Vec2::ONE, Vec2::ONE, Default::default(), 1);
    assert!(scene.deliver(leaf, &ev, &mut requests));
    assert!(!scene.deliver(root, &ev, &mut requests));

    assert_eq!(requests, vec![Request::Quit]);
    assert_eq!(*recorder.seen.lock().unwrap(), vec![(GestureKind::DoubleTap, Vec2::ONE)]);
    assert!(scene.flags(root).contains(DirtyFlags::PAINT));
    assert!(scene.node(leaf).widget().is_some());
    assert_eq!(scene.profiling.deliveries, 1);
}
