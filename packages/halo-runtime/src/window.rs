use crate::error::Result;
use crate::router::Router;
use crate::screen::{Control, PaintCmd, ScreenInner};
use halo_core::{
    Color, DirtyFlags, FrameBuffer, GestureEvent, GestureKind, NodeId, Painter, Rect, Request,
    Scene, WindowId,
};
use parking_lot::Mutex;
use std::cell::Cell;
use std::fmt;
use std::sync::{Arc, Weak};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};

thread_local! {
    static ON_DISPATCH: Cell<bool> = const { Cell::new(false) };
}

/// Whether the calling thread is some window's dispatch thread, i.e. a
/// widget handler is running.
pub(crate) fn on_dispatch_thread() -> bool {
    ON_DISPATCH.with(Cell::get)
}

/// Window lifecycle. Only `Visible` and `Focused` windows are painted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Stage {
    Dead,
    Alive,
    Visible,
    Focused,
}

/// Everything the window mutex guards: the scene and what it renders into.
pub struct WindowState {
    pub scene: Scene,
    pub frame: FrameBuffer,
}

/// Channels back into the owning screen.
#[derive(Clone)]
pub(crate) struct Links {
    pub(crate) paint: Sender<PaintCmd>,
    pub(crate) control: Sender<Control>,
    pub(crate) screen: Weak<ScreenInner>,
}

struct WindowInner {
    id: WindowId,
    rect: Rect,
    stage: Mutex<Stage>,
    state: Arc<Mutex<WindowState>>,
    queue: Mutex<Option<Sender<GestureEvent>>>,
    dispatch: Mutex<Option<JoinHandle<()>>>,
    dispatch_thread: ThreadId,
    links: Links,
}

/// A full-display surface owning one scene graph and its dispatch thread.
///
/// Cloning yields another handle to the same window.
#[derive(Clone)]
pub struct Window {
    inner: Arc<WindowInner>,
}

impl Window {
    pub(crate) fn spawn(id: WindowId, rect: Rect, links: Links) -> Result<Self> {
        let state = Arc::new(Mutex::new(WindowState {
            scene: Scene::new(id),
            frame: FrameBuffer::new(rect.width() as u32, rect.height() as u32),
        }));
        let (tx, rx) = mpsc::channel();

        let handle = {
            let state = state.clone();
            let links = links.clone();
            thread::Builder::new()
                .name(format!("halo-window-{}", id.0))
                .spawn(move || dispatch_loop(id, state, rx, links))?
        };

        tracing::debug!(?id, ?rect, "window created");
        Ok(Self {
            inner: Arc::new(WindowInner {
                id,
                rect,
                stage: Mutex::new(Stage::Alive),
                state,
                queue: Mutex::new(Some(tx)),
                dispatch_thread: handle.thread().id(),
                dispatch: Mutex::new(Some(handle)),
                links,
            }),
        })
    }

    pub fn id(&self) -> WindowId {
        self.inner.id
    }

    pub fn rect(&self) -> Rect {
        self.inner.rect
    }

    pub fn stage(&self) -> Stage {
        *self.inner.stage.lock()
    }

    pub(crate) fn set_stage(&self, stage: Stage) {
        let mut current = self.inner.stage.lock();
        if *current != Stage::Dead && *current != stage {
            tracing::debug!(id = ?self.inner.id, from = ?*current, to = ?stage, "window stage");
            *current = stage;
        }
    }

    /// Installs `node` as the root and stretches it over the window.
    pub fn set_root(&self, node: NodeId) {
        let mut state = self.inner.state.lock();
        state.scene.set_root(node);
        state.scene.set_size(node, self.inner.rect.size);
    }

    pub fn root(&self) -> Option<NodeId> {
        self.inner.state.lock().scene.root()
    }

    /// Forces a repaint on the next paint pass even if nothing is dirty.
    pub fn repaint(&self) {
        if self.inner.links.paint.send(PaintCmd::Repaint(self.inner.id)).is_err() {
            tracing::debug!(id = ?self.inner.id, "repaint after screen shutdown");
        }
    }

    /// Runs `f` with the window lock held. Must not be called from a widget
    /// handler of the same window, which already runs under that lock.
    pub fn with_scene<R>(&self, f: impl FnOnce(&mut Scene) -> R) -> R {
        f(&mut self.inner.state.lock().scene)
    }

    /// Copy of the last rendered frame.
    pub fn snapshot(&self) -> FrameBuffer {
        self.inner.state.lock().frame.clone()
    }

    /// Queues `event` for the dispatch thread. Returns false once the
    /// window is closed.
    pub fn post(&self, event: GestureEvent) -> bool {
        match &*self.inner.queue.lock() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    /// Marks the window dead, drops it from the screen, lets the dispatch
    /// thread drain what is already queued and joins it. Safe to call more
    /// than once and from a handler.
    pub fn close(&self) {
        *self.inner.stage.lock() = Stage::Dead;
        drop(self.inner.queue.lock().take());
        if let Some(screen) = self.inner.links.screen.upgrade() {
            screen.forget_window(self.inner.id);
        }

        let handle = self.inner.dispatch.lock().take();
        if let Some(handle) = handle {
            if thread::current().id() == self.inner.dispatch_thread {
                tracing::debug!(id = ?self.inner.id, "close from dispatch thread, not joining");
                return;
            }
            if handle.join().is_err() {
                tracing::error!(id = ?self.inner.id, "dispatch thread panicked");
            }
            tracing::debug!(id = ?self.inner.id, "window closed");
        }
    }

    /// Renders when the window is showing and its root is dirty, or when
    /// `force` is set. `sink` sees the finished frame while the lock is
    /// still held. Returns whether a frame was produced.
    pub(crate) fn render(&self, force: bool, background: Color, sink: impl FnOnce(&FrameBuffer)) -> bool {
        if self.stage() < Stage::Visible {
            return false;
        }
        let mut state = self.inner.state.lock();
        let WindowState { scene, frame } = &mut *state;

        let dirty = scene
            .root()
            .is_some_and(|root| scene.flags(root).intersects(DirtyFlags::PAINT | DirtyFlags::LAYOUT));
        if !dirty && !force {
            return false;
        }

        let mut painter = Painter::new(frame);
        painter.clear(background);
        scene.render(&mut painter);
        tracing::debug!(id = ?self.inner.id, force, "window rendered");
        sink(frame);
        true
    }
}

impl fmt::Debug for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Window")
            .field("id", &self.inner.id)
            .field("rect", &self.inner.rect)
            .field("stage", &self.stage())
            .finish()
    }
}

fn dispatch_loop(
    id: WindowId,
    state: Arc<Mutex<WindowState>>,
    rx: Receiver<GestureEvent>,
    links: Links,
) {
    ON_DISPATCH.with(|flag| flag.set(true));
    let mut router = Router::default();
    while let Ok(event) = rx.recv() {
        tracing::trace!(?id, ?event, "dispatch");
        let mut requests = Vec::new();
        {
            let mut state = state.lock();
            let routed = router.route(&state.scene, &event);
            for (target, event) in routed {
                state.scene.deliver(target, &event, &mut requests);
            }
        }

        for request in requests {
            let sent = match request {
                Request::Quit => links.control.send(Control::Quit).is_ok(),
                Request::Repaint => links.paint.send(PaintCmd::Repaint(id)).is_ok(),
            };
            if !sent {
                tracing::debug!(?id, ?request, "request after screen shutdown");
            }
        }
    }
    tracing::debug!(?id, "dispatch loop finished");
}

/// Promotes a visible window to focused when a contact lands on it.
pub(crate) fn focus_on_press(window: &Window, event: &GestureEvent) {
    if event.kind == GestureKind::Press && window.stage() == Stage::Visible {
        window.set_stage(Stage::Focused);
    }
}
