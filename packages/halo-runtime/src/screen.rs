use crate::capture::{self, MovieRecorder};
use crate::config::RuntimeConfig;
use crate::device::{Display, Driver, TouchSource};
use crate::error::{Result, RuntimeError};
use crate::window::{self, Links, Window};
use halo_core::{Rect, Vec2, WindowId};
use halo_gesture::{GestureEvent, GestureRecognizer, LongPressTimer, TouchSample};
use parking_lot::{Condvar, Mutex, const_mutex};
use rustc_hash::FxHashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Weak};
use std::thread::{self, JoinHandle};
use std::time::Instant;

static CURRENT: Mutex<Option<Weak<ScreenInner>>> = const_mutex(None);

pub(crate) enum PaintCmd {
    Repaint(WindowId),
    Stop,
}

pub(crate) enum Control {
    Quit,
    Closed,
}

pub(crate) struct ScreenInner {
    config: RuntimeConfig,
    rect: Rect,
    display: Mutex<Option<Box<dyn Display>>>,
    recognizer: Mutex<GestureRecognizer>,
    active: Mutex<Option<Window>>,
    windows: Mutex<FxHashMap<WindowId, Window>>,
    next_window: AtomicU32,
    running: AtomicBool,
    closing: AtomicBool,
    closed: Mutex<bool>,
    closed_cv: Condvar,
    paint_tx: Sender<PaintCmd>,
    control_tx: Sender<Control>,
    control_rx: Mutex<Option<Receiver<Control>>>,
    paint: Mutex<Option<JoinHandle<()>>>,
    ingest: Mutex<Option<JoinHandle<()>>>,
    movie: Mutex<Option<MovieRecorder>>,
}

/// The process-wide owner of the display and touch input.
///
/// At most one Screen is open at a time; [`Screen::open`] panics if another
/// one is still running. Handles are cheap to clone.
#[derive(Clone)]
pub struct Screen {
    inner: Arc<ScreenInner>,
}

impl Screen {
    /// Opens the display and touch source and starts the paint and ingestion
    /// threads.
    pub fn open(mut driver: impl Driver, config: RuntimeConfig) -> Result<Self> {
        config.validate()?;
        let mut current = CURRENT.lock();
        if current.as_ref().is_some_and(|w| w.strong_count() > 0) {
            panic!("a Screen is already open; quit it before opening another");
        }

        let mut display = driver.open_display(config.rotation)?;
        let touch = match driver.open_touch(config.rotation) {
            Ok(touch) => touch,
            Err(err) => {
                tracing::error!(%err, "touch input unavailable");
                display.close();
                return Err(err.into());
            }
        };

        let (w, h) = display.size();
        let (paint_tx, paint_rx) = mpsc::channel();
        let (control_tx, control_rx) = mpsc::channel();
        let inner = Arc::new(ScreenInner {
            rect: Rect::from_size(Vec2::new(w as f32, h as f32)),
            display: Mutex::new(Some(display)),
            recognizer: Mutex::new(GestureRecognizer::new(config.gesture)),
            config,
            active: Mutex::new(None),
            windows: Mutex::new(FxHashMap::default()),
            next_window: AtomicU32::new(1),
            running: AtomicBool::new(true),
            closing: AtomicBool::new(false),
            closed: Mutex::new(false),
            closed_cv: Condvar::new(),
            paint_tx,
            control_tx,
            control_rx: Mutex::new(Some(control_rx)),
            paint: Mutex::new(None),
            ingest: Mutex::new(None),
            movie: Mutex::new(None),
        });
        *current = Some(Arc::downgrade(&inner));
        drop(current);

        let screen = Self { inner };
        if let Err(err) = screen.start(paint_rx, touch) {
            screen.quit();
            return Err(err);
        }
        tracing::info!(size = ?(w, h), "screen opened");
        Ok(screen)
    }

    fn start(&self, paint_rx: Receiver<PaintCmd>, touch: Box<dyn TouchSource>) -> Result<()> {
        let inner = self.inner.clone();
        let paint = thread::Builder::new()
            .name("halo-paint".into())
            .spawn(move || inner.paint_loop(paint_rx))?;
        *self.inner.paint.lock() = Some(paint);

        let inner = self.inner.clone();
        let ingest = thread::Builder::new()
            .name("halo-ingest".into())
            .spawn(move || inner.ingest_loop(touch))?;
        *self.inner.ingest.lock() = Some(ingest);
        Ok(())
    }

    /// The open Screen, if any.
    pub fn current() -> Option<Screen> {
        let current = CURRENT.lock();
        let inner = current.as_ref()?.upgrade()?;
        (!inner.closing.load(Ordering::SeqCst)).then_some(Screen { inner })
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.inner.config
    }

    pub fn rect(&self) -> Rect {
        self.inner.rect
    }

    /// Creates a window covering the whole display, in the `Alive` stage.
    pub fn new_window(&self) -> Result<Window> {
        let id = WindowId(self.inner.next_window.fetch_add(1, Ordering::SeqCst));
        let links = Links {
            paint: self.inner.paint_tx.clone(),
            control: self.inner.control_tx.clone(),
            screen: Arc::downgrade(&self.inner),
        };
        let window = Window::spawn(id, self.inner.rect, links)?;
        self.inner.windows.lock().insert(id, window.clone());
        Ok(window)
    }

    pub fn active_window(&self) -> Option<Window> {
        self.inner.active.lock().clone()
    }

    /// Shows `window`: the previous window drops back to `Alive`, the new one
    /// becomes `Visible` and is repainted right away.
    pub fn set_window(&self, window: &Window) {
        if window.stage() == window::Stage::Dead {
            tracing::warn!(id = ?window.id(), "cannot show a closed window");
            return;
        }
        let previous = self.inner.active.lock().replace(window.clone());
        if let Some(previous) = previous.filter(|p| p.id() != window.id()) {
            previous.set_stage(window::Stage::Alive);
        }
        if window.stage() < window::Stage::Visible {
            window.set_stage(window::Stage::Visible);
        }
        tracing::info!(id = ?window.id(), "window shown");
        window.repaint();
    }

    /// Blocks until the screen has shut down, serving quit requests made
    /// through [`Screen::request_quit`] or by widget handlers.
    pub fn run(&self) {
        let Some(rx) = self.inner.control_rx.lock().take() else {
            panic!("Screen::run is already running");
        };
        tracing::info!("screen running");
        loop {
            match rx.recv() {
                Ok(Control::Quit) => self.quit(),
                Ok(Control::Closed) | Err(_) => break,
            }
        }
        tracing::info!("screen run loop finished");
    }

    /// Asks the run loop to quit. Returns immediately.
    pub fn request_quit(&self) {
        if self.inner.control_tx.send(Control::Quit).is_err() {
            tracing::debug!("quit requested after shutdown");
        }
    }

    /// Stops ingestion, closes every window, stops the paint ticker, closes
    /// the devices and releases the singleton. Concurrent callers all block
    /// until that has finished; calls after it return at once.
    ///
    /// Panics when called from a widget handler; use
    /// [`EventCtx::request_quit`](halo_core::EventCtx::request_quit) there.
    pub fn quit(&self) {
        self.inner.shutdown();
    }

    /// Writes the active window's current frame as a PNG.
    pub fn screenshot(&self, path: impl AsRef<Path>) -> Result<()> {
        let window = self.active_window().ok_or(RuntimeError::NoWindow)?;
        capture::save_png(&window.snapshot(), path.as_ref())
    }

    /// Starts writing every rendered frame into `dir`.
    pub fn start_movie(&self, dir: impl Into<PathBuf>) -> Result<()> {
        let recorder = MovieRecorder::start(dir)?;
        *self.inner.movie.lock() = Some(recorder);
        Ok(())
    }

    /// Stops movie capture and returns the number of frames written.
    pub fn stop_movie(&self) -> Option<u64> {
        let recorder = self.inner.movie.lock().take()?;
        tracing::info!(frames = recorder.frames(), dir = %recorder.dir().display(), "movie capture stopped");
        Some(recorder.frames())
    }
}

impl ScreenInner {
    fn paint_loop(&self, rx: Receiver<PaintCmd>) {
        let period = self.config.paint_period();
        let mut deadline = Instant::now() + period;
        loop {
            let timeout = deadline.saturating_duration_since(Instant::now());
            match rx.recv_timeout(timeout) {
                Ok(PaintCmd::Repaint(id)) => self.paint(Some(id)),
                Ok(PaintCmd::Stop) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {
                    self.paint(None);
                    deadline += period;
                    let now = Instant::now();
                    if deadline < now {
                        // Fell behind; skip missed ticks.
                        deadline = now + period;
                    }
                }
            }
        }
        tracing::debug!("paint loop finished");
    }

    /// One paint pass over the active window. `forced` names a window that
    /// asked for a repaint regardless of its dirty flags.
    fn paint(&self, forced: Option<WindowId>) {
        let Some(window) = self.active.lock().clone() else {
            return;
        };
        let force = forced == Some(window.id());
        window.render(force, self.config.background_color(), |frame| {
            if let Some(movie) = self.movie.lock().as_mut() {
                if let Err(err) = movie.record(frame) {
                    tracing::warn!(%err, "movie frame dropped");
                }
            }
            if let Some(display) = self.display.lock().as_mut() {
                if let Err(err) = display.draw(frame) {
                    tracing::warn!(%err, "display draw failed");
                }
            }
        });
    }

    fn ingest_loop(self: Arc<Self>, mut touch: Box<dyn TouchSource>) {
        let poll = self.config.poll_interval();
        while self.running.load(Ordering::SeqCst) {
            match touch.next_sample(poll) {
                Ok(Some(sample)) => self.ingest(sample),
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(%err, "touch source failed, ingestion stopped");
                    break;
                }
            }
        }
        touch.close();
        tracing::debug!("ingestion loop finished");
    }

    fn ingest(self: &Arc<Self>, sample: TouchSample) {
        // Posting under the recognizer lock keeps timer output ordered with
        // sample output.
        let mut recognizer = self.recognizer.lock();
        let recognized = recognizer.feed(sample);
        if let Some(timer) = recognized.timer {
            self.arm_long_press(timer);
        }
        for event in recognized.events {
            self.post(event);
        }
    }

    fn arm_long_press(self: &Arc<Self>, timer: LongPressTimer) {
        let weak = Arc::downgrade(self);
        let spawned = thread::Builder::new()
            .name("halo-long-press".into())
            .spawn(move || {
                thread::sleep(timer.delay);
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                if !inner.running.load(Ordering::SeqCst) {
                    return;
                }
                let mut recognizer = inner.recognizer.lock();
                if let Some(event) = recognizer.fire_long_press(timer.seq) {
                    inner.post(event);
                }
            });
        if let Err(err) = spawned {
            tracing::warn!(%err, seq = timer.seq, "long-press timer not armed");
        }
    }

    fn post(&self, event: GestureEvent) {
        let Some(window) = self.active.lock().clone() else {
            tracing::trace!(?event, "no active window, event dropped");
            return;
        };
        window::focus_on_press(&window, &event);
        if !window.post(event) {
            tracing::trace!(?event, "window closed, event dropped");
        }
    }

    /// Drops a closed window from the registry, and from the screen if it
    /// was showing.
    pub(crate) fn forget_window(&self, id: WindowId) {
        if self.windows.lock().remove(&id).is_some() {
            tracing::debug!(?id, "window unregistered");
        }
        let mut active = self.active.lock();
        if active.as_ref().is_some_and(|w| w.id() == id) {
            *active = None;
        }
    }

    fn shutdown(&self) {
        // The window being closed would wait on its own dispatch thread.
        assert!(
            !window::on_dispatch_thread(),
            "Screen::quit called from a widget handler; use EventCtx::request_quit"
        );
        if self.closing.swap(true, Ordering::SeqCst) {
            let mut closed = self.closed.lock();
            while !*closed {
                self.closed_cv.wait(&mut closed);
            }
            return;
        }
        tracing::info!("screen shutting down");

        self.running.store(false, Ordering::SeqCst);
        join("ingest", self.ingest.lock().take());

        let windows: Vec<Window> = self.windows.lock().drain().map(|(_, w)| w).collect();
        for window in &windows {
            window.close();
        }
        self.active.lock().take();

        let _ = self.paint_tx.send(PaintCmd::Stop);
        join("paint", self.paint.lock().take());

        if let Some(mut display) = self.display.lock().take() {
            display.close();
        }
        self.movie.lock().take();

        {
            let mut current = CURRENT.lock();
            let is_self = current
                .as_ref()
                .is_some_and(|w| std::ptr::eq(w.as_ptr(), self));
            if is_self {
                *current = None;
            }
        }
        *self.closed.lock() = true;
        self.closed_cv.notify_all();
        let _ = self.control_tx.send(Control::Closed);
        tracing::info!("screen closed");
    }
}

fn join(name: &str, handle: Option<JoinHandle<()>>) {
    let Some(handle) = handle else {
        return;
    };
    if handle.thread().id() == thread::current().id() {
        return;
    }
    if handle.join().is_err() {
        tracing::error!(thread = name, "runtime thread panicked");
    }
}
