use anyhow::{Context, Result};
use halo_core::{EventCtx, GestureEvent, GestureKind, Painter, Rect, SceneNode, Vec2, Widget};
use halo_gesture::{SampleKind, TouchSample};
use halo_runtime::{RuntimeConfig, Screen, SimDriver};
use image::Rgba;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Sender};
use std::thread;
use std::time::{Duration, Instant};

/// A recorded touch session: samples with their offsets from the start.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Script {
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct Step {
    pub at_ms: u64,
    pub kind: SampleKind,
    pub x: f32,
    pub y: f32,
}

impl Script {
    pub fn from_json(text: &str) -> Result<Self> {
        let script: Self = serde_json::from_str(text).context("malformed replay script")?;
        if script.steps.windows(2).any(|w| w[1].at_ms < w[0].at_ms) {
            anyhow::bail!("replay steps must be ordered by at_ms");
        }
        Ok(script)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text)
    }

    fn duration(&self) -> Duration {
        Duration::from_millis(self.steps.last().map_or(0, |s| s.at_ms))
    }
}

/// One delivered gesture as printed on stdout.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Delivered {
    pub kind: GestureKind,
    pub x: f32,
    pub y: f32,
    pub time_ms: u64,
    pub seq: u64,
}

impl From<&GestureEvent> for Delivered {
    fn from(event: &GestureEvent) -> Self {
        Self {
            kind: event.kind,
            x: event.pos.x,
            y: event.pos.y,
            time_ms: event.time.as_millis() as u64,
            seq: event.seq,
        }
    }
}

pub struct ReplayOptions {
    pub width: u32,
    pub height: u32,
    pub config: RuntimeConfig,
    pub screenshot: Option<PathBuf>,
    pub movie: Option<PathBuf>,
}

/// Full-window root that records every gesture and marks the last contact.
struct Recorder {
    tx: Sender<Delivered>,
    last: Option<Vec2>,
}

impl Widget for Recorder {
    fn paint(&self, node: &SceneNode, painter: &mut Painter<'_>) {
        painter.stroke_rect(node.local_bounds(), 1.0, Rgba([90, 90, 90, 255]));
        if let Some(p) = self.last {
            let mark = Rect::new(p - Vec2::splat(3.0), Vec2::splat(6.0));
            painter.fill_rect(mark, Rgba([255, 200, 0, 255]));
        }
    }

    fn on_input(&mut self, ctx: &mut EventCtx<'_>, event: &GestureEvent) {
        let _ = self.tx.send(Delivered::from(event));
        if !matches!(event.kind, GestureKind::Enter | GestureKind::Leave) {
            self.last = Some(event.pos);
            ctx.mark(halo_core::DirtyFlags::PAINT);
        }
    }
}

/// Replays `script` on a simulated panel and returns the delivered gestures
/// in delivery order.
pub fn replay(script: &Script, options: ReplayOptions) -> Result<Vec<Delivered>> {
    let settle = Duration::from_millis(
        options
            .config
            .gesture
            .long_press_ms
            .max(options.config.gesture.double_tap_ms)
            + 2 * options.config.paint_period_ms,
    );

    let (driver, injector, probe) = SimDriver::new(options.width, options.height);
    let screen = Screen::open(driver, options.config.clone()).context("opening simulated screen")?;
    let result = drive(&screen, script, &injector, &probe, settle, &options);
    screen.quit();
    result
}

fn drive(
    screen: &Screen,
    script: &Script,
    injector: &halo_runtime::Injector,
    probe: &halo_runtime::FrameProbe,
    settle: Duration,
    options: &ReplayOptions,
) -> Result<Vec<Delivered>> {
    let window = screen.new_window()?;
    let (tx, rx) = mpsc::channel();
    let root = window.with_scene(|scene| {
        scene.insert(
            SceneNode::container()
                .with_selectable(true)
                .with_widget(Recorder { tx, last: None }),
        )
    });
    window.set_root(root);
    screen.set_window(&window);
    if let Some(dir) = &options.movie {
        screen.start_movie(dir)?;
    }

    tracing::info!(steps = script.steps.len(), length = ?script.duration(), "replay started");
    let start = Instant::now();
    for step in &script.steps {
        let at = Duration::from_millis(step.at_ms);
        if let Some(wait) = at.checked_sub(start.elapsed()) {
            thread::sleep(wait);
        }
        injector.send(TouchSample::new(step.kind, step.x, step.y, at));
    }
    thread::sleep(settle);

    if let Some(path) = &options.screenshot {
        let before = probe.frames();
        window.repaint();
        if !probe.wait_for_frames(before + 1, Duration::from_secs(2)) {
            tracing::warn!("no fresh frame before screenshot");
        }
        screen.screenshot(path)?;
    }
    if let Some(frames) = screen.stop_movie() {
        tracing::info!(frames, "movie written");
    }

    window.close();
    Ok(rx.try_iter().collect())
}
