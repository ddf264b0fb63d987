//! In-process stand-in for the panel and touch controller.
//!
//! [`SimDriver::new`] hands back the driver plus an [`Injector`] that feeds
//! touch samples and a [`FrameProbe`] that observes what was drawn.

use crate::device::{Display, Driver, Rotation, TouchSource};
use crate::error::DeviceError;
use halo_core::{FrameBuffer, Vec2};
use halo_gesture::{SampleKind, TouchSample};
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

#[derive(Default)]
struct ProbeState {
    frames: u64,
    last: Option<FrameBuffer>,
    closed: bool,
}

/// Shared view of the frames the simulated display received.
#[derive(Clone, Default)]
pub struct FrameProbe {
    shared: Arc<(Mutex<ProbeState>, Condvar)>,
}

impl FrameProbe {
    pub fn frames(&self) -> u64 {
        self.shared.0.lock().frames
    }

    pub fn last_frame(&self) -> Option<FrameBuffer> {
        self.shared.0.lock().last.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.shared.0.lock().closed
    }

    /// Blocks until at least `count` frames were drawn. Returns false on
    /// timeout.
    pub fn wait_for_frames(&self, count: u64, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock();
        while state.frames < count {
            if cond.wait_until(&mut state, deadline).timed_out() {
                return state.frames >= count;
            }
        }
        true
    }

    fn record(&self, frame: &FrameBuffer) {
        let (lock, cond) = &*self.shared;
        let mut state = lock.lock();
        state.frames += 1;
        state.last = Some(frame.clone());
        cond.notify_all();
    }

    fn close(&self) {
        self.shared.0.lock().closed = true;
    }
}

/// Sends touch samples to the simulated controller.
///
/// Samples built through the convenience methods are stamped with the time
/// elapsed since the injector was created.
#[derive(Clone)]
pub struct Injector {
    tx: Sender<TouchSample>,
    epoch: Instant,
}

impl Injector {
    pub fn send(&self, sample: TouchSample) {
        if self.tx.send(sample).is_err() {
            tracing::debug!(?sample, "touch source gone, sample dropped");
        }
    }

    pub fn press(&self, x: f32, y: f32) {
        self.stamped(SampleKind::Press, x, y);
    }

    pub fn drag(&self, x: f32, y: f32) {
        self.stamped(SampleKind::Drag, x, y);
    }

    pub fn release(&self, x: f32, y: f32) {
        self.stamped(SampleKind::Release, x, y);
    }

    pub fn tap(&self, x: f32, y: f32) {
        self.press(x, y);
        self.release(x, y);
    }

    fn stamped(&self, kind: SampleKind, x: f32, y: f32) {
        self.send(TouchSample::new(kind, x, y, self.epoch.elapsed()));
    }
}

pub struct SimDriver {
    native: (u32, u32),
    touch: Option<Receiver<TouchSample>>,
    probe: FrameProbe,
    fail_touch: bool,
}

impl SimDriver {
    /// A panel of `width` x `height` native pixels.
    pub fn new(width: u32, height: u32) -> (Self, Injector, FrameProbe) {
        let (tx, rx) = mpsc::channel();
        let probe = FrameProbe::default();
        let driver = Self {
            native: (width, height),
            touch: Some(rx),
            probe: probe.clone(),
            fail_touch: false,
        };
        let injector = Injector {
            tx,
            epoch: Instant::now(),
        };
        (driver, injector, probe)
    }

    /// Makes `open_touch` fail, for exercising startup error paths.
    pub fn with_failing_touch(mut self) -> Self {
        self.fail_touch = true;
        self
    }
}

impl Driver for SimDriver {
    fn open_display(&mut self, rotation: Rotation) -> Result<Box<dyn Display>, DeviceError> {
        let size = rotation.logical_size(self.native);
        if size.0 == 0 || size.1 == 0 {
            return Err(DeviceError::Display(format!("empty panel {size:?}")));
        }
        tracing::info!(?size, ?rotation, "simulated display opened");
        Ok(Box::new(SimDisplay {
            size,
            probe: self.probe.clone(),
        }))
    }

    fn open_touch(&mut self, rotation: Rotation) -> Result<Box<dyn TouchSource>, DeviceError> {
        if self.fail_touch {
            return Err(DeviceError::Touch("simulated controller unavailable".into()));
        }
        let Some(rx) = self.touch.take() else {
            return Err(DeviceError::Touch("touch source already opened".into()));
        };
        Ok(Box::new(SimTouch {
            rx: Some(rx),
            rotation,
            native: Vec2::new(self.native.0 as f32, self.native.1 as f32),
        }))
    }
}

struct SimDisplay {
    size: (u32, u32),
    probe: FrameProbe,
}

impl Display for SimDisplay {
    fn size(&self) -> (u32, u32) {
        self.size
    }

    fn draw(&mut self, frame: &FrameBuffer) -> Result<(), DeviceError> {
        if self.probe.is_closed() {
            return Err(DeviceError::Closed);
        }
        self.probe.record(frame);
        Ok(())
    }

    fn close(&mut self) {
        self.probe.close();
        tracing::info!("simulated display closed");
    }
}

struct SimTouch {
    rx: Option<Receiver<TouchSample>>,
    rotation: Rotation,
    native: Vec2,
}

impl TouchSource for SimTouch {
    fn next_sample(&mut self, timeout: Duration) -> Result<Option<TouchSample>, DeviceError> {
        let Some(rx) = &self.rx else {
            return Err(DeviceError::Closed);
        };
        match rx.recv_timeout(timeout) {
            Ok(mut sample) => {
                sample.pos = self.rotation.map_point(sample.pos, self.native);
                Ok(Some(sample))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(DeviceError::Closed),
        }
    }

    fn close(&mut self) {
        self.rx = None;
        tracing::info!("simulated touch closed");
    }
}
