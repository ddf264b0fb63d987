use crate::event::{GestureEvent, GestureKind};
use crate::sample::{SampleKind, TouchSample};
use glam::Vec2;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GestureConfig {
    /// Hold time before a stationary contact becomes a long press.
    pub long_press_ms: u64,
    /// Maximum travel from the press position that still counts as "not moved".
    pub near_threshold: f32,
    /// Maximum gap between two taps that form a double tap.
    pub double_tap_ms: u64,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            long_press_ms: 400,
            near_threshold: 8.0,
            double_tap_ms: 300,
        }
    }
}

impl GestureConfig {
    pub fn long_press(&self) -> Duration {
        Duration::from_millis(self.long_press_ms)
    }

    pub fn double_tap_window(&self) -> Duration {
        Duration::from_millis(self.double_tap_ms)
    }
}

/// Request to call [`GestureRecognizer::fire_long_press`] with `seq` once
/// `delay` has elapsed. Nobody cancels it; the recognizer ignores it if the
/// contact it was armed for is gone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongPressTimer {
    pub seq: u64,
    pub delay: Duration,
}

/// Output of feeding one raw sample.
#[derive(Debug, Default, Clone)]
pub struct Recognized {
    pub events: SmallVec<[GestureEvent; 2]>,
    pub timer: Option<LongPressTimer>,
}

#[derive(Debug, Clone, Copy)]
struct Contact {
    seq: u64,
    init_time: Duration,
    init_pos: Vec2,
    time: Duration,
    pos: Vec2,
    released: bool,
    strayed: bool,
    long_pressed: bool,
}

#[derive(Debug, Clone, Copy)]
struct TapMemo {
    time: Duration,
    pos: Vec2,
}

/// Turns press/drag/release samples of a single contact into gestures.
pub struct GestureRecognizer {
    config: GestureConfig,
    seq: u64,
    contact: Option<Contact>,
    last_tap: Option<TapMemo>,
}

impl GestureRecognizer {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            seq: 0,
            contact: None,
            last_tap: None,
        }
    }

    pub fn config(&self) -> &GestureConfig {
        &self.config
    }

    /// Sequence number of the most recent contact, 0 before the first press.
    pub fn current_seq(&self) -> u64 {
        self.seq
    }

    pub fn is_pressed(&self) -> bool {
        self.contact.is_some_and(|c| !c.released)
    }

    pub fn feed(&mut self, sample: TouchSample) -> Recognized {
        tracing::trace!(?sample, "touch sample");
        match sample.kind {
            SampleKind::Press => self.press(sample),
            SampleKind::Drag => self.drag(sample),
            SampleKind::Release => self.release(sample),
        }
    }

    fn press(&mut self, sample: TouchSample) -> Recognized {
        self.seq += 1;
        let contact = Contact {
            seq: self.seq,
            init_time: sample.timestamp,
            init_pos: sample.pos,
            time: sample.timestamp,
            pos: sample.pos,
            released: false,
            strayed: false,
            long_pressed: false,
        };
        self.contact = Some(contact);

        Recognized {
            events: smallvec![self.event(GestureKind::Press, &contact)],
            timer: Some(LongPressTimer {
                seq: self.seq,
                delay: self.config.long_press(),
            }),
        }
    }

    fn drag(&mut self, sample: TouchSample) -> Recognized {
        let near = self.config.near_threshold;
        let Some(contact) = self.contact.as_mut() else {
            // Drag without a press: still forwarded, anchored on itself.
            let event = GestureEvent::new(
                GestureKind::Drag,
                sample.pos,
                sample.pos,
                sample.timestamp,
                self.seq,
            );
            return Recognized {
                events: smallvec![event],
                timer: None,
            };
        };
        contact.time = sample.timestamp;
        contact.pos = sample.pos;
        if contact.pos.distance(contact.init_pos) > near {
            contact.strayed = true;
        }
        let contact = *contact;

        Recognized {
            events: smallvec![self.event(GestureKind::Drag, &contact)],
            timer: None,
        }
    }

    fn release(&mut self, sample: TouchSample) -> Recognized {
        let near = self.config.near_threshold;
        let Some(contact) = self.contact.as_mut() else {
            let event = GestureEvent::new(
                GestureKind::Release,
                sample.pos,
                sample.pos,
                sample.timestamp,
                self.seq,
            );
            return Recognized {
                events: smallvec![event],
                timer: None,
            };
        };
        contact.time = sample.timestamp;
        contact.pos = sample.pos;
        contact.released = true;
        if contact.pos.distance(contact.init_pos) > near {
            contact.strayed = true;
        }
        let contact = *contact;

        let mut events: SmallVec<[GestureEvent; 2]> =
            smallvec![self.event(GestureKind::Release, &contact)];
        if !contact.strayed && !contact.long_pressed {
            events.push(self.classify_tap(&contact));
        } else {
            // A non-tap contact breaks any pending double tap.
            self.last_tap = None;
        }

        Recognized {
            events,
            timer: None,
        }
    }

    fn classify_tap(&mut self, contact: &Contact) -> GestureEvent {
        let is_double = self.last_tap.is_some_and(|prev| {
            contact.time.saturating_sub(prev.time) <= self.config.double_tap_window()
                && contact.pos.distance(prev.pos) <= self.config.near_threshold
        });

        if is_double {
            self.last_tap = None;
            self.event(GestureKind::DoubleTap, contact)
        } else {
            self.last_tap = Some(TapMemo {
                time: contact.time,
                pos: contact.pos,
            });
            self.event(GestureKind::Tap, contact)
        }
    }

    /// Long-press timer callback. Emits at most one `LongPress` per contact
    /// and only for the contact the timer was armed for.
    pub fn fire_long_press(&mut self, seq: u64) -> Option<GestureEvent> {
        let long_press = self.config.long_press();
        let contact = match self.contact.as_mut() {
            Some(c) if c.seq == seq && !c.released && !c.strayed && !c.long_pressed => c,
            _ => {
                tracing::trace!(seq, current = self.seq, "stale long-press timer");
                return None;
            }
        };
        contact.long_pressed = true;
        let contact = *contact;

        let mut event = self.event(GestureKind::LongPress, &contact);
        event.time = contact.init_time + long_press;
        Some(event)
    }

    fn event(&self, kind: GestureKind, contact: &Contact) -> GestureEvent {
        GestureEvent::new(kind, contact.pos, contact.init_pos, contact.time, contact.seq)
    }
}

impl Default for GestureRecognizer {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}
