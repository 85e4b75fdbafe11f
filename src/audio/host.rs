// Audio host capability
// The engine only needs a monotonic audio clock and a schedule-at-time
// primitive; anything providing those can host playback. Production uses
// the cpal-backed host, tests drive a manually advanced clock.

use parking_lot::Mutex;
use std::sync::Arc;

use crate::audio::decoder::DecodedSegment;
use crate::error::EngineError;

/// Opaque handle to one scheduled source
pub type SourceId = u64;

/// Monotonic clock plus schedule-at-future-time, the only audio capability
/// the engine depends on.
pub trait AudioHost: Send + Sync {
    /// Current audio-clock time in seconds. Monotonic, shared by the
    /// scheduler and the animation driver; unrelated to wall-clock time.
    fn now(&self) -> f64;

    fn output_rate(&self) -> u32;

    fn output_channels(&self) -> usize;

    /// Schedule a clip to start playing at an absolute clock time.
    /// The caller guarantees `start >= now()`.
    fn schedule(&self, segment: Arc<DecodedSegment>, start: f64) -> Result<SourceId, EngineError>;

    /// Force-stop one source. Already-finished sources are a no-op.
    fn stop(&self, id: SourceId);

    /// Whether a source has finished (or was stopped)
    fn is_finished(&self, id: SourceId) -> bool;

    fn set_volume(&self, volume: f32);

    fn volume(&self) -> f32;

    /// Freeze the audio clock and silence the output. The animation, a pure
    /// function of the clock, freezes with it.
    fn pause(&self);

    fn resume(&self);
}

/// Record of one `schedule` call on the manual host
#[derive(Debug, Clone)]
pub struct ScheduledCall {
    pub id: SourceId,
    pub start: f64,
    pub duration: f64,
}

#[derive(Default)]
struct ManualState {
    now: f64,
    scheduled: Vec<ScheduledCall>,
    stopped: Vec<SourceId>,
    next_id: SourceId,
    volume: f32,
    paused: bool,
}

/// Hand-advanced host for tests and headless use: records every schedule
/// and stop call and derives "finished" purely from the clock.
pub struct ManualHost {
    state: Mutex<ManualState>,
    rate: u32,
    channels: usize,
}

impl ManualHost {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ManualState {
                volume: 1.0,
                ..Default::default()
            }),
            rate: 44100,
            channels: 1,
        }
    }

    /// Advance the audio clock by `dt` seconds (unless paused)
    pub fn advance(&self, dt: f64) {
        let mut state = self.state.lock();
        if !state.paused {
            state.now += dt;
        }
    }

    pub fn scheduled(&self) -> Vec<ScheduledCall> {
        self.state.lock().scheduled.clone()
    }

    pub fn stopped(&self) -> Vec<SourceId> {
        self.state.lock().stopped.clone()
    }
}

impl Default for ManualHost {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioHost for ManualHost {
    fn now(&self) -> f64 {
        self.state.lock().now
    }

    fn output_rate(&self) -> u32 {
        self.rate
    }

    fn output_channels(&self) -> usize {
        self.channels
    }

    fn schedule(&self, segment: Arc<DecodedSegment>, start: f64) -> Result<SourceId, EngineError> {
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = state.next_id;
        state.scheduled.push(ScheduledCall {
            id,
            start,
            duration: segment.duration(),
        });
        Ok(id)
    }

    fn stop(&self, id: SourceId) {
        let mut state = self.state.lock();
        if !state.stopped.contains(&id) {
            state.stopped.push(id);
        }
    }

    fn is_finished(&self, id: SourceId) -> bool {
        let state = self.state.lock();
        if state.stopped.contains(&id) {
            return true;
        }
        match state.scheduled.iter().find(|c| c.id == id) {
            Some(call) => state.now >= call.start + call.duration,
            None => true,
        }
    }

    fn set_volume(&self, volume: f32) {
        self.state.lock().volume = volume.clamp(0.0, 1.0);
    }

    fn volume(&self) -> f32 {
        self.state.lock().volume
    }

    fn pause(&self) {
        self.state.lock().paused = true;
    }

    fn resume(&self) {
        self.state.lock().paused = false;
    }
}
