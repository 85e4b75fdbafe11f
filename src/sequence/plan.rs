// Playback plan: the precomputed timeline for one playback request
// All start times are absolute audio-clock seconds.

use std::sync::Arc;

use crate::audio::decoder::DecodedSegment;

/// Which audio path a plan should prefer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    /// Concatenate per-unit clips with a slight overlap
    Stitched,
    /// Use the word's custom whole-word recording when it exists,
    /// falling back to stitched when it doesn't
    PreferCustom,
}

/// Timing window for one unit on the audio clock
#[derive(Debug, Clone, PartialEq)]
pub struct Timing {
    pub unit_index: usize,
    /// Absolute audio-clock start, seconds
    pub start: f64,
    /// How long the marker dwells on the unit. On the stitched path this is
    /// the clip's true length; the crossfade overlap only moves the next
    /// start, it never shortens the reported dwell.
    pub duration: f64,
}

impl Timing {
    pub fn end(&self) -> f64 {
        self.start + self.duration
    }

    pub fn contains(&self, t: f64) -> bool {
        t >= self.start && t < self.end()
    }
}

/// The full schedule for one playback request. Buffers live only as long as
/// the request; nothing here is cached across words.
#[derive(Debug, Clone, Default)]
pub struct PlaybackPlan {
    /// Generation the plan was built for; stale plans are never scheduled
    pub id: u64,
    /// Anchor time: audio clock at build plus the scheduling lead-in
    pub start: f64,
    pub timings: Vec<Timing>,
    /// Per-timing stitched buffer, `None` for separators and fallback units
    pub buffers: Vec<Option<Arc<DecodedSegment>>>,
    /// Per-timing resolved sound id (present even when the bytes were
    /// missing, so viseme lookup still works)
    pub sound_ids: Vec<Option<String>>,
    /// Whole-word custom recording played in parallel with the timeline
    pub custom: Option<Arc<DecodedSegment>>,
}

impl PlaybackPlan {
    pub fn is_empty(&self) -> bool {
        self.timings.is_empty() && self.custom.is_none()
    }

    /// Absolute clock time at which the plan is over
    pub fn end_time(&self) -> f64 {
        self.timings
            .last()
            .map(|t| t.end())
            .unwrap_or(self.start)
    }

    pub fn total_duration(&self) -> f64 {
        self.end_time() - self.start
    }

    /// Index of the timing whose window contains `t`, if any
    pub fn timing_containing(&self, t: f64) -> Option<usize> {
        self.timings.iter().position(|w| w.contains(t))
    }
}
