// Animation driver
// Called once per display refresh. Everything it reports is a pure function
// of the audio clock and the already-built plan; it owns no timers, so any
// frame rate (or a paused clock) renders correctly.

use crate::anim::viseme::VisemeConfig;
use crate::sequence::plan::PlaybackPlan;
use crate::settings::AnimationSettings;

/// Horizontal extent of one unit on screen, in whatever coordinate space the
/// renderer uses. Layout is the caller's concern.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitSpan {
    pub x0: f32,
    pub x1: f32,
}

impl UnitSpan {
    pub fn lerp(&self, p: f32) -> f32 {
        self.x0 + (self.x1 - self.x0) * p
    }
}

/// Per-unit marker spans for one rendered word
#[derive(Debug, Clone)]
pub struct WordLayout {
    spans: Vec<UnitSpan>,
}

impl WordLayout {
    pub fn new(spans: Vec<UnitSpan>) -> Self {
        Self { spans }
    }

    /// Evenly spaced spans across `0..width`, for hosts without real glyph
    /// metrics
    pub fn uniform(count: usize, width: f32) -> Self {
        let step = if count == 0 { 0.0 } else { width / count as f32 };
        let spans = (0..count)
            .map(|i| UnitSpan {
                x0: step * i as f32,
                x1: step * (i + 1) as f32,
            })
            .collect();
        Self { spans }
    }

    pub fn span_for(&self, unit_index: usize) -> UnitSpan {
        self.spans
            .get(unit_index)
            .copied()
            .unwrap_or(UnitSpan { x0: 0.0, x1: 0.0 })
    }

    /// Full extent from the first unit to the last
    pub fn word_span(&self) -> UnitSpan {
        match (self.spans.first(), self.spans.last()) {
            (Some(first), Some(last)) => UnitSpan {
                x0: first.x0,
                x1: last.x1,
            },
            _ => UnitSpan { x0: 0.0, x1: 0.0 },
        }
    }
}

/// What the renderer needs for one frame
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationFrame {
    pub active_unit_index: Option<usize>,
    pub marker_x: f32,
    pub marker_y: f32,
    pub viseme_index: Option<usize>,
    /// Global progress through the plan, 0..1, never decreasing for
    /// increasing clock readings
    pub elapsed_fraction: f32,
    /// True on exactly one frame: the first tick past the end of the plan.
    /// This is the cue for "sequence finished" follow-ups.
    pub just_completed: bool,
}

/// Clock-driven marker and mouth-shape computation
pub struct AnimationDriver {
    viseme_config: VisemeConfig,
    bounce_amplitude: f32,
    last_plan_id: u64,
    completion_reported: bool,
}

impl AnimationDriver {
    pub fn new(viseme_config: VisemeConfig, settings: &AnimationSettings) -> Self {
        Self {
            viseme_config,
            bounce_amplitude: settings.bounce_amplitude,
            last_plan_id: 0,
            completion_reported: false,
        }
    }

    pub fn set_viseme_config(&mut self, config: VisemeConfig) {
        self.viseme_config = config;
    }

    /// Compute the frame for the given audio-clock reading
    pub fn tick(&mut self, plan: &PlaybackPlan, layout: &WordLayout, now: f64) -> AnimationFrame {
        if plan.id != self.last_plan_id {
            self.last_plan_id = plan.id;
            self.completion_reported = false;
        }

        let word_span = layout.word_span();

        if plan.is_empty() || now >= plan.end_time() {
            let just_completed = !self.completion_reported;
            self.completion_reported = true;
            return AnimationFrame {
                active_unit_index: None,
                marker_x: word_span.x1,
                marker_y: 0.0,
                viseme_index: None,
                elapsed_fraction: 1.0,
                just_completed,
            };
        }

        if now < plan.start {
            return AnimationFrame {
                active_unit_index: None,
                marker_x: word_span.x0,
                marker_y: 0.0,
                viseme_index: None,
                elapsed_fraction: 0.0,
                just_completed: false,
            };
        }

        let total = plan.total_duration();
        let fraction = if total > 0.0 {
            (((now - plan.start) / total).clamp(0.0, 1.0)) as f32
        } else {
            1.0
        };

        if let Some(index) = plan.timing_containing(now) {
            let timing = &plan.timings[index];
            let p = (((now - timing.start) / timing.duration).clamp(0.0, 1.0)) as f32;
            let span = layout.span_for(timing.unit_index);

            let viseme_index = plan.sound_ids[index]
                .as_deref()
                .and_then(|id| self.viseme_config.index_for(id));

            AnimationFrame {
                active_unit_index: Some(timing.unit_index),
                marker_x: span.lerp(p),
                marker_y: (p * std::f32::consts::PI).sin() * self.bounce_amplitude,
                viseme_index,
                elapsed_fraction: fraction,
                just_completed: false,
            }
        } else {
            // Between two windows: sweep the whole word by global progress
            // so the marker never teleports or freezes
            AnimationFrame {
                active_unit_index: None,
                marker_x: word_span.lerp(fraction),
                marker_y: 0.0,
                viseme_index: None,
                elapsed_fraction: fraction,
                just_completed: false,
            }
        }
    }
}
