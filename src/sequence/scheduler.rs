// Plan construction
// Walks a word's units in declared order, resolving each to a decoded clip
// or a nominal duration, and lays the result out on the audio clock. Loads
// stay sequential on purpose: unit order, not load-completion order, decides
// the timeline.

use std::sync::Arc;

use crate::audio::decoder::DecodedSegment;
use crate::audio::trim::trim_silence;
use crate::catalog::SoundCatalog;
use crate::sequence::plan::{PlanMode, PlaybackPlan, Timing};
use crate::settings::EngineSettings;
use crate::store::ClipStore;
use crate::units::{UnitKind, Word};

struct PreparedUnit {
    unit_index: usize,
    sound_id: Option<String>,
    buffer: Option<Arc<DecodedSegment>>,
    /// Duration the marker dwells on the unit
    nominal: f64,
    /// How far the cursor advances before the next unit starts
    effective: f64,
}

/// Builds playback plans from words
pub struct SequenceScheduler {
    settings: EngineSettings,
}

impl SequenceScheduler {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    /// Build the timeline for one word.
    ///
    /// `clock_now` is the current audio-clock reading; the first start is
    /// anchored at `clock_now + lead_in` so the host has time to schedule
    /// the first clip before the clock reaches it.
    pub async fn build_plan(
        &self,
        word: &Word,
        mode: PlanMode,
        catalog: &SoundCatalog,
        clips: &mut ClipStore,
        clock_now: f64,
    ) -> PlaybackPlan {
        let timing = &self.settings.timing;
        let t0 = clock_now + timing.lead_in;

        let mut prepared: Vec<PreparedUnit> = Vec::with_capacity(word.units.len());

        for (unit_index, unit) in word.units.iter().enumerate() {
            if unit.silent {
                // Silent letters contribute no timing and no audio; they are
                // invisible to the animation as well
                continue;
            }

            if unit.kind == UnitKind::Separator {
                prepared.push(PreparedUnit {
                    unit_index,
                    sound_id: None,
                    buffer: None,
                    nominal: timing.separator_duration,
                    effective: timing.separator_duration,
                });
                continue;
            }

            let sound_id = catalog.resolve(unit).map(str::to_owned);
            let buffer = match &sound_id {
                Some(id) => clips.load(id).await,
                None => None,
            };

            let nominal = buffer
                .as_ref()
                .map(|b| b.duration())
                .unwrap_or(timing.fallback_unit_duration);
            let effective = (nominal - timing.overlap_epsilon).max(timing.min_effective_duration);

            prepared.push(PreparedUnit {
                unit_index,
                sound_id,
                buffer,
                nominal,
                effective,
            });
        }

        if prepared.is_empty() {
            tracing::debug!(word = %word.text, "no playable units, empty plan");
            return PlaybackPlan {
                start: t0,
                ..Default::default()
            };
        }

        let total_stitched: f64 = prepared.iter().map(|p| p.effective).sum();

        if mode == PlanMode::PreferCustom {
            if let Some(custom_id) = &word.custom_recording_id {
                if let Some(custom) = clips.load(custom_id).await {
                    // Custom recordings are raw microphone captures; library
                    // clips arrive pre-trimmed and are left alone
                    let custom = Arc::new(trim_silence(&custom, &self.settings.trim));
                    return self.custom_plan(&prepared, custom, total_stitched, t0);
                }
                tracing::debug!(
                    word = %word.text,
                    custom_id = %custom_id,
                    "custom recording unavailable, falling back to stitched"
                );
            }
        }

        self.stitched_plan(word, prepared, t0)
    }

    /// Whole-word path: one long buffer plays while every per-unit window is
    /// rescaled by the same factor, so the marker still sweeps the letters
    /// in their estimated proportions.
    fn custom_plan(
        &self,
        prepared: &[PreparedUnit],
        custom: Arc<DecodedSegment>,
        total_stitched: f64,
        t0: f64,
    ) -> PlaybackPlan {
        let ratio = custom.duration() / total_stitched;

        let mut timings = Vec::with_capacity(prepared.len());
        let mut sound_ids = Vec::with_capacity(prepared.len());
        let mut cursor = t0;
        for p in prepared {
            let duration = p.effective * ratio;
            timings.push(Timing {
                unit_index: p.unit_index,
                start: cursor,
                duration,
            });
            sound_ids.push(p.sound_id.clone());
            cursor += duration;
        }

        tracing::debug!(
            units = timings.len(),
            ratio,
            duration = custom.duration(),
            "built custom-recording plan"
        );

        let buffers = vec![None; timings.len()];
        PlaybackPlan {
            id: 0,
            start: t0,
            timings,
            buffers,
            sound_ids,
            custom: Some(custom),
        }
    }

    /// Stitched path: each clip starts when the previous scheduled window
    /// ends minus the crossfade overlap; reported durations stay true to
    /// the clip so the marker dwells for the real sound length.
    fn stitched_plan(&self, word: &Word, prepared: Vec<PreparedUnit>, t0: f64) -> PlaybackPlan {
        let mut timings = Vec::with_capacity(prepared.len());
        let mut buffers = Vec::with_capacity(prepared.len());
        let mut sound_ids = Vec::with_capacity(prepared.len());

        let mut cursor = t0;
        for p in prepared {
            timings.push(Timing {
                unit_index: p.unit_index,
                start: cursor,
                duration: p.nominal,
            });
            cursor += p.effective;
            buffers.push(p.buffer);
            sound_ids.push(p.sound_id);
        }

        tracing::debug!(
            word = %word.text,
            units = timings.len(),
            total = cursor - t0,
            "built stitched plan"
        );

        PlaybackPlan {
            id: 0,
            start: t0,
            timings,
            buffers,
            sound_ids,
            custom: None,
        }
    }
}
