// Playback engine
// One logical timeline per active word: builds the plan, schedules every
// buffer on the audio host, tracks live sources for bulk stop, and resolves
// the play future once the shared clock passes the end of the plan.

use parking_lot::Mutex;
use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::anim::driver::{AnimationDriver, AnimationFrame, WordLayout};
use crate::anim::viseme::VisemeConfig;
use crate::audio::decoder::DecodedSegment;
use crate::audio::host::{AudioHost, SourceId};
use crate::catalog::SoundCatalog;
use crate::error::EngineError;
use crate::sequence::plan::{PlanMode, PlaybackPlan};
use crate::sequence::scheduler::SequenceScheduler;
use crate::settings::EngineSettings;
use crate::speech::SpeechSynthesizer;
use crate::store::{BlobStore, ClipStore};
use crate::units::{UnitKind, Word};

/// Completion poll interval; coarse is fine, the audio clock is the truth
const POLL_INTERVAL: Duration = Duration::from_millis(15);

/// Lifecycle of the active playback request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Idle,
    Scheduled,
    Playing,
    Completed,
    Stopped,
}

/// How a `play_sequence` call ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    /// The clock ran past the end of the plan
    Completed,
    /// `stop_all` (or a newer sequence) cancelled it
    Stopped,
}

struct CurrentSequence {
    plan: Arc<PlaybackPlan>,
    /// Timing indices already checked for the speech fallback
    dispatched: HashSet<usize>,
}

/// The caller-facing playback and animation engine
pub struct PlaybackEngine {
    host: Arc<dyn AudioHost>,
    store: Arc<dyn BlobStore>,
    speech: Arc<dyn SpeechSynthesizer>,
    catalog: SoundCatalog,
    settings: EngineSettings,
    scheduler: SequenceScheduler,
    /// The only mutable shared resource: every scheduled-but-unfinished
    /// source handle, mutated here and read only for bulk stop
    active: Mutex<Vec<SourceId>>,
    /// Bumped by every new sequence and every stop; in-flight work holding
    /// a stale generation must discard itself
    generation: AtomicU64,
    current: Mutex<Option<CurrentSequence>>,
    driver: Mutex<AnimationDriver>,
    state: Mutex<PlaybackState>,
}

impl PlaybackEngine {
    pub fn new(
        host: Arc<dyn AudioHost>,
        store: Arc<dyn BlobStore>,
        speech: Arc<dyn SpeechSynthesizer>,
        catalog: SoundCatalog,
        settings: EngineSettings,
    ) -> Self {
        let viseme_config = VisemeConfig::with_defaults(&catalog);
        let driver = AnimationDriver::new(viseme_config, &settings.animation);
        let scheduler = SequenceScheduler::new(settings.clone());
        Self {
            host,
            store,
            speech,
            catalog,
            settings,
            scheduler,
            active: Mutex::new(Vec::new()),
            generation: AtomicU64::new(0),
            current: Mutex::new(None),
            driver: Mutex::new(driver),
            state: Mutex::new(PlaybackState::Idle),
        }
    }

    pub fn set_viseme_config(&self, config: VisemeConfig) {
        self.driver.lock().set_viseme_config(config);
    }

    pub fn state(&self) -> PlaybackState {
        *self.state.lock()
    }

    /// Number of scheduled-but-unfinished sources (the ActiveSourceSet)
    pub fn active_source_count(&self) -> usize {
        self.active.lock().len()
    }

    /// The plan currently driving the animation, if any
    pub fn current_plan(&self) -> Option<Arc<PlaybackPlan>> {
        self.current.lock().as_ref().map(|seq| seq.plan.clone())
    }

    pub fn set_volume(&self, volume: f32) {
        self.host.set_volume(volume);
    }

    pub fn volume(&self) -> f32 {
        self.host.volume()
    }

    /// Freeze the audio clock; the animation freezes with it
    pub fn pause(&self) {
        self.host.pause();
    }

    pub fn resume(&self) {
        self.host.resume();
    }

    /// Play one word and resolve on natural completion.
    ///
    /// A sequence already in flight is stopped first; overlapping sequences
    /// are disallowed by design. The returned outcome says whether the
    /// timeline ran to its end or was cancelled.
    pub async fn play_sequence(
        &self,
        word: &Word,
        mode: PlanMode,
    ) -> Result<PlaybackOutcome, EngineError> {
        self.stop_all();
        let my_gen = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let mut clips = ClipStore::new(self.store.clone());
        let mut plan = self
            .scheduler
            .build_plan(word, mode, &self.catalog, &mut clips, self.host.now())
            .await;
        plan.id = my_gen;

        // A stop_all that landed while buffers were loading invalidates the
        // plan: late-resolving loads must never be scheduled. The check runs
        // under the current-sequence lock so a racing stop either sees this
        // sequence published (and clears it) or kills it right here.
        let plan = Arc::new(plan);
        {
            let mut current = self.current.lock();
            if self.generation.load(Ordering::SeqCst) != my_gen {
                tracing::debug!(word = %word.text, "sequence cancelled during plan build");
                return Ok(PlaybackOutcome::Stopped);
            }
            *current = Some(CurrentSequence {
                plan: plan.clone(),
                dispatched: HashSet::new(),
            });
        }

        if plan.is_empty() {
            *self.state.lock() = PlaybackState::Completed;
            return Ok(PlaybackOutcome::Completed);
        }

        *self.state.lock() = PlaybackState::Scheduled;
        if !self.schedule_plan(&plan, my_gen) {
            return Ok(PlaybackOutcome::Stopped);
        }

        loop {
            tokio::time::sleep(POLL_INTERVAL).await;

            if self.generation.load(Ordering::SeqCst) != my_gen {
                return Ok(PlaybackOutcome::Stopped);
            }

            let now = self.host.now();
            self.prune_finished();
            self.speak_due_units(word, &plan, now);

            {
                let mut state = self.state.lock();
                if *state == PlaybackState::Scheduled && now >= plan.start {
                    *state = PlaybackState::Playing;
                }
            }

            if now >= plan.end_time() {
                break;
            }
        }

        self.prune_finished();
        *self.state.lock() = PlaybackState::Completed;
        tracing::debug!(word = %word.text, "sequence completed");
        Ok(PlaybackOutcome::Completed)
    }

    /// Stop every live source, cancel queued speech, and invalidate any
    /// in-flight plan. Safe from any state, including mid-load.
    pub fn stop_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);

        let ids: Vec<SourceId> = self.active.lock().drain(..).collect();
        for id in &ids {
            // Already-finished handles are a no-op on the host side
            self.host.stop(*id);
        }
        self.speech.cancel_all();

        let had_sequence = self.current.lock().take().is_some();
        if had_sequence {
            *self.state.lock() = PlaybackState::Stopped;
            tracing::debug!(stopped = ids.len(), "stopped active sequence");
        }
    }

    /// Compute the animation frame for the current clock reading.
    /// `None` when no sequence is active.
    pub fn tick(&self, layout: &WordLayout) -> Option<AnimationFrame> {
        let plan = self.current_plan()?;
        let now = self.host.now();
        Some(self.driver.lock().tick(&plan, layout, now))
    }

    /// Schedule every buffer in the plan. Runs under the ActiveSourceSet
    /// lock with a generation re-check, so a stop_all either prevents the
    /// whole batch or lands after it and drains every id it pushed.
    /// Returns false when the sequence lost to a racing stop.
    fn schedule_plan(&self, plan: &PlaybackPlan, my_gen: u64) -> bool {
        let mut active = self.active.lock();
        if self.generation.load(Ordering::SeqCst) != my_gen {
            return false;
        }

        let mut scheduled = 0usize;

        if let Some(custom) = &plan.custom {
            self.schedule_one(custom.clone(), plan.start, &mut active, &mut scheduled);
        }

        for (timing, buffer) in plan.timings.iter().zip(&plan.buffers) {
            if let Some(buffer) = buffer {
                self.schedule_one(buffer.clone(), timing.start, &mut active, &mut scheduled);
            }
        }

        tracing::debug!(scheduled, total = plan.timings.len(), "plan scheduled");
        true
    }

    fn schedule_one(
        &self,
        buffer: Arc<DecodedSegment>,
        start: f64,
        active: &mut Vec<SourceId>,
        scheduled: &mut usize,
    ) {
        // Never schedule in the past: a start the clock already passed is
        // clamped to now, not dropped
        let now = self.host.now();
        let at = if start < now {
            tracing::debug!(start, now, "start time already passed, clamping");
            now
        } else {
            start
        };

        match self.host.schedule(buffer, at) {
            Ok(id) => {
                active.push(id);
                *scheduled += 1;
            }
            Err(e) => {
                // Degrades to a silent unit; the timeline itself stays valid
                tracing::warn!("failed to schedule buffer: {}", e);
            }
        }
    }

    fn prune_finished(&self) {
        self.active.lock().retain(|&id| !self.host.is_finished(id));
    }

    /// Fire the speech fallback for units whose window has opened and which
    /// have no recording. Skipped entirely when a custom whole-word
    /// recording is playing.
    fn speak_due_units(&self, word: &Word, plan: &PlaybackPlan, now: f64) {
        if plan.custom.is_some() {
            return;
        }

        let mut due: Vec<String> = Vec::new();
        {
            let mut current = self.current.lock();
            let seq = match current.as_mut() {
                Some(seq) if seq.plan.id == plan.id => seq,
                _ => return,
            };

            for (index, timing) in plan.timings.iter().enumerate() {
                if now < timing.start || seq.dispatched.contains(&index) {
                    continue;
                }
                seq.dispatched.insert(index);
                if plan.buffers[index].is_some() {
                    continue;
                }
                let unit = &word.units[timing.unit_index];
                if unit.kind != UnitKind::Separator {
                    due.push(unit.text.clone());
                }
            }
        }

        for text in due {
            tracing::debug!(text = %text, "unit has no recording, using speech fallback");
            self.speech
                .speak(&text, self.settings.speech.rate, self.settings.speech.pitch);
        }
    }
}
