// End-to-end playback tests against the manually clocked host.
// The real audio device never runs here; the engine only ever sees the
// injected clock and schedule calls, which is the point of the capability
// seam.

use async_trait::async_trait;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use phonosync::{
    BlobStore, CatalogEntry, EngineSettings, ManualHost, MemoryStore, PlanMode, PlaybackEngine,
    PlaybackOutcome, PlaybackState, SoundCatalog, SoundUnit, SpeechSynthesizer, VowelLength, Word,
    WordLayout,
};

fn tone_wav(duration_secs: f64) -> Vec<u8> {
    let rate = 44100u32;
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        let frames = (duration_secs * rate as f64).round() as usize;
        for i in 0..frames {
            let v = (i as f32 * 2.0 * std::f32::consts::PI * 220.0 / rate as f32).sin() * 0.6;
            writer.write_sample((v * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}

fn katt() -> Word {
    Word::new(
        "katt",
        vec![
            SoundUnit::consonant("k"),
            SoundUnit::vowel("a").with_length(VowelLength::Short),
            SoundUnit::consonant("tt"),
        ],
    )
}

fn catalog() -> SoundCatalog {
    // "k" is deliberately missing: it exercises the speech fallback
    SoundCatalog::new(vec![
        CatalogEntry::new("a-short", "a").with_length(VowelLength::Short),
        CatalogEntry::new("t", "t"),
    ])
}

fn library() -> Arc<MemoryStore> {
    let store = Arc::new(MemoryStore::new());
    store.insert("a-short", tone_wav(0.25));
    store.insert("t", tone_wav(0.40));
    store
}

#[derive(Default)]
struct RecordingSpeech {
    spoken: Mutex<Vec<String>>,
    cancels: AtomicUsize,
}

impl SpeechSynthesizer for RecordingSpeech {
    fn speak(&self, text: &str, _rate: f32, _pitch: f32) {
        self.spoken.lock().push(text.to_string());
    }

    fn cancel_all(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

/// Store whose loads block until the test releases them
struct GatedStore {
    inner: Arc<MemoryStore>,
    gate: tokio::sync::Semaphore,
}

#[async_trait]
impl BlobStore for GatedStore {
    async fn get(&self, id: &str) -> Option<Vec<u8>> {
        let _permit = self.gate.acquire().await.unwrap();
        self.inner.get(id).await
    }
}

/// Store that advances the host clock while loading, forcing the computed
/// start times into the past by the time scheduling runs
struct ClockSkewStore {
    inner: Arc<MemoryStore>,
    host: Arc<ManualHost>,
    skew: f64,
}

#[async_trait]
impl BlobStore for ClockSkewStore {
    async fn get(&self, id: &str) -> Option<Vec<u8>> {
        self.host.advance(self.skew);
        self.inner.get(id).await
    }
}

struct Fixture {
    host: Arc<ManualHost>,
    speech: Arc<RecordingSpeech>,
    engine: Arc<PlaybackEngine>,
}

fn fixture_with_store(store: Arc<dyn BlobStore>, host: Arc<ManualHost>) -> Fixture {
    // RUST_LOG=phonosync=debug makes failing runs readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();

    let speech = Arc::new(RecordingSpeech::default());
    let engine = Arc::new(PlaybackEngine::new(
        host.clone(),
        store,
        speech.clone(),
        catalog(),
        EngineSettings::default(),
    ));
    Fixture {
        host,
        speech,
        engine,
    }
}

fn fixture() -> Fixture {
    fixture_with_store(library(), Arc::new(ManualHost::new()))
}

/// Wait until the engine has built and published its plan, without touching
/// the clock; keeps start-time assertions free of clamping races
async fn wait_for_plan(fx: &Fixture) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while fx.engine.current_plan().is_none() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("plan was never built");
}

/// Drive the manual clock until the play future resolves
async fn run_to_end(
    fx: &Fixture,
    handle: tokio::task::JoinHandle<PlaybackOutcome>,
) -> PlaybackOutcome {
    tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            fx.host.advance(0.05);
            tokio::time::sleep(Duration::from_millis(3)).await;
            if handle.is_finished() {
                break;
            }
        }
        handle.await.unwrap()
    })
    .await
    .expect("playback did not resolve in time")
}

#[tokio::test(flavor = "multi_thread")]
async fn stitched_sequence_plays_to_completion() {
    let fx = fixture();

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    let outcome = run_to_end(&fx, handle).await;
    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert_eq!(fx.engine.state(), PlaybackState::Completed);

    // Two units had recordings; the third went through speech
    let scheduled = fx.host.scheduled();
    assert_eq!(scheduled.len(), 2);
    assert_eq!(fx.speech.spoken.lock().as_slice(), ["k"]);

    // Natural completion drains the ActiveSourceSet
    assert_eq!(fx.engine.active_source_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn stitched_schedule_matches_the_plan() {
    let fx = fixture();

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });
    wait_for_plan(&fx).await;
    run_to_end(&fx, handle).await;

    let plan = fx.engine.current_plan().expect("plan kept for animation");
    let scheduled = fx.host.scheduled();

    // The two real buffers start at their plan times: a at 0.38, tt at 0.61
    assert!((scheduled[0].start - plan.timings[1].start).abs() < 1e-6);
    assert!((scheduled[1].start - plan.timings[2].start).abs() < 1e-6);
    assert!((scheduled[0].duration - 0.25).abs() < 1e-6);
    assert!((scheduled[1].duration - 0.40).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn custom_recording_schedules_one_parallel_buffer() {
    let store = library();
    store.insert("katt-custom", tone_wav(1.20));
    let fx = fixture_with_store(store, Arc::new(ManualHost::new()));

    let word = katt().with_custom_recording("katt-custom");
    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&word, PlanMode::PreferCustom)
            .await
            .unwrap()
    });

    let outcome = run_to_end(&fx, handle).await;
    assert_eq!(outcome, PlaybackOutcome::Completed);

    // Only the whole-word buffer is scheduled; no per-unit clips, no speech
    let scheduled = fx.host.scheduled();
    assert_eq!(scheduled.len(), 1);
    assert!((scheduled[0].duration - 1.20).abs() < 1e-4);
    assert!(fx.speech.spoken.lock().is_empty());

    let plan = fx.engine.current_plan().unwrap();
    let sum: f64 = plan.timings.iter().map(|t| t.duration).sum();
    assert!((sum - 1.20).abs() < 1e-4);
}

#[tokio::test(flavor = "multi_thread")]
async fn stop_all_mid_sequence_halts_everything() {
    let fx = fixture();

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    // Let it get into the middle of the word
    wait_for_plan(&fx).await;
    for _ in 0..10 {
        fx.host.advance(0.05);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    fx.engine.stop_all();
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome, PlaybackOutcome::Stopped);
    assert_eq!(fx.engine.state(), PlaybackState::Stopped);
    assert_eq!(fx.engine.active_source_count(), 0);
    assert!(!fx.host.stopped().is_empty(), "no source was force-stopped");
    assert!(fx.speech.cancels.load(Ordering::SeqCst) >= 1);

    // No sequence left: ticks report nothing active
    assert!(fx.engine.tick(&WordLayout::uniform(3, 100.0)).is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn loads_resolving_after_stop_are_never_scheduled() {
    let host = Arc::new(ManualHost::new());
    let gated = Arc::new(GatedStore {
        inner: library(),
        gate: tokio::sync::Semaphore::new(0),
    });
    let fx = fixture_with_store(gated.clone(), host);

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    // Plan construction is now parked on the first load
    tokio::time::sleep(Duration::from_millis(30)).await;
    fx.engine.stop_all();

    // Release the loads after the stop: the finished plan must be discarded
    gated.gate.add_permits(100);
    let outcome = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();

    assert_eq!(outcome, PlaybackOutcome::Stopped);
    assert!(fx.host.scheduled().is_empty(), "late load was scheduled");
    assert_eq!(fx.engine.active_source_count(), 0);
}

#[tokio::test(flavor = "multi_thread")]
async fn past_start_times_are_clamped_to_now() {
    let host = Arc::new(ManualHost::new());
    let skewed = Arc::new(ClockSkewStore {
        inner: library(),
        host: host.clone(),
        skew: 1.0,
    });
    let fx = fixture_with_store(skewed, host);

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    let outcome = run_to_end(&fx, handle).await;
    assert_eq!(outcome, PlaybackOutcome::Completed);

    // The plan was anchored before the loads advanced the clock by 2s, so
    // every planned start was stale at schedule time. Each buffer must have
    // been corrected forward past the whole planned timeline, not dropped.
    let plan = fx.engine.current_plan().unwrap();
    let last_planned = plan
        .timings
        .iter()
        .map(|t| t.start)
        .fold(f64::NEG_INFINITY, f64::max);
    let scheduled = fx.host.scheduled();
    assert_eq!(scheduled.len(), 2);
    for call in &scheduled {
        assert!(
            call.start > last_planned,
            "start {} was not clamped past {}",
            call.start,
            last_planned
        );
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn replaying_stops_the_previous_sequence_first() {
    let fx = fixture();

    let engine = fx.engine.clone();
    let first = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    for _ in 0..5 {
        fx.host.advance(0.05);
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let engine = fx.engine.clone();
    let second = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    let first_outcome = tokio::time::timeout(Duration::from_secs(5), first)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first_outcome, PlaybackOutcome::Stopped);

    let second_outcome = run_to_end(&fx, second).await;
    assert_eq!(second_outcome, PlaybackOutcome::Completed);
}

#[tokio::test(flavor = "multi_thread")]
async fn animation_frames_track_the_clock() {
    let fx = fixture();

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&katt(), PlanMode::Stitched)
            .await
            .unwrap()
    });

    let layout = WordLayout::uniform(3, 300.0);
    let mut last_fraction = -1.0f32;
    let mut saw_active = false;

    let outcome = tokio::time::timeout(Duration::from_secs(20), async {
        loop {
            fx.host.advance(0.03);
            tokio::time::sleep(Duration::from_millis(3)).await;

            if let Some(frame) = fx.engine.tick(&layout) {
                assert!(
                    frame.elapsed_fraction >= last_fraction,
                    "fraction went backwards"
                );
                last_fraction = frame.elapsed_fraction;
                if frame.active_unit_index.is_some() {
                    saw_active = true;
                }
            }
            if handle.is_finished() {
                break;
            }
        }
        handle.await.unwrap()
    })
    .await
    .expect("playback did not resolve in time");

    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(saw_active, "marker never entered a unit window");

    // Past the end the driver reports completion with fraction pinned at 1
    let frame = fx.engine.tick(&layout).unwrap();
    assert_eq!(frame.active_unit_index, None);
    assert!((frame.elapsed_fraction - 1.0).abs() < 1e-6);
}

#[tokio::test(flavor = "multi_thread")]
async fn separator_only_word_schedules_nothing() {
    let fx = fixture();
    let word = Word::new(
        "--",
        vec![SoundUnit::separator(), SoundUnit::separator()],
    );

    let engine = fx.engine.clone();
    let handle = tokio::spawn(async move {
        engine
            .play_sequence(&word, PlanMode::Stitched)
            .await
            .unwrap()
    });

    let outcome = run_to_end(&fx, handle).await;
    assert_eq!(outcome, PlaybackOutcome::Completed);
    assert!(fx.host.scheduled().is_empty());
    assert!(fx.speech.spoken.lock().is_empty());

    let plan = fx.engine.current_plan().unwrap();
    assert!((plan.total_duration() - 0.8).abs() < 1e-9);
}
