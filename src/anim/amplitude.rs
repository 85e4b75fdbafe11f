// Amplitude-driven fallback lip sync
// While no buffer-backed viseme is active the avatar still needs a mouth:
// this estimates a smoothed 0..1 loudness level from the live output, and
// fakes a plausible one when the output is confirmed silent (platform TTS
// exposes no waveform).

use rand::Rng;

use crate::audio::output::TapConsumer;
use ringbuf::traits::Consumer;

/// Rolling RMS window, ~46ms of mono output at 44.1kHz
const WINDOW_SAMPLES: usize = 2048;
/// Maps typical speech RMS (~0.25) to a fully open mouth
const RMS_GAIN: f32 = 4.0;
/// Per-call smoothing toward the target level
const SMOOTHING: f32 = 0.35;
/// Mouth flaps per second for the synthetic waveform
const SYNTH_RATE_HZ: f32 = 6.0;
/// Below this RMS the output counts as silent
const SILENCE_RMS: f32 = 1e-3;

/// Smoothed loudness estimator over the engine's live output
pub struct AmplitudeAnalyzer {
    tap: Option<TapConsumer>,
    window: Vec<f32>,
    write_pos: usize,
    filled: usize,
    level: f32,
    synthetic: bool,
    phase: f32,
    observers: Vec<Box<dyn FnMut(f32) + Send>>,
}

impl AmplitudeAnalyzer {
    /// `tap` is the consumer end of the output tap
    /// (`CpalHost::take_amplitude_tap`); hosts without one can feed samples
    /// through `ingest`.
    pub fn new(tap: Option<TapConsumer>) -> Self {
        Self {
            tap,
            window: vec![0.0; WINDOW_SAMPLES],
            write_pos: 0,
            filled: 0,
            level: 0.0,
            synthetic: false,
            phase: 0.0,
            observers: Vec::new(),
        }
    }

    /// Enable the synthetic pseudo-periodic waveform used while the true
    /// output is known to be silent or inaccessible (speech fallback active)
    pub fn set_synthetic(&mut self, on: bool) {
        self.synthetic = on;
    }

    /// Register an observer notified with the level on every `sample` call
    pub fn add_observer(&mut self, observer: impl FnMut(f32) + Send + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Push output samples into the rolling window
    pub fn ingest(&mut self, samples: &[f32]) {
        for &s in samples {
            self.window[self.write_pos] = s;
            self.write_pos = (self.write_pos + 1) % self.window.len();
            self.filled = (self.filled + 1).min(self.window.len());
        }
    }

    /// Advance the estimate by one animation frame (`dt` seconds) and
    /// return the smoothed 0..1 level
    pub fn sample(&mut self, dt: f32) -> f32 {
        if let Some(tap) = self.tap.as_mut() {
            let mut drained = Vec::new();
            while let Some(s) = tap.try_pop() {
                drained.push(s);
            }
            if !drained.is_empty() {
                self.ingest(&drained);
            }
        }

        let rms = self.rms();
        let target = if self.synthetic && rms < SILENCE_RMS {
            self.synthetic_target(dt)
        } else {
            (rms * RMS_GAIN).clamp(0.0, 1.0)
        };

        self.level += (target - self.level) * SMOOTHING;
        let level = self.level;
        for observer in &mut self.observers {
            observer(level);
        }
        level
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    fn rms(&self) -> f32 {
        if self.filled == 0 {
            return 0.0;
        }
        let sum: f32 = self.window[..self.filled].iter().map(|s| s * s).sum();
        (sum / self.filled as f32).sqrt()
    }

    /// Sine plus a little jitter: regular enough to read as speech, uneven
    /// enough not to look mechanical
    fn synthetic_target(&mut self, dt: f32) -> f32 {
        self.phase += dt * SYNTH_RATE_HZ * std::f32::consts::TAU;
        if self.phase > std::f32::consts::TAU {
            self.phase -= std::f32::consts::TAU;
        }
        let jitter: f32 = rand::thread_rng().gen_range(-0.08..0.08);
        (0.5 + 0.4 * self.phase.sin() + jitter).clamp(0.0, 1.0)
    }
}
