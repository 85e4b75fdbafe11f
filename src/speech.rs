// Synthesized-speech fallback seam
// The real engine (platform TTS) lives outside this crate; units that
// resolve to no recording are spoken through this interface instead.

/// Fire-and-forget speech synthesis, cancelable as a unit
pub trait SpeechSynthesizer: Send + Sync {
    fn speak(&self, text: &str, rate: f32, pitch: f32);

    /// Cancel every pending or in-progress utterance
    fn cancel_all(&self);
}

/// No-op synthesizer for tests and headless hosts
pub struct NullSpeech;

impl SpeechSynthesizer for NullSpeech {
    fn speak(&self, text: &str, rate: f32, pitch: f32) {
        tracing::trace!(text, rate, pitch, "speech fallback (null)");
    }

    fn cancel_all(&self) {}
}
