// Engine error type
// Per-unit resolution/fetch/decode misses are Option-shaped degradations and
// never surface here; these variants cover infrastructure failures only.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no audio output device available")]
    NoOutputDevice,

    #[error("unsupported output sample format: {0}")]
    UnsupportedFormat(String),

    #[error("audio stream error: {0}")]
    Stream(String),

    #[error("failed to decode audio: {0}")]
    Decode(String),

    #[error("sample rate conversion failed: {0}")]
    Resample(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
