// Audio subsystem
// Symphonia decoding, rubato rate conversion, silence trimming, and the
// host capability (cpal in production, a manual clock in tests)

pub mod decoder;
pub mod host;
pub mod output;
pub mod resample;
pub mod trim;

pub use decoder::{decode_bytes, DecodedSegment};
pub use host::{AudioHost, ManualHost, SourceId};
pub use output::CpalHost;
pub use trim::trim_silence;
