// Phonosync - phoneme-synchronized playback and avatar animation
// Module declarations
pub mod anim;
pub mod audio;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod sequence;
pub mod settings;
pub mod speech;
pub mod store;
pub mod units;

pub use anim::{AmplitudeAnalyzer, AnimationDriver, AnimationFrame, UnitSpan, VisemeConfig,
    VisemeShape, VisemeTable, WordLayout};
pub use audio::{AudioHost, CpalHost, DecodedSegment, ManualHost};
pub use catalog::{CatalogEntry, SoundCatalog};
pub use engine::{PlaybackEngine, PlaybackOutcome, PlaybackState};
pub use error::EngineError;
pub use sequence::{PlanMode, PlaybackPlan, SequenceScheduler, Timing};
pub use settings::EngineSettings;
pub use speech::{NullSpeech, SpeechSynthesizer};
pub use store::{BlobStore, ClipStore, MemoryStore};
pub use units::{SoundUnit, UnitKind, VowelLength, Word};
