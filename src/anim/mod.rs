// Animation module
// Clock-driven marker motion, viseme selection, and the amplitude fallback

pub mod amplitude;
pub mod driver;
pub mod viseme;

pub use amplitude::AmplitudeAnalyzer;
pub use driver::{AnimationDriver, AnimationFrame, UnitSpan, WordLayout};
pub use viseme::{VisemeConfig, VisemeShape, VisemeTable};
