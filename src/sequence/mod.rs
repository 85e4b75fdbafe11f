// Sequence planning module
// Turns a word's ordered units into an absolute-time playback plan

pub mod plan;
pub mod scheduler;

pub use plan::{PlanMode, PlaybackPlan, Timing};
pub use scheduler::SequenceScheduler;
