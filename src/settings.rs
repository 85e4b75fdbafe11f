// Engine settings and persistence
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::EngineError;

/// Timing constants for plan construction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingSettings {
    /// Seconds added to the current audio-clock time when anchoring the
    /// first start, so the first clip can be scheduled before the clock
    /// reaches it
    pub lead_in: f64,
    /// Seconds of deliberate crossfade between consecutive clips
    pub overlap_epsilon: f64,
    /// Nominal duration for units with no usable recording
    pub fallback_unit_duration: f64,
    /// Nominal pause for separator units
    pub separator_duration: f64,
    /// Floor for the effective advance of any unit
    pub min_effective_duration: f64,
}

impl Default for TimingSettings {
    fn default() -> Self {
        Self {
            lead_in: 0.1,
            overlap_epsilon: 0.02,
            fallback_unit_duration: 0.3,
            separator_duration: 0.4,
            min_effective_duration: 0.1,
        }
    }
}

/// Silence trimming for raw microphone captures
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrimSettings {
    /// Absolute amplitude (full scale 1.0) above which a sample counts as audible
    pub threshold: f32,
    /// Padding kept outside the audible window, in seconds
    pub padding_secs: f64,
}

impl Default for TrimSettings {
    fn default() -> Self {
        Self {
            threshold: 0.02,
            padding_secs: 0.1,
        }
    }
}

/// Marker animation tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnimationSettings {
    /// Peak height of the vertical bounce over one unit
    pub bounce_amplitude: f32,
}

impl Default for AnimationSettings {
    fn default() -> Self {
        Self {
            bounce_amplitude: 12.0,
        }
    }
}

/// Defaults handed to the synthesized-speech fallback
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    pub rate: f32,
    pub pitch: f32,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            rate: 0.8,
            pitch: 1.0,
        }
    }
}

/// Main engine settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineSettings {
    pub timing: TimingSettings,
    pub trim: TrimSettings,
    pub animation: AnimationSettings,
    pub speech: SpeechSettings,
}

impl EngineSettings {
    /// Get the settings file path inside a host-provided directory
    pub fn settings_path(dir: &Path) -> PathBuf {
        dir.join("engine_settings.json")
    }

    /// Load settings from file, or return defaults if the file doesn't exist
    pub fn load(dir: &Path) -> Result<Self, EngineError> {
        let path = Self::settings_path(dir);

        if !path.exists() {
            tracing::debug!(?path, "no settings file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(&path)?;
        let settings: EngineSettings = serde_json::from_str(&content)?;

        tracing::debug!(?path, "loaded engine settings");
        Ok(settings)
    }

    /// Save settings to file
    pub fn save(&self, dir: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(dir)?;

        let path = Self::settings_path(dir);
        let content = serde_json::to_string_pretty(self)?;
        fs::write(&path, content)?;

        tracing::debug!(?path, "saved engine settings");
        Ok(())
    }
}
