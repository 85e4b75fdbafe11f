// Viseme table and per-sound viseme configuration
// A viseme is a discrete mouth shape; the avatar picks one per active sound.
// The mapping is user-editable and falls back to a class heuristic when a
// sound was never configured.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::catalog::{CatalogEntry, SoundCatalog};
use crate::error::EngineError;
use crate::units::VowelLength;

/// Letters treated as vowels by the default heuristic
const VOWEL_LETTERS: &str = "aeiouy\u{e5}\u{e4}\u{f6}"; // aeiouyåäö

// Default table indices
pub const VISEME_CLOSED: usize = 0;
pub const VISEME_SLIGHT_OPEN: usize = 1;
pub const VISEME_MEDIUM_OPEN: usize = 2;
pub const VISEME_WIDE_OPEN: usize = 3;
pub const VISEME_ROUNDED: usize = 4;
pub const VISEME_TEETH_ON_LIP: usize = 5;

/// One mouth-shape descriptor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisemeShape {
    pub name: String,
    /// 0.0 closed .. 1.0 fully open
    pub mouth_open: f32,
    /// 0.0 relaxed .. 1.0 fully rounded
    pub lip_rounding: f32,
}

/// Ordered catalog of mouth shapes, indexed by the small integers stored in
/// a `VisemeConfig`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisemeTable {
    shapes: Vec<VisemeShape>,
}

impl Default for VisemeTable {
    fn default() -> Self {
        let shape = |name: &str, mouth_open: f32, lip_rounding: f32| VisemeShape {
            name: name.to_string(),
            mouth_open,
            lip_rounding,
        };
        Self {
            shapes: vec![
                shape("closed", 0.0, 0.0),
                shape("slight-open", 0.25, 0.0),
                shape("medium-open", 0.55, 0.1),
                shape("wide-open", 1.0, 0.0),
                shape("rounded", 0.45, 1.0),
                shape("teeth-on-lip", 0.15, 0.0),
            ],
        }
    }
}

impl VisemeTable {
    pub fn new(shapes: Vec<VisemeShape>) -> Self {
        Self { shapes }
    }

    pub fn get(&self, index: usize) -> Option<&VisemeShape> {
        self.shapes.get(index)
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }
}

/// User-editable mapping from sound id to viseme index
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VisemeConfig {
    map: HashMap<String, usize>,
}

impl VisemeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate every catalog sound through the class heuristic, so
    /// lookups only miss for sounds outside the catalog.
    pub fn with_defaults(catalog: &SoundCatalog) -> Self {
        let mut map = HashMap::new();
        for entry in catalog.entries() {
            map.insert(entry.id.clone(), default_index(entry));
        }
        Self { map }
    }

    pub fn set(&mut self, sound_id: impl Into<String>, index: usize) {
        self.map.insert(sound_id.into(), index);
    }

    /// `None` means the sound was never configured; the caller falls back to
    /// the amplitude-driven generic mouth.
    pub fn index_for(&self, sound_id: &str) -> Option<usize> {
        self.map.get(sound_id).copied()
    }

    pub fn config_path(dir: &Path) -> PathBuf {
        dir.join("visemes.json")
    }

    /// Load a saved configuration, or derive defaults from the catalog when
    /// no file exists yet
    pub fn load(dir: &Path, catalog: &SoundCatalog) -> Result<Self, EngineError> {
        let path = Self::config_path(dir);
        if !path.exists() {
            return Ok(Self::with_defaults(catalog));
        }
        let content = fs::read_to_string(&path)?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, dir: &Path) -> Result<(), EngineError> {
        fs::create_dir_all(dir)?;
        let path = Self::config_path(dir);
        fs::write(&path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Fixed vowel/consonant class heuristic used when no explicit choice exists
fn default_index(entry: &CatalogEntry) -> usize {
    let mut chars = entry.base.chars();
    let first = match chars.next() {
        Some(c) => c,
        None => return VISEME_SLIGHT_OPEN,
    };
    let is_digraph = chars.next().is_some();

    if VOWEL_LETTERS.contains(first) {
        return match first {
            'o' | 'u' | 'y' | '\u{f6}' | '\u{e5}' => VISEME_ROUNDED,
            _ => match entry.length {
                Some(VowelLength::Short) => VISEME_MEDIUM_OPEN,
                // Long is the unmarked default form
                _ => VISEME_WIDE_OPEN,
            },
        };
    }

    if is_digraph {
        return VISEME_MEDIUM_OPEN;
    }

    match first {
        'b' | 'p' | 'm' => VISEME_CLOSED,
        'f' | 'v' => VISEME_TEETH_ON_LIP,
        _ => VISEME_SLIGHT_OPEN,
    }
}
