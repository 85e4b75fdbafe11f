// Sound catalog and recording resolution
// Maps a letter/sound unit to a canonical recording id. Resolution walks
// from most to least specific so that specificity always beats generality.

use serde::{Deserialize, Serialize};

use crate::error::EngineError;
use crate::units::{SoundUnit, UnitKind, VowelLength};

/// One recorded sound in the library
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    /// Stable recording identifier handed to the blob store
    pub id: String,
    /// Base fragment the entry covers, lowercase ("a", "t", "sj")
    pub base: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<VowelLength>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme: Option<String>,
}

impl CatalogEntry {
    pub fn new(id: impl Into<String>, base: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            base: base.into(),
            length: None,
            phoneme: None,
        }
    }

    pub fn with_length(mut self, length: VowelLength) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_phoneme(mut self, phoneme: impl Into<String>) -> Self {
        self.phoneme = Some(phoneme.into());
        self
    }
}

/// Ordered collection of catalog entries searched by the resolver
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SoundCatalog {
    entries: Vec<CatalogEntry>,
}

impl SoundCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    /// Load a catalog manifest from JSON
    pub fn from_json(json: &str) -> Result<Self, EngineError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Resolve a unit to a recording id. First match wins:
    /// 1. explicit recording id on the unit, verbatim
    /// 2. vowel with length marker: same base and same length
    /// 3. phoneme hint: base and phoneme both agree
    /// 4. vowel fallback: same base with the unmarked (long) form
    /// 5. any entry with a matching base
    ///
    /// `None` means no entry shares the base at all; the caller must fall
    /// back to synthesized speech for this unit.
    pub fn resolve<'a>(&'a self, unit: &'a SoundUnit) -> Option<&'a str> {
        if unit.kind == UnitKind::Separator {
            return None;
        }

        if let Some(id) = &unit.recording_id {
            return Some(id.as_str());
        }

        let base = unit.base();

        if unit.kind == UnitKind::Vowel {
            if let Some(wanted) = unit.length {
                if let Some(entry) = self
                    .entries
                    .iter()
                    .find(|e| e.base == base && e.length == Some(wanted))
                {
                    return Some(entry.id.as_str());
                }
            }
        }

        if let Some(hint) = &unit.phoneme {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|e| e.base == base && e.phoneme.as_deref() == Some(hint.as_str()))
            {
                return Some(entry.id.as_str());
            }
        }

        if unit.kind == UnitKind::Vowel {
            if let Some(entry) = self
                .entries
                .iter()
                .find(|e| e.base == base && e.length == Some(VowelLength::Long))
            {
                return Some(entry.id.as_str());
            }
        }

        self.entries
            .iter()
            .find(|e| e.base == base)
            .map(|e| e.id.as_str())
    }
}
