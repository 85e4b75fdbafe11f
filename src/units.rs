// Word and sound-unit data model
// A word is an ordered list of units that fully cover its text

use serde::{Deserialize, Serialize};

/// Category of a sound unit within a word
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitKind {
    Vowel,
    Consonant,
    Digraph,
    Separator,
}

/// Vowel length marker. Long is the pedagogically unmarked default form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VowelLength {
    Long,
    Short,
}

/// One letter or letter-group forming a single pronounceable sound
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SoundUnit {
    /// Text fragment: one character or a digraph/doubled-letter group
    pub text: String,
    pub kind: UnitKind,
    /// Explicit recording identifier, overrides all catalog resolution
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<VowelLength>,
    /// Phoneme hint for soft/hard consonant variants and digraphs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phoneme: Option<String>,
    /// Silent letters contribute no timing and no audio
    #[serde(default)]
    pub silent: bool,
}

impl SoundUnit {
    pub fn new(text: impl Into<String>, kind: UnitKind) -> Self {
        Self {
            text: text.into(),
            kind,
            recording_id: None,
            length: None,
            phoneme: None,
            silent: false,
        }
    }

    pub fn vowel(text: impl Into<String>) -> Self {
        Self::new(text, UnitKind::Vowel)
    }

    pub fn consonant(text: impl Into<String>) -> Self {
        Self::new(text, UnitKind::Consonant)
    }

    pub fn digraph(text: impl Into<String>) -> Self {
        Self::new(text, UnitKind::Digraph)
    }

    pub fn separator() -> Self {
        Self::new("-", UnitKind::Separator)
    }

    pub fn with_length(mut self, length: VowelLength) -> Self {
        self.length = Some(length);
        self
    }

    pub fn with_phoneme(mut self, phoneme: impl Into<String>) -> Self {
        self.phoneme = Some(phoneme.into());
        self
    }

    pub fn with_recording(mut self, id: impl Into<String>) -> Self {
        self.recording_id = Some(id.into());
        self
    }

    pub fn silent(mut self) -> Self {
        self.silent = true;
        self
    }

    /// Base fragment used for catalog matching: lowercased, with
    /// doubled-letter groups collapsed to a single character ("tt" -> "t").
    /// Multi-character fragments with distinct letters ("sj") stay whole.
    pub fn base(&self) -> String {
        let lower = self.text.to_lowercase();
        let mut chars = lower.chars();
        if let Some(first) = chars.next() {
            if chars.all(|c| c == first) {
                return first.to_string();
            }
        }
        lower
    }
}

/// A word decomposed into sound units, optionally carrying a whole-word
/// custom recording id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub units: Vec<SoundUnit>,
    /// Identifier of a single human-recorded clip for the entire word
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_recording_id: Option<String>,
}

impl Word {
    pub fn new(text: impl Into<String>, units: Vec<SoundUnit>) -> Self {
        Self {
            text: text.into(),
            units,
            custom_recording_id: None,
        }
    }

    pub fn with_custom_recording(mut self, id: impl Into<String>) -> Self {
        self.custom_recording_id = Some(id.into());
        self
    }

    /// Check the coverage invariant: non-separator unit fragments,
    /// concatenated in order, must reproduce the word text.
    pub fn units_cover_text(&self) -> bool {
        let joined: String = self
            .units
            .iter()
            .filter(|u| u.kind != UnitKind::Separator)
            .map(|u| u.text.as_str())
            .collect();
        joined.eq_ignore_ascii_case(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_collapses_doubled_letters() {
        assert_eq!(SoundUnit::consonant("tt").base(), "t");
        assert_eq!(SoundUnit::consonant("LL").base(), "l");
        assert_eq!(SoundUnit::digraph("sj").base(), "sj");
        assert_eq!(SoundUnit::vowel("a").base(), "a");
    }

    #[test]
    fn test_units_cover_text() {
        let word = Word::new(
            "katt",
            vec![
                SoundUnit::consonant("k"),
                SoundUnit::vowel("a"),
                SoundUnit::consonant("tt"),
            ],
        );
        assert!(word.units_cover_text());

        let broken = Word::new("katt", vec![SoundUnit::consonant("k"), SoundUnit::vowel("a")]);
        assert!(!broken.units_cover_text());
    }

    #[test]
    fn test_separators_ignored_for_coverage() {
        let word = Word::new(
            "ao",
            vec![
                SoundUnit::vowel("a"),
                SoundUnit::separator(),
                SoundUnit::vowel("o"),
            ],
        );
        assert!(word.units_cover_text());
    }
}
