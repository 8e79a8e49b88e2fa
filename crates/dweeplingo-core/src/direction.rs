//! Supported languages and translation directions

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    En,
    Hi,
}

impl Language {
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Hi => "hi",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Hi => "Hindi",
        }
    }

    /// Parse an exact lowercase language code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "en" => Some(Language::En),
            "hi" => Some(Language::Hi),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Descriptive metadata for the pretrained model behind a direction.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelCard {
    pub dataset: &'static str,
    pub architecture: &'static str,
    pub preprocessing: &'static str,
}

/// One configured translation pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Direction {
    #[serde(rename = "en-hi")]
    EnHi,
    #[serde(rename = "hi-en")]
    HiEn,
}

impl Direction {
    pub fn all() -> &'static [Direction] {
        &[Direction::EnHi, Direction::HiEn]
    }

    /// Resolve a `(source, target)` pair. Only the two configured pairings match.
    pub fn from_pair(src: Language, tgt: Language) -> Option<Self> {
        match (src, tgt) {
            (Language::En, Language::Hi) => Some(Direction::EnHi),
            (Language::Hi, Language::En) => Some(Direction::HiEn),
            _ => None,
        }
    }

    /// Resolve raw language codes as they arrive on the wire.
    pub fn from_codes(src: &str, tgt: &str) -> Option<Self> {
        Self::from_pair(Language::from_code(src)?, Language::from_code(tgt)?)
    }

    pub fn source(&self) -> Language {
        match self {
            Direction::EnHi => Language::En,
            Direction::HiEn => Language::Hi,
        }
    }

    pub fn target(&self) -> Language {
        match self {
            Direction::EnHi => Language::Hi,
            Direction::HiEn => Language::En,
        }
    }

    /// Directory name under the models root, also the wire name.
    pub fn key(&self) -> &'static str {
        match self {
            Direction::EnHi => "en-hi",
            Direction::HiEn => "hi-en",
        }
    }

    /// HuggingFace Hub repository id.
    pub fn repo_id(&self) -> &'static str {
        match self {
            Direction::EnHi => "Helsinki-NLP/opus-mt-en-hi",
            Direction::HiEn => "Helsinki-NLP/opus-mt-hi-en",
        }
    }

    pub fn card(&self) -> ModelCard {
        match self {
            Direction::EnHi => ModelCard {
                dataset: "opus",
                architecture: "transformer-align",
                preprocessing: "normalization + SentencePiece (spm32k,spm32k)",
            },
            Direction::HiEn => ModelCard {
                dataset: "opus",
                architecture: "transformer",
                preprocessing: "normalization + tokenization + BPE",
            },
        }
    }

    pub fn local_path(&self, models_dir: &Path) -> PathBuf {
        models_dir.join(self.key())
    }

    /// Fixed sentences used to smoke-test a freshly acquired bundle.
    pub fn smoke_sentences(&self) -> &'static [&'static str] {
        match self {
            Direction::EnHi => &["Hello, how are you?", "Good morning!", "Thank you very much."],
            Direction::HiEn => &["नमस्ते, आप कैसे हैं?", "शुभ प्रभात!", "बहुत बहुत धन्यवाद।"],
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Direction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Direction::all()
            .iter()
            .copied()
            .find(|d| d.key() == s)
            .ok_or_else(|| Error::ConfigError(format!("Unknown direction: {}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_codes_accepts_only_configured_pairs() {
        assert_eq!(Direction::from_codes("en", "hi"), Some(Direction::EnHi));
        assert_eq!(Direction::from_codes("hi", "en"), Some(Direction::HiEn));
        assert_eq!(Direction::from_codes("en", "en"), None);
        assert_eq!(Direction::from_codes("hi", "hi"), None);
        assert_eq!(Direction::from_codes("en", "fr"), None);
        assert_eq!(Direction::from_codes("EN", "HI"), None);
        assert_eq!(Direction::from_codes("", "hi"), None);
    }

    #[test]
    fn test_parse_direction_key() {
        assert_eq!("en-hi".parse::<Direction>().unwrap(), Direction::EnHi);
        assert_eq!("hi-en".parse::<Direction>().unwrap(), Direction::HiEn);

        let err = "en-fr".parse::<Direction>().unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }

    #[test]
    fn test_local_path_layout() {
        let root = Path::new("models");
        assert_eq!(Direction::EnHi.local_path(root), PathBuf::from("models/en-hi"));
        assert_eq!(Direction::HiEn.local_path(root), PathBuf::from("models/hi-en"));
    }

    #[test]
    fn test_source_and_target_are_mirrored() {
        for d in Direction::all() {
            assert_eq!(Direction::from_pair(d.source(), d.target()), Some(*d));
            assert_ne!(d.source(), d.target());
        }
    }

    #[test]
    fn test_serde_uses_direction_key() {
        let json = serde_json::to_string(&Direction::HiEn).unwrap();
        assert_eq!(json, "\"hi-en\"");
    }
}
