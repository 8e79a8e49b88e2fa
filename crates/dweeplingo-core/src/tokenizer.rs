//! Text tokenization for MarianMT bundles
//!
//! Source text is split into pieces by the bundle's SentencePiece model (or a
//! converted `tokenizer.json` when one is shipped), and pieces are mapped to
//! ids through the shared `vocab.json`.

use sentencepiece::SentencePieceProcessor;
use std::collections::HashMap;
use std::path::Path;
use tokenizers::Tokenizer as HfTokenizer;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Word-boundary marker used by SentencePiece.
const WORD_BOUNDARY: char = '\u{2581}';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpecialTokens {
    pub eos_id: u32,
    pub pad_id: u32,
    pub unk_id: u32,
}

impl SpecialTokens {
    fn from_vocab(vocab: &HashMap<String, u32>) -> Result<Self> {
        let lookup = |token: &str| {
            vocab.get(token).copied().ok_or_else(|| {
                Error::TokenizationError(format!("vocab.json has no {} token", token))
            })
        };
        Ok(Self {
            eos_id: lookup("</s>")?,
            pad_id: lookup("<pad>")?,
            unk_id: lookup("<unk>")?,
        })
    }

    pub fn is_special(&self, id: u32) -> bool {
        id == self.eos_id || id == self.pad_id || id == self.unk_id
    }
}

enum PieceEncoder {
    SentencePiece(SentencePieceProcessor),
    Json(HfTokenizer),
}

impl PieceEncoder {
    fn pieces(&self, text: &str) -> Result<Vec<String>> {
        match self {
            PieceEncoder::SentencePiece(spm) => Ok(spm
                .encode(text)
                .map_err(|e| Error::TokenizationError(e.to_string()))?
                .into_iter()
                .map(|p| p.piece)
                .collect()),
            PieceEncoder::Json(tokenizer) => Ok(tokenizer
                .encode(text, false)
                .map_err(|e| Error::TokenizationError(e.to_string()))?
                .get_tokens()
                .to_vec()),
        }
    }
}

pub struct Tokenizer {
    encoder: PieceEncoder,
    vocab: HashMap<String, u32>,
    id_to_token: HashMap<u32, String>,
    special_tokens: SpecialTokens,
}

impl Tokenizer {
    pub fn from_path(model_dir: &Path) -> Result<Self> {
        let vocab_path = model_dir.join("vocab.json");
        if !vocab_path.exists() {
            return Err(Error::TokenizationError(format!(
                "No vocab.json in {:?}",
                model_dir
            )));
        }
        let vocab: HashMap<String, u32> =
            serde_json::from_str(&std::fs::read_to_string(&vocab_path)?)?;

        let spm_path = model_dir.join("source.spm");
        if spm_path.exists() {
            let spm = SentencePieceProcessor::open(&spm_path)
                .map_err(|e| Error::TokenizationError(e.to_string()))?;
            debug!("Loaded SentencePiece model from {:?}", spm_path);
            return Self::new(PieceEncoder::SentencePiece(spm), vocab);
        }

        let json_path = model_dir.join("tokenizer.json");
        if json_path.exists() {
            info!("Loading source tokenizer from tokenizer.json");
            let tokenizer = HfTokenizer::from_file(&json_path)
                .map_err(|e| Error::TokenizationError(e.to_string()))?;
            return Self::new(PieceEncoder::Json(tokenizer), vocab);
        }

        Err(Error::TokenizationError(format!(
            "No tokenizer found in {:?}",
            model_dir
        )))
    }

    fn new(encoder: PieceEncoder, vocab: HashMap<String, u32>) -> Result<Self> {
        let special_tokens = SpecialTokens::from_vocab(&vocab)?;
        let id_to_token = vocab.iter().map(|(k, v)| (*v, k.clone())).collect();

        Ok(Self {
            encoder,
            vocab,
            id_to_token,
            special_tokens,
        })
    }

    /// Encode `text` into at most `max_tokens` ids, the last of which is EOS.
    /// Longer inputs are truncated.
    pub fn encode(&self, text: &str, max_tokens: usize) -> Result<Vec<u32>> {
        let pieces = self.encoder.pieces(text)?;
        Ok(pieces_to_ids(
            &pieces,
            &self.vocab,
            self.special_tokens,
            max_tokens,
        ))
    }

    /// Decode ids to text, dropping special tokens.
    pub fn decode(&self, ids: &[u32]) -> String {
        ids_to_text(ids, &self.id_to_token, self.special_tokens)
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab.len()
    }
}

fn pieces_to_ids(
    pieces: &[String],
    vocab: &HashMap<String, u32>,
    special: SpecialTokens,
    max_tokens: usize,
) -> Vec<u32> {
    let budget = max_tokens.saturating_sub(1);
    let mut ids: Vec<u32> = pieces
        .iter()
        .take(budget)
        .map(|p| vocab.get(p).copied().unwrap_or(special.unk_id))
        .collect();
    ids.push(special.eos_id);
    ids
}

fn ids_to_text(ids: &[u32], id_to_token: &HashMap<u32, String>, special: SpecialTokens) -> String {
    let joined: String = ids
        .iter()
        .filter(|id| !special.is_special(**id))
        .filter_map(|id| id_to_token.get(id))
        .map(|s| s.as_str())
        .collect();
    joined
        .replace(WORD_BOUNDARY, " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
