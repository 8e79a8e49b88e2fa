//! Decoding and the per-direction translation wrapper

pub mod generation;
mod translator;

pub use generation::{beam_search, DecoderTokens, GenerationConfig};
pub use translator::{MarianLoader, MarianTranslator, ModelLoader, Translate};
