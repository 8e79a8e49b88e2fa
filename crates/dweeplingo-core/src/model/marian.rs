//! MarianMT weights and decoding on candle

use candle_core::{DType, IndexOp, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::marian;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::inference::generation::{beam_search, DecoderTokens, GenerationConfig};
use crate::model::bundle::{weights_file, SAFETENSORS_WEIGHTS};
use crate::model::device::ComputeStrategy;

/// Parse a bundle's `config.json`, filling keys that older Marian exports omit.
pub fn parse_config(json: &str) -> Result<(marian::Config, DecoderTokens)> {
    let mut map: Map<String, Value> = serde_json::from_str(json)?;

    let eos = map
        .get("eos_token_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ModelLoadError("config.json has no eos_token_id".into()))?;
    let pad = map
        .get("pad_token_id")
        .and_then(Value::as_u64)
        .ok_or_else(|| Error::ModelLoadError("config.json has no pad_token_id".into()))?;

    let defaults = [
        ("decoder_start_token_id", Value::from(pad)),
        ("forced_eos_token_id", Value::from(eos)),
        ("activation_function", Value::from("swish")),
        ("scale_embedding", Value::from(true)),
        ("use_cache", Value::from(true)),
        ("is_encoder_decoder", Value::from(true)),
        ("share_encoder_decoder_embeddings", Value::from(true)),
    ];
    for (key, value) in defaults {
        map.entry(key).or_insert(value);
    }
    // Some exports write an explicit null here.
    if map.get("decoder_vocab_size").is_some_and(Value::is_null) {
        map.remove("decoder_vocab_size");
    }

    let start = map
        .get("decoder_start_token_id")
        .and_then(Value::as_u64)
        .unwrap_or(pad);

    let config: marian::Config = serde_json::from_value(Value::Object(map))
        .map_err(|e| Error::ModelLoadError(format!("invalid config.json: {}", e)))?;

    let tokens = DecoderTokens {
        start_id: start as u32,
        eos_id: eos as u32,
        pad_id: pad as u32,
    };
    Ok((config, tokens))
}

/// A loaded MarianMT encoder-decoder.
///
/// The loaded model is a template: each generation works on its own clone so
/// key/value caches are never shared between requests.
pub struct MarianModel {
    model: marian::MTModel,
    /// Tied output projection, `(vocab, d_model)`
    shared: Tensor,
    /// `(1, target_vocab)`
    final_logits_bias: Tensor,
    tokens: DecoderTokens,
    strategy: ComputeStrategy,
}

impl MarianModel {
    /// Load config and weights from a bundle directory. Never touches the network.
    pub fn load(model_dir: &Path, strategy: &ComputeStrategy) -> Result<Self> {
        info!("Loading model weights from {:?}", model_dir);

        let config_str = std::fs::read_to_string(model_dir.join("config.json"))?;
        let (config, tokens) = parse_config(&config_str)?;
        debug!("Model config: {:?}", config);

        let weights = weights_file(model_dir)
            .ok_or_else(|| Error::ModelLoadError(format!("No weights in {:?}", model_dir)))?;

        let vb = if weights.ends_with(SAFETENSORS_WEIGHTS) {
            // SAFETY: the bundle is owned by this process' models directory and
            // is not modified while the service runs.
            unsafe {
                VarBuilder::from_mmaped_safetensors(&[&weights], strategy.dtype, &strategy.device)?
            }
        } else {
            VarBuilder::from_pth(&weights, strategy.dtype, &strategy.device)?
        };

        let model = Self::from_var_builder(&config, tokens, vb, strategy)?;
        info!("Model loaded ({})", strategy);
        Ok(model)
    }

    pub(crate) fn from_var_builder(
        config: &marian::Config,
        tokens: DecoderTokens,
        vb: VarBuilder,
        strategy: &ComputeStrategy,
    ) -> Result<Self> {
        let target_vocab = config.decoder_vocab_size.unwrap_or(config.vocab_size);
        let load_err = |e: candle_core::Error| Error::ModelLoadError(e.to_string());

        let shared = vb
            .pp("model.shared")
            .get((config.vocab_size, config.d_model), "weight")
            .map_err(load_err)?;
        let final_logits_bias = vb
            .get((1, target_vocab), "final_logits_bias")
            .map_err(load_err)?;
        let model = marian::MTModel::new(config, vb).map_err(load_err)?;

        Ok(Self {
            model,
            shared,
            final_logits_bias,
            tokens,
            strategy: strategy.clone(),
        })
    }

    /// A model whose weights are all zero, for exercising the decode path.
    #[cfg(test)]
    pub(crate) fn zeroed(config_json: &str, dtype: DType) -> Result<Self> {
        let (config, tokens) = parse_config(config_json)?;
        let strategy = ComputeStrategy {
            device: candle_core::Device::Cpu,
            dtype,
        };
        let vb = VarBuilder::zeros(dtype, &strategy.device);
        Self::from_var_builder(&config, tokens, vb, &strategy)
    }

    /// Encode `input_ids` and beam-search a translation.
    pub fn generate(&self, input_ids: &[u32], config: &GenerationConfig) -> Result<Vec<u32>> {
        let device = &self.strategy.device;

        let mut model = self.model.clone();
        model.reset_kv_cache();

        let input = Tensor::new(input_ids, device)?.unsqueeze(0)?;
        let encoder_xs = model.encoder().forward(&input, 0)?;

        // One new token per step, so the causal mask is a single zero in the
        // weights' dtype.
        let mask = Tensor::zeros((1, 1), self.strategy.dtype, device)?;
        let projection = self.shared.t()?;

        beam_search(model, self.tokens, config, |model, prefix| {
            let last = prefix[prefix.len() - 1];
            let xs = Tensor::new(&[last], device)?.unsqueeze(0)?;
            let hidden = model
                .decoder()
                .forward(&xs, Some(&encoder_xs), prefix.len() - 1, &mask)?;
            let logits = hidden
                .i((0, 0))?
                .unsqueeze(0)?
                .matmul(&projection)?
                .broadcast_add(&self.final_logits_bias)?
                .i(0)?
                .to_dtype(DType::F32)?;
            let log_probs = candle_nn::ops::log_softmax(&logits, D::Minus1)?;
            Ok(log_probs.to_vec1::<f32>()?)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OPUS_MT_EN_HI: &str = r#"{
        "_name_or_path": "Helsinki-NLP/opus-mt-en-hi",
        "activation_dropout": 0.0,
        "activation_function": "swish",
        "architectures": ["MarianMTModel"],
        "bad_words_ids": [[61949]],
        "d_model": 512,
        "decoder_attention_heads": 8,
        "decoder_ffn_dim": 2048,
        "decoder_layers": 6,
        "decoder_start_token_id": 61949,
        "encoder_attention_heads": 8,
        "encoder_ffn_dim": 2048,
        "encoder_layers": 6,
        "eos_token_id": 0,
        "is_encoder_decoder": true,
        "max_length": 512,
        "max_position_embeddings": 512,
        "model_type": "marian",
        "num_beams": 4,
        "pad_token_id": 61949,
        "scale_embedding": true,
        "static_position_embeddings": true,
        "vocab_size": 61950
    }"#;

    #[test]
    fn test_parse_config_fills_missing_keys() {
        let (config, tokens) = parse_config(OPUS_MT_EN_HI).unwrap();
        assert_eq!(config.vocab_size, 61950);
        assert_eq!(config.d_model, 512);
        assert_eq!(config.encoder_layers, 6);
        assert!(config.share_encoder_decoder_embeddings);
        assert_eq!(config.forced_eos_token_id, 0);
        assert_eq!(tokens.start_id, 61949);
        assert_eq!(tokens.eos_id, 0);
        assert_eq!(tokens.pad_id, 61949);
    }

    #[test]
    fn test_parse_config_requires_special_ids() {
        let err = parse_config(r#"{"vocab_size": 10, "pad_token_id": 9}"#).unwrap_err();
        assert!(matches!(err, Error::ModelLoadError(_)));
    }

    #[test]
    fn test_load_without_weights_fails() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("config.json"), OPUS_MT_EN_HI).unwrap();

        let result = MarianModel::load(tmp.path(), &ComputeStrategy::cpu());
        assert!(matches!(result, Err(Error::ModelLoadError(_))));
    }

    /// Eight-token vocabulary, one layer each side.
    const TINY: &str = r#"{
        "vocab_size": 8,
        "d_model": 8,
        "encoder_layers": 1,
        "decoder_layers": 1,
        "encoder_attention_heads": 2,
        "decoder_attention_heads": 2,
        "encoder_ffn_dim": 16,
        "decoder_ffn_dim": 16,
        "max_position_embeddings": 32,
        "eos_token_id": 0,
        "pad_token_id": 7
    }"#;

    fn decode_with(dtype: DType) {
        let model = MarianModel::zeroed(TINY, dtype).unwrap();
        let config = GenerationConfig {
            max_length: 6,
            num_beams: 2,
            ..Default::default()
        };

        let first = model.generate(&[3, 4, 5, 0], &config).unwrap();
        assert!(first.len() <= config.max_length - 1, "{:?}", first);
        assert!(!first.contains(&7), "pad generated: {:?}", first);
        assert!(!first.contains(&0), "eos kept: {:?}", first);

        // The template's caches are untouched, so a second run matches.
        let second = model.generate(&[3, 4, 5, 0], &config).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_generate_full_precision() {
        decode_with(DType::F32);
    }

    #[test]
    fn test_generate_half_precision() {
        decode_with(DType::F16);
    }

    #[test]
    fn test_generate_respects_length_limit_without_early_stop() {
        let model = MarianModel::zeroed(TINY, DType::F32).unwrap();
        let config = GenerationConfig {
            max_length: 4,
            num_beams: 3,
            early_stopping: false,
            ..Default::default()
        };
        let out = model.generate(&[1, 2, 0], &config).unwrap();
        assert!(out.len() <= 3, "{:?}", out);
    }
}
