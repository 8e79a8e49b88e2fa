//! Translation models bound to a direction

use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::inference::generation::GenerationConfig;
use crate::model::{ComputeStrategy, MarianModel};
use crate::tokenizer::Tokenizer;

/// A loaded, read-only translation capability for one direction.
pub trait Translate: Send + Sync {
    fn direction(&self) -> Direction;

    /// Translate `text` and return the single best hypothesis.
    fn translate(&self, text: &str) -> Result<String>;
}

/// Builds a `Translate` implementation from a bundle on disk.
pub trait ModelLoader: Send + Sync {
    fn load(&self, direction: Direction, model_dir: &Path) -> Result<Arc<dyn Translate>>;
}

/// Tokenizer plus MarianMT weights for one direction
pub struct MarianTranslator {
    direction: Direction,
    tokenizer: Tokenizer,
    model: MarianModel,
    generation: GenerationConfig,
    max_input_tokens: usize,
}

impl MarianTranslator {
    /// Load from local files only. Fails fast when the bundle directory is absent.
    pub fn load(
        direction: Direction,
        model_dir: &Path,
        strategy: &ComputeStrategy,
        engine: &EngineConfig,
    ) -> Result<Self> {
        if !model_dir.exists() {
            return Err(Error::MissingBundle {
                path: model_dir.display().to_string(),
            });
        }

        info!("Loading {} from local path: {:?}", direction, model_dir);
        let tokenizer = Tokenizer::from_path(model_dir)?;
        info!("Tokenizer loaded ({} entries)", tokenizer.vocab_size());

        let model = MarianModel::load(model_dir, strategy)?;

        Ok(Self::new(direction, tokenizer, model, engine))
    }

    fn new(
        direction: Direction,
        tokenizer: Tokenizer,
        model: MarianModel,
        engine: &EngineConfig,
    ) -> Self {
        Self {
            direction,
            tokenizer,
            model,
            generation: GenerationConfig::from(engine),
            max_input_tokens: engine.max_input_tokens,
        }
    }

    fn run(&self, text: &str) -> Result<String> {
        let input_ids = self.tokenizer.encode(text, self.max_input_tokens)?;
        debug!("{}: {} input tokens", self.direction, input_ids.len());

        let output_ids = self.model.generate(&input_ids, &self.generation)?;
        debug!("{}: {} output tokens", self.direction, output_ids.len());

        Ok(self.tokenizer.decode(&output_ids))
    }
}

impl Translate for MarianTranslator {
    fn direction(&self) -> Direction {
        self.direction
    }

    fn translate(&self, text: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Err(Error::InvalidRequest("Empty text provided".into()));
        }

        let translation = self
            .run(text)
            .map_err(|e| Error::InferenceError(e.to_string()))?;

        if translation.is_empty() {
            return Err(Error::InferenceError(
                "model produced an empty translation".into(),
            ));
        }
        Ok(translation)
    }
}

/// Loads Marian bundles with a fixed compute strategy.
pub struct MarianLoader {
    strategy: ComputeStrategy,
    engine: EngineConfig,
}

impl MarianLoader {
    pub fn new(strategy: ComputeStrategy, engine: EngineConfig) -> Self {
        Self { strategy, engine }
    }
}

impl ModelLoader for MarianLoader {
    fn load(&self, direction: Direction, model_dir: &Path) -> Result<Arc<dyn Translate>> {
        let translator = MarianTranslator::load(direction, model_dir, &self.strategy, &self.engine)?;
        Ok(Arc::new(translator))
    }
}
