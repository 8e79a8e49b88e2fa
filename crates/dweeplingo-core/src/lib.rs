//! DweepLingo Core - offline English/Hindi translation engine
//!
//! This crate provides the pieces shared by the translation server and the
//! model fetcher: OPUS-MT bundles for each direction, their download and
//! integrity manifest, offline loading on candle, beam-search decoding, and
//! the immutable registry that routes requests to loaded models.
//!
//! # Example
//!
//! ```ignore
//! use dweeplingo_core::{ComputeStrategy, MarianLoader, ModelRegistry, Settings};
//!
//! let settings = Settings::load(None)?;
//! let strategy = ComputeStrategy::resolve(settings.engine.device)?;
//! let loader = MarianLoader::new(strategy, settings.engine.clone());
//! let registry = ModelRegistry::load(&settings.engine.models_dir, Arc::new(loader)).await;
//! ```

pub mod config;
pub mod direction;
pub mod error;
pub mod inference;
pub mod model;
pub mod registry;
pub mod tokenizer;

pub use config::{ConfirmMode, DevicePreference, EngineConfig, ServerConfig, Settings};
pub use direction::{Direction, Language, ModelCard};
pub use error::{Error, ErrorKind, Result};
pub use inference::{GenerationConfig, MarianLoader, MarianTranslator, ModelLoader, Translate};
pub use model::{
    BundleManifest, BundleSource, ComputeStrategy, DownloadEvent, HubSource, ModelDownloader,
};
pub use registry::{ModelRegistry, TranslationRequest, TranslationResponse};
