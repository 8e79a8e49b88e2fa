//! Loaded-model registry and request routing
//!
//! The registry is built once at startup and never mutated afterwards.
//! Directions whose bundle is missing or fails to load are simply absent.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::inference::{ModelLoader, Translate};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationRequest {
    pub text: String,
    pub src_lang: String,
    pub tgt_lang: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationResponse {
    pub translation: String,
    pub src_lang: String,
    pub tgt_lang: String,
}

#[derive(Default)]
pub struct ModelRegistry {
    models: HashMap<Direction, Arc<dyn Translate>>,
}

impl ModelRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_models(models: impl IntoIterator<Item = Arc<dyn Translate>>) -> Self {
        Self {
            models: models.into_iter().map(|m| (m.direction(), m)).collect(),
        }
    }

    /// Load every direction found under `models_dir`.
    ///
    /// Loading runs on the blocking pool. A direction that fails is logged and
    /// left out; the registry is returned even when nothing loaded.
    pub async fn load(models_dir: &Path, loader: Arc<dyn ModelLoader>) -> Self {
        let mut models = HashMap::new();

        for direction in Direction::all().iter().copied() {
            info!("Loading {}...", direction);
            let path = direction.local_path(models_dir);
            let loader = loader.clone();

            let result = tokio::task::spawn_blocking(move || loader.load(direction, &path))
                .await
                .map_err(|e| Error::ModelLoadError(e.to_string()))
                .and_then(|r| r);

            match result {
                Ok(model) => {
                    info!("{} ready", direction);
                    models.insert(direction, model);
                }
                Err(e @ Error::MissingBundle { .. }) => warn!("{} unavailable: {}", direction, e),
                Err(e) => error!("{} failed to load: {}", direction, e),
            }
        }

        if models.is_empty() {
            warn!("No models loaded!");
        }

        Self { models }
    }

    /// Loaded directions, in a stable order.
    pub fn loaded(&self) -> Vec<Direction> {
        let mut loaded: Vec<Direction> = self.models.keys().copied().collect();
        loaded.sort();
        loaded
    }

    pub fn get(&self, direction: Direction) -> Option<Arc<dyn Translate>> {
        self.models.get(&direction).cloned()
    }

    /// Validate a request and pick its model without running inference.
    ///
    /// Checks happen in order: language pair, non-blank text, availability.
    pub fn route(&self, request: &TranslationRequest) -> Result<Arc<dyn Translate>> {
        let direction = Direction::from_codes(&request.src_lang, &request.tgt_lang)
            .ok_or_else(|| Error::InvalidRequest("Only en↔hi translation supported".into()))?;

        if request.text.trim().is_empty() {
            return Err(Error::InvalidRequest("Empty text provided".into()));
        }

        self.get(direction)
            .ok_or_else(|| Error::Unavailable(direction.to_string()))
    }

    /// Route and translate synchronously.
    pub fn translate(&self, request: &TranslationRequest) -> Result<TranslationResponse> {
        let model = self.route(request).inspect_err(|e| debug!("Rejected request: {}", e))?;
        let translation = model.translate(&request.text)?;

        Ok(TranslationResponse {
            translation,
            src_lang: request.src_lang.clone(),
            tgt_lang: request.tgt_lang.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Uppercases its input and counts calls.
    struct StubModel {
        direction: Direction,
        calls: AtomicUsize,
    }

    impl StubModel {
        fn new(direction: Direction) -> Arc<Self> {
            Arc::new(Self {
                direction,
                calls: AtomicUsize::new(0),
            })
        }
    }

    impl Translate for StubModel {
        fn direction(&self) -> Direction {
            self.direction
        }

        fn translate(&self, text: &str) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(format!("[{}] {}", self.direction, text.to_uppercase()))
        }
    }

    struct StubLoader;

    impl ModelLoader for StubLoader {
        fn load(&self, direction: Direction, model_dir: &Path) -> Result<Arc<dyn Translate>> {
            if !model_dir.exists() {
                return Err(Error::MissingBundle {
                    path: model_dir.display().to_string(),
                });
            }
            if model_dir.join("corrupt").exists() {
                return Err(Error::ModelLoadError("bad weights".into()));
            }
            Ok(StubModel::new(direction))
        }
    }

    fn request(text: &str, src: &str, tgt: &str) -> TranslationRequest {
        TranslationRequest {
            text: text.to_string(),
            src_lang: src.to_string(),
            tgt_lang: tgt.to_string(),
        }
    }

    fn both() -> (Arc<StubModel>, Arc<StubModel>, ModelRegistry) {
        let en_hi = StubModel::new(Direction::EnHi);
        let hi_en = StubModel::new(Direction::HiEn);
        let registry = ModelRegistry::from_models([
            en_hi.clone() as Arc<dyn Translate>,
            hi_en.clone() as Arc<dyn Translate>,
        ]);
        (en_hi, hi_en, registry)
    }

    #[test]
    fn test_routes_valid_pairs() {
        let (en_hi, hi_en, registry) = both();

        let response = registry.translate(&request("hello", "en", "hi")).unwrap();
        assert_eq!(response.translation, "[en-hi] HELLO");
        assert_eq!(response.src_lang, "en");
        assert_eq!(response.tgt_lang, "hi");

        let response = registry.translate(&request("नमस्ते", "hi", "en")).unwrap();
        assert_eq!(response.src_lang, "hi");
        assert_eq!(response.tgt_lang, "en");

        assert_eq!(en_hi.calls.load(Ordering::SeqCst), 1);
        assert_eq!(hi_en.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_invalid_pairs_never_touch_a_model() {
        let (en_hi, hi_en, registry) = both();

        for (src, tgt) in [
            ("en", "fr"),
            ("fr", "hi"),
            ("en", "en"),
            ("hi", "hi"),
            ("EN", "HI"),
            ("", ""),
            (" en", "hi"),
        ] {
            let err = registry.translate(&request("hello", src, tgt)).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest, "{}->{}", src, tgt);
        }

        assert_eq!(en_hi.calls.load(Ordering::SeqCst), 0);
        assert_eq!(hi_en.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_blank_text_is_invalid() {
        let (en_hi, _, registry) = both();

        for text in ["", " ", "\n\t  "] {
            let err = registry.translate(&request(text, "en", "hi")).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidRequest);
        }
        assert_eq!(en_hi.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unloaded_direction_is_unavailable() {
        let registry =
            ModelRegistry::from_models([StubModel::new(Direction::EnHi) as Arc<dyn Translate>]);

        let err = registry.translate(&request("नमस्ते", "hi", "en")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
        assert_eq!(err.to_string(), "Model hi-en not available");

        // Pair validation still wins over availability.
        let err = registry.translate(&request("hi", "hi", "fr")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRequest);
    }

    #[test]
    fn test_empty_registry() {
        let registry = ModelRegistry::empty();
        assert!(registry.loaded().is_empty());
        let err = registry.translate(&request("hello", "en", "hi")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn test_load_skips_missing_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("hi-en")).unwrap();

        let registry = ModelRegistry::load(tmp.path(), Arc::new(StubLoader)).await;
        assert_eq!(registry.loaded(), vec![Direction::HiEn]);
        assert!(registry.get(Direction::EnHi).is_none());
    }

    #[tokio::test]
    async fn test_load_skips_broken_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("en-hi")).unwrap();
        std::fs::create_dir(tmp.path().join("hi-en")).unwrap();
        std::fs::write(tmp.path().join("en-hi/corrupt"), b"").unwrap();

        let registry = ModelRegistry::load(tmp.path(), Arc::new(StubLoader)).await;
        assert_eq!(registry.loaded(), vec![Direction::HiEn]);
    }

    #[tokio::test]
    async fn test_load_both() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir(tmp.path().join("en-hi")).unwrap();
        std::fs::create_dir(tmp.path().join("hi-en")).unwrap();

        let registry = ModelRegistry::load(tmp.path(), Arc::new(StubLoader)).await;
        assert_eq!(registry.loaded(), vec![Direction::EnHi, Direction::HiEn]);
    }
}
