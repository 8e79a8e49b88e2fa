//! Fetching model bundles from the HuggingFace Hub
//!
//! Artifacts land in a hidden staging directory next to the final bundle and
//! are moved into place only once every file is present and the manifest has
//! been written, so a bundle directory is either complete or absent.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::direction::Direction;
use crate::error::{Error, Result};
use crate::model::bundle::{
    validate_safetensors, BundleManifest, OPTIONAL_FILES, REQUIRED_FILES, SAFETENSORS_WEIGHTS,
    WEIGHT_FILES,
};

/// Remote store of model artifacts.
pub trait BundleSource: Send + Sync {
    /// Names of the files published in `repo_id`.
    fn list_files(&self, repo_id: &str) -> Result<Vec<String>>;

    /// Make one file available locally and return its path.
    fn fetch(&self, repo_id: &str, file: &str) -> Result<PathBuf>;
}

/// `BundleSource` backed by the HuggingFace Hub cache.
pub struct HubSource {
    api: hf_hub::api::sync::Api,
}

impl HubSource {
    pub fn new() -> Result<Self> {
        let api = hf_hub::api::sync::ApiBuilder::new()
            .with_progress(false)
            .build()?;
        Ok(Self { api })
    }
}

impl BundleSource for HubSource {
    fn list_files(&self, repo_id: &str) -> Result<Vec<String>> {
        let info = self.api.model(repo_id.to_string()).info()?;
        Ok(info.siblings.into_iter().map(|s| s.rfilename).collect())
    }

    fn fetch(&self, repo_id: &str, file: &str) -> Result<PathBuf> {
        Ok(self.api.model(repo_id.to_string()).get(file)?)
    }
}

/// Progress notifications emitted while a bundle downloads
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started {
        file: String,
        index: usize,
        total: usize,
    },
    Finished {
        file: String,
        size_bytes: u64,
    },
}

/// Downloads bundles for each direction into the models root
pub struct ModelDownloader<S> {
    source: S,
    models_dir: PathBuf,
}

impl<S: BundleSource> ModelDownloader<S> {
    pub fn new(source: S, models_dir: PathBuf) -> Self {
        Self { source, models_dir }
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn model_path(&self, direction: Direction) -> PathBuf {
        direction.local_path(&self.models_dir)
    }

    fn staging_path(&self, direction: Direction) -> PathBuf {
        self.models_dir.join(format!(".{}.partial", direction.key()))
    }

    /// Files to fetch for `direction`: required artifacts, optional ones the
    /// repository publishes, and the preferred available weights.
    pub fn plan(&self, direction: Direction) -> Result<Vec<String>> {
        let published: HashSet<String> = self
            .source
            .list_files(direction.repo_id())?
            .into_iter()
            .collect();

        let mut files = Vec::new();
        for name in REQUIRED_FILES {
            if !published.contains(*name) {
                return Err(Error::DownloadError(format!(
                    "{} does not publish {}",
                    direction.repo_id(),
                    name
                )));
            }
            files.push(name.to_string());
        }

        files.extend(
            OPTIONAL_FILES
                .iter()
                .filter(|name| published.contains(**name))
                .map(|name| name.to_string()),
        );

        let weights = WEIGHT_FILES
            .iter()
            .find(|name| published.contains(**name))
            .ok_or_else(|| {
                Error::DownloadError(format!("{} has no usable weights", direction.repo_id()))
            })?;
        files.push(weights.to_string());

        Ok(files)
    }

    /// Download the full bundle for `direction`. The target directory must be
    /// absent or empty.
    pub fn download(
        &self,
        direction: Direction,
        on_event: &mut dyn FnMut(DownloadEvent),
    ) -> Result<PathBuf> {
        let target = self.model_path(direction);
        if target.exists() {
            // An empty leftover directory is fine, anything else is not ours to clobber.
            std::fs::remove_dir(&target).map_err(|e| {
                Error::DownloadError(format!("{} already exists: {}", target.display(), e))
            })?;
        }

        let staging = self.staging_path(direction);
        if staging.exists() {
            warn!("Removing stale staging directory {:?}", staging);
            std::fs::remove_dir_all(&staging)?;
        }
        std::fs::create_dir_all(&staging)?;

        match self.fill_staging(direction, &staging, on_event) {
            Ok(()) => {
                std::fs::rename(&staging, &target)?;
                info!("Bundle {} saved to {:?}", direction, target);
                Ok(target)
            }
            Err(e) => {
                if let Err(cleanup) = std::fs::remove_dir_all(&staging) {
                    warn!("Failed to clean {:?}: {}", staging, cleanup);
                }
                Err(e)
            }
        }
    }

    fn fill_staging(
        &self,
        direction: Direction,
        staging: &Path,
        on_event: &mut dyn FnMut(DownloadEvent),
    ) -> Result<()> {
        let files = self.plan(direction)?;
        let total = files.len();

        for (i, file) in files.iter().enumerate() {
            on_event(DownloadEvent::Started {
                file: file.clone(),
                index: i + 1,
                total,
            });

            let cached = self.source.fetch(direction.repo_id(), file)?;
            let dest = staging.join(file);
            let size_bytes = std::fs::copy(&cached, &dest)?;
            debug!("Copied {:?} -> {:?}", cached, dest);

            if file == SAFETENSORS_WEIGHTS {
                let count = validate_safetensors(&dest)?;
                debug!("{} holds {} tensors", file, count);
            }

            on_event(DownloadEvent::Finished {
                file: file.clone(),
                size_bytes,
            });
        }

        BundleManifest::build(staging, direction)?.write(staging)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::bundle::{is_populated, MANIFEST_FILE, PYTORCH_WEIGHTS};
    use std::sync::Mutex;

    /// Serves files from a local directory, standing in for the Hub.
    struct DirSource {
        root: PathBuf,
        fail_on: Option<String>,
        fetched: Mutex<Vec<String>>,
    }

    impl DirSource {
        fn with_files(root: PathBuf, files: &[&str]) -> Self {
            std::fs::create_dir_all(&root).unwrap();
            for name in files {
                std::fs::write(root.join(name), format!("payload {}", name)).unwrap();
            }
            Self {
                root,
                fail_on: None,
                fetched: Mutex::new(Vec::new()),
            }
        }
    }

    impl BundleSource for DirSource {
        fn list_files(&self, _repo_id: &str) -> Result<Vec<String>> {
            let mut names: Vec<String> = std::fs::read_dir(&self.root)?
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect();
            names.sort();
            Ok(names)
        }

        fn fetch(&self, _repo_id: &str, file: &str) -> Result<PathBuf> {
            if self.fail_on.as_deref() == Some(file) {
                return Err(Error::HfHubError(format!("request for {} failed", file)));
            }
            self.fetched.lock().unwrap().push(file.to_string());
            Ok(self.root.join(file))
        }
    }

    fn full_repo() -> Vec<&'static str> {
        let mut files: Vec<&str> = REQUIRED_FILES.to_vec();
        files.push(PYTORCH_WEIGHTS);
        files.push("README.md");
        files.push("tf_model.h5");
        files
    }

    #[test]
    fn test_plan_selects_required_and_weights() {
        let tmp = tempfile::tempdir().unwrap();
        let mut files = full_repo();
        files.push("generation_config.json");
        let source = DirSource::with_files(tmp.path().join("hub"), &files);
        let downloader = ModelDownloader::new(source, tmp.path().join("models"));

        let plan = downloader.plan(Direction::EnHi).unwrap();
        assert_eq!(plan.len(), REQUIRED_FILES.len() + 2);
        assert!(plan.contains(&"generation_config.json".to_string()));
        assert_eq!(plan.last().unwrap(), PYTORCH_WEIGHTS);
        assert!(!plan.contains(&"README.md".to_string()));
        assert!(!plan.contains(&"tf_model.h5".to_string()));
    }

    #[test]
    fn test_plan_requires_tokenizer_files() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirSource::with_files(
            tmp.path().join("hub"),
            &["config.json", "vocab.json", PYTORCH_WEIGHTS],
        );
        let downloader = ModelDownloader::new(source, tmp.path().join("models"));

        let err = downloader.plan(Direction::HiEn).unwrap_err();
        assert!(matches!(err, Error::DownloadError(_)));
    }

    #[test]
    fn test_download_writes_complete_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirSource::with_files(tmp.path().join("hub"), &full_repo());
        let downloader = ModelDownloader::new(source, tmp.path().join("models"));

        let mut events = Vec::new();
        let path = downloader
            .download(Direction::EnHi, &mut |e| events.push(e))
            .unwrap();

        assert_eq!(path, tmp.path().join("models/en-hi"));
        for name in REQUIRED_FILES {
            assert!(path.join(name).is_file(), "missing {}", name);
        }
        assert!(path.join(PYTORCH_WEIGHTS).is_file());
        assert!(path.join(MANIFEST_FILE).is_file());
        assert!(!tmp.path().join("models/.en-hi.partial").exists());

        let manifest = BundleManifest::read(&path).unwrap().unwrap();
        manifest.verify(&path).unwrap();

        let total = REQUIRED_FILES.len() + 1;
        assert_eq!(events.len(), total * 2);
        assert_eq!(
            events[0],
            DownloadEvent::Started {
                file: "config.json".to_string(),
                index: 1,
                total
            }
        );
    }

    #[test]
    fn test_failed_fetch_leaves_no_bundle() {
        let tmp = tempfile::tempdir().unwrap();
        let mut source = DirSource::with_files(tmp.path().join("hub"), &full_repo());
        source.fail_on = Some(PYTORCH_WEIGHTS.to_string());
        let downloader = ModelDownloader::new(source, tmp.path().join("models"));

        let err = downloader
            .download(Direction::HiEn, &mut |_| {})
            .unwrap_err();
        assert!(matches!(err, Error::HfHubError(_)));
        assert!(!tmp.path().join("models/hi-en").exists());
        assert!(!tmp.path().join("models/.hi-en.partial").exists());
    }

    #[test]
    fn test_download_refuses_populated_target() {
        let tmp = tempfile::tempdir().unwrap();
        let source = DirSource::with_files(tmp.path().join("hub"), &full_repo());
        let downloader = ModelDownloader::new(source, tmp.path().join("models"));

        let target = tmp.path().join("models/en-hi");
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join("config.json"), "{}").unwrap();

        assert!(downloader.download(Direction::EnHi, &mut |_| {}).is_err());
        assert!(is_populated(&target));
        assert!(downloader.source.fetched.lock().unwrap().is_empty());
    }
}
