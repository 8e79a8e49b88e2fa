//! On-disk model bundles and their integrity manifest

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::direction::Direction;
use crate::error::{Error, Result};

pub const MANIFEST_FILE: &str = "bundle.json";
pub const SAFETENSORS_WEIGHTS: &str = "model.safetensors";
pub const PYTORCH_WEIGHTS: &str = "pytorch_model.bin";

/// Tokenizer and config artifacts every bundle must carry.
pub const REQUIRED_FILES: &[&str] = &[
    "config.json",
    "vocab.json",
    "source.spm",
    "target.spm",
    "tokenizer_config.json",
];

pub const OPTIONAL_FILES: &[&str] = &["generation_config.json"];

/// Weight files in order of preference.
pub const WEIGHT_FILES: &[&str] = &[SAFETENSORS_WEIGHTS, PYTORCH_WEIGHTS];

/// True when `dir` exists and holds at least one entry.
pub fn is_populated(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_some())
        .unwrap_or(false)
}

/// First weight file present in the bundle.
pub fn weights_file(dir: &Path) -> Option<PathBuf> {
    WEIGHT_FILES
        .iter()
        .map(|name| dir.join(name))
        .find(|p| p.is_file())
}

/// Sum of the sizes of the regular files directly under `dir`.
pub fn bundle_size(dir: &Path) -> Result<u64> {
    let mut total = 0;
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let meta = entry.metadata()?;
        if meta.is_file() {
            total += meta.len();
        }
    }
    Ok(total)
}

/// Check the safetensors header and tensor table. Returns the tensor count.
pub fn validate_safetensors(path: &Path) -> Result<usize> {
    let data = std::fs::read(path)?;
    let tensors = safetensors::SafeTensors::deserialize(&data)?;
    Ok(tensors.names().len())
}

/// Size and digest of one artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub name: String,
    pub size_bytes: u64,
    pub sha256: String,
}

/// Written next to the artifacts once a download completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BundleManifest {
    pub direction: Direction,
    pub repo_id: String,
    pub files: Vec<ManifestEntry>,
}

impl BundleManifest {
    /// Hash every regular file in `dir` except the manifest itself.
    pub fn build(dir: &Path, direction: Direction) -> Result<Self> {
        let mut names = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            if name != MANIFEST_FILE {
                names.push(name);
            }
        }
        names.sort();

        let mut files = Vec::with_capacity(names.len());
        for name in names {
            let path = dir.join(&name);
            let size_bytes = std::fs::metadata(&path)?.len();
            let sha256 = sha256_file(&path)?;
            debug!("{} {} bytes sha256={}", name, size_bytes, sha256);
            files.push(ManifestEntry {
                name,
                size_bytes,
                sha256,
            });
        }

        Ok(Self {
            direction,
            repo_id: direction.repo_id().to_string(),
            files,
        })
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(MANIFEST_FILE), json)?;
        Ok(())
    }

    pub fn read(dir: &Path) -> Result<Option<Self>> {
        let path = dir.join(MANIFEST_FILE);
        if !path.exists() {
            return Ok(None);
        }
        let json = std::fs::read_to_string(path)?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// Re-hash the artifacts and compare against the recorded entries.
    pub fn verify(&self, dir: &Path) -> Result<()> {
        let mut problems = Vec::new();

        for entry in &self.files {
            let path = dir.join(&entry.name);
            if !path.is_file() {
                problems.push(format!("{} missing", entry.name));
                continue;
            }
            let size = std::fs::metadata(&path)?.len();
            if size != entry.size_bytes {
                problems.push(format!(
                    "{} size {} (expected {})",
                    entry.name, size, entry.size_bytes
                ));
                continue;
            }
            if sha256_file(&path)? != entry.sha256 {
                problems.push(format!("{} checksum mismatch", entry.name));
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::IntegrityError(problems.join(", ")))
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.files.iter().map(|f| f.size_bytes).sum()
    }
}

fn sha256_file(path: &Path) -> Result<String> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut hasher = Sha256::new();
    std::io::copy(&mut reader, &mut hasher)?;
    Ok(format!("{:x}", hasher.finalize()))
}
