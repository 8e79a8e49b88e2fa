//! Configuration types for DweepLingo
//!
//! Settings are layered with the `config` crate: built-in defaults, then an
//! optional `dweeplingo.toml`, then `DWEEPLINGO__SECTION__KEY` environment
//! variables.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DWEEPLINGO_CONFIG";

const DEFAULT_CONFIG_FILE: &str = "dweeplingo";
const ENV_PREFIX: &str = "DWEEPLINGO";

/// Top-level settings shared by the server and the fetcher
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub fetch: FetchConfig,
}

impl Settings {
    /// Load settings from defaults, an optional config file and the environment.
    ///
    /// `path` wins over `DWEEPLINGO_CONFIG`, which wins over `./dweeplingo.toml`.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(p) => config::File::from(p.to_path_buf()).required(true),
            None => match std::env::var(CONFIG_PATH_ENV) {
                Ok(p) => config::File::from(PathBuf::from(p)).required(true),
                Err(_) => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
            },
        };

        let settings = config::Config::builder()
            .add_source(file)
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }
}

/// Where the model runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DevicePreference {
    /// CUDA when available, otherwise CPU
    #[default]
    Auto,
    Cpu,
    Cuda,
}

/// Model storage and decoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Root directory holding one bundle per direction
    #[serde(default = "default_models_dir")]
    pub models_dir: PathBuf,

    #[serde(default)]
    pub device: DevicePreference,

    /// Inputs longer than this many tokens are truncated
    #[serde(default = "default_max_input_tokens")]
    pub max_input_tokens: usize,

    /// Upper bound on generated tokens, decoder start token included
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: usize,

    #[serde(default = "default_num_beams")]
    pub num_beams: usize,

    #[serde(default = "default_early_stopping")]
    pub early_stopping: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            models_dir: default_models_dir(),
            device: DevicePreference::default(),
            max_input_tokens: default_max_input_tokens(),
            max_output_tokens: default_max_output_tokens(),
            num_beams: default_num_beams(),
            early_stopping: default_early_stopping(),
        }
    }
}

fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_max_input_tokens() -> usize {
    512
}

fn default_max_output_tokens() -> usize {
    128
}

fn default_num_beams() -> usize {
    4
}

fn default_early_stopping() -> bool {
    true
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Directory with `index.html` and the frontend assets
    #[serde(default = "default_frontend_dir")]
    pub frontend_dir: PathBuf,

    #[serde(default = "default_cors_enabled")]
    pub cors_enabled: bool,

    /// Upper bound on a single translation, in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_max_concurrent_translations")]
    pub max_concurrent_translations: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            frontend_dir: default_frontend_dir(),
            cors_enabled: default_cors_enabled(),
            request_timeout_secs: default_request_timeout_secs(),
            max_concurrent_translations: default_max_concurrent_translations(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_frontend_dir() -> PathBuf {
    PathBuf::from("frontend")
}

fn default_cors_enabled() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    60
}

fn default_max_concurrent_translations() -> usize {
    get_num_cpus().min(4)
}

/// How the fetcher answers its confirmation prompts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ConfirmMode {
    /// Prompt on stdin
    #[default]
    Ask,
    /// Proceed and re-download everything
    Yes,
    /// Proceed but keep existing bundles
    Keep,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FetchConfig {
    #[serde(default)]
    pub confirm: ConfirmMode,
}

fn get_num_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|p| p.get())
        .unwrap_or(4)
}
