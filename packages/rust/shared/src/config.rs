//! Application configuration for cmsextract.
//!
//! User config lives at `~/.cmsextract/cmsextract.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CmsExtractError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cmsextract.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cmsextract";

// ---------------------------------------------------------------------------
// Config structs (matching cmsextract.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Global defaults.
    #[serde(default)]
    pub defaults: DefaultsConfig,

    /// Rendering engines and ceilings.
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Classification oracle settings.
    #[serde(default)]
    pub oracle: OracleConfig,

    /// Snippet extraction limits.
    #[serde(default)]
    pub extract: ExtractOptions,
}

/// `[defaults]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DefaultsConfig {
    /// Root under which `pages/` and `models/` are written.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Pages processed concurrently in bulk mode.
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,
}

impl Default for DefaultsConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_output_dir() -> String {
    ".".into()
}
fn default_concurrency() -> u32 {
    4
}

/// `[fetch]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Rendering engines, tried in order: "browser", "http".
    #[serde(default = "default_engines")]
    pub engines: Vec<String>,

    /// Hard ceiling per engine attempt.
    #[serde(default = "default_fetch_timeout")]
    pub timeout_secs: u64,

    /// User-Agent header sent by the HTTP engine.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            engines: default_engines(),
            timeout_secs: default_fetch_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

fn default_engines() -> Vec<String> {
    vec!["browser".into(), "http".into()]
}
fn default_fetch_timeout() -> u64 {
    180
}
fn default_user_agent() -> String {
    concat!("cmsextract/", env!("CARGO_PKG_VERSION")).into()
}

/// `[oracle]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleConfig {
    /// When false, every snippet goes through the deterministic rule.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// "ollama" or "chat" (OpenAI-compatible chat completions).
    #[serde(default = "default_provider")]
    pub provider: String,

    /// Base URL of the provider API.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model name passed to the provider.
    #[serde(default = "default_model")]
    pub model: String,

    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Hard ceiling per classification call.
    #[serde(default = "default_oracle_timeout")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: default_provider(),
            endpoint: default_endpoint(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            timeout_secs: default_oracle_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_provider() -> String {
    "ollama".into()
}
fn default_endpoint() -> String {
    "http://localhost:11434".into()
}
fn default_model() -> String {
    "gemma:2b".into()
}
fn default_api_key_env() -> String {
    "OPENROUTER_API_KEY".into()
}
fn default_oracle_timeout() -> u64 {
    60
}

/// `[extract]` section: caps that bound the candidate snippet sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractOptions {
    /// Overall cap across all kinds.
    pub max_snippets: usize,
    pub max_headings: usize,
    pub max_paragraphs: usize,
    pub max_cards: usize,
    /// Paragraphs shorter than this are not "substantial".
    pub min_paragraph_chars: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            max_snippets: 15,
            max_headings: 6,
            max_paragraphs: 5,
            max_cards: 6,
            min_paragraph_chars: 40,
        }
    }
}

// ---------------------------------------------------------------------------
// Pipeline config (runtime, merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime pipeline configuration. Passed explicitly into each pipeline, so
/// concurrent pipelines may run with different settings.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Root under which `pages/` and `models/` are written.
    pub output_root: PathBuf,
    /// Bulk-mode concurrency.
    pub concurrency: u32,
    /// Ordered rendering engine names.
    pub engines: Vec<String>,
    pub fetch_timeout_secs: u64,
    pub user_agent: String,
    /// Oracle settings; `oracle.enabled == false` forces the fallback rule.
    pub oracle: OracleConfig,
    pub extract: ExtractOptions,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            output_root: PathBuf::from(&config.defaults.output_dir),
            concurrency: config.defaults.concurrency,
            engines: config.fetch.engines.clone(),
            fetch_timeout_secs: config.fetch.timeout_secs,
            user_agent: config.fetch.user_agent.clone(),
            oracle: config.oracle.clone(),
            extract: config.extract.clone(),
        }
    }
}

impl PipelineConfig {
    /// Default configuration writing under `output_root`, oracle disabled,
    /// HTTP engine only. Used by tests and offline runs.
    pub fn offline(output_root: impl Into<PathBuf>) -> Self {
        let mut config = Self::from(&AppConfig::default());
        config.output_root = output_root.into();
        config.oracle.enabled = false;
        config.engines = vec!["http".into()];
        config
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cmsextract/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| CmsExtractError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cmsextract/cmsextract.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        CmsExtractError::config(format!("failed to read {}: {e}", path.display()))
    })?;

    toml::from_str(&content).map_err(|e| {
        CmsExtractError::config(format!("failed to parse {}: {e}", path.display()))
    })
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CmsExtractError::write(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CmsExtractError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CmsExtractError::write(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
