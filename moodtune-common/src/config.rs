//! Configuration loading and resolution
//!
//! Bootstrap configuration for the MoodTune service. Values are resolved in
//! priority order:
//! 1. Command-line argument (applied by the binary)
//! 2. Environment variable (`MOODTUNE_*`, `OPENAI_API_KEY`)
//! 3. TOML config file
//! 4. Compiled defaults
//!
//! A missing TOML file is not an error: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Top-level TOML configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub curator: CuratorConfig,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub rag: RagConfig,

    /// Emotion label → acceptance ranges. Empty means "use compiled defaults".
    #[serde(default)]
    pub emotions: BTreeMap<String, EmotionRangeConfig>,
}

/// HTTP server bootstrap settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (e.g. "info", "moodtune_rag=debug")
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Document store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    OpenSearch,
    Sqlite,
    Memory,
}

impl std::str::FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "opensearch" => Ok(Self::OpenSearch),
            "sqlite" => Ok(Self::Sqlite),
            "memory" => Ok(Self::Memory),
            other => Err(Error::Config(format!(
                "Unknown store backend '{}' (expected opensearch, sqlite or memory)",
                other
            ))),
        }
    }
}

/// Document store connection settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_backend")]
    pub backend: StoreBackend,
    #[serde(default = "default_os_host")]
    pub host: String,
    #[serde(default = "default_os_port")]
    pub port: u16,
    #[serde(default = "default_os_user")]
    pub user: String,
    #[serde(default = "default_os_password")]
    pub password: String,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub verify_certs: bool,
    #[serde(default = "default_index")]
    pub index: String,
    /// SQLite database file (sqlite backend only)
    #[serde(default)]
    pub sqlite_path: Option<PathBuf>,
    #[serde(default = "default_store_timeout")]
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_backend(),
            host: default_os_host(),
            port: default_os_port(),
            user: default_os_user(),
            password: default_os_password(),
            use_ssl: false,
            verify_certs: false,
            index: default_index(),
            sqlite_path: None,
            timeout_secs: default_store_timeout(),
        }
    }
}

impl StoreConfig {
    /// Base URL of the OpenSearch cluster
    pub fn base_url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }

    /// SQLite file: configured path, else `<data dir>/moodtune/moodtune.db`
    pub fn sqlite_path_or_default(&self) -> PathBuf {
        self.sqlite_path.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("moodtune"))
                .unwrap_or_else(|| PathBuf::from("."))
                .join("moodtune.db")
        })
    }
}

/// Generative model settings (OpenAI-compatible API)
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CuratorConfig {
    #[serde(default = "default_openai_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    #[serde(default = "default_embedding_dim")]
    pub embedding_dim: usize,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_curator_timeout")]
    pub timeout_secs: u64,
}

impl Default for CuratorConfig {
    fn default() -> Self {
        Self {
            base_url: default_openai_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            embedding_dim: default_embedding_dim(),
            api_key: None,
            timeout_secs: default_curator_timeout(),
        }
    }
}

/// Catalog (music service) settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CatalogConfig {
    #[serde(default = "default_music_service_url")]
    pub base_url: String,
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,
    #[serde(default = "default_catalog_timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_music_service_url(),
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_catalog_timeout(),
        }
    }
}

/// Retrieval-augmentation tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RagConfig {
    #[serde(default = "default_min_tracks")]
    pub min_tracks: usize,
    #[serde(default = "default_max_relax_steps")]
    pub max_relax_steps: u32,
    #[serde(default = "default_relax_step")]
    pub relax_step: f64,
    #[serde(default = "default_augment_rounds")]
    pub augment_rounds: u32,
    #[serde(default = "default_avoid_cap")]
    pub avoid_cap: usize,
    #[serde(default = "default_call_timeout")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_auto_seed")]
    pub auto_seed: bool,
    #[serde(default = "default_seed_per_emotion")]
    pub seed_per_emotion: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            min_tracks: default_min_tracks(),
            max_relax_steps: default_max_relax_steps(),
            relax_step: default_relax_step(),
            augment_rounds: default_augment_rounds(),
            avoid_cap: default_avoid_cap(),
            call_timeout_secs: default_call_timeout(),
            auto_seed: default_auto_seed(),
            seed_per_emotion: default_seed_per_emotion(),
        }
    }
}

/// Acceptance ranges for one emotion, as `[lo, hi]` pairs
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct EmotionRangeConfig {
    pub valence: [f64; 2],
    pub energy: [f64; 2],
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    5780
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_backend() -> StoreBackend {
    StoreBackend::OpenSearch
}

fn default_os_host() -> String {
    "opensearch".to_string()
}

fn default_os_port() -> u16 {
    9200
}

fn default_os_user() -> String {
    "admin".to_string()
}

fn default_os_password() -> String {
    "admin".to_string()
}

fn default_index() -> String {
    "moodtune_tracks".to_string()
}

fn default_store_timeout() -> u64 {
    10
}

fn default_openai_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_embedding_dim() -> usize {
    1536
}

fn default_curator_timeout() -> u64 {
    30
}

fn default_music_service_url() -> String {
    "http://localhost:8020".to_string()
}

fn default_requests_per_second() -> u32 {
    5
}

fn default_catalog_timeout() -> u64 {
    30
}

fn default_min_tracks() -> usize {
    20
}

fn default_max_relax_steps() -> u32 {
    2
}

fn default_relax_step() -> f64 {
    0.1
}

fn default_augment_rounds() -> u32 {
    4
}

fn default_avoid_cap() -> usize {
    100
}

fn default_call_timeout() -> u64 {
    30
}

fn default_auto_seed() -> bool {
    true
}

fn default_seed_per_emotion() -> usize {
    25
}

/// Floor applied to `rag.min_tracks` from any source
pub const MIN_TRACKS_FLOOR: usize = 20;

/// Validate API key (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Default config file location: `~/.config/moodtune/moodtune.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("moodtune").join("moodtune.toml"))
}

/// Read and parse a TOML config file
pub fn read_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))
}

/// Load configuration from `path` (or the default location)
///
/// A missing file yields compiled defaults with a warning. A file that exists
/// but does not parse is a configuration error.
pub fn load_config(path: Option<&Path>) -> Result<TomlConfig> {
    let path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    let config = match path {
        Some(p) if p.exists() => {
            info!("Loading configuration from {}", p.display());
            read_toml_config(&p)?
        }
        Some(p) => {
            warn!("Config file not found at {}, using defaults", p.display());
            TomlConfig::default()
        }
        None => {
            warn!("Could not determine config directory, using defaults");
            TomlConfig::default()
        }
    };

    let mut config = config;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Apply environment variable overrides on top of a parsed config
pub fn apply_env_overrides(config: &mut TomlConfig) -> Result<()> {
    if let Some(v) = env_var("MOODTUNE_STORE_BACKEND") {
        config.store.backend = v.parse()?;
    }
    if let Some(v) = env_var("MOODTUNE_OS_HOST") {
        config.store.host = v;
    }
    if let Some(v) = env_var("MOODTUNE_OS_PORT") {
        config.store.port = parse_env("MOODTUNE_OS_PORT", &v)?;
    }
    if let Some(v) = env_var("MOODTUNE_OS_USER") {
        config.store.user = v;
    }
    if let Some(v) = env_var("MOODTUNE_OS_PASSWORD") {
        config.store.password = v;
    }
    if let Some(v) = env_var("MOODTUNE_OS_INDEX") {
        config.store.index = v;
    }
    if let Some(v) = env_var("MOODTUNE_SQLITE_PATH") {
        config.store.sqlite_path = Some(PathBuf::from(v));
    }
    if let Some(v) = env_var("MOODTUNE_MUSIC_SERVICE_URL") {
        config.catalog.base_url = v;
    }
    if let Some(v) = env_var("MOODTUNE_OPENAI_MODEL") {
        config.curator.model = v;
    }
    if let Some(v) = env_var("MOODTUNE_MIN_TRACKS") {
        config.rag.min_tracks = parse_env("MOODTUNE_MIN_TRACKS", &v)?;
    }
    if let Some(v) = env_var("MOODTUNE_AUTO_SEED") {
        config.rag.auto_seed = v.trim().eq_ignore_ascii_case("true");
    }

    // Environment key wins over TOML; warn when both are set
    if let Some(key) = env_var("OPENAI_API_KEY").filter(|k| is_valid_key(k)) {
        if config.curator.api_key.as_deref().is_some_and(is_valid_key) {
            warn!("OpenAI API key found in both environment and TOML. Using environment.");
        }
        config.curator.api_key = Some(key);
    }

    config.rag.min_tracks = config.rag.min_tracks.max(MIN_TRACKS_FLOOR);
    Ok(())
}

/// Resolve the generative model API key or fail with a clear configuration error
pub fn resolve_openai_api_key(config: &CuratorConfig) -> Result<String> {
    match config.api_key.as_deref() {
        Some(key) if is_valid_key(key) => Ok(key.trim().to_string()),
        _ => Err(Error::Config(
            "OpenAI API key not configured. Please configure using one of:\n\
             1. Environment: OPENAI_API_KEY=your-key-here\n\
             2. TOML config: ~/.config/moodtune/moodtune.toml ([curator] api_key = \"your-key\")"
                .to_string(),
        )),
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| Error::Config(format!("Invalid value for {}: {}", name, e)))
}
