//! Configuration management for cmpd

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog API configuration
    #[serde(default)]
    pub api: ApiConfig,

    /// Artifact store configuration
    #[serde(default)]
    pub store: StoreConfig,

    /// Output tree configuration
    #[serde(default)]
    pub output: OutputConfig,

    /// Logging configuration
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the catalog API
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Static headers sent with every request
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
}

fn default_base_url() -> String {
    "https://addons-ecs.forgesvc.net/api/v2".to_string()
}

fn default_timeout() -> u64 {
    30
}

fn default_headers() -> BTreeMap<String, String> {
    [
        (
            "User-Agent",
            "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) \
             Chrome/79.0.3945.88 Safari/537.36",
        ),
        ("DNT", "1"),
        ("Accept", "*/*"),
        ("Sec-Fetch-Site", "cross-site"),
        ("Sec-Fetch-Mode", "cors"),
        ("Accept-Language", "en-US,en;q=0.9,ja;q=0.8,fil;q=0.7"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect()
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            headers: default_headers(),
        }
    }
}

impl ApiConfig {
    /// Return a copy with `key` set to `value`, replacing any existing value
    pub fn with_header(mut self, key: &str, value: &str) -> Self {
        self.headers.insert(key.to_string(), value.to_string());
        self
    }

    /// Return a copy without `key`
    pub fn without_header(mut self, key: &str) -> Self {
        self.headers.remove(key);
        self
    }

    /// URL of the package info endpoint
    pub fn package_info_url(&self, package_id: i64) -> String {
        format!("{}/addon/{}", self.base_url.trim_end_matches('/'), package_id)
    }

    /// URL of the package file endpoint
    pub fn package_file_url(&self, package_id: i64, file_id: i64) -> String {
        format!(
            "{}/addon/{}/file/{}",
            self.base_url.trim_end_matches('/'),
            package_id,
            file_id
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Root directory of the artifact store
    #[serde(default = "default_store_dir")]
    pub dir: PathBuf,

    /// Read buffer size for streamed downloads
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Download attempts per file before giving up
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Base delay between attempts, multiplied by the attempt number
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,

    /// Draw a progress bar while downloading
    #[serde(default = "default_true")]
    pub show_progress: bool,
}

fn default_store_dir() -> PathBuf {
    PathBuf::from("cmpd_store")
}

fn default_chunk_size() -> usize {
    // 512 KiB
    1024 * 512
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_delay() -> u64 {
    1000
}

fn default_true() -> bool {
    true
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            dir: default_store_dir(),
            chunk_size: default_chunk_size(),
            max_attempts: default_max_attempts(),
            retry_delay_ms: default_retry_delay(),
            show_progress: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory the modpack is assembled into
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,

    /// Subdirectory (relative to `dir`) that receives dependency files
    #[serde(default = "default_mods_dir")]
    pub mods_dir: PathBuf,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("modpack")
}

fn default_mods_dir() -> PathBuf {
    PathBuf::from("mods")
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            mods_dir: default_mods_dir(),
        }
    }
}

impl OutputConfig {
    /// Absolute-or-relative path of the mods directory
    pub fn mods_path(&self) -> PathBuf {
        self.dir.join(&self.mods_dir)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log file, rewritten on every run
    #[serde(default = "default_log_file")]
    pub file: PathBuf,

    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_file() -> PathBuf {
    PathBuf::from("cmpd.log")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: default_log_file(),
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from file, or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = path.map(PathBuf::from).or_else(|| {
            directories::ProjectDirs::from("", "", "cmpd")
                .map(|d| d.config_dir().join("cmpd.toml"))
                .filter(|p| p.exists())
        });

        match config_path {
            Some(path) => {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("Failed to read config: {}", path.display()))?;
                toml::from_str(&content)
                    .with_context(|| format!("Failed to parse config: {}", path.display()))
            }
            None => Ok(Config::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.store.dir, PathBuf::from("cmpd_store"));
        assert_eq!(config.output.dir, PathBuf::from("modpack"));
        assert_eq!(config.output.mods_path(), PathBuf::from("modpack/mods"));
        assert_eq!(config.store.max_attempts, 3);
        assert_eq!(config.store.chunk_size, 512 * 1024);
        assert!(config.api.headers.contains_key("User-Agent"));
    }

    #[test]
    fn test_header_updates_return_new_value() {
        let base = ApiConfig::default();
        let updated = base.clone().with_header("X-Api-Key", "secret");
        assert_eq!(updated.headers.get("X-Api-Key").map(String::as_str), Some("secret"));
        assert!(!base.headers.contains_key("X-Api-Key"));

        let stripped = updated.without_header("DNT");
        assert!(!stripped.headers.contains_key("DNT"));
        assert!(base.headers.contains_key("DNT"));
    }

    #[test]
    fn test_endpoint_urls() {
        let api = ApiConfig {
            base_url: "http://catalog.test/api/".to_string(),
            ..ApiConfig::default()
        };
        assert_eq!(api.package_info_url(238222), "http://catalog.test/api/addon/238222");
        assert_eq!(
            api.package_file_url(1, 11),
            "http://catalog.test/api/addon/1/file/11"
        );
    }

    #[test]
    fn test_partial_toml() {
        let config: Config = toml::from_str(
            r#"
            [store]
            dir = "/tmp/store"
            max_attempts = 5

            [api]
            timeout_secs = 10
            "#,
        )
        .unwrap();

        assert_eq!(config.store.dir, PathBuf::from("/tmp/store"));
        assert_eq!(config.store.max_attempts, 5);
        assert_eq!(config.store.chunk_size, 512 * 1024);
        assert_eq!(config.api.timeout_secs, 10);
        assert_eq!(config.api.base_url, default_base_url());
        assert_eq!(config.output.dir, PathBuf::from("modpack"));
    }

    #[test]
    fn test_load_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cmpd.toml");
        std::fs::write(&path, "[output]\ndir = \"pack\"\n").unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.output.dir, PathBuf::from("pack"));

        let missing = dir.path().join("missing.toml");
        assert!(Config::load(Some(&missing)).is_err());
    }
}
