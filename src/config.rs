//! Configuration from files, environment variables and the command line.
//!
//! Sources are applied in increasing precedence: defaults, the first config
//! file found, `MODELSEED_*` environment variables, then CLI flags.

use crate::cache::CachePolicy;
use crate::catalog::{store_label, CatalogOptions};
use crate::constants::{
    DEFAULT_ANNOUNCE_PATH, DEFAULT_ARTIFACT_DIR, DEFAULT_HTTP_PORT, DEFAULT_NAMESPACE,
    DEFAULT_TRACKER_PORT, MODEL_PIECE_LENGTH, STORE_PIECE_LENGTH,
};
use crate::manifest::MissingBlobPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, UdpSocket};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub field: String,
    pub message: String,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {}: {reason}", path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("{var} has invalid value {value:?}")]
    InvalidEnv { var: String, value: String },

    #[error("invalid configuration: {}", format_issues(.0))]
    Validation(Vec<ValidationIssue>),
}

fn format_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub torrent: TorrentConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Location and layout of the blob store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub root: PathBuf,
    pub namespace: String,
    pub missing_blob: MissingBlobPolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Announce URL; derived from the local address when unset.
    pub announce: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TorrentConfig {
    pub model_piece_length: u64,
    pub store_piece_length: u64,
    /// `info.name` label; the store root's directory name when unset.
    pub label: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Artifact directory; `<store root>/torrents` when unset.
    pub dir: Option<PathBuf>,
    pub policy: CachePolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub max_concurrent_builds: usize,
    pub store_torrent: bool,
    /// Seconds between discovery passes; 0 disables rescanning.
    pub rescan_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: IpAddr,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        let root = dirs::home_dir()
            .map(|home| home.join(".ollama/models"))
            .unwrap_or_else(|| PathBuf::from("/usr/share/ollama/.ollama/models"));
        Self {
            root,
            namespace: DEFAULT_NAMESPACE.to_string(),
            missing_blob: MissingBlobPolicy::Fail,
        }
    }
}

impl Default for TorrentConfig {
    fn default() -> Self {
        Self {
            model_piece_length: MODEL_PIECE_LENGTH,
            store_piece_length: STORE_PIECE_LENGTH,
            label: None,
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            max_concurrent_builds: 1,
            store_torrent: false,
            rescan_interval_secs: 0,
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_HTTP_PORT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Command-line values that override every other source.
#[derive(Debug, Clone, Default)]
pub struct CliArgs {
    pub config_file: Option<PathBuf>,
    pub store_root: Option<PathBuf>,
    pub announce: Option<String>,
    pub bind: Option<IpAddr>,
    pub port: Option<u16>,
    pub cache_dir: Option<PathBuf>,
    pub cache_policy: Option<CachePolicy>,
    pub store_torrent: bool,
    pub rescan_interval_secs: Option<u64>,
    pub max_concurrent_builds: Option<usize>,
    pub log_level: Option<String>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let parse_err = |reason: String| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        };

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        match ext.as_deref() {
            Some("json") => serde_json::from_str(&content).map_err(|e| parse_err(e.to_string())),
            _ => toml::from_str(&content).map_err(|e| parse_err(e.to_string())),
        }
    }

    /// Loads the first config file that exists, or the defaults.
    pub fn from_default_locations() -> Result<Self, ConfigError> {
        let candidates = [
            dirs::config_dir().map(|d| d.join("modelseed/config.toml")),
            Some(PathBuf::from("/etc/modelseed/config.toml")),
            Some(PathBuf::from("./modelseed.toml")),
        ];

        for path in candidates.iter().flatten() {
            if path.exists() {
                tracing::info!("Loading config from: {}", path.display());
                return Self::from_file(path);
            }
        }

        Ok(Self::default())
    }

    pub fn merge_from_env(self) -> Result<Self, ConfigError> {
        self.merge_from_vars(|name| std::env::var(name).ok())
    }

    /// Applies `MODELSEED_*` variables looked up through `var`.
    pub fn merge_from_vars(
        mut self,
        var: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        fn parsed<T: std::str::FromStr>(name: &str, value: String) -> Result<T, ConfigError> {
            value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: name.to_string(),
                value,
            })
        }

        if let Some(val) = var("MODELSEED_STORE_ROOT") {
            self.store.root = PathBuf::from(val);
        }
        if let Some(val) = var("MODELSEED_NAMESPACE") {
            self.store.namespace = val;
        }
        if let Some(val) = var("MODELSEED_MISSING_BLOB") {
            self.store.missing_blob = match val.to_ascii_lowercase().as_str() {
                "fail" => MissingBlobPolicy::Fail,
                "skip" => MissingBlobPolicy::Skip,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: "MODELSEED_MISSING_BLOB".into(),
                        value: val,
                    })
                }
            };
        }
        if let Some(val) = var("MODELSEED_ANNOUNCE") {
            self.tracker.announce = Some(val);
        }
        if let Some(val) = var("MODELSEED_TORRENT_LABEL") {
            self.torrent.label = Some(val);
        }
        if let Some(val) = var("MODELSEED_CACHE_DIR") {
            self.cache.dir = Some(PathBuf::from(val));
        }
        if let Some(val) = var("MODELSEED_CACHE_POLICY") {
            self.cache.policy = parsed("MODELSEED_CACHE_POLICY", val)?;
        }
        if let Some(val) = var("MODELSEED_MAX_CONCURRENT_BUILDS") {
            self.catalog.max_concurrent_builds = parsed("MODELSEED_MAX_CONCURRENT_BUILDS", val)?;
        }
        if let Some(val) = var("MODELSEED_STORE_TORRENT") {
            self.catalog.store_torrent = parsed("MODELSEED_STORE_TORRENT", val)?;
        }
        if let Some(val) = var("MODELSEED_RESCAN_INTERVAL") {
            self.catalog.rescan_interval_secs = parsed("MODELSEED_RESCAN_INTERVAL", val)?;
        }
        if let Some(val) = var("MODELSEED_BIND") {
            self.server.bind = parsed("MODELSEED_BIND", val)?;
        }
        if let Some(val) = var("MODELSEED_PORT") {
            self.server.port = parsed("MODELSEED_PORT", val)?;
        }
        if let Some(val) = var("MODELSEED_LOG_LEVEL") {
            self.logging.level = val;
        }

        Ok(self)
    }

    pub fn merge_from_cli(mut self, cli: &CliArgs) -> Self {
        if let Some(ref root) = cli.store_root {
            self.store.root = root.clone();
        }
        if let Some(ref announce) = cli.announce {
            self.tracker.announce = Some(announce.clone());
        }
        if let Some(bind) = cli.bind {
            self.server.bind = bind;
        }
        if let Some(port) = cli.port {
            self.server.port = port;
        }
        if let Some(ref dir) = cli.cache_dir {
            self.cache.dir = Some(dir.clone());
        }
        if let Some(policy) = cli.cache_policy {
            self.cache.policy = policy;
        }
        if cli.store_torrent {
            self.catalog.store_torrent = true;
        }
        if let Some(secs) = cli.rescan_interval_secs {
            self.catalog.rescan_interval_secs = secs;
        }
        if let Some(n) = cli.max_concurrent_builds {
            self.catalog.max_concurrent_builds = n;
        }
        if let Some(ref level) = cli.log_level {
            self.logging.level = level.clone();
        }
        self
    }

    /// Loads every source; an explicit config file replaces the search.
    pub fn load_with_cli(cli: &CliArgs) -> Result<Self, ConfigError> {
        let base = match cli.config_file {
            Some(ref path) => Self::from_file(path)?,
            None => Self::from_default_locations()?,
        };
        Ok(base.merge_from_env()?.merge_from_cli(cli))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut issues = Vec::new();
        let mut issue = |field: &str, message: String| {
            issues.push(ValidationIssue {
                field: field.to_string(),
                message,
            })
        };

        if self.store.root.as_os_str().is_empty() {
            issue("store.root", "Store root cannot be empty".to_string());
        }
        if self.store.namespace.is_empty()
            || self.store.namespace.contains(['/', '\\'])
            || self.store.namespace == ".."
        {
            issue(
                "store.namespace",
                format!("Invalid namespace '{}'", self.store.namespace),
            );
        }

        if let Some(ref announce) = self.tracker.announce {
            let valid_schemes = ["http://", "https://", "udp://"];
            if !valid_schemes.iter().any(|s| announce.starts_with(s))
                || announce.len() <= announce.find("://").map_or(0, |i| i + 3)
            {
                issue(
                    "tracker.announce",
                    format!("Invalid announce URL '{announce}'"),
                );
            }
        }

        if let Some(ref label) = self.torrent.label {
            if label.is_empty() || label == "." || label == ".." || label.contains(['/', '\\']) {
                issue("torrent.label", format!("Invalid torrent label '{label}'"));
            }
        }
        if self.torrent.model_piece_length == 0 {
            issue(
                "torrent.model_piece_length",
                "Piece length must be positive".to_string(),
            );
        }
        if self.torrent.store_piece_length == 0 {
            issue(
                "torrent.store_piece_length",
                "Piece length must be positive".to_string(),
            );
        }

        if self.catalog.max_concurrent_builds == 0 {
            issue(
                "catalog.max_concurrent_builds",
                "At least one build must be allowed".to_string(),
            );
        }

        let valid_levels = ["error", "warn", "info", "debug", "trace"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            issue(
                "logging.level",
                format!(
                    "Invalid log level '{}'. Valid levels: {}",
                    self.logging.level,
                    valid_levels.join(", ")
                ),
            );
        }

        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(issues))
        }
    }

    /// The configured announce URL, or one pointing at the companion tracker
    /// on this host.
    pub fn announce_url(&self) -> String {
        self.tracker
            .announce
            .clone()
            .unwrap_or_else(|| default_announce(local_ip()))
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.cache
            .dir
            .clone()
            .unwrap_or_else(|| self.store.root.join(DEFAULT_ARTIFACT_DIR))
    }

    pub fn torrent_label(&self) -> String {
        self.torrent
            .label
            .clone()
            .unwrap_or_else(|| store_label(&self.store.root))
    }

    pub fn rescan_interval(&self) -> Option<Duration> {
        (self.catalog.rescan_interval_secs > 0)
            .then(|| Duration::from_secs(self.catalog.rescan_interval_secs))
    }

    pub fn catalog_options(&self) -> CatalogOptions {
        CatalogOptions {
            announce: self.announce_url(),
            label: self.torrent_label(),
            model_piece_length: self.torrent.model_piece_length,
            store_piece_length: self.torrent.store_piece_length,
            max_concurrent_builds: self.catalog.max_concurrent_builds,
            store_torrent: self.catalog.store_torrent,
        }
    }
}

pub fn default_announce(ip: IpAddr) -> String {
    let host = match ip {
        IpAddr::V4(v4) => v4.to_string(),
        IpAddr::V6(v6) => format!("[{v6}]"),
    };
    format!("http://{host}:{DEFAULT_TRACKER_PORT}{DEFAULT_ANNOUNCE_PATH}")
}

/// Address the OS would route outbound traffic from.
///
/// Connecting a UDP socket sends nothing; it only selects a route.
pub fn local_ip() -> IpAddr {
    UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))
        .and_then(|socket| {
            socket.connect((Ipv4Addr::new(8, 8, 8, 8), 80))?;
            socket.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
