use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default configuration file name
pub const DEFAULT_CONFIG_FILE: &str = "buildstash.yaml";

/// Default gzip level for archives
pub const DEFAULT_COMPRESSION: u32 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Empty artifact cache spec")]
    EmptySpec,

    #[error("Invalid artifact cache spec: {spec}")]
    InvalidSpec { spec: String },

    #[error("First of two cache specs must be a local cache path, got {spec}")]
    NonLocalFirstTier { spec: String },

    #[error("Remote artifact caches only support HTTP and HTTPS: {url}")]
    UnsupportedScheme { url: String },

    #[error("Combined artifact caches must share one artifact root: {expected} != {found}")]
    MismatchedRoots { expected: PathBuf, found: PathBuf },

    #[error("Must provide at least one underlying artifact cache")]
    NoTiers,

    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Where a cache lives, decided once when configuration is read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheSpec {
    /// Directory of a local cache; `~` expands to the home directory
    Local(PathBuf),
    /// Base URL of a REST cache
    Url(String),
    /// Equivalent REST caches; the fastest reachable one is used
    UrlList(Vec<String>),
    /// A local cache that also stages archives for the remote one
    Pair { local: PathBuf, remote: Vec<String> },
}

impl CacheSpec {
    /// Parse the list form: one spec, or a `[local, remote]` pair
    pub fn parse<S: AsRef<str>>(specs: &[S]) -> Result<Self> {
        match specs {
            [] => Err(ConfigError::EmptySpec),
            [single] => single.as_ref().parse(),
            [first, second] => {
                let local = match first.as_ref().parse()? {
                    CacheSpec::Local(path) => path,
                    _ => {
                        return Err(ConfigError::NonLocalFirstTier {
                            spec: first.as_ref().to_string(),
                        })
                    }
                };
                let remote = match second.as_ref().parse()? {
                    CacheSpec::Url(url) => vec![url],
                    CacheSpec::UrlList(urls) => urls,
                    _ => {
                        return Err(ConfigError::InvalidSpec {
                            spec: second.as_ref().to_string(),
                        })
                    }
                };
                Ok(CacheSpec::Pair { local, remote })
            }
            _ => Err(ConfigError::InvalidSpec {
                spec: specs
                    .iter()
                    .map(|s| s.as_ref())
                    .collect::<Vec<_>>()
                    .join(", "),
            }),
        }
    }

    /// Candidate remote URLs, empty for a purely local spec
    pub fn remote_urls(&self) -> &[String] {
        match self {
            CacheSpec::Local(_) => &[],
            CacheSpec::Url(url) => std::slice::from_ref(url),
            CacheSpec::UrlList(urls) => urls,
            CacheSpec::Pair { remote, .. } => remote,
        }
    }
}

impl FromStr for CacheSpec {
    type Err = ConfigError;

    fn from_str(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() {
            return Err(ConfigError::EmptySpec);
        }
        if spec.starts_with('/') || spec.starts_with('~') {
            return Ok(CacheSpec::Local(PathBuf::from(spec)));
        }

        let mut urls: Vec<String> = spec
            .split('|')
            .map(str::trim)
            .filter(|url| !url.is_empty())
            .map(String::from)
            .collect();
        if urls.is_empty() || !urls.iter().all(|url| is_http_url(url)) {
            return Err(ConfigError::InvalidSpec {
                spec: spec.to_string(),
            });
        }
        if urls.len() == 1 {
            Ok(CacheSpec::Url(urls.remove(0)))
        } else {
            Ok(CacheSpec::UrlList(urls))
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

/// A spec as written in a config file: one string or a list of them
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SpecValue {
    One(String),
    Many(Vec<String>),
}

impl SpecValue {
    pub fn to_spec(&self) -> Result<CacheSpec> {
        match self {
            SpecValue::One(spec) => spec.parse(),
            SpecValue::Many(specs) => CacheSpec::parse(specs),
        }
    }
}

/// Artifact cache configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheConfig {
    /// Root that cached paths are archived relative to (default: `.`)
    #[serde(default = "default_artifact_root")]
    pub artifact_root: PathBuf,

    /// Cache consulted for hits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_from: Option<SpecValue>,

    /// Cache that finished work is inserted into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_to: Option<SpecValue>,

    /// gzip level, 0 for plain tar (default: 5)
    #[serde(default = "default_compression")]
    pub compression: u32,

    /// Appended to every cache root and URL so tasks never share a namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_name: Option<String>,

    /// Per-request timeout for REST calls (default: 4.0)
    #[serde(default = "default_remote_timeout_secs")]
    pub remote_timeout_secs: f64,

    /// Ping timeout when choosing among remote caches (default: 500)
    #[serde(default = "default_ping_timeout_ms")]
    pub ping_timeout_ms: u64,

    /// Pings per candidate (default: 2)
    #[serde(default = "default_ping_tries")]
    pub ping_tries: u32,
}

fn default_artifact_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_compression() -> u32 {
    DEFAULT_COMPRESSION
}

fn default_remote_timeout_secs() -> f64 {
    4.0
}

fn default_ping_timeout_ms() -> u64 {
    500
}

fn default_ping_tries() -> u32 {
    2
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            artifact_root: default_artifact_root(),
            read_from: None,
            write_to: None,
            compression: DEFAULT_COMPRESSION,
            task_name: None,
            remote_timeout_secs: default_remote_timeout_secs(),
            ping_timeout_ms: default_ping_timeout_ms(),
            ping_tries: default_ping_tries(),
        }
    }
}

impl CacheConfig {
    /// Load configuration from a YAML file, or JSON when the extension is `.json`
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let parsed = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| e.to_string())
        } else {
            serde_yaml::from_str(&content).map_err(|e| e.to_string())
        };
        parsed.map_err(|reason| ConfigError::Parse {
            path: path.to_path_buf(),
            reason,
        })
    }

    /// Create a default configuration and write it to a file
    pub fn init_file(path: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(&CacheConfig::default()).map_err(|e| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        })?;
        std::fs::write(path, yaml).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line overrides on top of file values
    pub fn merge(&mut self, overrides: &CliOverrides) {
        if let Some(root) = &overrides.artifact_root {
            self.artifact_root = root.clone();
        }
        if let Some(spec) = SpecValue::from_flags(&overrides.read_from) {
            self.read_from = Some(spec);
        }
        if let Some(spec) = SpecValue::from_flags(&overrides.write_to) {
            self.write_to = Some(spec);
        }
        if let Some(compression) = overrides.compression {
            self.compression = compression;
        }
        if let Some(task_name) = &overrides.task_name {
            self.task_name = Some(task_name.clone());
        }
    }

    /// `None` when reads are not configured
    pub fn read_spec(&self) -> Result<Option<CacheSpec>> {
        self.read_from.as_ref().map(SpecValue::to_spec).transpose()
    }

    /// `None` when writes are not configured
    pub fn write_spec(&self) -> Result<Option<CacheSpec>> {
        self.write_to.as_ref().map(SpecValue::to_spec).transpose()
    }

    /// Falls back to the default for negative or non-finite values
    pub fn remote_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.remote_timeout_secs)
            .unwrap_or_else(|_| Duration::from_secs_f64(default_remote_timeout_secs()))
    }

    pub fn ping_timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout_ms)
    }
}

impl SpecValue {
    fn from_flags(flags: &[String]) -> Option<Self> {
        match flags {
            [] => None,
            [single] => Some(SpecValue::One(single.clone())),
            many => Some(SpecValue::Many(many.to_vec())),
        }
    }
}

/// Values given on the command line; unset fields keep the file's value
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub artifact_root: Option<PathBuf>,
    /// One flag per element, so two flags form a `[local, remote]` pair
    pub read_from: Vec<String>,
    pub write_to: Vec<String>,
    pub compression: Option<u32>,
    pub task_name: Option<String>,
}
