//! Pipeline configuration.
//!
//! # Responsibility
//! - Resolve every on-disk location from one base directory.
//! - Load optional TOML overrides and validate tunables before a run starts.
//!
//! # Invariants
//! - All paths derive from `base_dir`; nothing reads a global location.
//! - A config that fails validation never reaches the coordinator.

use crate::store::retry::RetryPolicy;
use serde::Deserialize;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_BASE_DIR_NAME: &str = ".lexinbox";
const DEFAULT_FRAGMENT_PREFIX: &str = "quick";
const DEFAULT_QUEUE_FILE_NAME: &str = "quick.jsonl";
const LEDGER_FILE_NAME: &str = "ledger.sqlite3";
const LOCK_FILE_NAME: &str = "run.lock";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse {
        path: PathBuf,
        message: String,
    },
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse { path, message } => {
                write!(f, "invalid config `{}`: {message}", path.display())
            }
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Tunables for [`crate::pipeline::normalize::LemmaNormalizer`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    /// Inclusive token range for the extended-phrase rule.
    pub extended_min_tokens: usize,
    pub extended_max_tokens: usize,
    /// Preferred content tokens, checked before the longest-token choice.
    pub special_tokens: Vec<String>,
    /// Extra stopwords merged into the built-in English list.
    pub extra_stopwords: Vec<String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            extended_min_tokens: 5,
            extended_max_tokens: 8,
            special_tokens: ["rent", "bill", "receipt", "appointment", "prescription"]
                .iter()
                .map(|value| value.to_string())
                .collect(),
            extra_stopwords: Vec::new(),
        }
    }
}

/// Reachability checks run before any queue item is touched.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PrecheckConfig {
    /// URLs that must answer (any HTTP status) for the run to proceed.
    pub urls: Vec<String>,
    pub attempts: u32,
    /// Fixed delay between attempts.
    pub delay_ms: u64,
    pub timeout_ms: u64,
}

impl Default for PrecheckConfig {
    fn default() -> Self {
        Self {
            urls: Vec::new(),
            attempts: 3,
            delay_ms: 2_000,
            timeout_ms: 5_000,
        }
    }
}

impl PrecheckConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(self.attempts, self.delay_ms)
    }
}

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub base_dir: PathBuf,
    /// File-name prefix shared by all fragment naming variants.
    pub fragment_prefix: String,
    /// Canonical queue file name inside the inbox directory.
    pub queue_file_name: String,
    /// Retry policy for queue reads/writes on contended storage.
    pub file_retry: RetryPolicy,
    pub precheck: PrecheckConfig,
    pub normalizer: NormalizerConfig,
    /// Enrichment endpoint; `None` turns `run` into a dry run.
    pub enrich_url: Option<String>,
    pub enrich_timeout_ms: u64,
    /// Write rolling logs under `<base_dir>/logs` instead of stderr.
    pub file_logging: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self::for_base_dir(default_base_dir())
    }
}

impl PipelineConfig {
    /// Creates a default config rooted at `base_dir`.
    pub fn for_base_dir(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            fragment_prefix: DEFAULT_FRAGMENT_PREFIX.to_string(),
            queue_file_name: DEFAULT_QUEUE_FILE_NAME.to_string(),
            file_retry: RetryPolicy::default(),
            precheck: PrecheckConfig::default(),
            normalizer: NormalizerConfig::default(),
            enrich_url: None,
            enrich_timeout_ms: 30_000,
            file_logging: false,
        }
    }

    /// Parses TOML text. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str, origin: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text).map_err(|err| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads config from an optional TOML file, then applies a base-dir override.
    ///
    /// # Errors
    /// - Returns `Io` when the file cannot be read.
    /// - Returns `Parse`/`Invalid` when its content is unusable.
    pub fn load(path: Option<&Path>, base_dir_override: Option<PathBuf>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml_str(&text, path)?
            }
            None => Self::default(),
        };
        if let Some(base_dir) = base_dir_override {
            config.base_dir = base_dir;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("base_dir cannot be empty".to_string()));
        }
        if self.fragment_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "fragment_prefix cannot be empty".to_string(),
            ));
        }
        if self.queue_file_name.trim().is_empty() || self.queue_file_name.contains('/') {
            return Err(ConfigError::Invalid(format!(
                "queue_file_name must be a bare file name, got `{}`",
                self.queue_file_name
            )));
        }
        if self.file_retry.attempts == 0 || self.precheck.attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry attempts must be at least 1".to_string(),
            ));
        }
        let normalizer = &self.normalizer;
        if normalizer.extended_min_tokens <= 3
            || normalizer.extended_min_tokens > normalizer.extended_max_tokens
        {
            return Err(ConfigError::Invalid(format!(
                "extended phrase range {}..={} must start above 3 and be non-empty",
                normalizer.extended_min_tokens, normalizer.extended_max_tokens
            )));
        }
        Ok(())
    }

    /// Drop folder watched for fragments; also holds the canonical queue.
    pub fn inbox_dir(&self) -> PathBuf {
        self.base_dir.join("inbox")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.inbox_dir().join(&self.queue_file_name)
    }

    /// Timestamped queue snapshots written on commit.
    pub fn archive_dir(&self) -> PathBuf {
        self.base_dir.join("archive")
    }

    /// Run lock and rotation stamps.
    pub fn state_dir(&self) -> PathBuf {
        self.base_dir.join("state")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join(LOCK_FILE_NAME)
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.base_dir.join(LEDGER_FILE_NAME)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.base_dir.join("logs")
    }
}

fn default_base_dir() -> PathBuf {
    match std::env::var_os("HOME") {
        Some(home) if !home.is_empty() => PathBuf::from(home).join(DEFAULT_BASE_DIR_NAME),
        _ => PathBuf::from(DEFAULT_BASE_DIR_NAME),
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, PipelineConfig};
    use std::path::Path;

    #[test]
    fn paths_derive_from_base_dir() {
        let config = PipelineConfig::for_base_dir("/tmp/lexinbox-test");
        assert_eq!(
            config.queue_path(),
            Path::new("/tmp/lexinbox-test/inbox/quick.jsonl")
        );
        assert_eq!(
            config.lock_path(),
            Path::new("/tmp/lexinbox-test/state/run.lock")
        );
    }

    #[test]
    fn toml_overrides_keep_unset_defaults() {
        let config = PipelineConfig::from_toml_str(
            r#"
base_dir = "/data/anki"
enrich_url = "http://127.0.0.1:9000/enrich"

[normalizer]
special_tokens = ["haircut"]

[precheck]
urls = ["http://127.0.0.1:8765"]
attempts = 2
"#,
            Path::new("lexinbox.toml"),
        )
        .expect("valid toml");

        assert_eq!(config.queue_file_name, "quick.jsonl");
        assert_eq!(config.normalizer.special_tokens, vec!["haircut".to_string()]);
        assert_eq!(config.normalizer.extended_max_tokens, 8);
        assert_eq!(config.precheck.attempts, 2);
        assert_eq!(config.precheck.delay_ms, 2_000);
    }

    #[test]
    fn invalid_extended_range_is_rejected() {
        let err = PipelineConfig::from_toml_str(
            "[normalizer]\nextended_min_tokens = 3\n",
            Path::new("bad.toml"),
        )
        .expect_err("range starting at 3 overlaps short phrases");
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn malformed_toml_reports_origin() {
        let err = PipelineConfig::from_toml_str("base_dir = [", Path::new("broken.toml"))
            .expect_err("malformed toml");
        assert!(err.to_string().contains("broken.toml"));
    }
}
