//! Configuration system using TOML files.
//!
//! Config is looked up at `--config <path>` or in the OS-standard config
//! directory:
//! - Windows: %APPDATA%\track-enricher\config.toml
//! - macOS: ~/Library/Application Support/track-enricher/config.toml
//! - Linux: ~/.config/track-enricher/config.toml
//!
//! Every section uses `#[serde(default)]`, so a partial file only overrides
//! what it names. Command-line flags and environment variables are applied
//! on top by the CLI layer.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::enrichment::retry::RetryPolicy;
use crate::model::FieldSet;

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub library: LibraryConfig,
    pub schedule: ScheduleConfig,
    pub enrichment: EnrichmentConfig,
    pub lookup: LookupConfig,
    pub cooldown: CooldownConfig,
    pub state: StateConfig,
}

/// How change is detected between scans.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignatureMode {
    /// Size + modification time
    #[default]
    Cheap,
    /// Size + modification time + partial content hash
    Content,
}

/// Music library settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LibraryConfig {
    /// Root of the music tree
    pub music_folder: PathBuf,
    /// Recognized audio extensions (case-insensitive)
    pub extensions: Vec<String>,
    /// Change detection mode
    pub signature: SignatureMode,
}

impl Default for LibraryConfig {
    fn default() -> Self {
        Self {
            music_folder: PathBuf::from("/music"),
            extensions: ["mp3", "flac", "ogg", "m4a", "wav", "opus"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            signature: SignatureMode::Cheap,
        }
    }
}

/// Daemon scheduling
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Seconds from the start of one cycle to the start of the next
    pub scan_interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            scan_interval_secs: 3600,
        }
    }
}

/// Candidate selection and write-back
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichmentConfig {
    /// Fields a file must carry to count as complete
    pub required_fields: Vec<String>,
    /// Minimum match confidence to accept (0.0 to 1.0)
    pub min_confidence: f32,
    /// Files processed concurrently within a cycle
    pub concurrency: usize,
    /// Replace populated fields instead of only filling empty ones
    pub overwrite_existing: bool,
    /// Look up but never write
    pub dry_run: bool,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            required_fields: vec![
                "title".to_string(),
                "artist".to_string(),
                "album".to_string(),
            ],
            min_confidence: 0.8,
            concurrency: 2,
            overwrite_existing: false,
            dry_run: false,
        }
    }
}

/// External lookup behaviour
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LookupConfig {
    /// Total attempts per lookup, including the first
    pub max_retries: u32,
    /// Minimum spacing between outbound requests
    pub rate_limit_interval_ms: u64,
    /// Hard deadline per request
    pub request_timeout_secs: u64,
    /// First backoff delay; doubled after each transient failure
    pub backoff_base_ms: u64,
    /// Backoff ceiling
    pub backoff_max_ms: u64,
    /// Metadata service endpoint
    pub base_url: String,
    /// User-Agent sent with every request
    pub user_agent: String,
}

impl Default for LookupConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_interval_ms: 1100,
            request_timeout_secs: 15,
            backoff_base_ms: 500,
            backoff_max_ms: 30_000,
            base_url: crate::enrichment::musicbrainz::DEFAULT_BASE_URL.to_string(),
            user_agent: crate::enrichment::musicbrainz::DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl LookupConfig {
    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_millis(self.rate_limit_interval_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }
}

/// Suppression of repeatedly unmatched files
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    /// Consecutive "not found" results before a path is suppressed
    pub threshold: u32,
    /// How long a suppressed path is left alone
    pub window_secs: u64,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            threshold: 3,
            window_secs: 7 * 24 * 3600,
        }
    }
}

impl CooldownConfig {
    pub fn window(&self) -> chrono::Duration {
        i64::try_from(self.window_secs)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .unwrap_or(chrono::Duration::MAX)
    }
}

/// Persistent state location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StateConfig {
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

impl Config {
    /// Required fields as a parsed set.
    pub fn required_fields(&self) -> Result<FieldSet, ConfigError> {
        FieldSet::from_names(&self.enrichment.required_fields).map_err(ConfigError::UnknownField)
    }

    pub fn scan_interval(&self) -> Duration {
        Duration::from_secs(self.schedule.scan_interval_secs)
    }

    /// Check invariants the rest of the system relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.required_fields()?;
        if self.schedule.scan_interval_secs == 0 {
            return Err(ConfigError::Invalid("scan_interval_secs must be > 0".into()));
        }
        if self.enrichment.concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be > 0".into()));
        }
        if self.lookup.max_retries == 0 {
            return Err(ConfigError::Invalid("max_retries must be > 0".into()));
        }
        if !(0.0..=1.0).contains(&self.enrichment.min_confidence) {
            return Err(ConfigError::Invalid(
                "min_confidence must be between 0.0 and 1.0".into(),
            ));
        }
        if self.library.extensions.is_empty() {
            return Err(ConfigError::Invalid("extensions must not be empty".into()));
        }
        Ok(())
    }
}

// ============================================================================
// Config File Operations
// ============================================================================

/// Get the config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("track-enricher"))
}

/// Get the full path to the default config file
pub fn config_path() -> Option<PathBuf> {
    config_dir().map(|d| d.join("config.toml"))
}

/// Default location of the state store
pub fn default_state_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("track-enricher"))
        .unwrap_or_else(|| PathBuf::from(".track-enricher"))
        .join("state.json")
}

/// Load configuration.
///
/// With an explicit path, the file must exist and parse. Without one, the
/// default location is tried and a missing file yields defaults.
pub fn load(explicit: Option<&Path>) -> Result<Config, ConfigError> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => match config_path() {
            Some(p) if p.exists() => p,
            Some(p) => {
                tracing::info!("No config file found at {:?}, using defaults", p);
                return Ok(Config::default());
            }
            None => {
                tracing::warn!("Could not determine config directory, using defaults");
                return Ok(Config::default());
            }
        },
    };

    let contents =
        std::fs::read_to_string(&path).map_err(|e| ConfigError::Read(path.clone(), e))?;
    let config = toml::from_str(&contents).map_err(|e| ConfigError::Parse(path.clone(), e))?;
    tracing::info!("Loaded config from {:?}", path);
    Ok(config)
}

// ============================================================================
// Error Types
// ============================================================================

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Read(PathBuf, std::io::Error),

    #[error("Failed to parse config file {0}: {1}")]
    Parse(PathBuf, toml::de::Error),

    #[error("Unknown tag field in required_fields: {0}")]
    UnknownField(String),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl From<ConfigError> for crate::error::Error {
    fn from(e: ConfigError) -> Self {
        crate::error::Error::config(e.to_string())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[library]"));
        assert!(toml.contains("[schedule]"));
        assert!(toml.contains("[enrichment]"));
        assert!(toml.contains("[lookup]"));
        assert!(toml.contains("[cooldown]"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(
            config.required_fields().unwrap(),
            FieldSet::TITLE | FieldSet::ARTIST | FieldSet::ALBUM
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let toml = r#"
[library]
music_folder = "/srv/music"
signature = "content"

[cooldown]
threshold = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.library.music_folder, PathBuf::from("/srv/music"));
        assert_eq!(config.library.signature, SignatureMode::Content);
        assert_eq!(config.cooldown.threshold, 5);
        assert_eq!(config.schedule.scan_interval_secs, 3600);
        assert_eq!(config.lookup.max_retries, 3);
        assert!(!config.library.extensions.is_empty());
    }

    #[test]
    fn test_validate_rejects_unknown_field() {
        let mut config = Config::default();
        config.enrichment.required_fields.push("mood".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::UnknownField(name)) if name == "mood"
        ));
    }

    #[test]
    fn test_validate_rejects_zero_values() {
        let mut config = Config::default();
        config.lookup.max_retries = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.schedule.scan_interval_secs = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.enrichment.min_confidence = 1.5;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_explicit_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = load(Some(&dir.path().join("nope.toml")));
        assert!(matches!(result, Err(ConfigError::Read(_, _))));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[schedule]\nscan_interval_secs = 60\n").unwrap();

        let config = load(Some(&path)).unwrap();
        assert_eq!(config.scan_interval(), Duration::from_secs(60));
    }

    #[test]
    fn test_retry_policy_from_lookup_config() {
        let lookup = LookupConfig::default();
        let policy = lookup.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.base_delay, Duration::from_millis(500));
    }
}
