//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. The path given with `--config`
//! 2. `$MAILSTASH_CONFIG` (environment variable)
//! 3. `~/.config/mailstash/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailstash\config.toml` (Windows)
//!
//! Unlike purely cosmetic settings, the connection sections have no defaults:
//! a missing `[server]`, `[mailboxes]`, or `[archive]` key is fatal at startup.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StashError};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// IMAP server connection settings. Required.
    pub server: ServerConfig,
    /// Source and destination mailbox names. Required.
    pub mailboxes: MailboxConfig,
    /// Archive output settings. Required.
    pub archive: ArchiveConfig,
    /// General behavior settings.
    #[serde(default)]
    pub general: GeneralConfig,
}

/// IMAP server connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server hostname (e.g. "imap.example.com").
    pub host: String,
    /// Server port (993 for IMAPS).
    pub port: u16,
    /// Login username.
    pub username: String,
    /// Login password (app password recommended).
    pub password: String,
}

/// Source and destination mailbox names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    /// Mailbox to poll (e.g. "INBOX").
    pub inbox: String,
    /// Mailbox processed messages are copied to before removal.
    pub outbox: String,
}

/// Archive output settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArchiveConfig {
    /// Directory archived files are written under. Created if absent.
    pub base_dir: PathBuf,
    /// Optional external program run once per archived `.eml` file,
    /// with the file path as its single argument.
    #[serde(default)]
    pub convert_path: Option<PathBuf>,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Seconds to sleep between poll cycles.
    pub poll_interval_secs: u64,
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override cache directory for the log file.
    pub cache_dir: Option<PathBuf>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: 600,
            log_level: "info".to_string(),
            cache_dir: None,
        }
    }
}

impl Config {
    /// Validate values that serde cannot check structurally.
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            return Err(StashError::Config("server.host must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(StashError::Config("server.port must be non-zero".into()));
        }
        if self.mailboxes.inbox.is_empty() || self.mailboxes.outbox.is_empty() {
            return Err(StashError::Config(
                "mailboxes.inbox and mailboxes.outbox must not be empty".into(),
            ));
        }
        if self.mailboxes.inbox == self.mailboxes.outbox {
            return Err(StashError::Config(
                "mailboxes.inbox and mailboxes.outbox must differ".into(),
            ));
        }
        Ok(())
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load and validate configuration from an explicit path or the standard
/// locations. A missing file or missing required key is a fatal `Config` error.
pub fn load_config(explicit: Option<&Path>) -> Result<Config> {
    let path = match explicit {
        Some(p) => p.to_path_buf(),
        None => config_file_path().ok_or_else(|| {
            StashError::Config("could not determine config file path".into())
        })?,
    };

    let contents = std::fs::read_to_string(&path).map_err(|e| {
        StashError::Config(format!("cannot read '{}': {e}", path.display()))
    })?;

    let config: Config = toml::from_str(&contents).map_err(|e| {
        StashError::Config(format!("cannot parse '{}': {e}", path.display()))
    })?;

    config.validate()?;
    tracing::info!(path = %path.display(), "Loaded config");
    Ok(config)
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    // 1. Environment variable override
    if let Ok(env_path) = std::env::var("MAILSTASH_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    // 2. Standard config directory
    dirs::config_dir().map(|d| d.join("mailstash").join("config.toml"))
}

/// Return the cache directory for the log file.
pub fn cache_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.cache_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailstash")
}
