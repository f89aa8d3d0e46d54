//! Deployment configuration for core entry points.
//!
//! # Responsibility
//! - Describe where data, logs and outgoing mail live.
//! - Carry the delivery presentation settings (subject, links).
//!
//! # Invariants
//! - Every field has a default, so a partial JSON file is valid.
//! - `validate()` runs on every load path.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_EMAIL_SUBJECT: &str = "Your Morning Quote";
const DEFAULT_SITE_URL: &str = "http://localhost:8080";

/// Core configuration loaded from a JSON file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    /// SQLite database file.
    pub db_path: PathBuf,
    /// `trace|debug|info|warn|error`.
    pub log_level: String,
    /// Absolute directory for rolling log files; `None` disables file logs.
    pub log_dir: Option<PathBuf>,
    /// Directory where the spool mailer drops outgoing messages.
    pub spool_dir: PathBuf,
    pub email_subject: String,
    /// Link shown in the mail footer.
    pub site_url: String,
    /// Optional affiliate tag appended to source search links.
    pub affiliate_tag: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from("requote.db"),
            log_level: crate::logging::default_log_level().to_string(),
            log_dir: None,
            spool_dir: PathBuf::from("outbox"),
            email_subject: DEFAULT_EMAIL_SUBJECT.to_string(),
            site_url: DEFAULT_SITE_URL.to_string(),
            affiliate_tag: String::new(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    Parse(serde_json::Error),
    Invalid(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config JSON: {err}"),
            Self::Invalid(message) => write!(f, "invalid config: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid(_) => None,
        }
    }
}

impl CoreConfig {
    /// Reads and validates a JSON config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Parses and validates config from JSON text.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.email_subject.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "email_subject must not be blank".to_string(),
            ));
        }
        if let Some(log_dir) = &self.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid(format!(
                    "log_dir must be an absolute path, got `{}`",
                    log_dir.display()
                )));
            }
        }
        Ok(())
    }
}
