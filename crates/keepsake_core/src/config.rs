//! Runtime configuration: remote service credentials and app settings.
//!
//! # Invariants
//! - Blank values are treated as absent.
//! - Remote sync is enabled only when both `api_key` and `database_url` are
//!   present; anything less runs the session local-only without an error.

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAMESPACE: &str = "shared";
pub const DEFAULT_ANNIVERSARY: &str = "2023-01-01T00:00:00+00:00";
pub const DEFAULT_DB_FILE_NAME: &str = "keepsake.sqlite3";

const ENV_PREFIX: &str = "KEEPSAKE_";

#[derive(Debug)]
pub enum ConfigError {
    Io(std::io::Error),
    Parse(serde_json::Error),
    InvalidAnniversary(String),
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "failed to read config: {err}"),
            Self::Parse(err) => write!(f, "failed to parse config: {err}"),
            Self::InvalidAnniversary(value) => {
                write!(f, "anniversary `{value}` is not an RFC 3339 timestamp")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            Self::Parse(err) => Some(err),
            Self::InvalidAnniversary(_) => None,
        }
    }
}

impl From<std::io::Error> for ConfigError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Hosted service credentials. Supplied at build/deploy time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub database_url: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub storage_bucket: Option<String>,
    #[serde(default)]
    pub messaging_sender_id: Option<String>,
    #[serde(default)]
    pub app_id: Option<String>,
    /// Shared path prefix all devices read and write under.
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            database_url: None,
            project_id: None,
            storage_bucket: None,
            messaging_sender_id: None,
            app_id: None,
            namespace: default_namespace(),
        }
    }
}

impl SyncConfig {
    /// Reads `KEEPSAKE_FIREBASE_*` and `KEEPSAKE_SYNC_NAMESPACE`.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |suffix: &str| non_blank(lookup(&format!("{ENV_PREFIX}{suffix}")));
        Self {
            api_key: var("FIREBASE_API_KEY"),
            database_url: var("FIREBASE_DATABASE_URL"),
            project_id: var("FIREBASE_PROJECT_ID"),
            storage_bucket: var("FIREBASE_STORAGE_BUCKET"),
            messaging_sender_id: var("FIREBASE_MESSAGING_SENDER_ID"),
            app_id: var("FIREBASE_APP_ID"),
            namespace: var("SYNC_NAMESPACE").unwrap_or_else(default_namespace),
        }
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path)?;
        let mut config: Self = serde_json::from_str(&raw)?;
        config.normalize();
        Ok(config)
    }

    /// Returns whether enough is configured to attempt remote sign-in.
    pub fn is_remote_configured(&self) -> bool {
        self.api_key.is_some() && self.database_url.is_some()
    }

    fn normalize(&mut self) {
        for field in [
            &mut self.api_key,
            &mut self.database_url,
            &mut self.project_id,
            &mut self.storage_bucket,
            &mut self.messaging_sender_id,
            &mut self.app_id,
        ] {
            *field = non_blank(field.take());
        }
        let namespace = self.namespace.trim().trim_matches('/');
        self.namespace = if namespace.is_empty() {
            default_namespace()
        } else {
            namespace.to_string()
        };
    }
}

/// Application-level configuration for one profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub db_path: PathBuf,
    pub sync: SyncConfig,
    pub anniversary: DateTime<FixedOffset>,
    /// Partner names used to derive avatar setting keys.
    pub partners: Vec<String>,
}

impl AppConfig {
    /// Profile rooted at `profile_dir` with default anniversary and partners.
    pub fn new(profile_dir: impl AsRef<Path>, sync: SyncConfig) -> Self {
        Self {
            db_path: profile_dir.as_ref().join(DEFAULT_DB_FILE_NAME),
            sync,
            anniversary: default_anniversary(),
            partners: vec!["jerry".to_string(), "claire".to_string()],
        }
    }

    pub fn with_anniversary(mut self, value: &str) -> Result<Self, ConfigError> {
        self.anniversary = DateTime::parse_from_rfc3339(value.trim())
            .map_err(|_| ConfigError::InvalidAnniversary(value.to_string()))?;
        Ok(self)
    }
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_anniversary() -> DateTime<FixedOffset> {
    match DateTime::parse_from_rfc3339(DEFAULT_ANNIVERSARY) {
        Ok(value) => value,
        Err(_) => DateTime::<Utc>::UNIX_EPOCH.fixed_offset(),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
