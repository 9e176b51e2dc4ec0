//! Account manager configuration persistence.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};

/// Storage key the extension keeps the account registry under.
pub const DEFAULT_STORAGE_KEY: &str = "cookieAccounts";

/// Which cookies count as belonging to a domain when saving or switching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CookieScope {
    /// Only cookies found under the parent domain. Two-label domains
    /// capture no cookies at all.
    #[default]
    ParentOnly,
    /// Parent-domain cookies plus cookies set on the exact host.
    ParentAndHost,
}

impl std::str::FromStr for CookieScope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "parent_only" | "parent" => Ok(Self::ParentOnly),
            "parent_and_host" | "host" => Ok(Self::ParentAndHost),
            other => Err(Error::Config(format!("unknown cookie scope: {other}"))),
        }
    }
}

/// How a switch reacts when a cookie cannot be written back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewritePolicy {
    /// Keep going and report the cookies that failed.
    #[default]
    BestEffort,
    /// Undo the switch and restore the previous cookies and storage.
    Transactional,
}

impl std::str::FromStr for RewritePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "best_effort" => Ok(Self::BestEffort),
            "transactional" => Ok(Self::Transactional),
            other => Err(Error::Config(format!("unknown rewrite policy: {other}"))),
        }
    }
}

/// Persisted account manager configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerConfig {
    #[serde(default = "default_storage_key")]
    pub storage_key: String,
    #[serde(default)]
    pub cookie_scope: CookieScope,
    #[serde(default)]
    pub rewrite_policy: RewritePolicy,
    #[serde(default = "default_true")]
    pub reload_after_switch: bool,
    /// Path to config file (not serialized).
    #[serde(skip)]
    pub config_path: PathBuf,
}

fn default_storage_key() -> String {
    DEFAULT_STORAGE_KEY.into()
}
fn default_true() -> bool {
    true
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            storage_key: default_storage_key(),
            cookie_scope: CookieScope::default(),
            rewrite_policy: RewritePolicy::default(),
            reload_after_switch: true,
            config_path: PathBuf::new(),
        }
    }
}

impl ManagerConfig {
    /// Load config from `config.json` in the given directory, or return defaults.
    pub fn load(config_dir: &Path) -> Self {
        let config_path = config_dir.join("config.json");
        let mut config: ManagerConfig = match std::fs::read_to_string(&config_path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_else(|e| {
                warn!("Ignoring malformed {}: {}", config_path.display(), e);
                ManagerConfig::default()
            }),
            Err(_) => ManagerConfig::default(),
        };
        config.config_path = config_path;
        config
    }

    /// Save config to disk.
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(&self.config_path, json)?;
        Ok(())
    }

    /// Apply `ACCTSWAP_*` environment overrides.
    pub fn with_env_overrides(mut self) -> Result<Self> {
        if let Ok(key) = std::env::var("ACCTSWAP_STORAGE_KEY") {
            if key.trim().is_empty() {
                return Err(Error::Config("ACCTSWAP_STORAGE_KEY is empty".into()));
            }
            self.storage_key = key;
        }
        if let Ok(scope) = std::env::var("ACCTSWAP_COOKIE_SCOPE") {
            self.cookie_scope = scope.parse()?;
        }
        if let Ok(policy) = std::env::var("ACCTSWAP_REWRITE_POLICY") {
            self.rewrite_policy = policy.parse()?;
        }
        Ok(self)
    }
}
