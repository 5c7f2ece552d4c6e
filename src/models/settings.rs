//! Settings file model (`vault.toml`).

use crate::constants;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub store: StoreSection,
    #[serde(default)]
    pub policy: PolicySection,
    #[serde(default)]
    pub service: ServiceSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSection {
    /// Credential document; relative paths resolve against the vault root.
    #[serde(default)]
    pub document: Option<PathBuf>,
    #[serde(default)]
    pub ledger: Option<PathBuf>,
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

impl Default for StoreSection {
    fn default() -> Self {
        Self {
            document: None,
            ledger: None,
            delimiter: default_delimiter(),
        }
    }
}

/// Account defaults and validation limits.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicySection {
    #[serde(default = "default_standard_days")]
    pub standard_days: u32,
    #[serde(default = "default_trial_minutes")]
    pub trial_minutes: u32,
    #[serde(default = "default_max_days")]
    pub max_days: u32,
    #[serde(default = "default_username_max_len")]
    pub username_max_len: usize,
}

impl Default for PolicySection {
    fn default() -> Self {
        Self {
            standard_days: default_standard_days(),
            trial_minutes: default_trial_minutes(),
            max_days: default_max_days(),
            username_max_len: default_username_max_len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceSection {
    /// argv of the daemon restart command.
    #[serde(default = "default_reload_command")]
    pub reload_command: Vec<String>,
    #[serde(default = "default_reload_timeout_secs")]
    pub reload_timeout_secs: u64,
    /// Unit inspected by `doctor`.
    #[serde(default = "default_unit")]
    pub unit: String,
}

impl Default for ServiceSection {
    fn default() -> Self {
        Self {
            reload_command: default_reload_command(),
            reload_timeout_secs: default_reload_timeout_secs(),
            unit: default_unit(),
        }
    }
}

fn default_delimiter() -> char {
    constants::DEFAULT_DELIMITER
}

fn default_standard_days() -> u32 {
    constants::DEFAULT_STANDARD_DAYS
}

fn default_trial_minutes() -> u32 {
    constants::DEFAULT_TRIAL_MINUTES
}

fn default_max_days() -> u32 {
    constants::MAX_VALIDITY_DAYS
}

fn default_username_max_len() -> usize {
    constants::MAX_USERNAME_LEN
}

fn default_reload_command() -> Vec<String> {
    constants::DEFAULT_RELOAD_COMMAND
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_reload_timeout_secs() -> u64 {
    constants::DEFAULT_RELOAD_TIMEOUT_SECS
}

fn default_unit() -> String {
    constants::DEFAULT_UNIT.to_string()
}
