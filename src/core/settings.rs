//! Runtime configuration assembled from `vault.toml` and resolved paths.

use crate::core::paths::VaultPaths;
use crate::error::{Result, VaultError};
use crate::models::settings::{PolicySection, ServiceSection, SettingsFile};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Everything the coordinator needs, passed in at construction.
#[derive(Debug, Clone)]
pub struct VaultConfig {
    pub paths: VaultPaths,
    pub delimiter: char,
    pub policy: PolicySection,
    pub service: ServiceSection,
}

impl VaultConfig {
    /// Defaults for every setting, rooted at `paths`.
    pub fn with_defaults(paths: VaultPaths) -> Self {
        Self::from_file(paths, SettingsFile::default())
    }

    /// Load `explicit` if given (it must exist), otherwise the root's
    /// `vault.toml` if present, otherwise defaults.
    pub fn load(mut paths: VaultPaths, explicit: Option<&Path>) -> Result<Self> {
        let file = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(VaultError::ConfigMissing(path.to_path_buf()));
                }
                load_file(path)?
            }
            None if paths.settings.exists() => load_file(&paths.settings)?,
            None => SettingsFile::default(),
        };
        paths.apply(&file.store);
        Ok(Self::from_file(paths, file))
    }

    fn from_file(paths: VaultPaths, file: SettingsFile) -> Self {
        Self {
            paths,
            delimiter: file.store.delimiter,
            policy: file.policy,
            service: file.service,
        }
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_secs(self.service.reload_timeout_secs)
    }
}

fn load_file(path: &Path) -> Result<SettingsFile> {
    let content = fs::read_to_string(path).map_err(|e| VaultError::Settings {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    let file: SettingsFile = toml::from_str(&content).map_err(|e| VaultError::Settings {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    validate(path, &file)?;
    Ok(file)
}

fn validate(path: &Path, file: &SettingsFile) -> Result<()> {
    let invalid = |reason: &str| VaultError::Settings {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };
    let delim = file.store.delimiter;
    if delim.is_alphanumeric() || delim.is_whitespace() || delim.is_control() {
        return Err(invalid("delimiter must be a visible punctuation character"));
    }
    if file.service.reload_command.is_empty() {
        return Err(invalid("service.reload_command must not be empty"));
    }
    if file.service.reload_timeout_secs == 0 {
        return Err(invalid("service.reload_timeout_secs must be positive"));
    }
    if file.policy.max_days == 0 || file.policy.username_max_len == 0 {
        return Err(invalid("policy limits must be positive"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_absent() {
        let dir = TempDir::new().unwrap();
        let paths = VaultPaths::from_root(dir.path().to_path_buf());
        let config = VaultConfig::load(paths, None).unwrap();
        assert_eq!(config.delimiter, ':');
        assert_eq!(config.policy.standard_days, 30);
        assert_eq!(config.policy.trial_minutes, 60);
        assert_eq!(config.service.reload_command, vec!["systemctl", "restart", "zivpn"]);
        assert_eq!(config.reload_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_explicit_missing_is_config_missing() {
        let dir = TempDir::new().unwrap();
        let paths = VaultPaths::from_root(dir.path().to_path_buf());
        let missing = dir.path().join("nope.toml");
        let err = VaultConfig::load(paths, Some(&missing)).unwrap_err();
        assert!(matches!(err, VaultError::ConfigMissing(p) if p == missing));
    }

    #[test]
    fn test_load_overrides() {
        let dir = TempDir::new().unwrap();
        let paths = VaultPaths::from_root(dir.path().to_path_buf());
        fs::write(
            &paths.settings,
            r#"
[store]
document = "auth.json"
delimiter = "-"

[policy]
standard_days = 7

[service]
reload_command = ["true"]
reload_timeout_secs = 3
"#,
        )
        .unwrap();
        let config = VaultConfig::load(paths, None).unwrap();
        assert_eq!(config.delimiter, '-');
        assert_eq!(config.policy.standard_days, 7);
        assert_eq!(config.policy.trial_minutes, 60);
        assert_eq!(config.paths.document, dir.path().join("auth.json"));
        assert_eq!(config.paths.ledger, dir.path().join("users.db"));
        assert_eq!(config.service.reload_command, vec!["true"]);
    }

    #[test]
    fn test_rejects_alphanumeric_delimiter() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("custom.toml");
        fs::write(&path, "[store]\ndelimiter = \"x\"\n").unwrap();
        let paths = VaultPaths::from_root(PathBuf::from(dir.path()));
        let err = VaultConfig::load(paths, Some(&path)).unwrap_err();
        assert!(matches!(err, VaultError::Settings { .. }));
    }

    #[test]
    fn test_unparseable_settings() {
        let dir = TempDir::new().unwrap();
        let paths = VaultPaths::from_root(dir.path().to_path_buf());
        fs::write(&paths.settings, "[store\n").unwrap();
        assert!(matches!(
            VaultConfig::load(paths, None),
            Err(VaultError::Settings { .. })
        ));
    }
}
