//! Vault path resolution.

use crate::constants;
use crate::models::settings::StoreSection;
use std::env;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct VaultPaths {
    pub root: PathBuf,
    pub document: PathBuf,
    pub ledger: PathBuf,
    pub settings: PathBuf,
    pub lock: PathBuf,
}

impl VaultPaths {
    /// Resolve vault paths from CLI arg, env var, or the default root.
    pub fn resolve(root_arg: Option<PathBuf>) -> Self {
        if let Some(root) = root_arg {
            return Self::from_root(root);
        }
        if let Ok(root) = env::var(constants::ROOT_ENV_VAR) {
            if !root.is_empty() {
                return Self::from_root(PathBuf::from(root));
            }
        }
        Self::from_root(PathBuf::from(constants::DEFAULT_VAULT_ROOT))
    }

    /// Create vault paths from a root directory.
    pub fn from_root(root: PathBuf) -> Self {
        let document = root.join(constants::DOCUMENT_FILE);
        let ledger = root.join(constants::LEDGER_FILE);
        let settings = root.join(constants::SETTINGS_FILE);
        let lock = root.join(constants::LOCK_FILE);
        Self {
            root,
            document,
            ledger,
            settings,
            lock,
        }
    }

    /// Apply document/ledger overrides from the settings file.
    pub fn apply(&mut self, store: &StoreSection) {
        if let Some(document) = &store.document {
            self.document = self.under_root(document);
        }
        if let Some(ledger) = &store.ledger {
            self.ledger = self.under_root(ledger);
        }
    }

    fn under_root(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}

impl std::fmt::Display for VaultPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "vault@{}", self.root.display())
    }
}
