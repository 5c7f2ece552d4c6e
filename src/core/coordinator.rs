//! Single-writer coordination of the credential document and the ledger.
//!
//! Every mutation holds the store-wide lock (an in-process mutex plus an
//! flock on `vault.lock`) across load, validate, mutate, persist and the
//! ledger update, then releases it before the daemon restart. Once the
//! document is persisted the request succeeds: ledger and reload failures
//! come back as [`Warning`]s and never roll the document back.

use crate::constants;
use crate::core::credstore::CredentialStore;
use crate::core::file_lock::FileLock;
use crate::core::ledger::ExpiryLedger;
use crate::core::reloader::{CommandReloader, ServiceReloader};
use crate::core::settings::VaultConfig;
use crate::error::{Result, VaultError};
use crate::models::account::{AccountSummary, Validity};
use crate::models::credential::Credential;
use crate::models::ledger::{LedgerEntry, Tier};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::{debug, info, warn};

/// A non-fatal failure after the document was already persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// The ledger no longer matches the document.
    Ledger(String),
    /// The daemon may still be serving the previous credential list.
    Reload(String),
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::Ledger(msg) => write!(f, "ledger out of sync: {}", msg),
            Warning::Reload(msg) => write!(f, "service not reloaded: {}", msg),
        }
    }
}

/// A successful mutation plus whatever degraded along the way.
#[derive(Debug, Clone)]
pub struct MutationReport<T> {
    pub value: T,
    pub warnings: Vec<Warning>,
}

impl<T> MutationReport<T> {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

struct WriteGuard<'a> {
    _file: FileLock,
    _local: MutexGuard<'a, ()>,
}

pub struct MutationCoordinator {
    config: VaultConfig,
    store: CredentialStore,
    ledger: ExpiryLedger,
    reloader: Box<dyn ServiceReloader>,
    local: Mutex<()>,
}

impl MutationCoordinator {
    pub fn new(config: VaultConfig, reloader: Box<dyn ServiceReloader>) -> Self {
        let store = CredentialStore::new(config.paths.document.clone(), config.delimiter);
        let ledger = ExpiryLedger::new(config.paths.ledger.clone());
        Self {
            config,
            store,
            ledger,
            reloader,
            local: Mutex::new(()),
        }
    }

    /// Coordinator restarting the daemon with the configured command.
    pub fn from_config(config: VaultConfig) -> Self {
        let reloader = CommandReloader::from_config(&config);
        Self::new(config, Box::new(reloader))
    }

    pub fn config(&self) -> &VaultConfig {
        &self.config
    }

    pub fn store(&self) -> &CredentialStore {
        &self.store
    }

    pub fn ledger(&self) -> &ExpiryLedger {
        &self.ledger
    }

    /// Provision a new account and restart the daemon.
    ///
    /// `validity` defaults to the policy for `tier`.
    pub fn create_account(
        &self,
        username: &str,
        secret: &str,
        tier: Tier,
        validity: Option<Validity>,
    ) -> Result<MutationReport<AccountSummary>> {
        self.validate_username(username)?;
        validate_secret(secret)?;
        let validity = validity.unwrap_or(match tier {
            Tier::Standard => Validity::Days(self.config.policy.standard_days),
            Tier::Trial => Validity::Minutes(self.config.policy.trial_minutes),
        });
        let lifetime = self.lifetime(validity)?;

        let mut warnings = Vec::new();
        let summary = {
            let _guard = self.lock()?;
            let mut snapshot = self.store.load()?;
            let cred = Credential::new(username, secret, self.store.delimiter());
            snapshot.add(cred.clone())?;
            self.store.persist(&snapshot)?;

            let now = Utc::now();
            let entry = LedgerEntry {
                username: username.to_string(),
                created_at: Some(now),
                expires_at: lifetime.map(|d| now + d),
                tier,
            };
            if let Err(e) = self.ledger.append(&entry) {
                warn!(username, error = %e, "account created but ledger entry not written");
                warnings.push(Warning::Ledger(e.to_string()));
            }
            info!(username, %tier, "account created");
            AccountSummary::from_parts(&cred, Some(&entry))
        };

        self.reload_into(&mut warnings);
        Ok(MutationReport {
            value: summary,
            warnings,
        })
    }

    /// Remove an account and every ledger record for it, then restart the daemon.
    pub fn delete_account(&self, username: &str) -> Result<MutationReport<()>> {
        if username.is_empty() {
            return Err(VaultError::invalid_username(username, "must not be empty"));
        }

        let mut warnings = Vec::new();
        {
            let _guard = self.lock()?;
            let mut snapshot = self.store.load()?;
            let removed = snapshot.remove(username)?;
            if removed > 1 {
                warn!(username, removed, "removed duplicate credentials");
            }
            self.store.persist(&snapshot)?;

            if let Err(e) = self.ledger.remove_all(username) {
                warn!(username, error = %e, "account deleted but ledger records remain");
                warnings.push(Warning::Ledger(e.to_string()));
            }
            info!(username, "account deleted");
        }

        self.reload_into(&mut warnings);
        Ok(MutationReport {
            value: (),
            warnings,
        })
    }

    /// Every credential in document order, with ledger details where known.
    ///
    /// Takes no lock: the document is only ever replaced whole.
    pub fn list_accounts(&self) -> Result<Vec<AccountSummary>> {
        let snapshot = self.store.load()?;
        let latest = self.latest_entries();
        Ok(snapshot
            .credentials()
            .iter()
            .map(|cred| AccountSummary::from_parts(cred, latest.get(&cred.username)))
            .collect())
    }

    pub fn account_info(&self, username: &str) -> Result<AccountSummary> {
        let snapshot = self.store.load()?;
        let cred = snapshot
            .find(username)
            .ok_or_else(|| VaultError::CredentialNotFound(username.to_string()))?;
        let latest = self.latest_entries();
        Ok(AccountSummary::from_parts(cred, latest.get(username)))
    }

    /// Extend an account's expiry from the later of now and its current expiry.
    ///
    /// Only the ledger changes, so the daemon is not restarted.
    pub fn renew_account(&self, username: &str, validity: Validity) -> Result<AccountSummary> {
        let lifetime = self.lifetime(validity)?;
        // Document tokens may predate validation; the ledger is whitespace-delimited.
        if username.is_empty() || username.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(VaultError::invalid_username(
                username,
                "cannot be recorded in the ledger",
            ));
        }

        let _guard = self.lock()?;
        let snapshot = self.store.load()?;
        let cred = snapshot
            .find(username)
            .ok_or_else(|| VaultError::CredentialNotFound(username.to_string()))?;
        let current = self.ledger.latest(username)?;

        let now = Utc::now();
        let base = match current.as_ref().and_then(|e| e.expires_at) {
            Some(at) if at > now => at,
            _ => now,
        };
        let entry = LedgerEntry {
            username: username.to_string(),
            created_at: current.as_ref().and_then(|e| e.created_at).or(Some(now)),
            expires_at: lifetime.map(|d| base + d),
            tier: current.as_ref().map(|e| e.tier).unwrap_or(Tier::Standard),
        };
        self.ledger.replace(&entry)?;
        info!(username, "account renewed");
        Ok(AccountSummary::from_parts(cred, Some(&entry)))
    }

    /// Ledger records whose expiry lies before `now`.
    pub fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        self.ledger.list_expired(now)
    }

    /// Revoke every account whose latest ledger record expired before `now`.
    ///
    /// Runs only when invoked; returns the usernames removed from the document.
    pub fn revoke_expired(&self, now: DateTime<Utc>) -> Result<MutationReport<Vec<String>>> {
        let mut warnings = Vec::new();
        let revoked = {
            let _guard = self.lock()?;
            let entries = self.ledger.entries()?;
            let mut latest: HashMap<&str, &LedgerEntry> = HashMap::new();
            for entry in &entries {
                latest.insert(entry.username.as_str(), entry);
            }
            let mut expired: Vec<&str> = Vec::new();
            for entry in &entries {
                let name = entry.username.as_str();
                if latest[name].is_expired(now) && !expired.contains(&name) {
                    expired.push(name);
                }
            }
            if expired.is_empty() {
                return Ok(MutationReport {
                    value: Vec::new(),
                    warnings,
                });
            }

            let mut snapshot = self.store.load()?;
            let mut revoked = Vec::new();
            for name in &expired {
                if snapshot.find(name).is_some() {
                    snapshot.remove(name)?;
                    revoked.push(name.to_string());
                }
            }
            if !revoked.is_empty() {
                self.store.persist(&snapshot)?;
            }

            for name in &expired {
                if let Err(e) = self.ledger.remove_all(name) {
                    warn!(username = %name, error = %e, "expired records not purged");
                    warnings.push(Warning::Ledger(e.to_string()));
                }
            }
            info!(revoked = revoked.len(), expired = expired.len(), "expired accounts swept");
            revoked
        };

        if !revoked.is_empty() {
            self.reload_into(&mut warnings);
        }
        Ok(MutationReport {
            value: revoked,
            warnings,
        })
    }

    /// Restart the daemon without changing anything.
    pub fn reload_service(&self) -> Result<()> {
        self.reloader.reload()
    }

    fn lock(&self) -> Result<WriteGuard<'_>> {
        let local = self.local.lock().unwrap_or_else(PoisonError::into_inner);
        let file = FileLock::exclusive(&self.config.paths.lock)?;
        debug!(lock = %self.config.paths.lock.display(), "store lock acquired");
        Ok(WriteGuard {
            _file: file,
            _local: local,
        })
    }

    fn reload_into(&self, warnings: &mut Vec<Warning>) {
        if let Err(e) = self.reloader.reload() {
            warnings.push(Warning::Reload(e.to_string()));
        }
    }

    /// Latest ledger record per username; an unreadable ledger reads as empty.
    fn latest_entries(&self) -> HashMap<String, LedgerEntry> {
        let entries = match self.ledger.entries() {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "ledger unreadable, expiry shown as unknown");
                Vec::new()
            }
        };
        entries
            .into_iter()
            .map(|e| (e.username.clone(), e))
            .collect()
    }

    fn validate_username(&self, username: &str) -> Result<()> {
        let invalid = |reason: String| Err(VaultError::invalid_username(username, reason));
        if username.is_empty() {
            return invalid("must not be empty".into());
        }
        let max = self.config.policy.username_max_len;
        if username.chars().count() > max {
            return invalid(format!("longer than {} characters", max));
        }
        if username.contains(self.config.delimiter) {
            return invalid(format!("contains the delimiter '{}'", self.config.delimiter));
        }
        if !username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-')
        {
            return invalid("only [a-zA-Z0-9._-] allowed".into());
        }
        if username.contains("..") || username.starts_with('.') || username.starts_with('-') {
            return invalid("must not start with '.' or '-' or contain '..'".into());
        }
        Ok(())
    }

    /// `None` means the account never expires.
    fn lifetime(&self, validity: Validity) -> Result<Option<Duration>> {
        let max_days = self.config.policy.max_days;
        match validity {
            Validity::Unlimited => Ok(None),
            Validity::Days(days) if days == 0 || days > max_days => Err(
                VaultError::InvalidValidity(format!("days must be 1..={}", max_days)),
            ),
            Validity::Days(days) => Ok(Some(Duration::days(i64::from(days)))),
            Validity::Minutes(minutes)
                if minutes == 0 || u64::from(minutes) > u64::from(max_days) * 24 * 60 =>
            {
                Err(VaultError::InvalidValidity(format!(
                    "minutes must be 1..={}",
                    u64::from(max_days) * 24 * 60
                )))
            }
            Validity::Minutes(minutes) => Ok(Some(Duration::minutes(i64::from(minutes)))),
        }
    }
}

fn validate_secret(secret: &str) -> Result<()> {
    if secret.is_empty() {
        return Err(VaultError::InvalidSecret("must not be empty".into()));
    }
    if secret.len() > constants::MAX_SECRET_SIZE {
        return Err(VaultError::InvalidSecret(format!(
            "exceeds {} bytes",
            constants::MAX_SECRET_SIZE
        )));
    }
    if secret.chars().any(char::is_control) {
        return Err(VaultError::InvalidSecret(
            "control characters are not allowed".into(),
        ));
    }
    Ok(())
}
