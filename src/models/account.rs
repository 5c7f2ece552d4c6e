use crate::models::credential::Credential;
use crate::models::ledger::{LedgerEntry, Tier};
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Expiry as known from the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "at", rename_all = "lowercase")]
pub enum Expiry {
    /// No ledger entry exists for the account.
    Unknown,
    Never,
    At(DateTime<Utc>),
}

/// How long a new or renewed account stays valid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validity {
    Days(u32),
    Minutes(u32),
    Unlimited,
}

/// What the front-end renders for one account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountSummary {
    pub username: String,
    pub secret: String,
    pub tier: Option<Tier>,
    pub created_at: Option<DateTime<Utc>>,
    pub expiry: Expiry,
}

impl AccountSummary {
    /// Merge a credential with the most recent of its ledger entries, if any.
    pub fn from_parts(cred: &Credential, entry: Option<&LedgerEntry>) -> Self {
        Self {
            username: cred.username.clone(),
            secret: cred.secret.clone(),
            tier: entry.map(|e| e.tier),
            created_at: entry.and_then(|e| e.created_at),
            expiry: match entry {
                None => Expiry::Unknown,
                Some(LedgerEntry {
                    expires_at: None, ..
                }) => Expiry::Never,
                Some(LedgerEntry {
                    expires_at: Some(at),
                    ..
                }) => Expiry::At(*at),
            },
        }
    }
}
