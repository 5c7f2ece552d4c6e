//! Bookkeeping records kept alongside the live auth list.

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Account classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Standard,
    Trial,
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Tier::Standard => write!(f, "standard"),
            Tier::Trial => write!(f, "trial"),
        }
    }
}

impl FromStr for Tier {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "standard" => Ok(Tier::Standard),
            "trial" => Ok(Tier::Trial),
            other => Err(format!("unknown tier '{}'", other)),
        }
    }
}

/// One ledger line: `username expiresAt createdAt tier`.
///
/// `-` stands for a missing timestamp. Legacy two-field lines
/// (`username YYYY-MM-DD`) are read as standard accounts with an unknown
/// creation time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub username: String,
    pub created_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub tier: Tier,
}

impl LedgerEntry {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        matches!(self.expires_at, Some(at) if at < now)
    }

    pub fn to_line(&self) -> String {
        format!(
            "{} {} {} {}",
            self.username,
            format_timestamp(self.expires_at),
            format_timestamp(self.created_at),
            self.tier
        )
    }

    /// Parse a ledger line. Returns `None` for lines that do not hold a record.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let username = fields.next()?.to_string();
        let expires_at = parse_timestamp(fields.next()?)?;
        let created_at = match fields.next() {
            Some(raw) => parse_timestamp(raw)?,
            None => None,
        };
        let tier = match fields.next() {
            Some(raw) => raw.parse().ok()?,
            None => Tier::Standard,
        };
        if fields.next().is_some() {
            return None;
        }
        Some(Self {
            username,
            created_at,
            expires_at,
            tier,
        })
    }
}

/// First whitespace-separated field of a ledger line.
pub fn line_username(line: &str) -> Option<&str> {
    line.split_whitespace().next()
}

fn format_timestamp(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(ts) => ts.to_rfc3339_opts(SecondsFormat::Secs, true),
        None => "-".to_string(),
    }
}

fn parse_timestamp(raw: &str) -> Option<Option<DateTime<Utc>>> {
    if raw == "-" {
        return Some(None);
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(Some(ts.with_timezone(&Utc)));
    }
    let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()?;
    Some(Some(date.and_hms_opt(0, 0, 0)?.and_utc()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn entry(expires_at: Option<DateTime<Utc>>) -> LedgerEntry {
        LedgerEntry {
            username: "alice".into(),
            created_at: Some(Utc.with_ymd_and_hms(2026, 1, 1, 12, 0, 0).unwrap()),
            expires_at,
            tier: Tier::Trial,
        }
    }

    #[test]
    fn test_line_roundtrip() {
        let e = entry(Some(Utc.with_ymd_and_hms(2026, 1, 1, 13, 0, 0).unwrap()));
        assert_eq!(
            e.to_line(),
            "alice 2026-01-01T13:00:00Z 2026-01-01T12:00:00Z trial"
        );
        assert_eq!(LedgerEntry::parse_line(&e.to_line()), Some(e));
    }

    #[test]
    fn test_unlimited_entry_uses_dash() {
        let e = entry(None);
        assert!(e.to_line().starts_with("alice - "));
        assert_eq!(LedgerEntry::parse_line(&e.to_line()).unwrap().expires_at, None);
    }

    #[test]
    fn test_legacy_two_field_line() {
        let e = LedgerEntry::parse_line("bob 2025-12-31").unwrap();
        assert_eq!(e.username, "bob");
        assert_eq!(e.tier, Tier::Standard);
        assert_eq!(e.created_at, None);
        assert_eq!(
            e.expires_at,
            Some(Utc.with_ymd_and_hms(2025, 12, 31, 0, 0, 0).unwrap())
        );
    }

    #[test]
    fn test_malformed_lines_rejected() {
        assert!(LedgerEntry::parse_line("").is_none());
        assert!(LedgerEntry::parse_line("onlyname").is_none());
        assert!(LedgerEntry::parse_line("bob not-a-date").is_none());
        assert!(LedgerEntry::parse_line("bob - - gold").is_none());
        assert!(LedgerEntry::parse_line("bob - - trial extra").is_none());
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        assert!(entry(Some(now - Duration::seconds(1))).is_expired(now));
        assert!(!entry(Some(now + Duration::seconds(1))).is_expired(now));
        assert!(!entry(None).is_expired(now));
    }
}
