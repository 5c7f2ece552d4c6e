//! Line-oriented expiry ledger.
//!
//! Advisory bookkeeping only: the daemon never reads it. Callers serialize
//! writers through the store-wide lock. Lines that do not parse are kept
//! verbatim when the file is rewritten.

use crate::constants;
use crate::error::{Result, VaultError};
use crate::models::ledger::{line_username, LedgerEntry};
use crate::util::fs as vault_fs;
use chrono::{DateTime, Utc};
use std::fs::{self, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::warn;

#[derive(Debug, Clone)]
pub struct ExpiryLedger {
    path: PathBuf,
}

impl ExpiryLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Add a record. Duplicates are allowed; the latest line wins on lookup.
    pub fn append(&self, entry: &LedgerEntry) -> Result<()> {
        self.ensure_parent()?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.err(e))?;

        let len = file.metadata().map_err(|e| self.err(e))?.len();
        if len == 0 {
            vault_fs::set_file_mode(&file, constants::LEDGER_MODE).map_err(|e| self.err(e))?;
        } else {
            // A hand-edited file may lack its final newline.
            let mut last = [0u8; 1];
            file.seek(SeekFrom::End(-1)).map_err(|e| self.err(e))?;
            file.read_exact(&mut last).map_err(|e| self.err(e))?;
            if last[0] != b'\n' {
                file.write_all(b"\n").map_err(|e| self.err(e))?;
            }
        }
        writeln!(file, "{}", entry.to_line()).map_err(|e| self.err(e))?;
        file.sync_data().map_err(|e| self.err(e))?;
        Ok(())
    }

    /// Delete every record for `username`; returns how many were dropped.
    pub fn remove_all(&self, username: &str) -> Result<usize> {
        let lines = self.read_lines()?;
        let before = lines.len();
        let kept: Vec<String> = lines
            .into_iter()
            .filter(|line| line_username(line) != Some(username))
            .collect();
        let removed = before - kept.len();
        if removed > 0 {
            self.rewrite(&kept)?;
        }
        Ok(removed)
    }

    /// Replace every record for `entry.username` with `entry`.
    pub fn replace(&self, entry: &LedgerEntry) -> Result<()> {
        let mut kept: Vec<String> = self
            .read_lines()?
            .into_iter()
            .filter(|line| line_username(line) != Some(entry.username.as_str()))
            .collect();
        kept.push(entry.to_line());
        self.rewrite(&kept)
    }

    /// All well-formed records in file order.
    pub fn entries(&self) -> Result<Vec<LedgerEntry>> {
        let mut entries = Vec::new();
        let mut malformed = 0usize;
        for line in self.read_lines()? {
            if line.trim().is_empty() {
                continue;
            }
            match LedgerEntry::parse_line(&line) {
                Some(entry) => entries.push(entry),
                None => malformed += 1,
            }
        }
        if malformed > 0 {
            warn!(
                path = %self.path.display(),
                malformed,
                "skipped malformed ledger lines"
            );
        }
        Ok(entries)
    }

    /// The most recent record for `username`.
    pub fn latest(&self, username: &str) -> Result<Option<LedgerEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.username == username)
            .last())
    }

    /// Records that have not expired at `now` (including unlimited ones).
    pub fn list_active(&self, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| !e.is_expired(now))
            .collect())
    }

    /// Records with an expiry strictly before `now`.
    pub fn list_expired(&self, now: DateTime<Utc>) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries()?
            .into_iter()
            .filter(|e| e.is_expired(now))
            .collect())
    }

    fn read_lines(&self) -> Result<Vec<String>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|e| self.err(e))?;
        Ok(content.lines().map(str::to_string).collect())
    }

    fn rewrite(&self, lines: &[String]) -> Result<()> {
        self.ensure_parent()?;
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        let mode = vault_fs::mode_of(&self.path).unwrap_or(constants::LEDGER_MODE);
        let mut tmp = tempfile::Builder::new()
            .prefix(".ledger-")
            .tempfile_in(parent)
            .map_err(|e| self.err(e))?;
        for line in lines {
            writeln!(tmp, "{}", line).map_err(|e| self.err(e))?;
        }
        tmp.as_file().sync_all().map_err(|e| self.err(e))?;
        vault_fs::set_file_mode(tmp.as_file(), mode).map_err(|e| self.err(e))?;
        tmp.persist(&self.path).map_err(|e| self.err(e.error))?;
        Ok(())
    }

    fn ensure_parent(&self) -> Result<()> {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => {
                fs::create_dir_all(parent).map_err(|e| self.err(e))
            }
            _ => Ok(()),
        }
    }

    fn err(&self, source: std::io::Error) -> VaultError {
        VaultError::Ledger {
            path: self.path.clone(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ledger::Tier;
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    fn ledger() -> (TempDir, ExpiryLedger) {
        let dir = TempDir::new().unwrap();
        let ledger = ExpiryLedger::new(dir.path().join("users.db"));
        (dir, ledger)
    }

    fn entry(username: &str, expires_at: Option<DateTime<Utc>>, tier: Tier) -> LedgerEntry {
        LedgerEntry {
            username: username.into(),
            created_at: Some(Utc.with_ymd_and_hms(2026, 3, 1, 0, 0, 0).unwrap()),
            expires_at,
            tier,
        }
    }

    #[test]
    fn test_absent_ledger_is_empty() {
        let (_dir, ledger) = ledger();
        assert!(ledger.entries().unwrap().is_empty());
        assert_eq!(ledger.remove_all("alice").unwrap(), 0);
    }

    #[test]
    fn test_append_keeps_duplicates() {
        let (_dir, ledger) = ledger();
        let t = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        ledger.append(&entry("alice", Some(t), Tier::Trial)).unwrap();
        ledger.append(&entry("alice", None, Tier::Standard)).unwrap();
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(ledger.latest("alice").unwrap().unwrap().tier, Tier::Standard);
    }

    #[test]
    fn test_remove_all_matches_whole_field() {
        let (_dir, ledger) = ledger();
        ledger.append(&entry("bob", None, Tier::Trial)).unwrap();
        ledger.append(&entry("bob2", None, Tier::Standard)).unwrap();
        ledger.append(&entry("bob", None, Tier::Standard)).unwrap();
        assert_eq!(ledger.remove_all("bob").unwrap(), 2);
        let left: Vec<String> = ledger
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(left, vec!["bob2"]);
    }

    #[test]
    fn test_rewrite_preserves_unparseable_lines() {
        let (_dir, ledger) = ledger();
        fs::write(ledger.path(), "# legacy notes\ncarol 2025-01-01\nbob - - trial\n").unwrap();
        assert_eq!(ledger.remove_all("bob").unwrap(), 1);
        let content = fs::read_to_string(ledger.path()).unwrap();
        assert_eq!(content, "# legacy notes\ncarol 2025-01-01\n");
    }

    #[test]
    fn test_append_repairs_missing_newline() {
        let (_dir, ledger) = ledger();
        fs::write(ledger.path(), "carol 2025-01-01").unwrap();
        ledger.append(&entry("dave", None, Tier::Standard)).unwrap();
        let names: Vec<String> = ledger
            .entries()
            .unwrap()
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(names, vec!["carol", "dave"]);
    }

    #[test]
    fn test_replace_collapses_records() {
        let (_dir, ledger) = ledger();
        ledger.append(&entry("alice", None, Tier::Trial)).unwrap();
        ledger.append(&entry("zed", None, Tier::Trial)).unwrap();
        ledger.append(&entry("alice", None, Tier::Standard)).unwrap();
        let t = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();
        ledger.replace(&entry("alice", Some(t), Tier::Standard)).unwrap();
        let entries = ledger.entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].username, "zed");
        assert_eq!(entries[1].expires_at, Some(t));
    }

    #[test]
    fn test_active_and_expired_partition() {
        let (_dir, ledger) = ledger();
        let now = Utc.with_ymd_and_hms(2026, 6, 1, 0, 0, 0).unwrap();
        ledger
            .append(&entry("old", Some(now - Duration::days(1)), Tier::Standard))
            .unwrap();
        ledger
            .append(&entry("new", Some(now + Duration::minutes(5)), Tier::Trial))
            .unwrap();
        ledger.append(&entry("forever", None, Tier::Standard)).unwrap();

        let expired: Vec<String> = ledger
            .list_expired(now)
            .unwrap()
            .into_iter()
            .map(|e| e.username)
            .collect();
        let active: Vec<String> = ledger
            .list_active(now)
            .unwrap()
            .into_iter()
            .map(|e| e.username)
            .collect();
        assert_eq!(expired, vec!["old"]);
        assert_eq!(active, vec!["new", "forever"]);
    }
}
