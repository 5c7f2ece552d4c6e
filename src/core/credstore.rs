//! The daemon's auth list: a JSON document whose `auth.config` array holds
//! one encoded credential per element.
//!
//! Every write replaces the whole document through a temporary file in the
//! same directory followed by rename(2), so the daemon (and lock-free
//! readers) observe either the previous or the next complete document.
//! Fields other than `auth.config` are carried through untouched.

use crate::constants;
use crate::error::{Result, VaultError};
use crate::models::credential::Credential;
use crate::util::fs as vault_fs;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Handle on the credential document.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    delimiter: char,
}

/// The parsed document plus its ordered credential list.
#[derive(Debug, Clone)]
pub struct Snapshot {
    document: Value,
    credentials: Vec<Credential>,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>, delimiter: char) -> Self {
        Self {
            path: path.into(),
            delimiter,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// Read the document. An absent document is an empty store.
    pub fn load(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Ok(Snapshot::empty());
        }
        self.read()
    }

    /// Like [`load`](Self::load), but an absent document is `ConfigMissing`.
    pub fn load_required(&self) -> Result<Snapshot> {
        if !self.path.exists() {
            return Err(VaultError::ConfigMissing(self.path.clone()));
        }
        self.read()
    }

    fn read(&self) -> Result<Snapshot> {
        let content = fs::read_to_string(&self.path).map_err(|source| VaultError::Persistence {
            path: self.path.clone(),
            source,
        })?;
        let document: Value = serde_json::from_str(&content)
            .map_err(|e| VaultError::corrupt(&self.path, format!("invalid JSON: {}", e)))?;
        let credentials = self.extract(&document)?;
        Ok(Snapshot {
            document,
            credentials,
        })
    }

    fn extract(&self, document: &Value) -> Result<Vec<Credential>> {
        let root = document
            .as_object()
            .ok_or_else(|| VaultError::corrupt(&self.path, "top level is not an object"))?;
        let auth = match root.get("auth") {
            None => return Ok(Vec::new()),
            Some(Value::Object(auth)) => auth,
            Some(_) => return Err(VaultError::corrupt(&self.path, "`auth` is not an object")),
        };
        let entries = match auth.get("config") {
            None => return Ok(Vec::new()),
            Some(Value::Array(entries)) => entries,
            Some(_) => {
                return Err(VaultError::corrupt(
                    &self.path,
                    "`auth.config` is not an array",
                ))
            }
        };
        entries
            .iter()
            .enumerate()
            .map(|(idx, entry)| match entry {
                Value::String(token) => Ok(Credential::parse(token, self.delimiter)),
                _ => Err(VaultError::corrupt(
                    &self.path,
                    format!("`auth.config[{}]` is not a string", idx),
                )),
            })
            .collect()
    }

    /// Write `snapshot` back, replacing the document atomically.
    pub fn persist(&self, snapshot: &Snapshot) -> Result<()> {
        let content = self.render(snapshot)?;
        let persist_err = |source: std::io::Error| VaultError::Persistence {
            path: self.path.clone(),
            source,
        };

        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent).map_err(persist_err)?;

        let mode = vault_fs::mode_of(&self.path).unwrap_or(constants::DOCUMENT_MODE);
        let mut tmp = tempfile::Builder::new()
            .prefix(".config-")
            .suffix(".tmp")
            .tempfile_in(&parent)
            .map_err(persist_err)?;
        tmp.write_all(content.as_bytes()).map_err(persist_err)?;
        tmp.as_file().sync_all().map_err(persist_err)?;
        vault_fs::set_file_mode(tmp.as_file(), mode).map_err(persist_err)?;

        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;
        // Make the rename itself durable; the data is already synced.
        if let Err(e) = sync_dir(&parent) {
            warn!(dir = %parent.display(), error = %e, "directory fsync after rename failed");
        }
        debug!(
            path = %self.path.display(),
            credentials = snapshot.credentials.len(),
            "credential document replaced"
        );
        Ok(())
    }

    fn render(&self, snapshot: &Snapshot) -> Result<String> {
        let mut document = snapshot.document.clone();
        let root = document
            .as_object_mut()
            .ok_or_else(|| VaultError::corrupt(&self.path, "top level is not an object"))?;
        let auth = root
            .entry("auth")
            .or_insert_with(|| Value::Object(Map::new()))
            .as_object_mut()
            .ok_or_else(|| VaultError::corrupt(&self.path, "`auth` is not an object"))?;
        auth.insert(
            "config".to_string(),
            Value::Array(
                snapshot
                    .credentials
                    .iter()
                    .map(|c| Value::String(c.encoded().to_string()))
                    .collect(),
            ),
        );

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        document
            .serialize(&mut ser)
            .map_err(|e| VaultError::corrupt(&self.path, format!("serialize: {}", e)))?;
        buf.push(b'\n');
        String::from_utf8(buf)
            .map_err(|e| VaultError::corrupt(&self.path, format!("serialize: {}", e)))
    }
}

impl Snapshot {
    /// A store with nothing provisioned yet.
    pub fn empty() -> Self {
        Self {
            document: Value::Object(Map::new()),
            credentials: Vec::new(),
        }
    }

    pub fn credentials(&self) -> &[Credential] {
        &self.credentials
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// Exact, case-sensitive username lookup.
    pub fn find(&self, username: &str) -> Option<&Credential> {
        self.credentials.iter().find(|c| c.username == username)
    }

    /// Append `cred`, refusing a username that is already present.
    pub fn add(&mut self, cred: Credential) -> Result<()> {
        if self.find(&cred.username).is_some() {
            return Err(VaultError::DuplicateCredential(cred.username));
        }
        self.credentials.push(cred);
        Ok(())
    }

    /// Drop every credential whose username equals `username`; returns how
    /// many were removed.
    pub fn remove(&mut self, username: &str) -> Result<usize> {
        let before = self.credentials.len();
        self.credentials.retain(|c| c.username != username);
        let removed = before - self.credentials.len();
        if removed == 0 {
            return Err(VaultError::CredentialNotFound(username.to_string()));
        }
        Ok(removed)
    }
}

fn sync_dir(dir: &Path) -> io::Result<()> {
    File::open(dir)?.sync_all()
}
