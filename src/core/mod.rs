//! Credential store synchronization core.

pub mod coordinator;
pub mod credstore;
pub mod file_lock;
pub mod ledger;
pub mod paths;
pub mod reloader;
pub mod settings;
