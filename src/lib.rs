//! ZiVPN credential manager.
//!
//! Keeps the daemon's password list (`auth.config` in its JSON config) and
//! a separate expiry ledger consistent under concurrent administrators,
//! and restarts the daemon after each change.
//!
//! ## Modules
//! - `cli` — Command-line handlers
//! - `core` — Store, ledger, lock, reloader, and the mutation coordinator
//! - `models` — Data structures
//! - `util` — System utilities (fs, process, privilege)

pub mod cli;
pub mod constants;
pub mod core;
pub mod error;
pub mod models;
pub mod util;

pub use crate::core::coordinator::{MutationCoordinator, MutationReport, Warning};
pub use crate::error::{Result, VaultError};
