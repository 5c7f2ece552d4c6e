//! Data structures shared by the store, the ledger, and the CLI.

pub mod account;
pub mod credential;
pub mod ledger;
pub mod settings;
