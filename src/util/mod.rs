//! Utility modules for filesystem, process, and privilege handling.

pub mod fs;
pub mod privilege;
pub mod systemd;
