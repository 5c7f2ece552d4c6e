//! Root check for commands that rewrite the daemon's configuration.

use anyhow::{bail, Result};

/// Whether the effective uid is 0.
pub fn is_root() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Bail unless running as root; `command` names the refused subcommand.
pub fn require_root(command: &str) -> Result<()> {
    if !is_root() {
        bail!(
            "'{}' rewrites the VPN daemon's configuration and requires root. Run with sudo.",
            command
        );
    }
    Ok(())
}
