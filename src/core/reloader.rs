//! Daemon restart after a store mutation.

use crate::core::settings::VaultConfig;
use crate::error::{Result, VaultError};
use crate::util::systemd;
use std::time::Duration;
use tracing::{info, warn};

/// Makes the daemon pick up a rewritten credential document.
///
/// One attempt per call, no retries.
pub trait ServiceReloader: Send + Sync {
    fn reload(&self) -> Result<()>;
}

/// Runs the configured restart command with a bounded wait.
#[derive(Debug, Clone)]
pub struct CommandReloader {
    argv: Vec<String>,
    timeout: Duration,
}

impl CommandReloader {
    pub fn new(argv: Vec<String>, timeout: Duration) -> Self {
        Self { argv, timeout }
    }

    pub fn from_config(config: &VaultConfig) -> Self {
        Self::new(config.service.reload_command.clone(), config.reload_timeout())
    }
}

impl ServiceReloader for CommandReloader {
    fn reload(&self) -> Result<()> {
        match systemd::run_bounded(&self.argv, self.timeout) {
            Ok(()) => {
                info!(command = %self.argv.join(" "), "service reloaded");
                Ok(())
            }
            Err(reason) => {
                warn!(command = %self.argv.join(" "), %reason, "service reload failed");
                Err(VaultError::ServiceReload(reason))
            }
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn reloader(parts: &[&str], timeout_ms: u64) -> CommandReloader {
        CommandReloader::new(
            parts.iter().map(|s| s.to_string()).collect(),
            Duration::from_millis(timeout_ms),
        )
    }

    #[test]
    fn test_successful_restart() {
        assert!(reloader(&["true"], 5_000).reload().is_ok());
    }

    #[test]
    fn test_failed_restart_is_service_reload_error() {
        let err = reloader(&["false"], 5_000).reload().unwrap_err();
        assert!(matches!(err, VaultError::ServiceReload(_)));
    }

    #[test]
    fn test_hung_restart_times_out() {
        let err = reloader(&["sleep", "10"], 150).reload().unwrap_err();
        assert!(matches!(err, VaultError::ServiceReload(msg) if msg.contains("did not finish")));
    }
}
