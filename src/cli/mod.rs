//! CLI routing and command dispatch.

use crate::core::coordinator::{MutationCoordinator, Warning};
use crate::core::paths::VaultPaths;
use crate::core::settings::VaultConfig;
use crate::util::privilege;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod account;
pub mod doctor;
pub mod service;

/// Shared context passed to all command handlers.
pub struct CliContext {
    pub coordinator: MutationCoordinator,
    pub non_interactive: bool,
    pub config_load_warning: Option<String>,
}

impl CliContext {
    pub fn config(&self) -> &VaultConfig {
        self.coordinator.config()
    }

    /// Print non-fatal warnings attached to a successful mutation.
    pub fn report_warnings(&self, warnings: &[Warning]) {
        for warning in warnings {
            eprintln!("warning: {}", warning);
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "zivpn-vault", version, about = "Credential manager for the ZiVPN daemon")]
pub struct Cli {
    /// Vault root (default: $ZIVPN_VAULT_ROOT or /etc/zivpn)
    #[arg(long, global = true, value_name = "PATH")]
    pub root: Option<PathBuf>,

    /// Settings file (default: <root>/vault.toml if present)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Run in non-interactive mode (no prompts, suitable for automation)
    #[arg(long, global = true, env = "ZIVPN_VAULT_NON_INTERACTIVE")]
    pub non_interactive: bool,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn run(self) -> Result<()> {
        let paths = VaultPaths::resolve(self.root);

        // `doctor` must still run when the settings file is broken.
        let mut config_load_warning = None;
        let config = match VaultConfig::load(paths.clone(), self.config.as_deref()) {
            Ok(config) => config,
            Err(e) if matches!(self.command, Commands::Doctor(_)) => {
                config_load_warning = Some(e.to_string());
                VaultConfig::with_defaults(paths)
            }
            Err(e) => return Err(e).context("load settings"),
        };

        if self.command.requires_root() {
            privilege::require_root(self.command.name())?;
        }

        let ctx = CliContext {
            coordinator: MutationCoordinator::from_config(config),
            non_interactive: self.non_interactive,
            config_load_warning,
        };

        match self.command {
            Commands::Create(args) => account::run_create(&ctx, args),
            Commands::Trial(args) => account::run_trial(&ctx, args),
            Commands::Delete(args) => account::run_delete(&ctx, args),
            Commands::List(args) => account::run_list(&ctx, args),
            Commands::Info(args) => account::run_info(&ctx, args),
            Commands::Renew(args) => account::run_renew(&ctx, args),
            Commands::Expired(args) => account::run_expired(&ctx, args),
            Commands::Sweep => account::run_sweep(&ctx),
            Commands::Reload => service::run_reload(&ctx),
            Commands::Doctor(args) => doctor::run(&ctx, args),
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a standard account
    Create(account::CreateArgs),
    /// Create a short-lived trial account
    Trial(account::TrialArgs),
    /// Delete an account
    Delete(account::DeleteArgs),
    /// List accounts
    List(account::ListArgs),
    /// Show one account
    Info(account::InfoArgs),
    /// Extend an account's expiry
    Renew(account::RenewArgs),
    /// List expired ledger records
    Expired(account::ListArgs),
    /// Revoke every expired account
    Sweep,
    /// Restart the VPN daemon
    Reload,
    /// Diagnose installation and store consistency (safe, read-only)
    Doctor(doctor::DoctorArgs),
}

impl Commands {
    /// Whether this command requires root privileges.
    pub fn requires_root(&self) -> bool {
        matches!(
            self,
            Commands::Create(_)
                | Commands::Trial(_)
                | Commands::Delete(_)
                | Commands::Renew(_)
                | Commands::Sweep
                | Commands::Reload
        )
    }

    /// Command name for error messages.
    pub fn name(&self) -> &str {
        match self {
            Commands::Create(_) => "create",
            Commands::Trial(_) => "trial",
            Commands::Delete(_) => "delete",
            Commands::List(_) => "list",
            Commands::Info(_) => "info",
            Commands::Renew(_) => "renew",
            Commands::Expired(_) => "expired",
            Commands::Sweep => "sweep",
            Commands::Reload => "reload",
            Commands::Doctor(_) => "doctor",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_create_with_days() {
        let cli = Cli::try_parse_from(["zivpn-vault", "create", "alice", "--days", "7"]).unwrap();
        match cli.command {
            Commands::Create(args) => {
                assert_eq!(args.username, "alice");
                assert_eq!(args.days, Some(7));
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_days_conflicts_with_unlimited() {
        assert!(Cli::try_parse_from([
            "zivpn-vault",
            "create",
            "alice",
            "--days",
            "7",
            "--unlimited"
        ])
        .is_err());
    }

    #[test]
    fn test_mutating_commands_require_root() {
        let cli =
            Cli::try_parse_from(["zivpn-vault", "--root", "/tmp/x", "delete", "bob"]).unwrap();
        assert!(cli.command.requires_root());
        let cli = Cli::try_parse_from(["zivpn-vault", "list"]).unwrap();
        assert!(!cli.command.requires_root());
        assert_eq!(cli.command.name(), "list");
    }
}
