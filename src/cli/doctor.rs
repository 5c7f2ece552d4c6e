//! Diagnostics for installation and store consistency.

use crate::cli::CliContext;
use crate::core::file_lock::FileLock;
use crate::util::systemd;
use anyhow::Result;
use chrono::Utc;
use clap::Args;
use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Args, Debug)]
pub struct DoctorArgs {
    /// Also query systemd for the daemon's unit state
    #[arg(long)]
    pub unit: bool,
}

pub fn run(ctx: &CliContext, args: DoctorArgs) -> Result<()> {
    let config = ctx.config();
    let paths = &config.paths;
    let coordinator = &ctx.coordinator;
    let mut ok = 0u32;
    let mut warn = 0u32;
    let mut fail = 0u32;

    println!("Doctor: {}", paths);
    if let Some(w) = &ctx.config_load_warning {
        println!("  [WARN] settings unusable, checking with defaults: {}", w);
        warn += 1;
    } else if paths.settings.exists() {
        println!("  [PASS] settings loaded: {}", paths.settings.display());
        ok += 1;
    } else {
        println!("  [INFO] no settings file, using defaults");
    }

    if paths.root.is_dir() {
        println!("  [PASS] vault root exists: {}", paths.root.display());
        ok += 1;
    } else {
        println!("  [FAIL] vault root missing: {}", paths.root.display());
        fail += 1;
    }

    // Credential document
    let usernames: Option<BTreeSet<String>> = match coordinator.store().load_required() {
        Ok(snapshot) => {
            println!(
                "  [PASS] credential document ok: {} ({} credentials)",
                paths.document.display(),
                snapshot.len()
            );
            ok += 1;
            let mut seen = BTreeSet::new();
            for cred in snapshot.credentials() {
                if !seen.insert(cred.username.clone()) {
                    println!("  [FAIL] duplicate username in document: {}", cred.username);
                    fail += 1;
                }
            }
            Some(seen)
        }
        Err(e) => {
            println!("  [FAIL] {}", e);
            fail += 1;
            None
        }
    };

    // Ledger and its consistency with the document
    match coordinator.ledger().entries() {
        Ok(entries) => {
            let now = Utc::now();
            let expired = entries.iter().filter(|e| e.is_expired(now)).count();
            println!(
                "  [PASS] ledger readable: {} ({} records, {} expired)",
                paths.ledger.display(),
                entries.len(),
                expired
            );
            ok += 1;
            if expired > 0 {
                println!("  [INFO] run `zivpn-vault sweep` to revoke expired accounts");
            }
            if let Some(usernames) = &usernames {
                let recorded: BTreeSet<&str> =
                    entries.iter().map(|e| e.username.as_str()).collect();
                for orphan in recorded.iter().filter(|u| !usernames.contains(**u)) {
                    println!("  [WARN] ledger record without credential: {}", orphan);
                    warn += 1;
                }
                for missing in usernames.iter().filter(|u| !recorded.contains(u.as_str())) {
                    println!("  [WARN] credential without ledger record: {}", missing);
                    warn += 1;
                }
            }
        }
        Err(e) => {
            println!("  [FAIL] {}", e);
            fail += 1;
        }
    }

    // Lock
    if paths.root.is_dir() {
        match FileLock::try_exclusive(&paths.lock) {
            Ok(Some(_)) => {
                println!("  [PASS] store lock free: {}", paths.lock.display());
                ok += 1;
            }
            Ok(None) => {
                println!("  [WARN] store lock held by another process");
                warn += 1;
            }
            Err(e) => {
                println!("  [WARN] {}", e);
                warn += 1;
            }
        }
    }

    // Reload command
    if let Some(program) = config.service.reload_command.first() {
        if resolve_program(program).is_some() {
            println!("  [PASS] reload command available: {}", program);
            ok += 1;
        } else {
            println!("  [FAIL] reload command not found: {}", program);
            fail += 1;
        }
    }

    if args.unit {
        match systemd::unit_state(&config.service.unit) {
            Some(state) if state == "active" => {
                println!("  [PASS] unit {} is active", config.service.unit);
                ok += 1;
            }
            Some(state) => {
                println!("  [WARN] unit {} is {}", config.service.unit, state);
                warn += 1;
            }
            None => {
                println!("  [WARN] systemctl not available");
                warn += 1;
            }
        }
    }

    // Summary
    println!();
    println!("Doctor summary: {} pass, {} warn, {} fail", ok, warn, fail);
    if fail > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn resolve_program(program: &str) -> Option<PathBuf> {
    let direct = Path::new(program);
    if direct.components().count() > 1 {
        return is_executable_file(direct).then(|| direct.to_path_buf());
    }
    let path = env::var_os("PATH").unwrap_or_default();
    env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| is_executable_file(candidate))
}

fn is_executable_file(path: &Path) -> bool {
    if !path.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = fs::metadata(path) {
            return (meta.permissions().mode() & 0o111) != 0;
        }
    }
    #[cfg(not(unix))]
    {
        return true;
    }
    false
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_program_on_path() {
        assert!(resolve_program("sh").is_some());
        assert!(resolve_program("zivpn-definitely-not-installed").is_none());
    }

    #[test]
    fn test_resolve_program_absolute() {
        assert!(resolve_program("/bin/sh").is_some());
        assert!(resolve_program("/nonexistent/bin/tool").is_none());
    }
}
