//! Centralized constants for paths, permissions, and account policy defaults.

/// Default vault root directory (the VPN daemon's configuration directory).
pub const DEFAULT_VAULT_ROOT: &str = "/etc/zivpn";

/// Environment variable overriding the vault root.
pub const ROOT_ENV_VAR: &str = "ZIVPN_VAULT_ROOT";

/// File name of the credential document read by the daemon.
pub const DOCUMENT_FILE: &str = "config.json";

/// File name of the expiry ledger.
pub const LEDGER_FILE: &str = "users.db";

/// File name of the optional settings file.
pub const SETTINGS_FILE: &str = "vault.toml";

/// File name of the store-wide lock.
pub const LOCK_FILE: &str = "vault.lock";

/// Permission mode for a freshly created credential document.
pub const DOCUMENT_MODE: u32 = 0o600;

/// Permission mode for the ledger.
pub const LEDGER_MODE: u32 = 0o600;

/// Default separator between username and secret in an encoded credential.
pub const DEFAULT_DELIMITER: char = ':';

/// Default validity of a standard account, in days.
pub const DEFAULT_STANDARD_DAYS: u32 = 30;

/// Default validity of a trial account, in minutes.
pub const DEFAULT_TRIAL_MINUTES: u32 = 60;

/// Upper bound on a caller-supplied validity, in days.
pub const MAX_VALIDITY_DAYS: u32 = 3650;

/// Maximum username length.
pub const MAX_USERNAME_LEN: usize = 32;

/// Default daemon restart command.
pub const DEFAULT_RELOAD_COMMAND: &[&str] = &["systemctl", "restart", "zivpn"];

/// Default systemd unit inspected by `doctor`.
pub const DEFAULT_UNIT: &str = "zivpn";

/// Upper bound on a daemon restart, in seconds.
pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 10;

/// Prefix for generated trial usernames.
pub const TRIAL_PREFIX: &str = "trial";

/// Length of generated secrets.
pub const GENERATED_SECRET_LEN: usize = 12;

/// Maximum secret size in bytes.
pub const MAX_SECRET_SIZE: usize = 4096;
