use crate::cli::CliContext;
use crate::constants;
use crate::models::account::{AccountSummary, Expiry, Validity};
use crate::models::ledger::{LedgerEntry, Tier};
use anyhow::{bail, Context, Result};
use chrono::{DateTime, Local, Utc};
use clap::Args;
use comfy_table::{presets::UTF8_FULL, Attribute, Cell, Table};
use dialoguer::Password;
use rand::{distributions::Alphanumeric, rngs::OsRng, Rng};
use std::io::Read;
use zeroize::Zeroizing;

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Account username
    pub username: String,

    /// Read secret from stdin instead of interactive prompt
    #[arg(long, conflicts_with = "auto")]
    pub from_stdin: bool,

    /// Auto-generate a random secret
    #[arg(long)]
    pub auto: bool,

    /// Length for auto-generated secret
    #[arg(long, default_value_t = constants::GENERATED_SECRET_LEN)]
    pub length: usize,

    /// Validity in days (default from policy)
    #[arg(long, conflicts_with = "unlimited")]
    pub days: Option<u32>,

    /// Never expire
    #[arg(long)]
    pub unlimited: bool,
}

#[derive(Args, Debug)]
pub struct TrialArgs {
    /// Account username (generated if omitted)
    pub username: Option<String>,

    /// Validity in minutes (default from policy)
    #[arg(long)]
    pub minutes: Option<u32>,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    /// Account username
    pub username: String,
}

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Output format: table|json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Account username
    pub username: String,

    /// Output format: table|json
    #[arg(long, default_value = "table")]
    pub format: String,
}

#[derive(Args, Debug)]
pub struct RenewArgs {
    /// Account username
    pub username: String,

    /// Days to add (default from policy)
    #[arg(long, conflicts_with = "unlimited")]
    pub days: Option<u32>,

    /// Remove the expiry altogether
    #[arg(long)]
    pub unlimited: bool,
}

pub fn run_create(ctx: &CliContext, args: CreateArgs) -> Result<()> {
    if ctx.non_interactive && !args.from_stdin && !args.auto {
        bail!("--non-interactive requires --from-stdin or --auto for create");
    }
    let secret: Zeroizing<String> = if args.auto {
        Zeroizing::new(generate_secret(args.length))
    } else {
        read_secret(args.from_stdin, &args.username)?
    };
    let validity = if args.unlimited {
        Some(Validity::Unlimited)
    } else {
        args.days.map(Validity::Days)
    };

    let report = ctx
        .coordinator
        .create_account(&args.username, &secret, Tier::Standard, validity)?;
    ctx.report_warnings(&report.warnings);
    print_created(&report.value);
    Ok(())
}

pub fn run_trial(ctx: &CliContext, args: TrialArgs) -> Result<()> {
    let username = args.username.unwrap_or_else(generate_trial_username);
    let secret = Zeroizing::new(generate_secret(constants::GENERATED_SECRET_LEN));
    let report = ctx.coordinator.create_account(
        &username,
        &secret,
        Tier::Trial,
        args.minutes.map(Validity::Minutes),
    )?;
    ctx.report_warnings(&report.warnings);
    print_created(&report.value);
    Ok(())
}

pub fn run_delete(ctx: &CliContext, args: DeleteArgs) -> Result<()> {
    let report = ctx.coordinator.delete_account(&args.username)?;
    ctx.report_warnings(&report.warnings);
    println!("Deleted {}", args.username);
    Ok(())
}

pub fn run_list(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let json = wants_json(&args.format)?;
    let accounts = ctx.coordinator.list_accounts()?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&accounts).context("serialize accounts")?
        );
        return Ok(());
    }
    if accounts.is_empty() {
        println!("No accounts.");
        return Ok(());
    }

    let now = Utc::now();
    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Username").add_attribute(Attribute::Bold),
        Cell::new("Secret").add_attribute(Attribute::Bold),
        Cell::new("Tier").add_attribute(Attribute::Bold),
        Cell::new("Created").add_attribute(Attribute::Bold),
        Cell::new("Expires").add_attribute(Attribute::Bold),
    ]);
    for account in &accounts {
        table.add_row(vec![
            account.username.clone(),
            account.secret.clone(),
            account
                .tier
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
            account
                .created_at
                .map(format_time)
                .unwrap_or_else(|| "-".to_string()),
            format_expiry(account.expiry, now),
        ]);
    }
    println!("{}", table);
    println!("\nTotal: {}", accounts.len());
    Ok(())
}

pub fn run_info(ctx: &CliContext, args: InfoArgs) -> Result<()> {
    let json = wants_json(&args.format)?;
    let account = ctx.coordinator.account_info(&args.username)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&account).context("serialize account")?
        );
        return Ok(());
    }
    println!("username: {}", account.username);
    println!("secret: {}", account.secret);
    if let Some(tier) = account.tier {
        println!("tier: {}", tier);
    }
    if let Some(created) = account.created_at {
        println!("created_at: {}", created.to_rfc3339());
    }
    println!("expires: {}", format_expiry(account.expiry, Utc::now()));
    Ok(())
}

pub fn run_renew(ctx: &CliContext, args: RenewArgs) -> Result<()> {
    let validity = if args.unlimited {
        Validity::Unlimited
    } else {
        Validity::Days(args.days.unwrap_or(ctx.config().policy.standard_days))
    };
    let account = ctx.coordinator.renew_account(&args.username, validity)?;
    println!(
        "Renewed {} (expires: {})",
        account.username,
        format_expiry(account.expiry, Utc::now())
    );
    Ok(())
}

pub fn run_expired(ctx: &CliContext, args: ListArgs) -> Result<()> {
    let json = wants_json(&args.format)?;
    let entries = ctx.coordinator.list_expired(Utc::now())?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&entries).context("serialize ledger entries")?
        );
        return Ok(());
    }
    if entries.is_empty() {
        println!("No expired records.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("Username").add_attribute(Attribute::Bold),
        Cell::new("Tier").add_attribute(Attribute::Bold),
        Cell::new("Expired").add_attribute(Attribute::Bold),
    ]);
    for LedgerEntry {
        username,
        expires_at,
        tier,
        ..
    } in entries
    {
        table.add_row(vec![
            username,
            tier.to_string(),
            expires_at.map(format_time).unwrap_or_else(|| "-".to_string()),
        ]);
    }
    println!("{}", table);
    Ok(())
}

pub fn run_sweep(ctx: &CliContext) -> Result<()> {
    let report = ctx.coordinator.revoke_expired(Utc::now())?;
    ctx.report_warnings(&report.warnings);
    if report.value.is_empty() {
        println!("No expired accounts.");
    } else {
        println!("Revoked {}: {}", report.value.len(), report.value.join(", "));
    }
    Ok(())
}

fn print_created(account: &AccountSummary) {
    println!("Created {}", account.username);
    println!("  secret:  {}", account.secret);
    if let Some(tier) = account.tier {
        println!("  tier:    {}", tier);
    }
    println!("  expires: {}", format_expiry(account.expiry, Utc::now()));
}

fn wants_json(format: &str) -> Result<bool> {
    match format {
        "table" => Ok(false),
        "json" => Ok(true),
        other => bail!("invalid format: {} (use table|json)", other),
    }
}

fn format_time(ts: DateTime<Utc>) -> String {
    let local: DateTime<Local> = ts.into();
    local.format("%Y-%m-%d %H:%M").to_string()
}

fn format_expiry(expiry: Expiry, now: DateTime<Utc>) -> String {
    match expiry {
        Expiry::Unknown => "unknown".to_string(),
        Expiry::Never => "never".to_string(),
        Expiry::At(at) if at < now => format!("{} (expired)", format_time(at)),
        Expiry::At(at) => format_time(at),
    }
}

fn read_secret(from_stdin: bool, username: &str) -> Result<Zeroizing<String>> {
    let secret = if from_stdin {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("read secret from stdin")?;
        Zeroizing::new(buf.trim_end_matches(['\r', '\n']).to_string())
    } else {
        Zeroizing::new(
            Password::new()
                .with_prompt(format!("Secret for {}", username))
                .allow_empty_password(false)
                .interact()
                .context("read secret from prompt")?,
        )
    };
    Ok(secret)
}

fn generate_secret(length: usize) -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

fn generate_trial_username() -> String {
    let suffix: String = OsRng
        .sample_iter(&Alphanumeric)
        .take(5)
        .map(|b| char::from(b).to_ascii_lowercase())
        .collect();
    format!("{}{}", constants::TRIAL_PREFIX, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_generate_secret_length() {
        assert_eq!(generate_secret(12).len(), 12);
        assert_eq!(generate_secret(0).len(), 0);
    }

    #[test]
    fn test_generate_secret_alphanumeric() {
        assert!(generate_secret(100).chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_trial_username_shape() {
        let name = generate_trial_username();
        assert!(name.starts_with("trial"));
        assert_eq!(name.len(), 10);
        assert!(name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_wants_json_rejects_unknown_format() {
        assert!(!wants_json("table").unwrap());
        assert!(wants_json("json").unwrap());
        let err = wants_json("yaml").unwrap_err();
        assert!(err.to_string().contains("invalid format: yaml"));
    }

    #[test]
    fn test_format_expiry() {
        let now = Utc::now();
        assert_eq!(format_expiry(Expiry::Unknown, now), "unknown");
        assert_eq!(format_expiry(Expiry::Never, now), "never");
        assert!(format_expiry(Expiry::At(now - Duration::hours(1)), now).ends_with("(expired)"));
        assert!(!format_expiry(Expiry::At(now + Duration::hours(1)), now).contains("expired"));
    }
}
