//! CLI entry point for `easaccount`.

use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use tracing::{error, info};

use easaccount::config::{self, Config};
use easaccount::error::ProvisionError;
use easaccount::host::memory::MemoryHost;
use easaccount::model::account::AccountProfile;
use easaccount::provision::Provisioner;
use easaccount::subsystem::MailSubsystem;

#[derive(Parser)]
#[command(
    name = "easaccount",
    version,
    about = "Add an ActiveSync shared-mailbox account to an existing mail profile"
)]
struct Cli {
    /// Profile to add the shared mailbox to
    profile: String,

    /// Host client major version tag (e.g. 16)
    client_version: String,

    /// 8-hex-digit id of the existing account whose credential
    /// authenticates the share
    existing_account_id: String,

    /// Username of the mailbox being shared
    share_username: String,

    /// Email address of the mailbox being shared
    share_email: String,

    /// Display name for the new account
    display_name: String,

    /// "1" to restrict the sync window to one month (default from config)
    sync_one_month: Option<String>,

    /// "1" to show reminders for the new account (default from config)
    show_reminders: Option<String>,

    /// Offline-store folder override; must end with a path separator
    #[arg(long, value_name = "DIR")]
    data_folder: Option<String>,

    /// Run the full protocol against the built-in in-memory host. The
    /// simulated profile contains one existing account, 00000001.
    #[arg(long)]
    simulate: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            use clap::error::ErrorKind;
            let _ = e.print();
            return match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => ExitCode::SUCCESS,
                _ => ExitCode::from(3),
            };
        }
    };

    let config = config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.clone(),
        1 => "info".to_string(),
        2 => "debug".to_string(),
        _ => "trace".to_string(),
    };
    setup_logging(&log_level, &config);

    match run(&cli, &config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            match e.downcast_ref::<ProvisionError>() {
                Some(ProvisionError::AdministrationUnavailable { profile }) => {
                    error!("Profile does not exist: {profile}");
                }
                _ => error!("{e:#}"),
            }
            ExitCode::from(exit_code_for(&e))
        }
    }
}

/// Exit codes: 0 success, 1 recognized administrative error, 2 any
/// other error, 3 usage (handled in `main`).
fn exit_code_for(error: &anyhow::Error) -> u8 {
    match error.downcast_ref::<ProvisionError>() {
        Some(ProvisionError::AdministrationUnavailable { .. }) => 1,
        _ => 2,
    }
}

fn run(cli: &Cli, config: &Config) -> anyhow::Result<()> {
    if !cli.simulate {
        // The administrative session, registry, and protection
        // primitives are host-client capabilities injected by the
        // deployment; this build links none.
        anyhow::bail!("no host-client backend in this build (try --simulate)");
    }

    let host = simulated_host(&cli.profile, &cli.client_version);
    let registry = Rc::new(host.registry().clone());
    let client = host.client();
    let protector = host.protector();

    // Load the account whose credential will authenticate the share.
    let keystore = easaccount::keystore::ProfileKeyStore::new(
        host.registry(),
        &cli.profile,
        &cli.client_version,
    );
    let existing = keystore.open_account(&cli.existing_account_id)?;
    info!(
        username = %existing.username,
        share = %cli.share_username,
        "adding share"
    );

    let mut profile = AccountProfile::share_of(
        &existing,
        &cli.profile,
        &cli.client_version,
        &cli.share_username,
        &cli.share_email,
        &cli.display_name,
    );
    profile.sync_one_month = toggle(
        cli.sync_one_month.as_deref(),
        config.provision.sync_one_month,
    );
    profile.show_reminders = toggle(
        cli.show_reminders.as_deref(),
        config.provision.show_reminders,
    );
    profile.data_folder = cli
        .data_folder
        .clone()
        .or_else(|| config.provision.data_folder.clone())
        .or_else(simulated_data_folder);

    let subsystem = MailSubsystem::new(Rc::clone(&client));
    let guard = subsystem.acquire()?;

    let provisioner = Provisioner::new(client, registry, protector, subsystem.clone());
    let receipt = provisioner.run(&profile)?;

    println!("  Account id     {:08X}", receipt.account_id);
    println!("  Entry id       {}", receipt.entry_id.to_hex());
    println!("  Offline store  {}", receipt.store_path);

    drop(guard);
    Ok(())
}

/// Positional toggles follow the original helper convention: the
/// literal "1" enables, any other value disables, absent uses the
/// configured default.
fn toggle(arg: Option<&str>, default: bool) -> bool {
    match arg {
        Some(value) => value == "1",
        None => default,
    }
}

/// In-memory host seeded with the named profile and one existing
/// account for the share credential.
fn simulated_host(profile: &str, client_version: &str) -> MemoryHost {
    use easaccount::credential::EncryptedCredential;
    use easaccount::model::record::MailAccountRecord;

    let host = MemoryHost::new();
    host.seed_profile(profile, client_version);

    let credential =
        EncryptedCredential::protect(host.protector().as_ref(), "simulated-password")
            .expect("simulated credential");
    host.seed_account(
        profile,
        client_version,
        &MailAccountRecord {
            account_name: "owner@example.com".to_string(),
            display_name: "Owner Mailbox".to_string(),
            email: "owner@example.com".to_string(),
            server: "https://mail.example.com/Microsoft-Server-ActiveSync".to_string(),
            username: "owner".to_string(),
            encrypted_password: credential.as_bytes().to_vec(),
        },
    );
    host
}

/// Simulated runs default the offline store to the system temp
/// directory rather than the real client data folder.
fn simulated_data_folder() -> Option<String> {
    let mut folder = std::env::temp_dir().to_string_lossy().into_owned();
    if !folder.ends_with(std::path::MAIN_SEPARATOR) {
        folder.push(std::path::MAIN_SEPARATOR);
    }
    Some(folder)
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "easaccount.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let admin: anyhow::Error = ProvisionError::AdministrationUnavailable {
            profile: "P".into(),
        }
        .into();
        assert_eq!(exit_code_for(&admin), 1);
        let other: anyhow::Error = ProvisionError::EntryIdentifierUnavailable.into();
        assert_eq!(exit_code_for(&other), 2);
        let plain = anyhow::anyhow!("no backend");
        assert_eq!(exit_code_for(&plain), 2);
    }

    #[test]
    fn test_toggle_convention() {
        assert!(toggle(Some("1"), false));
        assert!(!toggle(Some("0"), true));
        assert!(!toggle(Some("yes"), true));
        assert!(toggle(None, true));
        assert!(!toggle(None, false));
    }
}
