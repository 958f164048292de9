//! `mailsweep` - delete mail from every sender not on your allow-list.
//!
//! Scan a folder, review the unapproved senders, approve the ones worth
//! keeping, then delete the rest. Works over IMAP or the Gmail API.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod cli;
mod commands;

use anyhow::{Context, Result};
use clap::Parser;
use mailsweep_core::service::{GmailAuthenticator, ImapAuthenticator};
use mailsweep_core::{Authenticator, Config, credentials};
use tracing::debug;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{AllowCommand, Backend, Cli, Command};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays scriptable.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mailsweep=info,mailsweep_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Config::default_path);
    let mut config = Config::load(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;
    cli.apply_overrides(&mut config);
    debug!("Using config {}", config_path.display());

    match &cli.command {
        Command::Allow(args) => match &args.command {
            AllowCommand::List => commands::allow_list(&config).await,
            AllowCommand::Add { patterns } => commands::allow_add(&config, patterns).await,
        },
        Command::Auth => commands::authorize(&config).await,
        Command::StorePassword => commands::store_password(&config, cli.password.clone()).await,
        Command::ForgetPassword => commands::forget_password(&config),
        Command::Init { force } => commands::init(&config, &config_path, *force).await,
        Command::Scan | Command::Review | Command::Delete { .. } => match cli.backend {
            Backend::Imap => {
                let username = commands::imap_username(&config)?;
                let password = credentials::resolve_password(&username, cli.password.clone())?;
                let mut auth = ImapAuthenticator::from_config(&config.imap, password)?;
                run_mailbox_command(&mut auth, &config, &cli.command).await
            }
            Backend::Gmail => {
                let mut auth = GmailAuthenticator::new(&config.gmail);
                run_mailbox_command(&mut auth, &config, &cli.command).await
            }
        },
    }
}

async fn run_mailbox_command<A: Authenticator>(
    auth: &mut A,
    config: &Config,
    command: &Command,
) -> Result<()> {
    match command {
        Command::Scan => commands::scan(auth, config).await,
        Command::Review => commands::review(auth, config).await,
        Command::Delete { dry_run, yes } => commands::delete(auth, config, *dry_run, *yes).await,
        Command::Allow(_)
        | Command::Auth
        | Command::StorePassword
        | Command::ForgetPassword
        | Command::Init { .. } => Ok(()),
    }
}
