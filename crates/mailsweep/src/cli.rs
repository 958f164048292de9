//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use mailsweep_core::Config;

/// Delete mail from every sender not on your allow-list.
#[derive(Debug, Parser)]
#[command(name = "mailsweep", version, about)]
pub struct Cli {
    /// Config file (defaults to the platform config directory).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Mailbox backend.
    #[arg(long, value_enum, default_value_t = Backend::Imap, global = true)]
    pub backend: Backend,

    /// How many recent messages to consider: a positive count or `all`.
    #[arg(long, global = true)]
    pub scan_limit: Option<String>,

    /// Folder (IMAP) or label (Gmail) to sweep.
    #[arg(long, global = true)]
    pub folder: Option<String>,

    /// IMAP login name.
    #[arg(long, global = true)]
    pub username: Option<String>,

    /// IMAP password. Falls back to `MAILSWEEP_PASSWORD`, then the keyring.
    #[arg(long, global = true)]
    pub password: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Which mailbox protocol to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Backend {
    /// IMAP over TLS with a password.
    Imap,
    /// Gmail REST API with `OAuth2`.
    Gmail,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List senders that are not on the allow-list.
    Scan,

    /// Scan, then approve senders interactively.
    Review,

    /// Delete every message from an unapproved sender.
    Delete {
        /// Only count what would be deleted.
        #[arg(long)]
        dry_run: bool,

        /// Skip the confirmation prompt.
        #[arg(long, short)]
        yes: bool,
    },

    /// Inspect or edit the allow-list.
    Allow(AllowArgs),

    /// Run Gmail consent and save the token.
    Auth,

    /// Save the IMAP password in the system keyring.
    StorePassword,

    /// Remove the IMAP password from the system keyring.
    ForgetPassword,

    /// Write the current settings to the config file.
    Init {
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Debug, Args)]
pub struct AllowArgs {
    #[command(subcommand)]
    pub command: AllowCommand,
}

#[derive(Debug, Subcommand)]
pub enum AllowCommand {
    /// Print every entry.
    List,
    /// Add entries (addresses, domains, or any substring).
    Add {
        #[arg(required = true)]
        patterns: Vec<String>,
    },
}

impl Cli {
    /// Applies per-invocation overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(limit) = &self.scan_limit {
            config.scan_limit.clone_from(limit);
        }
        if let Some(folder) = &self.folder {
            config.folder.clone_from(folder);
        }
        if let Some(username) = &self.username {
            config.imap.username = Some(username.clone());
        }
    }
}
