//! Command implementations.
//!
//! Mailbox commands are generic over the [`Authenticator`], so the same code
//! runs against IMAP and Gmail.

use std::io::Write as _;
use std::path::Path;

use anyhow::{Context, Result};
use mailsweep_core::credentials;
use mailsweep_core::service::GmailAuthenticator;
use mailsweep_core::{
    AllowList, Authenticator, Config, Error, MutationMode, ReviewSession, TracingObserver,
    UnapprovedSet, mutate, scan_unapproved, with_session,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::{debug, info};

type StdinLines = Lines<BufReader<Stdin>>;

fn stdin_lines() -> StdinLines {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn prompt(lines: &mut StdinLines, question: &str) -> Result<Option<String>> {
    print!("{question} ");
    std::io::stdout().flush()?;
    Ok(lines.next_line().await?)
}

fn print_unapproved(unapproved: &UnapprovedSet) {
    if unapproved.is_empty() {
        println!("No unapproved senders.");
        return;
    }
    println!("{} unapproved senders:", unapproved.len());
    for sender in unapproved {
        println!("  {sender}");
    }
}

async fn load_unapproved<A: Authenticator>(
    auth: &mut A,
    config: &Config,
    allow_list: &AllowList,
) -> Result<UnapprovedSet> {
    let options = config.scan_options();
    let classifier = config.classifier();
    debug!("Matching senders by {}", classifier.strategy().as_str());

    with_session(auth, async |client| {
        scan_unapproved(client, &options, &classifier, allow_list, &mut TracingObserver).await
    })
    .await
    .with_context(|| format!("Failed to scan {}", options.folder))
}

/// Prints every sender in the scan window that the allow-list misses.
pub async fn scan<A: Authenticator>(auth: &mut A, config: &Config) -> Result<()> {
    let allow_list = config.allow_list_store().load().await;
    let unapproved = load_unapproved(auth, config, &allow_list).await?;
    print_unapproved(&unapproved);
    Ok(())
}

/// Scans once, then takes approvals from stdin until an empty line.
///
/// Each round persists the additions before the remaining list is shown.
pub async fn review<A: Authenticator>(auth: &mut A, config: &Config) -> Result<()> {
    let store = config.allow_list_store();
    let classifier = config.classifier();
    let allow_list = store.load().await;
    let unapproved = load_unapproved(auth, config, &allow_list).await?;

    let mut session =
        ReviewSession::start(config.session_ttl(), config.scan_limit(), allow_list, unapproved);
    print_unapproved(session.unapproved());

    let mut lines = stdin_lines();
    while !session.unapproved().is_empty() {
        let Some(line) = prompt(&mut lines, "Approve (comma separated, empty to finish):").await?
        else {
            break;
        };
        if line.trim().is_empty() {
            break;
        }

        match session
            .approve(&store, &classifier, &AllowList::parse_lines(&line))
            .await
        {
            Ok(()) => print_unapproved(session.unapproved()),
            Err(Error::SessionExpired) => {
                println!("Review session expired, run `mailsweep review` again.");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to save the allow-list"),
        }
    }

    if !session.unapproved().is_empty() {
        println!(
            "Run `mailsweep delete` to remove mail from the {} remaining senders.",
            session.unapproved().len()
        );
    }
    Ok(())
}

/// Re-scans and deletes (or counts) mail from unapproved senders.
pub async fn delete<A: Authenticator>(
    auth: &mut A,
    config: &Config,
    dry_run: bool,
    yes: bool,
) -> Result<()> {
    if !dry_run && !yes {
        let question = format!(
            "Delete every message in {} from senders not on the allow-list? [y/N]",
            config.folder
        );
        let answer = prompt(&mut stdin_lines(), &question).await?;
        if !answer.is_some_and(|a| a.trim().eq_ignore_ascii_case("y")) {
            println!("Aborted.");
            return Ok(());
        }
    }

    // Always classify against what is on disk now, not an earlier review.
    let allow_list = config.allow_list_store().load().await;
    let options = config.scan_options();
    let classifier = config.classifier();
    let mode = MutationMode::from_dry_run(dry_run);
    debug!("Matching senders by {}", classifier.strategy().as_str());

    let report = with_session(auth, async |client| {
        mutate(client, &options, &classifier, &allow_list, mode, &mut TracingObserver).await
    })
    .await
    .context("Deletion failed")?;

    if report.dry_run {
        println!("Would delete {}", report.count());
    } else {
        println!("Deleted {}", report.count());
    }
    if report.failed > 0 {
        println!("{} messages could not be deleted and were skipped", report.failed);
    }
    Ok(())
}

/// Prints the allow-list, one entry per line.
pub async fn allow_list(config: &Config) -> Result<()> {
    let allow_list = config.allow_list_store().load().await;
    if allow_list.is_empty() {
        println!("The allow-list is empty.");
    }
    for entry in &allow_list {
        println!("{entry}");
    }
    Ok(())
}

/// Adds entries to the allow-list and saves it.
pub async fn allow_add(config: &Config, patterns: &[String]) -> Result<()> {
    let store = config.allow_list_store();
    let mut allow_list = store.load().await;

    let mut added = 0;
    for pattern in patterns {
        if allow_list.insert(pattern) {
            added += 1;
        }
    }

    store
        .save(&allow_list)
        .await
        .with_context(|| format!("Failed to write {}", store.path().display()))?;
    println!("Added {added} entries ({} total)", allow_list.len());
    Ok(())
}

/// Runs Gmail consent and stores the token.
pub async fn authorize(config: &Config) -> Result<()> {
    GmailAuthenticator::new(&config.gmail)
        .authorize()
        .await
        .context("Gmail authorization failed")?;
    println!("Authorized. Token saved to {}", config.gmail.token_path.display());
    Ok(())
}

/// Saves the IMAP password in the system keyring.
pub async fn store_password(config: &Config, password: Option<String>) -> Result<()> {
    let username = imap_username(config)?;
    let password = match password {
        Some(password) => password,
        None => prompt(&mut stdin_lines(), &format!("Password for {username}:"))
            .await?
            .unwrap_or_default(),
    };
    if password.is_empty() {
        anyhow::bail!("No password given");
    }

    credentials::store_password(&username, &password)?;
    info!("Stored IMAP password for {username}");
    println!("Password stored in the system keyring.");
    Ok(())
}

/// Removes the IMAP password from the system keyring.
pub fn forget_password(config: &Config) -> Result<()> {
    let username = imap_username(config)?;
    credentials::delete_password(&username)?;
    info!("Removed IMAP password for {username}");
    println!("Password removed from the system keyring.");
    Ok(())
}

/// Writes the effective config to `path` so it can be edited by hand.
///
/// An existing file is only replaced with `force`.
pub async fn init(config: &Config, path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(path).await.unwrap_or(false) {
        anyhow::bail!("{} already exists, pass --force to overwrite it", path.display());
    }
    config
        .save(path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))?;
    println!("Wrote {}", path.display());
    Ok(())
}

/// The configured IMAP login, with a hint when missing.
pub fn imap_username(config: &Config) -> Result<String> {
    config
        .imap
        .username
        .clone()
        .context("No IMAP username: pass --username or set imap.username in the config file")
}
