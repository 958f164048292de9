//! File-backed allow-list persistence.
//!
//! The file is a pretty-printed JSON array of strings in sorted order, so it
//! can be inspected and diffed by hand.

use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::AllowList;
use crate::error::{Error, Result};

/// Loads and saves the process-wide allow-list file.
#[derive(Debug, Clone)]
pub struct AllowListStore {
    path: PathBuf,
}

impl AllowListStore {
    /// Creates a store backed by `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the allow-list file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the allow-list.
    ///
    /// Never fails: a missing, unreadable or corrupt file is logged and
    /// treated as an empty list.
    pub async fn load(&self) -> AllowList {
        let contents = match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No allow-list at {}", self.path.display());
                return AllowList::new();
            }
            Err(e) => {
                warn!("Could not read allow-list {}: {e}", self.path.display());
                return AllowList::new();
            }
        };

        match serde_json::from_str::<Vec<String>>(&contents) {
            Ok(entries) => AllowList::from_entries(entries),
            Err(e) => {
                warn!(
                    "Ignoring corrupt allow-list {}: {e}",
                    self.path.display()
                );
                AllowList::new()
            }
        }
    }

    /// Persists `list`, replacing the previous file.
    ///
    /// The content goes to a sibling temporary file that is flushed and then
    /// renamed over the destination, so a concurrent [`load`](Self::load)
    /// sees either the old or the new list. The temporary file is removed if
    /// any step fails.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the file cannot be written.
    pub async fn save(&self, list: &AllowList) -> Result<()> {
        let entries: Vec<&str> = list.iter().collect();
        let contents = serde_json::to_vec_pretty(&entries)?;
        let tmp = self.path.with_extension("json.tmp");

        if let Err(source) = self.write_atomically(&tmp, &contents).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Error::Storage {
                path: self.path.clone(),
                source,
            });
        }

        info!(
            "Saved {} allow-list entries to {}",
            list.len(),
            self.path.display()
        );
        Ok(())
    }

    async fn write_atomically(&self, tmp: &Path, contents: &[u8]) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(tmp).await?;
        file.write_all(contents).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(tmp, &self.path).await
    }
}
