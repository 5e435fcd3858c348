//! Library persistence.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use castit_core::{Error, Result};
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::model::Library;

/// Load/save boundary for playlists.
#[async_trait]
pub trait LibraryStore: Send + Sync {
    async fn load(&self) -> Result<Library>;
    async fn save(&self, library: &Library) -> Result<()>;
}

/// Stores the whole library as one pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonLibraryStore {
    path: PathBuf,
}

impl JsonLibraryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl LibraryStore for JsonLibraryStore {
    async fn load(&self) -> Result<Library> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %self.path.display(), "No library file; starting empty");
                return Ok(Library::default());
            }
            Err(e) => return Err(e.into()),
        };

        let mut library: Library = serde_json::from_str(&content)
            .map_err(|e| Error::Validation(format!("library file {}: {e}", self.path.display())))?;

        // Existence is recomputed on load; files may have moved while we were down.
        for entry in library.playlists.iter_mut().flat_map(|p| p.entries.iter_mut()) {
            if !entry.is_url() {
                entry.exists = tokio::fs::try_exists(&entry.path).await.unwrap_or(false);
            }
        }
        Ok(library)
    }

    async fn save(&self, library: &Library) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(library)
            .map_err(|e| Error::Internal(format!("failed to serialize library: {e}")))?;

        // Write-then-rename so a crash never leaves a truncated file.
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

async fn save_snapshot(store: &dyn LibraryStore, library: &RwLock<Library>) {
    let snapshot = library.read().clone();
    match store.save(&snapshot).await {
        Ok(()) => tracing::debug!(playlists = snapshot.playlists.len(), "Library saved"),
        Err(e) => tracing::error!(error = %e, "Failed to save library"),
    }
}

/// Periodically flush `library` to `store`, plus once more on shutdown.
pub fn spawn_save_job(
    library: Arc<RwLock<Library>>,
    store: Arc<dyn LibraryStore>,
    interval: Duration,
    shutdown: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval.max(Duration::from_secs(1)));
        // The first tick fires immediately; nothing has changed yet.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    save_snapshot(store.as_ref(), &library).await;
                    tracing::info!("Library save job stopped");
                    return;
                }
                _ = ticker.tick() => {
                    save_snapshot(store.as_ref(), &library).await;
                }
            }
        }
    })
}
