//! Cloneable front door to the session actor.
//!
//! Every verb becomes a [`Command`] on the actor's inbox and waits for the
//! reply. Reads go through a `watch` snapshot and never touch the actor.

use std::sync::Arc;

use castit_core::events::PlaybackState;
use castit_core::{DeviceId, EntryId, Error, PlaylistId, Result};
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;

use super::state::{FileOptions, PlayOptions, SessionSnapshot};
use crate::playlist::NavigationDirection;

pub(crate) type Reply<T> = oneshot::Sender<Result<T>>;

pub(crate) enum Command {
    Play {
        entry_id: EntryId,
        options: PlayOptions,
        reply: Reply<()>,
    },
    Pause {
        reply: Reply<()>,
    },
    Resume {
        reply: Reply<()>,
    },
    Seek {
        secs: f64,
        reply: Reply<()>,
    },
    GoToPosition {
        percentage: f64,
        reply: Reply<()>,
    },
    AddSeconds {
        delta: f64,
        reply: Reply<()>,
    },
    Stop {
        preserve_loop: bool,
        reply: Reply<()>,
    },
    /// `generation` is the navigation counter the caller saw; the request is
    /// dropped if another navigation completed since.
    Navigate {
        direction: NavigationDirection,
        generation: u64,
        reply: Reply<bool>,
    },
    SetVolume {
        level: f64,
        muted: bool,
        reply: Reply<()>,
    },
    Connect {
        device_id: DeviceId,
        reply: Reply<()>,
    },
    SetFileOptions {
        options: FileOptions,
        reply: Reply<()>,
    },
    RefreshEntry {
        entry_id: EntryId,
        reply: Reply<()>,
    },
    AddPlaylist {
        name: String,
        reply: Reply<PlaylistId>,
    },
    RemovePlaylist {
        playlist_id: PlaylistId,
        reply: Reply<()>,
    },
    AddEntries {
        playlist_id: PlaylistId,
        paths: Vec<String>,
        reply: Reply<Vec<EntryId>>,
    },
    RemoveEntries {
        playlist_id: PlaylistId,
        entry_ids: Vec<EntryId>,
        reply: Reply<usize>,
    },
    MoveEntry {
        playlist_id: PlaylistId,
        entry_id: EntryId,
        position: u32,
        reply: Reply<()>,
    },
    SetPlaylistFlags {
        playlist_id: PlaylistId,
        shuffle: Option<bool>,
        looping: Option<bool>,
        reply: Reply<()>,
    },
    SetEntryLoop {
        entry_id: EntryId,
        looping: bool,
        reply: Reply<()>,
    },
    /// The `/media` route could not produce a stream.
    StreamFailed {
        error: Error,
    },
}

#[derive(Clone)]
pub struct SessionHandle {
    inbox: mpsc::Sender<Command>,
    snapshot: watch::Receiver<SessionSnapshot>,
    cancel: Arc<Mutex<CancellationToken>>,
}

impl SessionHandle {
    pub(crate) fn new(
        inbox: mpsc::Sender<Command>,
        snapshot: watch::Receiver<SessionSnapshot>,
        cancel: Arc<Mutex<CancellationToken>>,
    ) -> Self {
        Self {
            inbox,
            snapshot,
            cancel,
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// A receiver notified whenever the snapshot changes.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.inbox
            .send(build(tx))
            .await
            .map_err(|_| Error::Internal("session controller is not running".into()))?;
        rx.await
            .map_err(|_| Error::Internal("session controller dropped the request".into()))?
    }

    pub async fn play(&self, entry_id: EntryId) -> Result<()> {
        self.play_with(entry_id, PlayOptions::user()).await
    }

    pub async fn play_with(&self, entry_id: EntryId, options: PlayOptions) -> Result<()> {
        if self.snapshot.borrow().state == PlaybackState::Connecting {
            return Err(Error::Connecting("a device connection is in progress".into()));
        }
        self.request(|reply| Command::Play {
            entry_id,
            options,
            reply,
        })
        .await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(|reply| Command::Pause { reply }).await
    }

    pub async fn resume(&self) -> Result<()> {
        self.request(|reply| Command::Resume { reply }).await
    }

    pub async fn toggle_pause(&self) -> Result<()> {
        if self.snapshot.borrow().state == PlaybackState::Paused {
            self.resume().await
        } else {
            self.pause().await
        }
    }

    pub async fn seek(&self, secs: f64) -> Result<()> {
        self.request(|reply| Command::Seek { secs, reply }).await
    }

    pub async fn go_to_position(&self, percentage: f64) -> Result<()> {
        self.request(|reply| Command::GoToPosition { percentage, reply })
            .await
    }

    /// Skip forward (or back, when negative) relative to the current time.
    pub async fn add_seconds(&self, delta: f64) -> Result<()> {
        self.request(|reply| Command::AddSeconds { delta, reply }).await
    }

    /// Stop playback and clear every file loop.
    pub async fn stop(&self) -> Result<()> {
        self.stop_with(false).await
    }

    /// Stop playback. In-flight probes and transcodes are cancelled before
    /// the request is queued.
    pub async fn stop_with(&self, preserve_loop: bool) -> Result<()> {
        self.cancel.lock().cancel();
        self.request(|reply| Command::Stop {
            preserve_loop,
            reply,
        })
        .await
    }

    /// Skip to the next entry. Returns `false` when the request was dropped
    /// because another navigation was in flight.
    pub async fn next(&self) -> Result<bool> {
        self.navigate(NavigationDirection::Next).await
    }

    pub async fn previous(&self) -> Result<bool> {
        self.navigate(NavigationDirection::Previous).await
    }

    async fn navigate(&self, direction: NavigationDirection) -> Result<bool> {
        let (state, generation) = {
            let snapshot = self.snapshot.borrow();
            (snapshot.state, snapshot.navigation)
        };
        if state == PlaybackState::Navigating {
            tracing::debug!(?direction, "Navigation already in flight; dropping request");
            return Ok(false);
        }
        self.request(|reply| Command::Navigate {
            direction,
            generation,
            reply,
        })
        .await
    }

    pub async fn set_volume(&self, level: f64, muted: bool) -> Result<()> {
        self.request(|reply| Command::SetVolume {
            level,
            muted,
            reply,
        })
        .await
    }

    pub async fn connect(&self, device_id: DeviceId) -> Result<()> {
        self.request(|reply| Command::Connect { device_id, reply })
            .await
    }

    /// Replace the stream selection. A loaded file is reloaded at its
    /// current time.
    pub async fn set_file_options(&self, options: FileOptions) -> Result<()> {
        self.request(|reply| Command::SetFileOptions { options, reply })
            .await
    }

    /// Recompute existence and re-probe an entry.
    pub async fn refresh_entry(&self, entry_id: EntryId) -> Result<()> {
        self.request(|reply| Command::RefreshEntry { entry_id, reply })
            .await
    }

    pub async fn add_playlist(&self, name: impl Into<String>) -> Result<PlaylistId> {
        let name = name.into();
        self.request(|reply| Command::AddPlaylist { name, reply }).await
    }

    pub async fn remove_playlist(&self, playlist_id: PlaylistId) -> Result<()> {
        self.request(|reply| Command::RemovePlaylist { playlist_id, reply })
            .await
    }

    pub async fn add_entries(&self, playlist_id: PlaylistId, paths: Vec<String>) -> Result<Vec<EntryId>> {
        self.request(|reply| Command::AddEntries {
            playlist_id,
            paths,
            reply,
        })
        .await
    }

    pub async fn remove_entries(&self, playlist_id: PlaylistId, entry_ids: Vec<EntryId>) -> Result<usize> {
        self.request(|reply| Command::RemoveEntries {
            playlist_id,
            entry_ids,
            reply,
        })
        .await
    }

    pub async fn move_entry(&self, playlist_id: PlaylistId, entry_id: EntryId, position: u32) -> Result<()> {
        self.request(|reply| Command::MoveEntry {
            playlist_id,
            entry_id,
            position,
            reply,
        })
        .await
    }

    pub async fn set_playlist_flags(
        &self,
        playlist_id: PlaylistId,
        shuffle: Option<bool>,
        looping: Option<bool>,
    ) -> Result<()> {
        self.request(|reply| Command::SetPlaylistFlags {
            playlist_id,
            shuffle,
            looping,
            reply,
        })
        .await
    }

    /// Enabling a loop clears it on every other entry in the library.
    pub async fn set_entry_loop(&self, entry_id: EntryId, looping: bool) -> Result<()> {
        self.request(|reply| Command::SetEntryLoop {
            entry_id,
            looping,
            reply,
        })
        .await
    }

    /// Fire-and-forget report from the streaming route.
    pub fn report_stream_failure(&self, error: Error) {
        if let Err(e) = self.inbox.try_send(Command::StreamFailed { error }) {
            tracing::warn!(error = %e, "Could not report stream failure to the session");
        }
    }
}
