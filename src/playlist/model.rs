//! Playlists, their entries, and the library holding them.

use std::path::Path;

use castit_av::StreamMetadata;
use castit_core::{EntryId, Error, FileKind, PlaylistId, Result};
use serde::{Deserialize, Serialize};

/// A single file or URL inside a playlist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaylistEntry {
    pub id: EntryId,
    /// 1-based, dense within the playlist.
    pub position: u32,
    pub path: String,
    pub name: String,
    /// `None` when no handler recognizes the path.
    pub kind: Option<FileKind>,
    pub duration_secs: Option<f64>,
    pub played_percentage: f64,
    pub elapsed_secs: f64,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub exists: bool,
    #[serde(default)]
    pub metadata: Option<StreamMetadata>,
}

impl PlaylistEntry {
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        let kind = FileKind::classify(&path);
        Self {
            id: EntryId::new(),
            position: 0,
            name: display_name(&path),
            exists: kind.is_some_and(|k| k.is_remote()) || Path::new(&path).exists(),
            path,
            kind,
            duration_secs: None,
            played_percentage: 0.0,
            elapsed_secs: 0.0,
            looping: false,
            metadata: None,
        }
    }

    pub fn is_url(&self) -> bool {
        self.kind.is_some_and(|k| k.is_remote())
    }

    /// Store probed metadata and the duration it reports.
    pub fn set_metadata(&mut self, metadata: StreamMetadata) {
        self.duration_secs = metadata.duration_secs();
        self.metadata = Some(metadata);
    }

    /// Update elapsed time and the derived played percentage.
    pub fn record_progress(&mut self, elapsed_secs: f64) {
        self.elapsed_secs = elapsed_secs.max(0.0);
        self.played_percentage = match self.duration_secs {
            Some(d) if d > 0.0 => (self.elapsed_secs / d * 100.0).clamp(0.0, 100.0),
            _ => 0.0,
        };
    }

    pub fn mark_finished(&mut self) {
        self.played_percentage = 100.0;
        self.elapsed_secs = self.duration_secs.unwrap_or(self.elapsed_secs);
    }
}

fn display_name(path: &str) -> String {
    if FileKind::classify(path).is_some_and(|k| k.is_remote()) {
        return path.to_string();
    }
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string())
}

/// An ordered sequence of entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Playlist {
    pub id: PlaylistId,
    pub name: String,
    /// 1-based position among sibling playlists.
    pub position: u32,
    pub shuffle: bool,
    #[serde(rename = "loop")]
    pub looping: bool,
    pub entries: Vec<PlaylistEntry>,
}

impl Playlist {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: PlaylistId::new(),
            name: name.into(),
            position: 0,
            shuffle: false,
            looping: false,
            entries: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reassign positions 1..N in list order.
    pub fn renumber(&mut self) {
        for (i, entry) in self.entries.iter_mut().enumerate() {
            entry.position = i as u32 + 1;
        }
    }

    pub fn index_of(&self, id: EntryId) -> Option<usize> {
        self.entries.iter().position(|e| e.id == id)
    }

    pub fn entry(&self, id: EntryId) -> Option<&PlaylistEntry> {
        self.entries.iter().find(|e| e.id == id)
    }

    pub fn entry_mut(&mut self, id: EntryId) -> Option<&mut PlaylistEntry> {
        self.entries.iter_mut().find(|e| e.id == id)
    }

    /// Insert `entry` at `index` (appended when `None` or out of range).
    pub fn insert(&mut self, entry: PlaylistEntry, index: Option<usize>) -> Result<EntryId> {
        if self.index_of(entry.id).is_some() {
            return Err(Error::Validation(format!(
                "entry {} is already in playlist {}",
                entry.id, self.id
            )));
        }
        let id = entry.id;
        let at = index.unwrap_or(self.entries.len()).min(self.entries.len());
        self.entries.insert(at, entry);
        self.renumber();
        Ok(id)
    }

    /// Append one entry per path.
    pub fn add_paths<I, S>(&mut self, paths: I) -> Vec<EntryId>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let added: Vec<EntryId> = paths
            .into_iter()
            .map(|p| {
                let entry = PlaylistEntry::new(p);
                let id = entry.id;
                self.entries.push(entry);
                id
            })
            .collect();
        self.renumber();
        added
    }

    /// Remove the given entries, returning how many were removed.
    pub fn remove(&mut self, ids: &[EntryId]) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !ids.contains(&e.id));
        self.renumber();
        before - self.entries.len()
    }

    /// Move an entry to a new 1-based position (clamped to the list).
    pub fn move_entry(&mut self, id: EntryId, new_position: u32) -> Result<()> {
        let from = self
            .index_of(id)
            .ok_or_else(|| Error::not_found("entry", id))?;
        let entry = self.entries.remove(from);
        let to = (new_position.max(1) as usize - 1).min(self.entries.len());
        self.entries.insert(to, entry);
        self.renumber();
        Ok(())
    }
}

/// All playlists known to the application.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub playlists: Vec<Playlist>,
}

impl Library {
    pub fn playlist(&self, id: PlaylistId) -> Option<&Playlist> {
        self.playlists.iter().find(|p| p.id == id)
    }

    pub fn playlist_mut(&mut self, id: PlaylistId) -> Option<&mut Playlist> {
        self.playlists.iter_mut().find(|p| p.id == id)
    }

    /// Like [`Library::playlist_mut`] but reports a missing playlist as an error.
    pub fn require_playlist_mut(&mut self, id: PlaylistId) -> Result<&mut Playlist> {
        self.playlist_mut(id)
            .ok_or_else(|| Error::not_found("playlist", id))
    }

    pub fn add_playlist(&mut self, name: impl Into<String>) -> PlaylistId {
        let playlist = Playlist::new(name);
        let id = playlist.id;
        self.playlists.push(playlist);
        self.renumber();
        id
    }

    pub fn remove_playlist(&mut self, id: PlaylistId) -> bool {
        let before = self.playlists.len();
        self.playlists.retain(|p| p.id != id);
        self.renumber();
        before != self.playlists.len()
    }

    fn renumber(&mut self) {
        for (i, playlist) in self.playlists.iter_mut().enumerate() {
            playlist.position = i as u32 + 1;
        }
    }

    /// Locate an entry anywhere in the library.
    pub fn find_entry(&self, id: EntryId) -> Option<(&Playlist, &PlaylistEntry)> {
        self.playlists
            .iter()
            .find_map(|p| p.entry(id).map(|e| (p, e)))
    }

    pub fn find_entry_mut(&mut self, id: EntryId) -> Option<(PlaylistId, &mut PlaylistEntry)> {
        self.playlists
            .iter_mut()
            .find_map(|p| {
                let playlist_id = p.id;
                p.entry_mut(id).map(|e| (playlist_id, e))
            })
    }

    /// Set the loop flag of one entry. Enabling it clears the flag on every
    /// other entry in the library. Returns every entry whose flag changed.
    pub fn set_entry_loop(&mut self, id: EntryId, looping: bool) -> Result<Vec<(EntryId, bool)>> {
        if self.find_entry(id).is_none() {
            return Err(Error::not_found("entry", id));
        }

        let mut changed = Vec::new();
        for entry in self.playlists.iter_mut().flat_map(|p| p.entries.iter_mut()) {
            let wanted = if entry.id == id { looping } else { entry.looping && !looping };
            if entry.looping != wanted {
                entry.looping = wanted;
                changed.push((entry.id, wanted));
            }
        }
        Ok(changed)
    }

    /// Clear every loop flag, returning the entries that were looping.
    pub fn disable_all_loops(&mut self) -> Vec<EntryId> {
        let mut changed = Vec::new();
        for entry in self.playlists.iter_mut().flat_map(|p| p.entries.iter_mut()) {
            if entry.looping {
                entry.looping = false;
                changed.push(entry.id);
            }
        }
        changed
    }
}
