//! Next/previous resolution over a mutable playlist.

use castit_core::EntryId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::model::Playlist;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NavigationDirection {
    Next,
    Previous,
}

/// Where navigation lands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationOutcome {
    /// Play this entry.
    Entry(EntryId),
    /// The current entry loops: play it again from second 0.
    Replay(EntryId),
    /// Nothing left to play; the caller stops playback.
    EndOfPlaylist,
}

/// What the session remembers about the playing entry. The entry itself may
/// have been deleted or moved since playback started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentRef {
    pub id: EntryId,
    pub position: u32,
}

pub struct NavigationResolver<R = StdRng> {
    rng: R,
}

impl NavigationResolver<StdRng> {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for NavigationResolver<StdRng> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Rng> NavigationResolver<R> {
    pub fn with_rng(rng: R) -> Self {
        Self { rng }
    }

    pub fn next(&mut self, playlist: &Playlist, current: &CurrentRef) -> NavigationOutcome {
        self.resolve(playlist, current, NavigationDirection::Next)
    }

    pub fn previous(&mut self, playlist: &Playlist, current: &CurrentRef) -> NavigationOutcome {
        self.resolve(playlist, current, NavigationDirection::Previous)
    }

    pub fn resolve(
        &mut self,
        playlist: &Playlist,
        current: &CurrentRef,
        direction: NavigationDirection,
    ) -> NavigationOutcome {
        let len = playlist.entries.len();
        if len == 0 {
            return NavigationOutcome::EndOfPlaylist;
        }

        let Some(index) = playlist.index_of(current.id) else {
            return self.recover(playlist, current, direction);
        };

        // A looping file wins over playlist navigation; read the live flag
        // since it may have been toggled during playback.
        if playlist.entries[index].looping {
            return NavigationOutcome::Replay(current.id);
        }

        if playlist.shuffle && len > 1 {
            // Uniform over every index except the current one.
            let pick = self.rng.gen_range(0..len - 1);
            let pick = if pick >= index { pick + 1 } else { pick };
            return NavigationOutcome::Entry(playlist.entries[pick].id);
        }

        let target = match direction {
            NavigationDirection::Next if index + 1 < len => Some(index + 1),
            NavigationDirection::Next => playlist.looping.then_some(0),
            NavigationDirection::Previous if index > 0 => Some(index - 1),
            NavigationDirection::Previous => playlist.looping.then_some(len - 1),
        };

        match target {
            Some(i) => NavigationOutcome::Entry(playlist.entries[i].id),
            None => NavigationOutcome::EndOfPlaylist,
        }
    }

    /// The current entry is gone. Positions were renumbered when it was
    /// removed, so its successor now holds its old position.
    fn recover(
        &mut self,
        playlist: &Playlist,
        current: &CurrentRef,
        direction: NavigationDirection,
    ) -> NavigationOutcome {
        let len = playlist.entries.len();
        if playlist.shuffle && len > 1 {
            let pick = self.rng.gen_range(0..len);
            return NavigationOutcome::Entry(playlist.entries[pick].id);
        }

        let target = match direction {
            NavigationDirection::Next => i64::from(current.position),
            NavigationDirection::Previous => i64::from(current.position) - 1,
        };

        let last = len as i64;
        if target > last {
            return match playlist.looping {
                true => NavigationOutcome::Entry(playlist.entries[0].id),
                false => NavigationOutcome::EndOfPlaylist,
            };
        }
        if target < 1 {
            return match playlist.looping {
                true => NavigationOutcome::Entry(playlist.entries[len - 1].id),
                false => NavigationOutcome::EndOfPlaylist,
            };
        }

        playlist
            .entries
            .iter()
            .min_by_key(|e| ((i64::from(e.position) - target).abs(), e.position))
            .map(|e| NavigationOutcome::Entry(e.id))
            .unwrap_or(NavigationOutcome::EndOfPlaylist)
    }
}
