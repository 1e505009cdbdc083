//! Remote-source registry kept in insertion order.
//!
//! Insertion order is the admission order for backfill and ceiling raises.

use crate::engine::{SourceHandle, SourceId};

/// Lifecycle of one registered remote source.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum SourceState {
    /// Known but not in any tile.
    Unrendered,
    /// Attach to this tile in flight.
    Attaching(usize),
    /// Rendered in this tile.
    Rendered(usize),
    /// Leaving this tile; returns to `Unrendered` when the detach completes.
    Detaching(usize),
    /// Left its tile for a swap and waits for its new one.
    Relocating,
}

impl SourceState {
    /// Counts against the resource ceiling.
    pub fn is_committed(self) -> bool {
        matches!(
            self,
            SourceState::Attaching(_) | SourceState::Rendered(_) | SourceState::Relocating
        )
    }
}

#[derive(Clone, Debug)]
pub(super) struct RemoteSource {
    pub id: SourceId,
    pub handle: SourceHandle,
    pub state: SourceState,
}

#[derive(Debug, Default)]
pub(super) struct Registry {
    sources: Vec<RemoteSource>,
}

impl Registry {
    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn contains(&self, id: &SourceId) -> bool {
        self.get(id).is_some()
    }

    pub fn get(&self, id: &SourceId) -> Option<&RemoteSource> {
        self.sources.iter().find(|s| &s.id == id)
    }

    pub fn state(&self, id: &SourceId) -> Option<SourceState> {
        self.get(id).map(|s| s.state)
    }

    /// Sets the state of a registered source; unknown ids are ignored.
    pub fn set_state(&mut self, id: &SourceId, state: SourceState) {
        if let Some(src) = self.sources.iter_mut().find(|s| &s.id == id) {
            src.state = state;
        }
    }

    /// Registers a new unrendered source. Returns false on a duplicate id.
    pub fn insert(&mut self, id: SourceId, handle: SourceHandle) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.sources.push(RemoteSource {
            id,
            handle,
            state: SourceState::Unrendered,
        });
        true
    }

    pub fn remove(&mut self, id: &SourceId) -> Option<RemoteSource> {
        let pos = self.sources.iter().position(|s| &s.id == id)?;
        Some(self.sources.remove(pos))
    }

    pub fn clear(&mut self) {
        self.sources.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &RemoteSource> {
        self.sources.iter()
    }

    /// Unrendered sources in insertion order.
    pub fn unrendered(&self) -> Vec<SourceId> {
        self.sources
            .iter()
            .filter(|s| s.state == SourceState::Unrendered)
            .map(|s| s.id.clone())
            .collect()
    }

    pub fn first_unrendered(&self) -> Option<SourceId> {
        self.sources
            .iter()
            .find(|s| s.state == SourceState::Unrendered)
            .map(|s| s.id.clone())
    }

    /// Sources holding (or about to hold) a tile.
    pub fn committed(&self) -> usize {
        self.sources
            .iter()
            .filter(|s| s.state.is_committed())
            .count()
    }
}
