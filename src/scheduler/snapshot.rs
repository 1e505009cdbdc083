//! Read-only view of the slot table for the display layer.

use crate::engine::SourceId;

/// Content of one numbered tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Tile {
    /// The local camera (always tile 0).
    Local,
    /// No remote source.
    Open,
    /// A remote source is attached or attaching.
    Remote(SourceId),
}

impl Tile {
    /// Remote occupant, if any.
    pub fn source(&self) -> Option<&SourceId> {
        match self {
            Tile::Remote(id) => Some(id),
            _ => None,
        }
    }
}

/// Slot table as seen after one processed input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotSnapshot {
    /// Tiles `0..K`; the last one is the featured tile.
    pub tiles: Vec<Tile>,
    /// Whether a window share is rendered.
    pub share_active: bool,
    /// Ceiling in effect.
    pub ceiling: usize,
    /// Registered remote sources.
    pub live: usize,
    /// Remote sources rendered.
    pub rendered: usize,
    /// Engine operations awaiting completion.
    pub in_flight: usize,
}

impl SlotSnapshot {
    /// Remote occupant of the featured tile.
    pub fn featured(&self) -> Option<&SourceId> {
        self.tiles.last().and_then(Tile::source)
    }

    /// Tile holding `id`, if any.
    pub fn position(&self, id: &SourceId) -> Option<usize> {
        self.tiles.iter().position(|t| t.source() == Some(id))
    }

    /// No engine operation is pending.
    pub fn is_quiescent(&self) -> bool {
        self.in_flight == 0
    }
}
