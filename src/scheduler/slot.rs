use std::ops::RangeInclusive;

use crate::engine::{SourceId, ViewId};

use super::input::OpId;

/// Identifier of one speaker swap or feature move.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(super) struct SwapId(pub u64);

/// Fixed tile geometry: local tile, `grid` grid tiles, featured tile.
#[derive(Clone, Copy, Debug)]
pub(super) struct SlotLayout {
    grid: usize,
}

impl SlotLayout {
    /// Tile reserved for the local camera.
    pub const LOCAL: usize = 0;

    pub fn new(grid: usize) -> Self {
        Self { grid }
    }

    /// Number of numbered tiles.
    pub fn len(&self) -> usize {
        self.grid + 2
    }

    /// Index of the featured tile.
    pub fn featured(&self) -> usize {
        self.grid + 1
    }

    pub fn is_featured(&self, slot: usize) -> bool {
        slot == self.featured()
    }

    /// Grid tile indices, ascending.
    pub fn grid(&self) -> RangeInclusive<usize> {
        1..=self.grid
    }

    /// Remote tiles (grid and featured).
    pub fn remote(&self) -> RangeInclusive<usize> {
        1..=self.featured()
    }

    pub fn view(&self, slot: usize) -> ViewId {
        ViewId::Tile(slot)
    }
}

/// What to do with a tile once its detach completes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum Then {
    /// Leave the tile open and backfill it if the ceiling allows.
    Backfill,
    /// Place this source (it is relocating into the tile).
    Fill(SourceId),
    /// Hold the tile until the other half of the swap is done.
    Swap(SwapId),
}

/// State of one numbered tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum SlotState {
    /// Free to be assigned.
    Open,

    /// Attach in flight (optimistically claimed).
    Attaching {
        /// Source being attached.
        source: SourceId,
        /// Pending engine operation.
        op: OpId,
    },

    /// Source is rendered.
    Rendered {
        /// Occupant.
        source: SourceId,
        /// Render clock value at attach completion.
        since: u64,
    },

    /// Detach in flight.
    Detaching {
        /// Source leaving the tile.
        source: SourceId,
        /// Pending engine operation.
        op: OpId,
        /// Follow-up once the view is clear.
        then: Then,
    },

    /// Vacated and reserved for the second half of a swap.
    Held {
        /// Swap the tile belongs to.
        swap: SwapId,
    },
}

impl SlotState {
    pub fn is_open(&self) -> bool {
        matches!(self, SlotState::Open)
    }

    /// Pending operation, if any.
    pub fn op(&self) -> Option<OpId> {
        match self {
            SlotState::Attaching { op, .. } | SlotState::Detaching { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// Source shown in the tile (attaching or rendered).
    pub fn occupant(&self) -> Option<&SourceId> {
        match self {
            SlotState::Attaching { source, .. } | SlotState::Rendered { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// A speaker swap (or feature move, when `displaced` is `None`) in progress.
#[derive(Clone, Debug)]
pub(super) struct Swap {
    /// Source moving into the featured tile.
    pub speaker: SourceId,
    /// Grid tile the speaker is leaving.
    pub grid_slot: usize,
    /// Previous featured occupant, moving into `grid_slot`.
    pub displaced: Option<SourceId>,
    /// Detaches still in flight.
    pub outstanding: u8,
}
