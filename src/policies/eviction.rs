//! # Eviction policy for ceiling drops.
//!
//! [`EvictionPolicy`] decides which occupied tiles are given up first when the
//! resource ceiling falls below the number of committed sources.
//!
//! - [`EvictionPolicy::TailFirst`] grid tiles from the highest index down (default).
//! - [`EvictionPolicy::LeastRecentlyRendered`] grid tiles whose occupant has been
//!   rendered the longest go first.
//!
//! Under both policies the featured tile is the last one given up: the loudest
//! speaker keeps rendering as long as the ceiling allows one remote source.
//!
//! ## Ordering
//! ```text
//! grid = [1:B(t=3), 2:C(t=1), 3:D(t=2)], featured = 5:A
//!
//! TailFirst             → 3, 2, 1, 5
//! LeastRecentlyRendered → 2, 3, 1, 5
//! ```

/// An occupied tile that may be given up.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EvictionCandidate {
    /// Tile index.
    pub slot: usize,
    /// Whether this is the featured tile.
    pub featured: bool,
    /// Render stamp of the occupant (`None` while its attach is in flight).
    pub since: Option<u64>,
}

/// Policy controlling the order in which tiles are evicted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EvictionPolicy {
    /// Evict grid tiles from the highest index down, the featured tile last.
    #[default]
    TailFirst,
    /// Evict the grid occupant rendered the longest first, the featured tile last.
    ///
    /// Occupants whose attach is still in flight count as the most recent.
    LeastRecentlyRendered,
}

impl EvictionPolicy {
    /// Orders candidates from first-to-evict to last-to-evict.
    pub fn order(&self, mut candidates: Vec<EvictionCandidate>) -> Vec<EvictionCandidate> {
        match self {
            EvictionPolicy::TailFirst => {
                candidates.sort_by_key(|c| (c.featured, std::cmp::Reverse(c.slot)));
            }
            EvictionPolicy::LeastRecentlyRendered => {
                candidates.sort_by_key(|c| (c.featured, c.since.unwrap_or(u64::MAX), c.slot));
            }
        }
        candidates
    }
}
