/// Resource accounting for remote rendering.
///
/// - `ceiling`: maximum simultaneously rendered remote sources (engine-dictated)
/// - `live`: registered remote sources
/// - `rendered`: sources whose attach completed and whose detach has not
///
/// At quiescent points `rendered <= ceiling` and `rendered` equals the number of
/// rendered tiles.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResourceBudget {
    pub ceiling: usize,
    pub live: usize,
    pub rendered: usize,
}

impl ResourceBudget {
    pub(super) fn new(ceiling: usize) -> Self {
        Self {
            ceiling,
            live: 0,
            rendered: 0,
        }
    }

    /// True while `committed` sources leave room for one more.
    #[inline]
    pub(super) fn admits(&self, committed: usize) -> bool {
        committed < self.ceiling
    }

    /// Number of sources above the ceiling.
    #[inline]
    pub(super) fn excess(&self, committed: usize) -> usize {
        committed.saturating_sub(self.ceiling)
    }
}
