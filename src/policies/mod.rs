//! Scheduling policies.
//!
//! This module groups the knobs that control **which** sources give up their
//! tiles when the resource ceiling drops.
//!
//! ## Contents
//! - [`EvictionPolicy`] victim order on ceiling drops (tail-first / least-recently-rendered)
//!
//! ## Quick wiring
//! ```text
//! SchedulerConfig { eviction: EvictionPolicy, .. }
//!      └─► SlotScheduler::on_ceiling_changed uses:
//!           - eviction.order(candidates) to pick victims
//! ```

mod eviction;

pub use eviction::{EvictionCandidate, EvictionPolicy};
