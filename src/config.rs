//! # Scheduler configuration.
//!
//! Provides [`SchedulerConfig`], the settings consumed at construction by
//! [`SlotScheduler`](crate::SlotScheduler) and the runtime builder.
//!
//! ## Slot geometry
//! With `grid_slots = N` the tile table has `K = N + 2` entries:
//! ```text
//! 0        local camera
//! 1..=N    grid tiles (cropped)
//! N + 1    featured tile (loudest speaker, uncropped)
//! S        share view (out of band)
//! ```
//!
//! ## Sentinel values
//! - `engine_timeout = 0s` → no timeout (engine calls are awaited indefinitely)

use std::time::Duration;

use crate::error::ConfigError;
use crate::policies::EvictionPolicy;

/// Configuration for the slot scheduler and its runtime.
///
/// ## Field semantics
/// - `grid_slots`: Number of grid tiles (min 1)
/// - `initial_ceiling`: Remote sources renderable until the engine reports otherwise
/// - `eviction`: Victim order when the ceiling drops
/// - `engine_timeout`: Bound on one attach/detach (`0s` = unbounded)
/// - `queue_capacity`: Runtime input queue size (min 1)
/// - `bus_capacity`: Event bus ring buffer size (min 1; clamped by Bus)
#[derive(Clone, Debug)]
pub struct SchedulerConfig {
    /// Number of grid tiles between the local tile and the featured tile.
    pub grid_slots: usize,

    /// Resource ceiling in effect at construction and after a disconnect reset.
    ///
    /// May exceed `grid_slots + 1`; the tile count then becomes the limit.
    pub initial_ceiling: usize,

    /// Order in which tiles are given up when the ceiling drops.
    pub eviction: EvictionPolicy,

    /// Maximum time to wait for one engine call.
    ///
    /// - `Duration::ZERO` = no timeout (the engine is trusted to resolve)
    /// - `> 0` = an unresolved call completes as `EngineError::Timeout`
    pub engine_timeout: Duration,

    /// Capacity of the runtime input queue.
    ///
    /// When full, `submit()` waits and `try_submit()` returns `Full`.
    pub queue_capacity: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,
}

impl SchedulerConfig {
    /// Returns the engine timeout as an `Option`.
    ///
    /// - `None` → no timeout
    /// - `Some(d)` → timeout applied per engine call
    #[inline]
    pub fn engine_timeout(&self) -> Option<Duration> {
        if self.engine_timeout.is_zero() {
            None
        } else {
            Some(self.engine_timeout)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Total number of numbered tiles (local + grid + featured).
    #[inline]
    pub fn tile_count(&self) -> usize {
        self.grid_slots + 2
    }

    /// Checks the configuration for values the scheduler cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid_slots == 0 {
            return Err(ConfigError::NoGridSlots);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        Ok(())
    }
}

impl Default for SchedulerConfig {
    /// Default configuration:
    ///
    /// - `grid_slots = 4` (six tiles: local, four grid, featured)
    /// - `initial_ceiling = 5`
    /// - `eviction = EvictionPolicy::TailFirst`
    /// - `engine_timeout = 0s` (no timeout)
    /// - `queue_capacity = 256`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            grid_slots: 4,
            initial_ceiling: 5,
            eviction: EvictionPolicy::default(),
            engine_timeout: Duration::ZERO,
            queue_capacity: 256,
            bus_capacity: 1024,
        }
    }
}
