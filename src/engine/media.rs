//! # Media engine contract
//!
//! `MediaEngine` is the only way the scheduler reaches the outside world.
//! The runtime calls it from spawned tasks; every call resolves to a
//! [`Completion`](crate::Completion) that is fed back into the scheduler queue.
//!
//! ## Contract
//! - Both calls may fail (engine busy, source gone, view unavailable).
//! - Calls for different views may run concurrently; the scheduler never
//!   issues two overlapping operations on the same view.
//! - The engine is expected to resolve every call eventually. Configure
//!   [`SchedulerConfig::engine_timeout`](crate::SchedulerConfig::engine_timeout)
//!   to turn a hung call into [`EngineError::Timeout`].
//!
//! ## Example (skeleton)
//! ```rust
//! use async_trait::async_trait;
//! use slotvisor::{EngineError, MediaEngine, SourceHandle, ViewId};
//!
//! struct Headless;
//!
//! #[async_trait]
//! impl MediaEngine for Headless {
//!     async fn attach(&self, _h: &SourceHandle, _v: ViewId, _cropped: bool) -> Result<(), EngineError> {
//!         Ok(())
//!     }
//!     async fn detach(&self, _v: ViewId) -> Result<(), EngineError> {
//!         Ok(())
//!     }
//! }
//! ```

use async_trait::async_trait;

use super::types::{SourceHandle, ViewId};
use crate::error::EngineError;

/// Asynchronous attach/detach primitives exposed by the media engine.
#[async_trait]
pub trait MediaEngine: Send + Sync + 'static {
    /// Starts rendering `handle` into `view`.
    ///
    /// `cropped` asks the engine to fill the view (grid tiles) rather than
    /// letterbox the source (featured and share views).
    async fn attach(
        &self,
        handle: &SourceHandle,
        view: ViewId,
        cropped: bool,
    ) -> Result<(), EngineError>;

    /// Stops rendering whatever is attached to `view`.
    async fn detach(&self, view: ViewId) -> Result<(), EngineError>;

    /// Human-readable name (for logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}
