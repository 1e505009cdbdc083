//! Error types used by the slotvisor runtime and its media engine.
//!
//! This module defines three enums:
//!
//! - [`EngineError`]: failures reported by a [`MediaEngine`](crate::MediaEngine) call.
//! - [`ConfigError`]: invalid [`SchedulerConfig`](crate::SchedulerConfig) values.
//! - [`SubmitError`]: the runtime input queue rejected an event.
//!
//! None of these are fatal to the scheduler. Engine failures are absorbed by
//! the state machine (rollback on attach, best-effort on detach) and reported
//! as events; they never propagate to the caller that submitted the event.

use std::time::Duration;
use thiserror::Error;

use crate::engine::ViewId;

/// # Errors produced by the media engine.
///
/// Every attach/detach may fail. The scheduler treats all variants as
/// transient: a failed attach is rolled back and retried only as a side
/// effect of the next structurally relevant event.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// Engine is busy and refused the request.
    #[error("engine busy")]
    Busy,

    /// The source handle no longer refers to a live stream.
    #[error("source gone: {handle}")]
    SourceGone {
        /// Handle the engine could not resolve.
        handle: String,
    },

    /// The target view does not exist or cannot be drawn to.
    #[error("view unavailable: {view}")]
    ViewUnavailable {
        /// View that was addressed.
        view: ViewId,
    },

    /// The call did not resolve within the configured engine timeout.
    #[error("timed out after {timeout:?}")]
    Timeout {
        /// The timeout that was exceeded.
        timeout: Duration,
    },

    /// Any other engine-reported failure.
    #[error("engine failure: {error}")]
    Other {
        /// The underlying error message.
        error: String,
    },
}

impl EngineError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use slotvisor::EngineError;
    /// use std::time::Duration;
    ///
    /// let err = EngineError::Timeout { timeout: Duration::from_secs(2) };
    /// assert_eq!(err.as_label(), "engine_timeout");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            EngineError::Busy => "engine_busy",
            EngineError::SourceGone { .. } => "engine_source_gone",
            EngineError::ViewUnavailable { .. } => "engine_view_unavailable",
            EngineError::Timeout { .. } => "engine_timeout",
            EngineError::Other { .. } => "engine_other",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            EngineError::Busy => "busy".to_string(),
            EngineError::SourceGone { handle } => format!("source gone: {handle}"),
            EngineError::ViewUnavailable { view } => format!("view unavailable: {view}"),
            EngineError::Timeout { timeout } => format!("timeout: {timeout:?}"),
            EngineError::Other { error } => format!("error: {error}"),
        }
    }
}

/// # Invalid scheduler configuration.
///
/// Returned by [`SchedulerConfig::validate`](crate::SchedulerConfig::validate)
/// and by the runtime builder.
#[non_exhaustive]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// At least one grid slot is required.
    #[error("grid_slots must be at least 1")]
    NoGridSlots,

    /// The input queue must hold at least one event.
    #[error("queue_capacity must be at least 1")]
    ZeroQueueCapacity,
}

impl ConfigError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            ConfigError::NoGridSlots => "config_no_grid_slots",
            ConfigError::ZeroQueueCapacity => "config_zero_queue_capacity",
        }
    }
}

/// Error returned by [`SchedulerHandle::submit`](crate::SchedulerHandle::submit).
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// Input queue is full (try again later or use async `submit`).
    #[error("input queue full")]
    Full,

    /// Runtime channel is closed (driver stopped).
    #[error("scheduler channel closed")]
    Closed,
}
