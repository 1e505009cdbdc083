//! Media engine seam: identifiers and the attach/detach contract.
//!
//! ## Contents
//! - [`SourceId`], [`SourceHandle`], [`ViewId`] identifiers shared with the engine
//! - [`MediaEngine`] async trait the runtime drives
//! - `RecordingEngine` in-memory engine (tests / `test-util` feature)

mod media;
mod types;

#[cfg(any(test, feature = "test-util"))]
mod recording;

pub use media::MediaEngine;
pub use types::{SourceHandle, SourceId, ViewId};

#[cfg(any(test, feature = "test-util"))]
pub use recording::{EngineCall, RecordingEngine};
