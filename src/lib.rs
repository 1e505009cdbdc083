//! # slotvisor
//!
//! **Slotvisor** decides which remote video sources of a conference get one
//! of a fixed number of rendering views, and keeps that decision consistent
//! while sources come and go, the loudest speaker changes and the engine's
//! resource ceiling moves.
//!
//! The decision logic is a synchronous state machine ([`SlotScheduler`]);
//! the async part only queues inputs, runs engine calls and feeds their
//! outcomes back.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   media layer                      SchedulerHandle
//!  (joins, leaves, speaker,  ──────► submit(MediaEvent)
//!   share, ceiling)                        │
//!                                          ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  driver (runtime)                                                 │
//! │  - input queue (bounded, SchedulerConfig::queue_capacity)         │
//! │  - completion queue (unbounded)                                   │
//! │  - SlotScheduler::handle(Input) -> Vec<Command>                   │
//! └──────┬──────────────────┬──────────────────────────────┬──────────┘
//!        │ spawn            │ send_if_modified             │ publish
//!        ▼                  ▼                              ▼
//! ┌──────────────┐   watch<SlotSnapshot>     ┌──────────────────────────┐
//! │ MediaEngine  │   (display layer)         │ Bus (broadcast channel)  │
//! │ attach/detach│                           └────────────┬─────────────┘
//! └──────┬───────┘                                        ▼
//!        │ Completion{op, result}              subscriber listener
//!        └──────────► completion queue                    │
//!                                                         ▼
//!                                                   SubscriberSet
//!                                                (per-sub queues)
//! ```
//!
//! ### Slot table
//! ```text
//! 0        local camera (never scheduled)
//! 1..=N    grid tiles, cropped
//! N + 1    featured tile: loudest speaker, or the only remote source
//! S        window share, independent of the ceiling
//! ```
//!
//! ### Admission
//! ```text
//! committed = attaching + rendered + relocating sources
//! admit     ⇔ committed < ceiling
//!
//! SourceAdded ──► headroom? ──no──► stays Unrendered (AdmissionDenied)
//!                    │yes
//!                    ▼
//!     open grid tile (featured if sole source) ──► Attach ──► Rendered
//!                                                     └─ failed ─► Unrendered
//! ceiling drop  ──► EvictionPolicy picks victims ──► Detach ──► backfill
//! speaker swap  ──► detach both halves ──► fill featured ──► fill grid tile
//! ```
//!
//! ## Features
//! | Area              | Description                                                 | Key types / traits                       |
//! |-------------------|-------------------------------------------------------------|------------------------------------------|
//! | **Scheduling**    | Deterministic slot allocation, eviction and swaps.          | [`SlotScheduler`], [`MediaEvent`]        |
//! | **Runtime**       | Queue, engine calls with timeout, snapshot publishing.      | [`SchedulerBuilder`], [`SchedulerHandle`]|
//! | **Engine seam**   | Attach/detach primitives provided by the media layer.       | [`MediaEngine`], [`ViewId`]              |
//! | **Subscriber API**| Hook into scheduling decisions (logging, metrics, tests).   | [`Subscribe`], [`Event`]                 |
//! | **Policies**      | Victim order when the ceiling drops.                        | [`EvictionPolicy`]                       |
//! | **Errors**        | Typed engine, configuration and submission errors.          | [`EngineError`], [`ConfigError`]         |
//! | **Configuration** | Grid size, initial ceiling, queue and bus sizes.            | [`SchedulerConfig`]                      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//! - `test-util`: exports `RecordingEngine`, an in-memory [`MediaEngine`].
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use slotvisor::{
//!     EngineError, MediaEngine, MediaEvent, SchedulerBuilder, SchedulerConfig, SourceHandle, Tile,
//!     ViewId,
//! };
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
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rt = SchedulerBuilder::new(SchedulerConfig::default(), Arc::new(Headless)).build()?;
//!     let handle = rt.handle();
//!
//!     handle
//!         .submit(MediaEvent::SourceAdded { id: "alice".into(), handle: "cam-alice".into() })
//!         .await?;
//!     let snap = handle
//!         .wait_for(|s| s.rendered == 1 && s.is_quiescent())
//!         .await
//!         .ok_or("driver stopped")?;
//!
//!     // A lone remote source is shown in the featured tile.
//!     assert_eq!(snap.tiles.last(), Some(&Tile::Remote("alice".into())));
//!
//!     rt.shutdown().await;
//!     Ok(())
//! }
//! ```
mod config;
mod engine;
mod error;
mod events;
mod policies;
mod runtime;
mod scheduler;
mod subscribers;

// ---- Public re-exports ----

pub use config::SchedulerConfig;
pub use engine::{MediaEngine, SourceHandle, SourceId, ViewId};
pub use error::{ConfigError, EngineError, SubmitError};
pub use events::{Bus, Event, EventKind};
pub use policies::{EvictionCandidate, EvictionPolicy};
pub use runtime::{SchedulerBuilder, SchedulerHandle, SlotRuntime};
pub use scheduler::{
    Command, Completion, Input, MediaEvent, OpId, ResourceBudget, SlotScheduler, SlotSnapshot,
    Tile,
};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

// Optional: in-memory engine for tests and demos.
// Enable with: `--features test-util`
#[cfg(any(test, feature = "test-util"))]
pub use engine::{EngineCall, RecordingEngine};
