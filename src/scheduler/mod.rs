//! Render-slot scheduling: the synchronous core.
//!
//! ## Contents
//! - [`SlotScheduler`] state machine (`handle(Input) -> Vec<Command>`)
//! - [`Input`], [`MediaEvent`], [`Completion`], [`Command`], [`OpId`] its vocabulary
//! - [`ResourceBudget`] ceiling / live / rendered accounting
//! - [`SlotSnapshot`], [`Tile`] read-only view for the display layer
//!
//! ## Quick reference
//! ```text
//! tiles:   0 = local │ 1..=N grid (cropped) │ N+1 featured │ S share (out of band)
//! source:  Unrendered ─► Attaching ─► Rendered ─► Detaching ─► Unrendered
//!                                        └──► Relocating (swap) ──► Attaching
//! share:   Idle ─► Attaching ─► Active ─► Detaching ─► Idle
//! ```
//!
//! Nothing here is async: the runtime module owns the queue and the engine
//! calls, which keeps the scheduler deterministic under test.

mod budget;
mod input;
mod machine;
mod registry;
mod share;
mod slot;
mod snapshot;

pub use budget::ResourceBudget;
pub use input::{Command, Completion, Input, MediaEvent, OpId};
pub use machine::SlotScheduler;
pub use snapshot::{SlotSnapshot, Tile};
