//! Scheduler events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to decisions made by the slot scheduler, the runtime
//! driver and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `SlotScheduler` (every admission/eviction/swap decision),
//!   `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the runtime's subscriber listener (fans out to
//!   `SubscriberSet`) and anyone holding [`Bus::subscribe`].

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
