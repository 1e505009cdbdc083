//! # Event subscribers for the slotvisor runtime.
//!
//! This module provides the [`Subscribe`] trait, the [`SubscriberSet`] fan-out
//! and built-in implementations for handling events broadcast through the
//! [`Bus`](crate::events::Bus).
//!
//! ## Architecture
//! ```text
//! SlotScheduler ── publish(Event) ──► Bus ──► subscriber listener (runtime)
//!                                                   │
//!                                                   ▼
//!                                             SubscriberSet
//!                                    ┌─────────┬────┴────┬─────────┐
//!                                    ▼         ▼         ▼         ▼
//!                                LogWriter  Layout    Metrics    ...
//! ```

#[cfg_attr(not(feature = "logging"), allow(dead_code))]
mod embedded;
mod set;
mod subscribe;

#[cfg_attr(not(feature = "logging"), allow(unused_imports))]
pub use embedded::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;
