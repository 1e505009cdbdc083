//! # Events emitted by the slot scheduler.
//!
//! The [`EventKind`] enum classifies event types across five categories:
//! - **Registry events**: remote sources and participants coming and going
//! - **Admission events**: admission denied, backfill, eviction, ceiling changes
//! - **Engine events**: attach/detach requested, completed, failed, stale
//! - **Speaker events**: loudest speaker changes, swaps and feature moves
//! - **Subscriber events**: overflow and panics in subscriber workers
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! source involved, the view, reasons, and ceiling values.
//!
//! ## Ordering guarantees
//! Each event gets a sequence number from the [`Bus`](crate::events::Bus) it is
//! published on. Within one bus the numbers increase monotonically.
//!
//! ## Example
//! ```rust
//! use slotvisor::{Event, EventKind, ViewId};
//!
//! let ev = Event::new(EventKind::AttachFailed)
//!     .with_source("alice")
//!     .with_view(ViewId::Tile(2))
//!     .with_reason("engine_busy");
//!
//! assert_eq!(ev.kind, EventKind::AttachFailed);
//! assert_eq!(ev.source.as_ref().map(|s| s.as_str()), Some("alice"));
//! assert_eq!(ev.view, Some(ViewId::Tile(2)));
//! ```

use std::sync::Arc;
use std::time::SystemTime;

use crate::engine::{SourceId, ViewId};

/// Classification of scheduler events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Subscriber events ===
    /// Subscriber panicked during event processing.
    ///
    /// Sets:
    /// - `reason`: subscriber name and panic message
    SubscriberPanicked,

    /// Subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets:
    /// - `reason`: subscriber name and cause ("full", "closed")
    SubscriberOverflow,

    // === Registry events ===
    /// Remote camera registered.
    ///
    /// Sets:
    /// - `source`: source id
    SourceAdded,

    /// Remote camera removed from the registry.
    ///
    /// Sets:
    /// - `source`: source id
    /// - `view`: tile it occupied, if any
    SourceRemoved,

    /// Event referencing a source was ignored (duplicate add, unknown id).
    ///
    /// Sets:
    /// - `source`: source id
    /// - `reason`: "duplicate" / "unknown"
    SourceIgnored,

    /// Participant joined the conference (informational).
    ///
    /// Sets:
    /// - `source`: participant id
    /// - `reason`: display name
    ParticipantJoined,

    /// Participant left the conference (informational).
    ///
    /// Sets:
    /// - `source`: participant id
    /// - `reason`: display name
    ParticipantLeft,

    // === Admission events ===
    /// Source left unrendered.
    ///
    /// Sets:
    /// - `source`: source id
    /// - `ceiling`: ceiling in effect
    /// - `reason`: "ceiling_reached" / "no_open_slot" / "featured_busy"
    AdmissionDenied,

    /// Unrendered source promoted into a vacated tile.
    ///
    /// Sets:
    /// - `source`: promoted source
    /// - `view`: vacated tile
    Backfilled,

    /// Resource ceiling changed.
    ///
    /// Sets:
    /// - `ceiling`: new ceiling
    /// - `previous`: old ceiling
    CeilingChanged,

    /// Source evicted to honor a lowered ceiling.
    ///
    /// Sets:
    /// - `source`: evicted source
    /// - `view`: tile it is leaving
    /// - `ceiling`: new ceiling
    Evicted,

    // === Engine events ===
    /// Attach issued to the engine.
    ///
    /// Sets:
    /// - `source`: source being attached (absent for shares)
    /// - `view`: target view
    AttachRequested,

    /// Attach completed; the source is rendered.
    ///
    /// Sets:
    /// - `source`, `view`
    Attached,

    /// Attach failed and was rolled back (no automatic retry).
    ///
    /// Sets:
    /// - `source`, `view`
    /// - `reason`: engine error label
    AttachFailed,

    /// Detach issued to the engine.
    ///
    /// Sets:
    /// - `source`: source leaving the view (absent for shares)
    /// - `view`: target view
    DetachRequested,

    /// Detach completed.
    ///
    /// Sets:
    /// - `source`, `view`
    Detached,

    /// Detach failed; bookkeeping proceeded anyway.
    ///
    /// Sets:
    /// - `source`, `view`
    /// - `reason`: engine error label
    DetachFailed,

    /// A completion or follow-up no longer matches current state and was ignored.
    ///
    /// Sets:
    /// - `view`: view involved, if known
    /// - `source`: source involved, if known
    /// - `reason`: what was stale
    StaleCompletion,

    // === Speaker events ===
    /// Loudest speaker notification received.
    ///
    /// Sets:
    /// - `source`: speaking participant
    SpeakerChanged,

    /// Speaker change not acted on because an operation is still in flight.
    ///
    /// Sets:
    /// - `source`: speaking participant
    /// - `reason`: what was busy
    SpeakerDeferred,

    /// Speaker is being moved into the featured tile.
    ///
    /// Sets:
    /// - `source`: speaker
    /// - `view`: tile the speaker is leaving (absent when it was unrendered)
    /// - `reason`: "swap" / "move" / "displace"
    SwapStarted,

    /// Both halves of a swap or move were placed.
    ///
    /// Sets:
    /// - `source`: speaker
    SwapCompleted,

    // === Share events ===
    /// Window share is rendered in the share view.
    ShareAttached,

    /// Window share view was cleared.
    ShareDetached,

    // === Session events ===
    /// Connection lost; every slot is being cleared.
    Reset,
}

/// Scheduler event with optional metadata.
///
/// - `seq`: per-bus monotonic sequence (0 until published)
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Sequence number assigned by the bus.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Source involved, if applicable.
    pub source: Option<SourceId>,
    /// View involved, if applicable.
    pub view: Option<ViewId>,
    /// Human-readable reason (error labels, deny causes, etc.).
    pub reason: Option<Arc<str>>,
    /// Ceiling in effect (or the new ceiling).
    pub ceiling: Option<usize>,
    /// Previous ceiling (only for `CeilingChanged`).
    pub previous: Option<usize>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: 0,
            at: SystemTime::now(),
            kind,
            source: None,
            view: None,
            reason: None,
            ceiling: None,
            previous: None,
        }
    }

    /// Attaches a source id.
    #[inline]
    pub fn with_source(mut self, source: impl Into<SourceId>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Attaches a view.
    #[inline]
    pub fn with_view(mut self, view: ViewId) -> Self {
        self.view = Some(view);
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the ceiling in effect.
    #[inline]
    pub fn with_ceiling(mut self, ceiling: usize) -> Self {
        self.ceiling = Some(ceiling);
        self
    }

    /// Attaches the previous ceiling.
    #[inline]
    pub fn with_previous(mut self, previous: usize) -> Self {
        self.previous = Some(previous);
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_reason(format!("subscriber={subscriber} reason={reason}"))
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_reason(format!("subscriber={subscriber} info={info}"))
    }

    #[inline]
    pub fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }

    #[inline]
    pub fn is_subscriber_panic(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberPanicked)
    }
}
