//! # LogWriter: event renderer over `tracing`
//!
//! A minimal subscriber that renders incoming [`Event`]s as `tracing` records
//! under the `slotvisor.events` target. Install any `tracing` subscriber
//! (e.g. `tracing-subscriber`'s fmt layer) to see them.
//!
//! ## Example output
//! ```text
//! INFO slotvisor.events: [attached] source=alice view=renderer5
//! WARN slotvisor.events: [attach-failed] source=bob view=renderer1 reason=engine_busy
//! INFO slotvisor.events: [ceiling] 5 -> 2
//! INFO slotvisor.events: [evicted] source=carol view=renderer2 ceiling=2
//! ```

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;
use async_trait::async_trait;

/// Event writer subscriber.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Construct a new [`LogWriter`].
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

fn label(kind: EventKind) -> &'static str {
    match kind {
        EventKind::SubscriberPanicked => "subscriber-panicked",
        EventKind::SubscriberOverflow => "subscriber-overflow",
        EventKind::SourceAdded => "source-added",
        EventKind::SourceRemoved => "source-removed",
        EventKind::SourceIgnored => "source-ignored",
        EventKind::ParticipantJoined => "joined",
        EventKind::ParticipantLeft => "left",
        EventKind::AdmissionDenied => "admission-denied",
        EventKind::Backfilled => "backfilled",
        EventKind::CeilingChanged => "ceiling",
        EventKind::Evicted => "evicted",
        EventKind::AttachRequested => "attach",
        EventKind::Attached => "attached",
        EventKind::AttachFailed => "attach-failed",
        EventKind::DetachRequested => "detach",
        EventKind::Detached => "detached",
        EventKind::DetachFailed => "detach-failed",
        EventKind::StaleCompletion => "stale",
        EventKind::SpeakerChanged => "speaker",
        EventKind::SpeakerDeferred => "speaker-deferred",
        EventKind::SwapStarted => "swap",
        EventKind::SwapCompleted => "swapped",
        EventKind::ShareAttached => "share-attached",
        EventKind::ShareDetached => "share-detached",
        EventKind::Reset => "reset",
    }
}

/// Renders everything except the kind label as `key=value` pairs.
fn render(e: &Event) -> String {
    if let (EventKind::CeilingChanged, Some(new)) = (e.kind, e.ceiling) {
        return format!("{} -> {new}", e.previous.unwrap_or(new));
    }
    let mut out = String::new();
    if let Some(source) = &e.source {
        out.push_str(&format!(" source={source}"));
    }
    if let Some(view) = e.view {
        out.push_str(&format!(" view={view}"));
    }
    if let Some(reason) = &e.reason {
        out.push_str(&format!(" reason={reason}"));
    }
    if let Some(ceiling) = e.ceiling {
        out.push_str(&format!(" ceiling={ceiling}"));
    }
    out.trim_start().to_string()
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        let label = label(e.kind);
        let body = render(e);
        match e.kind {
            EventKind::AttachFailed
            | EventKind::DetachFailed
            | EventKind::SubscriberOverflow
            | EventKind::SubscriberPanicked => {
                tracing::warn!(target: "slotvisor.events", seq = e.seq, "[{label}] {body}");
            }
            EventKind::AttachRequested
            | EventKind::DetachRequested
            | EventKind::StaleCompletion
            | EventKind::SpeakerChanged
            | EventKind::SpeakerDeferred => {
                tracing::debug!(target: "slotvisor.events", seq = e.seq, "[{label}] {body}");
            }
            _ => {
                tracing::info!(target: "slotvisor.events", seq = e.seq, "[{label}] {body}");
            }
        }
    }

    fn name(&self) -> &'static str {
        "LogWriter"
    }
}
