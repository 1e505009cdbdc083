//! # Scheduler inputs and outputs.
//!
//! The scheduler consumes [`Input`]s one at a time and answers each with zero
//! or more [`Command`]s for the media engine:
//!
//! ```text
//! MediaEvent ──┐                            ┌──► Command::Attach { op, .. }
//!              ├──► Input ──► SlotScheduler ┤
//! Completion ──┘                            └──► Command::Detach { op, .. }
//!      ▲                                                   │
//!      └────────────── engine resolves op ◄────────────────┘
//! ```
//!
//! Every command carries a fresh [`OpId`]; the completion for it must echo
//! the same id so the scheduler can match it against current state.

use std::fmt;

use crate::engine::{SourceHandle, SourceId, ViewId};
use crate::error::EngineError;

/// Identifier of one engine operation issued by the scheduler.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OpId(pub(crate) u64);

impl fmt::Display for OpId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "op#{}", self.0)
    }
}

/// Engine request decided by the scheduler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Render `handle` into `view`.
    Attach {
        op: OpId,
        handle: SourceHandle,
        view: ViewId,
        cropped: bool,
    },
    /// Clear `view`.
    Detach { op: OpId, view: ViewId },
}

impl Command {
    /// Operation id to echo in the completion.
    pub fn op(&self) -> OpId {
        match self {
            Command::Attach { op, .. } | Command::Detach { op, .. } => *op,
        }
    }

    /// View the command targets.
    pub fn view(&self) -> ViewId {
        match self {
            Command::Attach { view, .. } | Command::Detach { view, .. } => *view,
        }
    }

    /// True for attach commands.
    pub fn is_attach(&self) -> bool {
        matches!(self, Command::Attach { .. })
    }
}

/// Notification from the media engine or the conference.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaEvent {
    /// A remote camera became available.
    SourceAdded { id: SourceId, handle: SourceHandle },
    /// A remote camera went away.
    SourceRemoved { id: SourceId },
    /// The loudest speaker changed.
    LoudestSpeakerChanged { id: SourceId },
    /// A remote window share started (replaces any active share).
    ShareAdded { handle: SourceHandle },
    /// The remote window share stopped.
    ShareRemoved,
    /// The engine's maximum renderable remote sources changed.
    ResourceCeilingChanged { ceiling: usize },
    /// A participant joined (informational).
    ParticipantJoined { id: SourceId, name: String },
    /// A participant left (informational).
    ParticipantLeft { id: SourceId, name: String },
    /// The conference connection was lost; clear everything.
    Disconnected,
}

/// Result of one engine operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Completion {
    /// Operation being resolved.
    pub op: OpId,
    /// Engine outcome.
    pub result: Result<(), EngineError>,
}

impl Completion {
    /// Successful completion of `op`.
    pub fn ok(op: OpId) -> Self {
        Self { op, result: Ok(()) }
    }

    /// Failed completion of `op`.
    pub fn failed(op: OpId, err: EngineError) -> Self {
        Self {
            op,
            result: Err(err),
        }
    }
}

/// Anything the scheduler processes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Input {
    Media(MediaEvent),
    Completion(Completion),
}

impl From<MediaEvent> for Input {
    fn from(value: MediaEvent) -> Self {
        Input::Media(value)
    }
}

impl From<Completion> for Input {
    fn from(value: Completion) -> Self {
        Input::Completion(value)
    }
}
