//! # Window-share view.
//!
//! The share view is reconciled rather than driven directly: events change the
//! *wanted* share, and [`ShareSlot::next_action`] computes the single engine
//! step that moves the *actual* share toward it.
//!
//! ```text
//!             want(h)                 attach ok
//!   Idle ─────────────► Attaching(h) ───────────► Active(h)
//!    ▲                      │ attach err               │ wanted != h
//!    │                      ▼ (wanted cleared)         ▼
//!    └────────────────── Idle ◄──────────────────── Detaching
//!                                   detach done
//! ```
//!
//! Nothing is issued while an operation is in flight, so a replaced share is
//! always one detach followed by one attach, never overlapping.

use crate::engine::SourceHandle;
use crate::error::EngineError;

use super::input::OpId;

/// One requested share. `generation` distinguishes re-adds of the same handle.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ShareRequest {
    pub generation: u64,
    pub handle: SourceHandle,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ShareState {
    Idle,
    Attaching { op: OpId, req: ShareRequest },
    Active { req: ShareRequest },
    Detaching { op: OpId },
}

/// Next engine step for the share view.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ShareAction {
    Attach(ShareRequest),
    Detach,
}

/// What a share completion meant.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) enum ShareOutcome {
    Attached,
    AttachFailed(EngineError),
    Detached(Result<(), EngineError>),
}

#[derive(Debug)]
pub(super) struct ShareSlot {
    state: ShareState,
    wanted: Option<ShareRequest>,
    generation: u64,
}

impl Default for ShareSlot {
    fn default() -> Self {
        Self {
            state: ShareState::Idle,
            wanted: None,
            generation: 0,
        }
    }
}

impl ShareSlot {
    /// Requests `handle`, replacing any current share.
    pub fn want(&mut self, handle: SourceHandle) {
        self.generation += 1;
        self.wanted = Some(ShareRequest {
            generation: self.generation,
            handle,
        });
    }

    /// Requests an empty share view.
    pub fn clear(&mut self) {
        self.wanted = None;
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, ShareState::Active { .. })
    }

    pub fn in_flight(&self) -> bool {
        self.pending_op().is_some()
    }

    pub fn pending_op(&self) -> Option<OpId> {
        match &self.state {
            ShareState::Attaching { op, .. } | ShareState::Detaching { op } => Some(*op),
            _ => None,
        }
    }

    pub fn next_action(&self) -> Option<ShareAction> {
        match (&self.state, &self.wanted) {
            (ShareState::Idle, Some(req)) => Some(ShareAction::Attach(req.clone())),
            (ShareState::Active { req }, wanted) if wanted.as_ref() != Some(req) => {
                Some(ShareAction::Detach)
            }
            _ => None,
        }
    }

    pub fn begin_attach(&mut self, op: OpId, req: ShareRequest) {
        self.state = ShareState::Attaching { op, req };
    }

    pub fn begin_detach(&mut self, op: OpId) {
        self.state = ShareState::Detaching { op };
    }

    /// Applies a completion for the pending operation.
    ///
    /// Returns `None` when `op` is not the pending share operation.
    pub fn complete(&mut self, op: OpId, result: Result<(), EngineError>) -> Option<ShareOutcome> {
        if self.pending_op() != Some(op) {
            return None;
        }
        let prev = std::mem::replace(&mut self.state, ShareState::Idle);
        match (prev, result) {
            (ShareState::Attaching { req, .. }, Ok(())) => {
                self.state = ShareState::Active { req };
                Some(ShareOutcome::Attached)
            }
            (ShareState::Attaching { req, .. }, Err(err)) => {
                if self.wanted.as_ref() == Some(&req) {
                    self.wanted = None;
                }
                Some(ShareOutcome::AttachFailed(err))
            }
            (_, result) => Some(ShareOutcome::Detached(result)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attach(slot: &mut ShareSlot, op: u64) -> ShareRequest {
        let Some(ShareAction::Attach(req)) = slot.next_action() else {
            panic!("expected attach");
        };
        slot.begin_attach(OpId(op), req.clone());
        req
    }

    #[test]
    fn test_idle_share_attaches_immediately() {
        let mut s = ShareSlot::default();
        assert_eq!(s.next_action(), None);
        s.want("w1".into());
        attach(&mut s, 1);
        assert!(s.in_flight());
        assert_eq!(s.next_action(), None);
        assert_eq!(s.complete(OpId(1), Ok(())), Some(ShareOutcome::Attached));
        assert!(s.is_active());
        assert_eq!(s.next_action(), None);
    }

    #[test]
    fn test_readd_same_handle_replaces() {
        let mut s = ShareSlot::default();
        s.want("w1".into());
        attach(&mut s, 1);
        s.complete(OpId(1), Ok(()));

        s.want("w1".into());
        assert_eq!(s.next_action(), Some(ShareAction::Detach));
        s.begin_detach(OpId(2));
        assert_eq!(s.next_action(), None);
        assert_eq!(s.complete(OpId(2), Ok(())), Some(ShareOutcome::Detached(Ok(()))));
        let req = attach(&mut s, 3);
        assert_eq!(req.generation, 2);
    }

    #[test]
    fn test_failed_attach_clears_wanted() {
        let mut s = ShareSlot::default();
        s.want("w1".into());
        attach(&mut s, 1);
        assert_eq!(
            s.complete(OpId(1), Err(EngineError::Busy)),
            Some(ShareOutcome::AttachFailed(EngineError::Busy))
        );
        assert!(!s.is_active());
        assert_eq!(s.next_action(), None);
    }

    #[test]
    fn test_failed_attach_keeps_newer_request() {
        let mut s = ShareSlot::default();
        s.want("w1".into());
        attach(&mut s, 1);
        s.want("w2".into());
        s.complete(OpId(1), Err(EngineError::Busy));
        let req = attach(&mut s, 2);
        assert_eq!(req.handle.as_str(), "w2");
    }

    #[test]
    fn test_foreign_op_is_ignored() {
        let mut s = ShareSlot::default();
        s.want("w1".into());
        attach(&mut s, 1);
        assert_eq!(s.complete(OpId(9), Ok(())), None);
        assert!(s.in_flight());
    }
}
