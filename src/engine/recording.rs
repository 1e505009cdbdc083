//! # RecordingEngine: in-memory media engine
//!
//! Records every call in order and resolves it after an optional delay.
//! Failures can be scripted per view so tests and demos can exercise the
//! rollback and best-effort detach paths.
//!
//! Available in tests and with the `test-util` feature.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::media::MediaEngine;
use super::types::{SourceHandle, ViewId};
use crate::error::EngineError;

/// One call observed by the [`RecordingEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineCall {
    Attach {
        handle: SourceHandle,
        view: ViewId,
        cropped: bool,
    },
    Detach {
        view: ViewId,
    },
}

#[derive(Default)]
struct Script {
    calls: Vec<EngineCall>,
    attach_failures: HashMap<ViewId, VecDeque<EngineError>>,
    detach_failures: HashMap<ViewId, VecDeque<EngineError>>,
}

/// Media engine that records calls instead of rendering.
#[derive(Default)]
pub struct RecordingEngine {
    delay: Duration,
    script: Mutex<Script>,
}

impl RecordingEngine {
    /// Creates an engine that resolves every call immediately.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an engine that sleeps `delay` before resolving each call.
    #[must_use]
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Makes the next attach on `view` fail with `err`.
    pub fn fail_next_attach(&self, view: ViewId, err: EngineError) {
        if let Ok(mut s) = self.script.lock() {
            s.attach_failures.entry(view).or_default().push_back(err);
        }
    }

    /// Makes the next detach on `view` fail with `err`.
    pub fn fail_next_detach(&self, view: ViewId, err: EngineError) {
        if let Ok(mut s) = self.script.lock() {
            s.detach_failures.entry(view).or_default().push_back(err);
        }
    }

    /// Returns every call observed so far, in issue order.
    pub fn calls(&self) -> Vec<EngineCall> {
        self.script
            .lock()
            .map(|s| s.calls.clone())
            .unwrap_or_default()
    }

    /// Returns the calls observed for one view.
    pub fn calls_for(&self, view: ViewId) -> Vec<EngineCall> {
        self.calls()
            .into_iter()
            .filter(|c| match c {
                EngineCall::Attach { view: v, .. } | EngineCall::Detach { view: v } => *v == view,
            })
            .collect()
    }

    fn record(&self, call: EngineCall) -> Result<(), EngineError> {
        let Ok(mut s) = self.script.lock() else {
            return Err(EngineError::Other {
                error: "script poisoned".into(),
            });
        };
        let failure = match &call {
            EngineCall::Attach { view, .. } => {
                s.attach_failures.get_mut(view).and_then(VecDeque::pop_front)
            }
            EngineCall::Detach { view } => {
                s.detach_failures.get_mut(view).and_then(VecDeque::pop_front)
            }
        };
        s.calls.push(call);
        failure.map_or(Ok(()), Err)
    }
}

#[async_trait]
impl MediaEngine for RecordingEngine {
    async fn attach(
        &self,
        handle: &SourceHandle,
        view: ViewId,
        cropped: bool,
    ) -> Result<(), EngineError> {
        let res = self.record(EngineCall::Attach {
            handle: handle.clone(),
            view,
            cropped,
        });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        res
    }

    async fn detach(&self, view: ViewId) -> Result<(), EngineError> {
        let res = self.record(EngineCall::Detach { view });
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        res
    }

    fn name(&self) -> &'static str {
        "RecordingEngine"
    }
}
