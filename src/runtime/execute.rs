//! # Execute one engine command.
//!
//! Runs a single [`Command`] against the [`MediaEngine`] with an optional
//! timeout and turns the outcome into a [`Completion`] for the scheduler.
//!
//! ```text
//! Attach → engine.attach(handle, view, cropped) ─┐
//! Detach → engine.detach(view) ──────────────────┼─► Ok / Err(e)      → Completion
//!                          timeout exceeded ─────┘   Err(Timeout{..}) → Completion
//! ```
//!
//! ## Rules
//! - Always yields **exactly one** completion per command.
//! - A timed-out call is dropped; the engine is not told to cancel it.

use std::time::Duration;

use tokio::time;

use crate::engine::MediaEngine;
use crate::error::EngineError;
use crate::scheduler::{Command, Completion};

/// Executes `cmd` on `engine`, bounded by `timeout` when set.
pub(super) async fn execute(
    engine: &dyn MediaEngine,
    cmd: &Command,
    timeout: Option<Duration>,
) -> Completion {
    let call = async {
        match cmd {
            Command::Attach {
                handle,
                view,
                cropped,
                ..
            } => engine.attach(handle, *view, *cropped).await,
            Command::Detach { view, .. } => engine.detach(*view).await,
        }
    };

    let result = match timeout.filter(|d| *d > Duration::ZERO) {
        Some(dur) => match time::timeout(dur, call).await {
            Ok(r) => r,
            Err(_elapsed) => {
                tracing::warn!(
                    target: "slotvisor.runtime",
                    engine = engine.name(),
                    op = %cmd.op(),
                    view = %cmd.view(),
                    timeout = ?dur,
                    "engine call timed out"
                );
                Err(EngineError::Timeout { timeout: dur })
            }
        },
        None => call.await,
    };

    Completion {
        op: cmd.op(),
        result,
    }
}
