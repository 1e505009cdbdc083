//! # Driver loop.
//!
//! Owns the [`SlotScheduler`] and serialises everything that touches it:
//!
//! ```text
//! SchedulerHandle::submit ──► [input queue] ──┐
//!                                             ├──► scheduler.handle() ──► Vec<Command>
//! engine task ──► [completion queue] ─────────┘            │                  │
//!      ▲                                                   ▼                  │
//!      │                                          watch<SlotSnapshot>         │
//!      └──────────────── tokio::spawn(execute(cmd)) ◄─────────────────────────┘
//! ```
//!
//! ## Rules
//! - One input is processed to completion before the next is taken.
//! - Each command runs in its own task; completions come back in any order.
//! - The completion queue is unbounded so an engine task never waits on the
//!   driver; the input queue is bounded by `queue_capacity`.
//! - On cancellation the loop exits; engine calls still in flight finish on
//!   their own and their completions are dropped.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use super::execute::execute;
use crate::engine::MediaEngine;
use crate::scheduler::{Command, Completion, Input, MediaEvent, SlotScheduler, SlotSnapshot};

pub(super) struct Driver {
    scheduler: SlotScheduler,
    engine: Arc<dyn MediaEngine>,
    timeout: Option<Duration>,
    snapshots: watch::Sender<SlotSnapshot>,
}

impl Driver {
    pub(super) fn new(
        scheduler: SlotScheduler,
        engine: Arc<dyn MediaEngine>,
        timeout: Option<Duration>,
        snapshots: watch::Sender<SlotSnapshot>,
    ) -> Self {
        Self {
            scheduler,
            engine,
            timeout,
            snapshots,
        }
    }

    /// Runs until `token` is cancelled or every input sender is gone.
    pub(super) async fn run(
        mut self,
        mut inputs: mpsc::Receiver<MediaEvent>,
        token: CancellationToken,
    ) {
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completion>();
        tracing::info!(
            target: "slotvisor.runtime",
            engine = self.engine.name(),
            "scheduler driver started"
        );
        loop {
            tokio::select! {
                _ = token.cancelled() => break,

                Some(done) = done_rx.recv() => {
                    self.step(done.into(), &done_tx);
                }
                maybe = inputs.recv() => match maybe {
                    Some(ev) => self.step(ev.into(), &done_tx),
                    None => break,
                },
            }
        }
        tracing::info!(
            target: "slotvisor.runtime",
            in_flight = self.scheduler.snapshot().in_flight,
            "scheduler driver stopped"
        );
    }

    fn step(&mut self, input: Input, done_tx: &mpsc::UnboundedSender<Completion>) {
        for cmd in self.scheduler.handle(input) {
            self.dispatch(cmd, done_tx.clone());
        }
        let snap = self.scheduler.snapshot();
        self.snapshots.send_if_modified(move |current| {
            if *current == snap {
                false
            } else {
                *current = snap;
                true
            }
        });
    }

    fn dispatch(&self, cmd: Command, tx: mpsc::UnboundedSender<Completion>) {
        let engine = Arc::clone(&self.engine);
        let timeout = self.timeout;
        tokio::spawn(async move {
            let done = execute(engine.as_ref(), &cmd, timeout).await;
            // Driver gone: nothing left to reconcile.
            let _ = tx.send(done);
        });
    }
}
