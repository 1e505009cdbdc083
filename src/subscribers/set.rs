//! Fan-out of scheduler events to [`Subscribe`] implementations.
//!
//! Each subscriber gets its own bounded queue and worker task, so a slow
//! layout redraw never holds back a metrics exporter or the scheduler.
//!
//! ```text
//! listener ──► emit_arc(ev) ──try_send──► [queue: log]     ──► worker ──► LogWriter
//!                            └─try_send──► [queue: layout]  ──► worker ──► redraw
//!                                  │ full / closed
//!                                  ▼
//!                         Bus ◄── SubscriberOverflow
//! ```
//!
//! A subscriber sees events in bus order. Nothing orders delivery across
//! subscribers. A panic inside `on_event` is caught, logged and published as
//! `SubscriberPanicked`; the worker moves on to the next event. Unwind safety
//! is asserted, so a subscriber that panics while holding a lock may leave
//! its own state poisoned.

use std::any::Any;
use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::{Bus, Event, EventKind};
use crate::subscribers::Subscribe;

struct Queue {
    name: &'static str,
    tx: mpsc::Sender<Arc<Event>>,
}

/// Per-subscriber queues and their workers.
pub struct SubscriberSet {
    queues: Vec<Queue>,
    workers: Vec<JoinHandle<()>>,
    bus: Bus,
}

impl SubscriberSet {
    /// Spawns one worker per subscriber. Must be called inside a tokio runtime.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>, bus: Bus) -> Self {
        let (queues, workers): (Vec<Queue>, Vec<JoinHandle<()>>) = subs
            .into_iter()
            .map(|sub| {
                let (tx, rx) = mpsc::channel(sub.queue_capacity().max(1));
                let queue = Queue {
                    name: sub.name(),
                    tx,
                };
                (queue, spawn_worker(sub, rx, bus.clone()))
            })
            .unzip();
        Self {
            queues,
            workers,
            bus,
        }
    }

    /// Number of subscribers.
    pub fn len(&self) -> usize {
        self.queues.len()
    }

    /// Whether the set has no subscribers.
    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    /// Queues `event` for every subscriber without waiting.
    ///
    /// A full or closed queue drops the event for that subscriber and
    /// publishes `SubscriberOverflow`, unless the event is itself an overflow
    /// report.
    pub fn emit_arc(&self, event: Arc<Event>) {
        let report = event.kind != EventKind::SubscriberOverflow;
        for q in &self.queues {
            let reason = match q.tx.try_send(Arc::clone(&event)) {
                Ok(()) => continue,
                Err(mpsc::error::TrySendError::Full(_)) => "full",
                Err(mpsc::error::TrySendError::Closed(_)) => "closed",
            };
            if report {
                self.bus.publish(Event::subscriber_overflow(q.name, reason));
            }
        }
    }

    /// Closes every queue and waits until the workers have delivered what
    /// was already queued.
    pub async fn shutdown(self) {
        drop(self.queues);
        for worker in self.workers {
            if let Err(e) = worker.await {
                tracing::warn!(target: "slotvisor.subscribers", error = %e, "subscriber worker failed");
            }
        }
    }
}

fn spawn_worker(
    sub: Arc<dyn Subscribe>,
    mut rx: mpsc::Receiver<Arc<Event>>,
    bus: Bus,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            let delivery = std::panic::AssertUnwindSafe(sub.on_event(&ev));
            if let Err(payload) = delivery.catch_unwind().await {
                let info = panic_message(payload.as_ref());
                tracing::warn!(
                    target: "slotvisor.subscribers",
                    subscriber = sub.name(),
                    %info,
                    "subscriber panicked"
                );
                bus.publish(Event::subscriber_panicked(sub.name(), info));
            }
        }
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&'static str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}
