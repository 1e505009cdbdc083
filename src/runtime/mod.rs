//! # Async runtime around the slot scheduler.
//!
//! [`SchedulerBuilder`] wires a [`SlotScheduler`](crate::SlotScheduler) to a
//! [`MediaEngine`](crate::MediaEngine) and starts two tasks:
//!
//! ```text
//!                 ┌──────────────────────── driver ────────────────────────┐
//! submit(ev) ──►  │ mpsc ──► scheduler.handle() ──► spawn(execute(cmd)) ──┐│
//!                 │  ▲                                                    ││
//!                 │  └──────────────── completion ◄───────────────────────┘│
//!                 └──────────┬──────────────────────────┬──────────────────┘
//!                            ▼                          ▼
//!                  watch<SlotSnapshot>        Bus ──► listener ──► SubscriberSet
//! ```
//!
//! [`SlotRuntime::shutdown`] stops the driver first, then lets the listener
//! drain buffered events into the subscribers before they are shut down.

mod builder;
mod driver;
mod execute;
mod handle;

pub use builder::SchedulerBuilder;
pub use handle::SchedulerHandle;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// A started scheduler: the driver loop and its subscriber listener.
pub struct SlotRuntime {
    handle: SchedulerHandle,
    token: CancellationToken,
    listener_token: CancellationToken,
    driver: JoinHandle<()>,
    listener: JoinHandle<()>,
}

impl SlotRuntime {
    /// Returns a handle for submitting events and reading snapshots.
    pub fn handle(&self) -> SchedulerHandle {
        self.handle.clone()
    }

    /// Stops the driver, flushes pending events to subscribers and waits for
    /// both tasks to finish.
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.driver.await {
            tracing::warn!(target: "slotvisor.runtime", error = %e, "driver task failed");
        }
        self.listener_token.cancel();
        if let Err(e) = self.listener.await {
            tracing::warn!(target: "slotvisor.runtime", error = %e, "subscriber listener failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use crate::config::SchedulerConfig;
    use crate::engine::{EngineCall, RecordingEngine, SourceHandle, ViewId};
    use crate::error::{ConfigError, EngineError, SubmitError};
    use crate::events::{Event, EventKind};
    use crate::scheduler::{MediaEvent, Tile};
    use crate::subscribers::Subscribe;

    struct Collect {
        seen: Arc<Mutex<Vec<Event>>>,
    }

    #[async_trait::async_trait]
    impl Subscribe for Collect {
        async fn on_event(&self, event: &Event) {
            self.seen.lock().unwrap().push(event.clone());
        }
        fn name(&self) -> &'static str {
            "collect"
        }
    }

    fn added(id: &str) -> MediaEvent {
        MediaEvent::SourceAdded {
            id: id.into(),
            handle: SourceHandle::new(format!("cam-{id}")),
        }
    }

    fn start(cfg: SchedulerConfig, engine: &Arc<RecordingEngine>) -> SlotRuntime {
        SchedulerBuilder::new(cfg, engine.clone())
            .build()
            .expect("valid config")
    }

    #[tokio::test]
    async fn test_runtime_renders_sources_and_publishes_snapshots() {
        let engine = Arc::new(RecordingEngine::new());
        let rt = start(SchedulerConfig::default(), &engine);
        let handle = rt.handle();

        handle.submit(added("A")).await.unwrap();
        handle.submit(added("B")).await.unwrap();
        let snap = handle
            .wait_for(|s| s.rendered == 2 && s.is_quiescent())
            .await
            .unwrap();

        assert_eq!(snap.featured().map(|s| s.as_str()), Some("A"));
        assert_eq!(snap.tiles[1], Tile::Remote("B".into()));
        let calls = engine.calls();
        assert_eq!(calls.len(), 2);
        assert!(calls.contains(&EngineCall::Attach {
            handle: "cam-A".into(),
            view: ViewId::Tile(5),
            cropped: false,
        }));
        assert!(calls.contains(&EngineCall::Attach {
            handle: "cam-B".into(),
            view: ViewId::Tile(1),
            cropped: true,
        }));
        assert_eq!(handle.snapshot(), snap);
        rt.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_engine_timeout_rolls_back_attach() {
        let engine = Arc::new(RecordingEngine::with_delay(Duration::from_secs(10)));
        let cfg = SchedulerConfig {
            engine_timeout: Duration::from_millis(100),
            ..SchedulerConfig::default()
        };
        let rt = start(cfg, &engine);
        let handle = rt.handle();
        let mut events = handle.events();

        handle.submit(added("A")).await.unwrap();
        let snap = handle
            .wait_for(|s| s.live == 1 && s.is_quiescent())
            .await
            .unwrap();
        assert_eq!(snap.rendered, 0);
        assert_eq!(snap.featured(), None);

        let failed = loop {
            let ev = events.recv().await.unwrap();
            if ev.kind == EventKind::AttachFailed {
                break ev;
            }
        };
        assert_eq!(failed.reason.as_deref(), Some("engine_timeout"));
        rt.shutdown().await;
    }

    #[tokio::test]
    async fn test_failed_detach_reaches_subscribers_and_still_backfills() {
        let engine = Arc::new(RecordingEngine::new());
        engine.fail_next_detach(ViewId::Tile(1), EngineError::Busy);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let cfg = SchedulerConfig {
            initial_ceiling: 2,
            ..SchedulerConfig::default()
        };
        let rt = SchedulerBuilder::new(cfg, engine.clone())
            .with_subscribers(vec![Arc::new(Collect {
                seen: Arc::clone(&seen),
            })])
            .build()
            .unwrap();
        let handle = rt.handle();

        for id in ["A", "B", "C"] {
            handle.submit(added(id)).await.unwrap();
        }
        handle
            .wait_for(|s| s.live == 3 && s.rendered == 2 && s.is_quiescent())
            .await
            .unwrap();

        handle
            .submit(MediaEvent::SourceRemoved { id: "B".into() })
            .await
            .unwrap();
        let snap = handle
            .wait_for(|s| s.live == 2 && s.rendered == 2 && s.is_quiescent())
            .await
            .unwrap();
        assert_eq!(snap.tiles[1], Tile::Remote("C".into()));
        rt.shutdown().await;

        let seen = seen.lock().unwrap();
        assert!(seen.iter().any(|e| e.kind == EventKind::DetachFailed));
        assert!(seen.iter().any(|e| e.kind == EventKind::Backfilled));
        assert!(seen.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_builder_rejects_invalid_config() {
        let engine = Arc::new(RecordingEngine::new());
        let cfg = SchedulerConfig {
            grid_slots: 0,
            ..SchedulerConfig::default()
        };
        let err = SchedulerBuilder::new(cfg, engine).build().err();
        assert_eq!(err, Some(ConfigError::NoGridSlots));
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_closed() {
        let engine = Arc::new(RecordingEngine::new());
        let rt = start(SchedulerConfig::default(), &engine);
        let handle = rt.handle();
        rt.shutdown().await;

        assert_eq!(handle.try_submit(added("A")), Err(SubmitError::Closed));
        assert_eq!(handle.submit(added("A")).await, Err(SubmitError::Closed));
        assert!(engine.calls().is_empty());
    }
}
