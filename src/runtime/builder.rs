use std::sync::Arc;

use tokio::sync::{broadcast::error::RecvError, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::{driver::Driver, handle::SchedulerHandle, SlotRuntime};
use crate::{
    config::SchedulerConfig,
    engine::MediaEngine,
    error::ConfigError,
    events::Bus,
    scheduler::SlotScheduler,
    subscribers::{Subscribe, SubscriberSet},
};

/// Builder for a running scheduler with optional event subscribers.
pub struct SchedulerBuilder {
    cfg: SchedulerConfig,
    engine: Arc<dyn MediaEngine>,
    subscribers: Vec<Arc<dyn Subscribe>>,
}

impl SchedulerBuilder {
    /// Creates a new builder for `engine` with the given configuration.
    pub fn new(cfg: SchedulerConfig, engine: Arc<dyn MediaEngine>) -> Self {
        Self {
            cfg,
            engine,
            subscribers: Vec::new(),
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive scheduler events (admissions, evictions, engine
    /// failures, etc.) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Validates the configuration and starts the runtime.
    ///
    /// Spawns:
    /// - the driver loop owning the [`SlotScheduler`]
    /// - the subscriber listener feeding the [`SubscriberSet`]
    ///
    /// Must be called inside a tokio runtime.
    pub fn build(self) -> Result<SlotRuntime, ConfigError> {
        self.cfg.validate()?;

        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let listener_token = CancellationToken::new();
        let listener = subscriber_listener(
            &bus,
            SubscriberSet::new(self.subscribers, bus.clone()),
            listener_token.clone(),
        );

        let scheduler = SlotScheduler::new(&self.cfg, bus.clone());
        let (snap_tx, snap_rx) = watch::channel(scheduler.snapshot());
        let (tx, rx) = mpsc::channel(self.cfg.queue_capacity);

        let token = CancellationToken::new();
        let driver = Driver::new(scheduler, self.engine, self.cfg.engine_timeout(), snap_tx);
        let driver = tokio::spawn(driver.run(rx, token.clone()));

        Ok(SlotRuntime {
            handle: SchedulerHandle::new(tx, snap_rx, bus),
            token,
            listener_token,
            driver,
            listener,
        })
    }
}

/// Forwards bus events to the subscriber set until cancelled, then drains
/// whatever is still buffered and shuts the set down.
fn subscriber_listener(bus: &Bus, set: SubscriberSet, token: CancellationToken) -> JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        tracing::debug!(target: "slotvisor.runtime", subscribers = set.len(), "subscriber listener started");
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                res = rx.recv() => match res {
                    Ok(ev) => set.emit_arc(Arc::new(ev)),
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(target: "slotvisor.runtime", skipped, "subscriber listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
        while let Ok(ev) = rx.try_recv() {
            set.emit_arc(Arc::new(ev));
        }
        set.shutdown().await;
    })
}
