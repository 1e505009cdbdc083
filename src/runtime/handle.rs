use tokio::sync::{broadcast, mpsc, watch};

use crate::error::SubmitError;
use crate::events::{Bus, Event};
use crate::scheduler::{MediaEvent, SlotSnapshot};

/// Handle for feeding media events to a running scheduler and observing it.
///
/// Cheap to clone; every clone talks to the same driver.
#[derive(Clone)]
pub struct SchedulerHandle {
    tx: mpsc::Sender<MediaEvent>,
    snapshots: watch::Receiver<SlotSnapshot>,
    bus: Bus,
}

impl SchedulerHandle {
    pub(super) fn new(
        tx: mpsc::Sender<MediaEvent>,
        snapshots: watch::Receiver<SlotSnapshot>,
        bus: Bus,
    ) -> Self {
        Self { tx, snapshots, bus }
    }

    /// Submit an event (async, waits if the queue is full).
    pub async fn submit(&self, ev: MediaEvent) -> Result<(), SubmitError> {
        self.tx.send(ev).await.map_err(|_| SubmitError::Closed)
    }

    /// Try to submit without blocking (fails if the queue is full).
    pub fn try_submit(&self, ev: MediaEvent) -> Result<(), SubmitError> {
        self.tx.try_send(ev).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    /// Latest published slot table.
    pub fn snapshot(&self) -> SlotSnapshot {
        self.snapshots.borrow().clone()
    }

    /// Receiver notified after every input that changed the slot table.
    pub fn subscribe_snapshots(&self) -> watch::Receiver<SlotSnapshot> {
        self.snapshots.clone()
    }

    /// Waits until a published snapshot satisfies `pred`.
    ///
    /// Returns `None` once the driver has stopped.
    pub async fn wait_for(&self, pred: impl FnMut(&SlotSnapshot) -> bool) -> Option<SlotSnapshot> {
        let mut rx = self.snapshots.clone();
        rx.wait_for(pred).await.ok().map(|snap| snap.clone())
    }

    /// Receiver for scheduler events published after this call.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }
}
