//! # SlotScheduler: admission, eviction and swaps over a fixed tile table.
//!
//! The scheduler is a synchronous state machine. Each call to
//! [`SlotScheduler::handle`] processes one [`Input`] to completion and
//! returns the engine [`Command`]s it decided on. The caller executes them
//! (concurrently, in any order) and feeds each result back as a
//! [`Completion`].
//!
//! ## Claims
//! Tiles are claimed optimistically: an attach marks the tile and the source
//! before the engine confirms, so a racing event cannot assign the same tile
//! twice. Admission compares the ceiling against the number of *committed*
//! sources (attaching, rendered, or relocating for a swap), never against
//! completed attaches alone.
//!
//! ## Completions
//! A completion is matched by [`OpId`] against the tile or share view that
//! issued it, then checked against the registry: a source removed, evicted
//! or re-added while its operation was in flight turns the completion stale
//! and the tile is released instead.
//!
//! ```text
//! attach ok   ─► source still Attaching(slot)?  yes ─► Rendered
//!                                               evicted ─► detach
//!                                               gone ─► detach, backfill
//! attach err  ─► tile open, source unrendered (no retry)
//! detach any  ─► tile open, then Backfill | Fill(speaker) | Swap half
//! ```
//!
//! ## Retry policy
//! Failed admissions are never retried on a timer. An unrendered source is
//! placed only as a side effect of the next structurally relevant event: a
//! vacated tile (backfill), a raised ceiling, or a speaker change.

use std::collections::HashMap;

use crate::config::SchedulerConfig;
use crate::engine::{SourceHandle, SourceId, ViewId};
use crate::error::EngineError;
use crate::events::{Bus, Event, EventKind};
use crate::policies::{EvictionCandidate, EvictionPolicy};

use super::budget::ResourceBudget;
use super::input::{Command, Completion, Input, MediaEvent, OpId};
use super::registry::{Registry, SourceState};
use super::share::{ShareAction, ShareOutcome, ShareSlot};
use super::slot::{SlotLayout, SlotState, Swap, SwapId, Then};
use super::snapshot::{SlotSnapshot, Tile};

/// Render-slot scheduler owning the tile table, the source registry, the
/// resource budget and the share view.
///
/// Every decision is published on the [`Bus`] passed at construction.
pub struct SlotScheduler {
    layout: SlotLayout,
    slots: Vec<SlotState>,
    registry: Registry,
    budget: ResourceBudget,
    share: ShareSlot,
    swaps: HashMap<SwapId, Swap>,
    outbox: Vec<Command>,
    next_op: u64,
    next_swap: u64,
    /// Incremented on every successful tile attach.
    clock: u64,
    policy: EvictionPolicy,
    initial_ceiling: usize,
    bus: Bus,
}

impl SlotScheduler {
    /// Creates an empty scheduler: every remote tile open, no sources,
    /// ceiling at `cfg.initial_ceiling`.
    pub fn new(cfg: &SchedulerConfig, bus: Bus) -> Self {
        let layout = SlotLayout::new(cfg.grid_slots);
        Self {
            layout,
            slots: vec![SlotState::Open; layout.len()],
            registry: Registry::default(),
            budget: ResourceBudget::new(cfg.initial_ceiling),
            share: ShareSlot::default(),
            swaps: HashMap::new(),
            outbox: Vec::new(),
            next_op: 0,
            next_swap: 0,
            clock: 0,
            policy: cfg.eviction,
            initial_ceiling: cfg.initial_ceiling,
            bus,
        }
    }

    /// Processes one input and returns the engine commands it produced.
    pub fn handle(&mut self, input: impl Into<Input>) -> Vec<Command> {
        match input.into() {
            Input::Media(ev) => self.on_media(ev),
            Input::Completion(c) => self.on_completion(c),
        }
        self.settle_lone_source();
        std::mem::take(&mut self.outbox)
    }

    /// Current slot table for the display layer.
    pub fn snapshot(&self) -> SlotSnapshot {
        let tiles = self
            .slots
            .iter()
            .enumerate()
            .map(|(i, s)| match s.occupant() {
                _ if i == SlotLayout::LOCAL => Tile::Local,
                Some(id) => Tile::Remote(id.clone()),
                None => Tile::Open,
            })
            .collect();
        let in_flight = self.slots.iter().filter(|s| s.op().is_some()).count()
            + usize::from(self.share.in_flight());
        SlotSnapshot {
            tiles,
            share_active: self.share.is_active(),
            ceiling: self.budget.ceiling,
            live: self.budget.live,
            rendered: self.budget.rendered,
            in_flight,
        }
    }

    /// Resource accounting.
    pub fn budget(&self) -> ResourceBudget {
        self.budget
    }

    /// Bus every decision is published on.
    pub fn bus(&self) -> &Bus {
        &self.bus
    }

    /// Index of the featured tile.
    pub fn featured_slot(&self) -> usize {
        self.layout.featured()
    }

    fn on_media(&mut self, ev: MediaEvent) {
        match ev {
            MediaEvent::SourceAdded { id, handle } => self.on_source_added(id, handle),
            MediaEvent::SourceRemoved { id } => self.on_source_removed(id),
            MediaEvent::LoudestSpeakerChanged { id } => self.on_loudest_speaker_changed(id),
            MediaEvent::ShareAdded { handle } => {
                self.share.want(handle);
                self.reconcile_share();
            }
            MediaEvent::ShareRemoved => {
                self.share.clear();
                self.reconcile_share();
            }
            MediaEvent::ResourceCeilingChanged { ceiling } => self.on_ceiling_changed(ceiling),
            MediaEvent::ParticipantJoined { id, name } => self.bus.publish(
                Event::new(EventKind::ParticipantJoined)
                    .with_source(id)
                    .with_reason(name),
            ),
            MediaEvent::ParticipantLeft { id, name } => self.bus.publish(
                Event::new(EventKind::ParticipantLeft)
                    .with_source(id)
                    .with_reason(name),
            ),
            MediaEvent::Disconnected => self.on_disconnected(),
        }
    }

    // === Registry events ===

    fn on_source_added(&mut self, id: SourceId, handle: SourceHandle) {
        if !self.registry.insert(id.clone(), handle) {
            tracing::warn!(target: "slotvisor.scheduler", source = %id, "duplicate source ignored");
            self.bus.publish(
                Event::new(EventKind::SourceIgnored)
                    .with_source(id)
                    .with_reason("duplicate"),
            );
            return;
        }
        self.budget.live = self.registry.len();
        self.bus
            .publish(Event::new(EventKind::SourceAdded).with_source(&id));

        if !self.has_headroom() {
            self.deny(&id, "ceiling_reached");
            return;
        }
        let featured = self.layout.featured();
        if self.budget.live == 1 {
            if self.slots[featured].is_open() {
                self.assign(featured, &id);
            } else {
                // Featured tile is draining; its completion backfills.
                self.deny(&id, "featured_busy");
            }
            return;
        }
        // The featured tile is left to the speaker logic.
        match self.open_grid_slot() {
            Some(slot) => self.assign(slot, &id),
            None => self.deny(&id, "no_open_slot"),
        }
    }

    fn on_source_removed(&mut self, id: SourceId) {
        let Some(src) = self.registry.remove(&id) else {
            tracing::warn!(target: "slotvisor.scheduler", source = %id, "removal of unknown source ignored");
            self.bus.publish(
                Event::new(EventKind::SourceIgnored)
                    .with_source(id)
                    .with_reason("unknown"),
            );
            return;
        };
        self.budget.live = self.registry.len();

        let mut ev = Event::new(EventKind::SourceRemoved).with_source(&id);
        if let SourceState::Attaching(slot) | SourceState::Rendered(slot) | SourceState::Detaching(slot) =
            src.state
        {
            ev = ev.with_view(self.layout.view(slot));
        }
        self.bus.publish(ev);

        // Attaching, detaching and relocating sources are resolved by their
        // pending completions.
        if let SourceState::Rendered(slot) = src.state {
            self.detach(slot, id, Then::Backfill);
        }
    }

    // === Speaker ===

    fn on_loudest_speaker_changed(&mut self, id: SourceId) {
        self.bus
            .publish(Event::new(EventKind::SpeakerChanged).with_source(&id));
        if self.budget.ceiling == 0 {
            return;
        }
        let Some(state) = self.registry.state(&id) else {
            tracing::debug!(target: "slotvisor.scheduler", source = %id, "speaker not registered");
            self.bus.publish(
                Event::new(EventKind::SourceIgnored)
                    .with_source(id)
                    .with_reason("unknown"),
            );
            return;
        };
        let featured = self.layout.featured();
        match (state, self.slots[featured].clone()) {
            (SourceState::Rendered(slot) | SourceState::Attaching(slot), _) if slot == featured => {}
            (SourceState::Rendered(slot), SlotState::Rendered { source: prev, .. }) => {
                self.start_swap(id, slot, Some(prev));
            }
            (SourceState::Rendered(slot), SlotState::Open) => self.start_swap(id, slot, None),
            (SourceState::Unrendered, SlotState::Rendered { source: prev, .. }) => {
                self.displace(id, prev);
            }
            (SourceState::Unrendered, SlotState::Open) if self.has_headroom() => {
                self.assign(featured, &id);
            }
            (SourceState::Unrendered, SlotState::Open) => self.defer(&id, "ceiling_reached"),
            (SourceState::Rendered(_) | SourceState::Unrendered, _) => {
                self.defer(&id, "featured_busy");
            }
            _ => self.defer(&id, "in_flight"),
        }
    }

    /// Moves a grid speaker into the featured tile.
    ///
    /// With `displaced` both tiles detach concurrently and both attaches wait
    /// for both detaches. Without it the featured tile is held open while the
    /// grid tile detaches.
    fn start_swap(&mut self, speaker: SourceId, grid_slot: usize, displaced: Option<SourceId>) {
        let featured = self.layout.featured();
        self.next_swap += 1;
        let sid = SwapId(self.next_swap);
        let reason = if displaced.is_some() { "swap" } else { "move" };
        tracing::debug!(
            target: "slotvisor.scheduler",
            speaker = %speaker,
            from = grid_slot,
            reason,
            "featuring speaker"
        );
        self.bus.publish(
            Event::new(EventKind::SwapStarted)
                .with_source(&speaker)
                .with_view(self.layout.view(grid_slot))
                .with_reason(reason),
        );

        self.registry.set_state(&speaker, SourceState::Relocating);
        self.detach(grid_slot, speaker.clone(), Then::Swap(sid));
        let outstanding = match &displaced {
            Some(prev) => {
                self.registry.set_state(prev, SourceState::Relocating);
                self.detach(featured, prev.clone(), Then::Swap(sid));
                2
            }
            None => {
                self.slots[featured] = SlotState::Held { swap: sid };
                1
            }
        };
        self.swaps.insert(
            sid,
            Swap {
                speaker,
                grid_slot,
                displaced,
                outstanding,
            },
        );
    }

    /// Replaces the featured occupant with an unrendered speaker.
    fn displace(&mut self, speaker: SourceId, prev: SourceId) {
        let featured = self.layout.featured();
        self.bus.publish(
            Event::new(EventKind::SwapStarted)
                .with_source(&speaker)
                .with_reason("displace"),
        );
        self.registry
            .set_state(&prev, SourceState::Detaching(featured));
        self.registry.set_state(&speaker, SourceState::Relocating);
        self.detach(featured, prev, Then::Fill(speaker));
    }

    fn defer(&self, id: &SourceId, reason: &'static str) {
        tracing::debug!(target: "slotvisor.scheduler", source = %id, reason, "speaker change deferred");
        self.bus.publish(
            Event::new(EventKind::SpeakerDeferred)
                .with_source(id)
                .with_reason(reason),
        );
    }

    // === Ceiling ===

    fn on_ceiling_changed(&mut self, ceiling: usize) {
        let previous = self.budget.ceiling;
        if ceiling == previous {
            return;
        }
        self.budget.ceiling = ceiling;
        tracing::debug!(target: "slotvisor.scheduler", previous, ceiling, "resource ceiling changed");
        self.bus.publish(
            Event::new(EventKind::CeilingChanged)
                .with_ceiling(ceiling)
                .with_previous(previous),
        );

        if ceiling < previous {
            let excess = self.budget.excess(self.registry.committed());
            if excess > 0 {
                self.evict(excess);
            }
        } else {
            self.admit_unrendered();
        }
    }

    /// Gives up `count` claimed tiles in policy order.
    ///
    /// Relocating sources are not candidates; their placement re-checks the
    /// ceiling when the swap completes.
    fn evict(&mut self, count: usize) {
        let featured = self.layout.featured();
        let candidates: Vec<EvictionCandidate> = self
            .layout
            .remote()
            .filter_map(|slot| match &self.slots[slot] {
                SlotState::Rendered { since, .. } => Some(EvictionCandidate {
                    slot,
                    featured: slot == featured,
                    since: Some(*since),
                }),
                SlotState::Attaching { source, .. }
                    if self.registry.state(source) == Some(SourceState::Attaching(slot)) =>
                {
                    Some(EvictionCandidate {
                        slot,
                        featured: slot == featured,
                        since: None,
                    })
                }
                _ => None,
            })
            .collect();

        for victim in self.policy.order(candidates).into_iter().take(count) {
            let slot = victim.slot;
            let Some(source) = self.slots[slot].occupant().cloned() else {
                continue;
            };
            let view = self.layout.view(slot);
            tracing::debug!(target: "slotvisor.scheduler", source = %source, %view, "evicting");
            self.bus.publish(
                Event::new(EventKind::Evicted)
                    .with_source(&source)
                    .with_view(view)
                    .with_ceiling(self.budget.ceiling),
            );
            self.registry
                .set_state(&source, SourceState::Detaching(slot));
            // An attaching victim is detached when its attach resolves.
            if matches!(self.slots[slot], SlotState::Rendered { .. }) {
                self.detach(slot, source, Then::Backfill);
            }
        }
    }

    /// Admits unrendered sources in registry order into open grid tiles.
    /// A sole source goes straight to the featured tile.
    fn admit_unrendered(&mut self) {
        let featured = self.layout.featured();
        for id in self.registry.unrendered() {
            if !self.has_headroom() {
                break;
            }
            let target = if self.registry.len() == 1 && self.slots[featured].is_open() {
                Some(featured)
            } else {
                self.open_grid_slot()
            };
            let Some(slot) = target else {
                break;
            };
            self.bus.publish(
                Event::new(EventKind::Backfilled)
                    .with_source(&id)
                    .with_view(self.layout.view(slot))
                    .with_reason("ceiling_raised"),
            );
            self.assign(slot, &id);
        }
    }

    // === Completions ===

    fn on_completion(&mut self, Completion { op, result }: Completion) {
        let slot = self
            .layout
            .remote()
            .find(|&s| self.slots[s].op() == Some(op));
        if let Some(slot) = slot {
            if matches!(self.slots[slot], SlotState::Attaching { .. }) {
                self.on_attach_done(slot, result);
            } else {
                self.on_detach_done(slot, result);
            }
            return;
        }
        if let Some(outcome) = self.share.complete(op, result) {
            self.on_share_done(outcome);
            return;
        }
        tracing::debug!(target: "slotvisor.scheduler", %op, "completion for unknown operation");
        self.bus.publish(
            Event::new(EventKind::StaleCompletion).with_reason(format!("unknown {op}")),
        );
    }

    fn on_attach_done(&mut self, slot: usize, result: Result<(), EngineError>) {
        let SlotState::Attaching { source, .. } =
            std::mem::replace(&mut self.slots[slot], SlotState::Open)
        else {
            return;
        };
        let view = self.layout.view(slot);
        let state = self.registry.state(&source);

        match result {
            Ok(()) => {
                self.budget.rendered += 1;
                match state {
                    Some(SourceState::Attaching(s)) if s == slot => {
                        self.clock += 1;
                        self.registry
                            .set_state(&source, SourceState::Rendered(slot));
                        self.bus.publish(
                            Event::new(EventKind::Attached)
                                .with_source(&source)
                                .with_view(view),
                        );
                        self.slots[slot] = SlotState::Rendered {
                            source,
                            since: self.clock,
                        };
                    }
                    // Evicted while attaching.
                    Some(SourceState::Detaching(s)) if s == slot => {
                        self.detach(slot, source, Then::Backfill);
                    }
                    _ => {
                        self.bus.publish(
                            Event::new(EventKind::StaleCompletion)
                                .with_source(&source)
                                .with_view(view)
                                .with_reason("source_removed"),
                        );
                        self.detach(slot, source, Then::Backfill);
                    }
                }
            }
            Err(err) => {
                tracing::warn!(
                    target: "slotvisor.scheduler",
                    source = %source,
                    %view,
                    error = %err,
                    "attach failed"
                );
                self.bus.publish(
                    Event::new(EventKind::AttachFailed)
                        .with_source(&source)
                        .with_view(view)
                        .with_reason(err.as_label()),
                );
                match state {
                    Some(SourceState::Attaching(s) | SourceState::Detaching(s)) if s == slot => {
                        self.registry.set_state(&source, SourceState::Unrendered);
                    }
                    _ => self.backfill(slot),
                }
            }
        }
    }

    fn on_detach_done(&mut self, slot: usize, result: Result<(), EngineError>) {
        let SlotState::Detaching { source, then, .. } =
            std::mem::replace(&mut self.slots[slot], SlotState::Open)
        else {
            return;
        };
        let view = self.layout.view(slot);
        // Detach bookkeeping is never rolled back.
        self.budget.rendered = self.budget.rendered.saturating_sub(1);
        if self.registry.state(&source) == Some(SourceState::Detaching(slot)) {
            self.registry.set_state(&source, SourceState::Unrendered);
        }

        match result {
            Ok(()) => self.bus.publish(
                Event::new(EventKind::Detached)
                    .with_source(&source)
                    .with_view(view),
            ),
            Err(err) => {
                tracing::warn!(
                    target: "slotvisor.scheduler",
                    source = %source,
                    %view,
                    error = %err,
                    "detach failed, treating view as cleared"
                );
                self.bus.publish(
                    Event::new(EventKind::DetachFailed)
                        .with_source(&source)
                        .with_view(view)
                        .with_reason(err.as_label()),
                );
            }
        }

        match then {
            Then::Backfill => self.backfill(slot),
            Then::Fill(id) => self.fill_slot(slot, Some(id)),
            Then::Swap(sid) => self.swap_half_done(slot, sid),
        }
    }

    fn swap_half_done(&mut self, slot: usize, sid: SwapId) {
        let Some(swap) = self.swaps.get_mut(&sid) else {
            self.backfill(slot);
            return;
        };
        swap.outstanding = swap.outstanding.saturating_sub(1);
        if swap.outstanding > 0 {
            self.slots[slot] = SlotState::Held { swap: sid };
            return;
        }
        let Some(swap) = self.swaps.remove(&sid) else {
            return;
        };

        // Release both halves first so the featured placement sees the
        // ceiling without the displaced occupant.
        for id in std::iter::once(&swap.speaker).chain(swap.displaced.as_ref()) {
            if self.registry.state(id) == Some(SourceState::Relocating) {
                self.registry.set_state(id, SourceState::Unrendered);
            }
        }
        let featured = self.layout.featured();
        self.fill_slot(featured, Some(swap.speaker.clone()));
        self.fill_slot(swap.grid_slot, swap.displaced);
        self.bus.publish(
            Event::new(EventKind::SwapCompleted).with_source(&swap.speaker),
        );
    }

    /// Places `intended` into a vacated tile, or backfills it when the
    /// intended source is gone (stale second half of a swap).
    fn fill_slot(&mut self, slot: usize, intended: Option<SourceId>) {
        self.slots[slot] = SlotState::Open;
        let Some(id) = intended else {
            self.backfill(slot);
            return;
        };
        match self.registry.state(&id) {
            Some(SourceState::Unrendered | SourceState::Relocating) => {
                self.registry.set_state(&id, SourceState::Unrendered);
                if self.has_headroom() {
                    self.assign(slot, &id);
                } else {
                    self.deny(&id, "ceiling_reached");
                }
            }
            _ => {
                self.bus.publish(
                    Event::new(EventKind::StaleCompletion)
                        .with_source(&id)
                        .with_view(self.layout.view(slot))
                        .with_reason("swap_target_gone"),
                );
                self.backfill(slot);
            }
        }
    }

    /// Promotes the first unrendered source into an open tile.
    fn backfill(&mut self, slot: usize) {
        if !self.slots[slot].is_open() || !self.has_headroom() {
            return;
        }
        let Some(id) = self.registry.first_unrendered() else {
            return;
        };
        self.bus.publish(
            Event::new(EventKind::Backfilled)
                .with_source(&id)
                .with_view(self.layout.view(slot)),
        );
        self.assign(slot, &id);
    }

    /// Keeps a sole remote source in the featured tile.
    fn settle_lone_source(&mut self) {
        if self.registry.len() != 1 || self.budget.ceiling == 0 {
            return;
        }
        let featured = self.layout.featured();
        if !self.slots[featured].is_open() {
            return;
        }
        let Some(src) = self.registry.iter().next() else {
            return;
        };
        let SourceState::Rendered(slot) = src.state else {
            return;
        };
        let id = src.id.clone();
        self.start_swap(id, slot, None);
    }

    // === Share ===

    fn reconcile_share(&mut self) {
        match self.share.next_action() {
            Some(ShareAction::Attach(req)) => {
                let op = self.next_op();
                self.outbox.push(Command::Attach {
                    op,
                    handle: req.handle.clone(),
                    view: ViewId::Share,
                    cropped: false,
                });
                self.share.begin_attach(op, req);
                self.bus.publish(
                    Event::new(EventKind::AttachRequested).with_view(ViewId::Share),
                );
            }
            Some(ShareAction::Detach) => {
                let op = self.next_op();
                self.outbox.push(Command::Detach {
                    op,
                    view: ViewId::Share,
                });
                self.share.begin_detach(op);
                self.bus.publish(
                    Event::new(EventKind::DetachRequested).with_view(ViewId::Share),
                );
            }
            None => {}
        }
    }

    fn on_share_done(&mut self, outcome: ShareOutcome) {
        let view = ViewId::Share;
        match outcome {
            ShareOutcome::Attached => self
                .bus
                .publish(Event::new(EventKind::ShareAttached).with_view(view)),
            ShareOutcome::AttachFailed(err) => {
                tracing::warn!(target: "slotvisor.scheduler", error = %err, "share attach failed");
                self.bus.publish(
                    Event::new(EventKind::AttachFailed)
                        .with_view(view)
                        .with_reason(err.as_label()),
                );
            }
            ShareOutcome::Detached(result) => {
                if let Err(err) = result {
                    tracing::warn!(target: "slotvisor.scheduler", error = %err, "share detach failed");
                    self.bus.publish(
                        Event::new(EventKind::DetachFailed)
                            .with_view(view)
                            .with_reason(err.as_label()),
                    );
                }
                self.bus
                    .publish(Event::new(EventKind::ShareDetached).with_view(view));
            }
        }
        self.reconcile_share();
    }

    // === Session ===

    fn on_disconnected(&mut self) {
        tracing::info!(
            target: "slotvisor.scheduler",
            live = self.budget.live,
            rendered = self.budget.rendered,
            "connection lost, clearing slots"
        );
        self.bus
            .publish(Event::new(EventKind::Reset).with_ceiling(self.initial_ceiling));
        self.registry.clear();
        self.swaps.clear();
        self.budget.live = 0;
        self.budget.ceiling = self.initial_ceiling;

        for slot in self.layout.remote() {
            match std::mem::replace(&mut self.slots[slot], SlotState::Open) {
                SlotState::Rendered { source, .. } => self.detach(slot, source, Then::Backfill),
                SlotState::Detaching { source, op, .. } => {
                    self.slots[slot] = SlotState::Detaching {
                        source,
                        op,
                        then: Then::Backfill,
                    };
                }
                // Resolves as stale and detaches.
                attaching @ SlotState::Attaching { .. } => self.slots[slot] = attaching,
                SlotState::Held { .. } | SlotState::Open => {}
            }
        }
        self.share.clear();
        self.reconcile_share();
    }

    // === Helpers ===

    fn next_op(&mut self) -> OpId {
        self.next_op += 1;
        OpId(self.next_op)
    }

    fn has_headroom(&self) -> bool {
        self.budget.admits(self.registry.committed())
    }

    fn open_grid_slot(&self) -> Option<usize> {
        self.layout.grid().find(|&s| self.slots[s].is_open())
    }

    fn deny(&self, id: &SourceId, reason: &'static str) {
        tracing::debug!(
            target: "slotvisor.scheduler",
            source = %id,
            ceiling = self.budget.ceiling,
            reason,
            "admission denied"
        );
        self.bus.publish(
            Event::new(EventKind::AdmissionDenied)
                .with_source(id)
                .with_ceiling(self.budget.ceiling)
                .with_reason(reason),
        );
    }

    /// Claims `slot` for `id` and issues the attach.
    fn assign(&mut self, slot: usize, id: &SourceId) {
        let Some(handle) = self.registry.get(id).map(|s| s.handle.clone()) else {
            return;
        };
        let op = self.next_op();
        let view = self.layout.view(slot);
        self.registry.set_state(id, SourceState::Attaching(slot));
        self.slots[slot] = SlotState::Attaching {
            source: id.clone(),
            op,
        };
        self.outbox.push(Command::Attach {
            op,
            handle,
            view,
            cropped: !self.layout.is_featured(slot),
        });
        tracing::debug!(target: "slotvisor.scheduler", source = %id, %view, %op, "attach issued");
        self.bus.publish(
            Event::new(EventKind::AttachRequested)
                .with_source(id)
                .with_view(view),
        );
    }

    fn detach(&mut self, slot: usize, source: SourceId, then: Then) {
        let op = self.next_op();
        let view = self.layout.view(slot);
        tracing::debug!(target: "slotvisor.scheduler", source = %source, %view, %op, "detach issued");
        self.bus.publish(
            Event::new(EventKind::DetachRequested)
                .with_source(&source)
                .with_view(view),
        );
        self.slots[slot] = SlotState::Detaching { source, op, then };
        self.outbox.push(Command::Detach { op, view });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::{HashSet, VecDeque};
    use tokio::sync::broadcast;

    fn sched_with(cfg: SchedulerConfig) -> SlotScheduler {
        SlotScheduler::new(&cfg, Bus::new(512))
    }

    fn sched(ceiling: usize) -> SlotScheduler {
        sched_with(SchedulerConfig {
            initial_ceiling: ceiling,
            ..SchedulerConfig::default()
        })
    }

    fn added(id: &str) -> MediaEvent {
        MediaEvent::SourceAdded {
            id: id.into(),
            handle: SourceHandle::new(format!("cam-{id}")),
        }
    }

    fn removed(id: &str) -> MediaEvent {
        MediaEvent::SourceRemoved { id: id.into() }
    }

    fn speaker(id: &str) -> MediaEvent {
        MediaEvent::LoudestSpeakerChanged { id: id.into() }
    }

    fn ceiling(ceiling: usize) -> MediaEvent {
        MediaEvent::ResourceCeilingChanged { ceiling }
    }

    fn share(handle: &str) -> MediaEvent {
        MediaEvent::ShareAdded {
            handle: handle.into(),
        }
    }

    /// Completes `cmds` and every follow-up successfully, FIFO.
    fn settle(s: &mut SlotScheduler, cmds: Vec<Command>) -> Vec<Command> {
        let mut queue: VecDeque<Command> = cmds.into();
        let mut log = Vec::new();
        while let Some(cmd) = queue.pop_front() {
            queue.extend(s.handle(Completion::ok(cmd.op())));
            log.push(cmd);
        }
        log
    }

    fn run(s: &mut SlotScheduler, ev: MediaEvent) -> Vec<Command> {
        let cmds = s.handle(ev);
        settle(s, cmds)
    }

    fn layout(s: &SlotScheduler) -> Vec<String> {
        s.snapshot()
            .tiles
            .iter()
            .map(|t| match t {
                Tile::Local => "L".to_string(),
                Tile::Open => "-".to_string(),
                Tile::Remote(id) => id.to_string(),
            })
            .collect()
    }

    fn views(cmds: &[Command]) -> Vec<String> {
        cmds.iter()
            .map(|c| format!("{}{}", if c.is_attach() { "+" } else { "-" }, c.view()))
            .collect()
    }

    fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push(ev);
        }
        out
    }

    fn has_event(events: &[Event], kind: EventKind, source: &str) -> bool {
        events
            .iter()
            .any(|e| e.kind == kind && e.source.as_ref().map(SourceId::as_str) == Some(source))
    }

    fn assert_invariants(s: &SlotScheduler) {
        let snap = s.snapshot();
        assert!(snap.is_quiescent(), "in flight: {}", snap.in_flight);
        let occupants: Vec<&SourceId> = snap.tiles.iter().filter_map(Tile::source).collect();
        assert_eq!(snap.rendered, occupants.len(), "tiles: {:?}", snap.tiles);
        let unique: HashSet<&SourceId> = occupants.iter().copied().collect();
        assert_eq!(unique.len(), occupants.len(), "tiles: {:?}", snap.tiles);
        assert!(snap.rendered <= snap.ceiling, "{} > {}", snap.rendered, snap.ceiling);
        assert_eq!(snap.tiles[0], Tile::Local);
    }

    fn assert_lone_source_featured(s: &SlotScheduler) {
        let snap = s.snapshot();
        if snap.live == 1 && snap.ceiling >= 1 {
            assert_eq!(snap.rendered, 1, "tiles: {:?}", snap.tiles);
            assert!(snap.featured().is_some(), "tiles: {:?}", snap.tiles);
        }
    }

    #[test]
    fn test_sources_fill_featured_then_grid_then_deny() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();

        let first = s.handle(added("A"));
        assert_eq!(
            first,
            vec![Command::Attach {
                op: OpId(1),
                handle: "cam-A".into(),
                view: ViewId::Tile(5),
                cropped: false,
            }]
        );
        settle(&mut s, first);
        for id in ["B", "C", "D", "E"] {
            let log = run(&mut s, added(id));
            assert!(matches!(log[..], [Command::Attach { cropped: true, .. }]));
        }
        assert_eq!(layout(&s), ["L", "B", "C", "D", "E", "A"]);

        assert!(s.handle(added("G")).is_empty());
        let snap = s.snapshot();
        assert_eq!((snap.live, snap.rendered), (6, 5));
        assert!(has_event(&drain(&mut rx), EventKind::AdmissionDenied, "G"));
        assert_invariants(&s);
    }

    #[test]
    fn test_racing_adds_do_not_over_admit() {
        let mut s = sched(2);
        let mut cmds = Vec::new();
        for id in ["A", "B", "C"] {
            cmds.extend(s.handle(added(id)));
        }
        assert_eq!(views(&cmds), ["+renderer5", "+renderer1"]);
        settle(&mut s, cmds);
        assert_eq!(layout(&s), ["L", "B", "-", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_ceiling_drop_evicts_from_tail() {
        let mut s = sched(5);
        for id in ["A", "B", "C"] {
            run(&mut s, added(id));
        }
        let mut rx = s.bus().subscribe();
        let cmds = s.handle(ceiling(2));
        assert_eq!(views(&cmds), ["-renderer2"]);
        settle(&mut s, cmds);

        assert_eq!(layout(&s), ["L", "B", "-", "-", "-", "A"]);
        assert_eq!(s.budget().rendered, 2);
        assert!(has_event(&drain(&mut rx), EventKind::Evicted, "C"));
        assert_invariants(&s);
    }

    #[test]
    fn test_ceiling_change_is_idempotent() {
        let mut s = sched(5);
        for id in ["A", "B", "C"] {
            run(&mut s, added(id));
        }
        run(&mut s, ceiling(2));
        assert!(s.handle(ceiling(2)).is_empty());

        let cmds = s.handle(ceiling(5));
        assert_eq!(views(&cmds), ["+renderer2"]);
        settle(&mut s, cmds);
        assert!(s.handle(ceiling(5)).is_empty());
        assert_eq!(layout(&s), ["L", "B", "C", "-", "-", "A"]);
    }

    #[test]
    fn test_ceiling_raise_admits_in_registry_order() {
        let mut s = sched(1);
        for id in ["A", "B", "C", "D"] {
            run(&mut s, added(id));
        }
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);

        let cmds = s.handle(ceiling(3));
        let handles: Vec<&str> = cmds
            .iter()
            .filter_map(|c| match c {
                Command::Attach { handle, .. } => Some(handle.as_str()),
                Command::Detach { .. } => None,
            })
            .collect();
        assert_eq!(views(&cmds), ["+renderer1", "+renderer2"]);
        assert_eq!(handles, ["cam-B", "cam-C"]);
        settle(&mut s, cmds);
        assert_invariants(&s);
    }

    #[test]
    fn test_ceiling_raise_fills_grid_not_featured() {
        let mut s = sched(0);
        run(&mut s, added("A"));
        run(&mut s, added("B"));
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "-"]);

        let cmds = s.handle(ceiling(2));
        assert_eq!(views(&cmds), ["+renderer1", "+renderer2"]);
        settle(&mut s, cmds);
        assert_eq!(layout(&s), ["L", "A", "B", "-", "-", "-"]);
        assert_invariants(&s);

        // The speaker takes the featured tile when it speaks.
        let log = run(&mut s, speaker("B"));
        assert_eq!(views(&log), ["-renderer2", "+renderer5"]);
        assert_eq!(s.snapshot().position(&"B".into()), Some(5));
        assert_invariants(&s);
    }

    #[test]
    fn test_ceiling_raise_features_sole_source() {
        let mut s = sched(0);
        run(&mut s, added("A"));
        let cmds = s.handle(ceiling(1));
        assert_eq!(views(&cmds), ["+renderer5"]);
        settle(&mut s, cmds);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_add_with_full_grid_leaves_featured_open() {
        let mut s = sched(6);
        let mut rx = s.bus().subscribe();
        for id in ["A", "B", "C", "D", "E"] {
            run(&mut s, added(id));
        }
        run(&mut s, removed("A"));
        assert_eq!(layout(&s), ["L", "B", "C", "D", "E", "-"]);

        assert!(s.handle(added("G")).is_empty());
        assert_eq!(s.snapshot().position(&"G".into()), None);
        let denied = drain(&mut rx)
            .into_iter()
            .find(|e| e.kind == EventKind::AdmissionDenied)
            .and_then(|e| e.reason);
        assert_eq!(denied.as_deref(), Some("no_open_slot"));
        assert_invariants(&s);
    }

    #[test]
    fn test_lone_featured_speaker_is_noop() {
        let mut s = sched(5);
        run(&mut s, added("A"));
        assert!(s.handle(speaker("A")).is_empty());
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);
    }

    #[test]
    fn test_speaker_swap_attaches_after_both_detaches() {
        let mut s = sched(5);
        run(&mut s, added("A"));
        run(&mut s, added("B"));

        let detaches = s.handle(speaker("B"));
        assert_eq!(views(&detaches), ["-renderer1", "-renderer5"]);
        // Swap in flight: a repeated speaker event is deferred.
        assert!(s.handle(speaker("B")).is_empty());

        assert!(s.handle(Completion::ok(detaches[1].op())).is_empty());
        let attaches = s.handle(Completion::ok(detaches[0].op()));
        assert_eq!(
            attaches,
            vec![
                Command::Attach {
                    op: attaches[0].op(),
                    handle: "cam-B".into(),
                    view: ViewId::Tile(5),
                    cropped: false,
                },
                Command::Attach {
                    op: attaches[1].op(),
                    handle: "cam-A".into(),
                    view: ViewId::Tile(1),
                    cropped: true,
                },
            ]
        );
        settle(&mut s, attaches);
        assert_eq!(layout(&s), ["L", "A", "-", "-", "-", "B"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_unrendered_speaker_displaces_featured() {
        let mut s = sched(1);
        run(&mut s, added("A"));
        run(&mut s, added("B"));

        let cmds = s.handle(speaker("B"));
        assert_eq!(views(&cmds), ["-renderer5"]);
        let log = settle(&mut s, cmds);
        assert_eq!(views(&log), ["-renderer5", "+renderer5"]);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "B"]);
        assert_eq!(s.budget().live, 2);
        assert_invariants(&s);
    }

    #[test]
    fn test_unknown_speaker_and_zero_ceiling_are_ignored() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();
        run(&mut s, added("A"));
        run(&mut s, added("B"));

        assert!(s.handle(speaker("ghost")).is_empty());
        assert!(has_event(&drain(&mut rx), EventKind::SourceIgnored, "ghost"));

        run(&mut s, ceiling(0));
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "-"]);
        assert!(s.handle(speaker("B")).is_empty());
        assert_invariants(&s);
    }

    #[test]
    fn test_removal_backfills_vacated_slot() {
        let mut s = sched(3);
        for id in ["A", "B", "C", "D"] {
            run(&mut s, added(id));
        }
        assert_eq!(layout(&s), ["L", "B", "C", "-", "-", "A"]);

        let cmds = s.handle(removed("B"));
        assert_eq!(views(&cmds), ["-renderer1"]);
        let follow = s.handle(Completion::ok(cmds[0].op()));
        assert_eq!(views(&follow), ["+renderer1"]);
        settle(&mut s, follow);
        assert_eq!(layout(&s), ["L", "D", "C", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_lone_source_moves_to_featured_after_removal() {
        let mut s = sched(5);
        run(&mut s, added("A"));
        run(&mut s, added("B"));

        let log = run(&mut s, removed("A"));
        assert_eq!(views(&log), ["-renderer5", "-renderer1", "+renderer5"]);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "B"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_attach_failure_rolls_back_without_retry() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();
        let cmds = s.handle(added("A"));
        let retry = s.handle(Completion::failed(cmds[0].op(), EngineError::Busy));
        assert!(retry.is_empty());
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "-"]);
        assert_eq!(s.budget().rendered, 0);
        assert_eq!(s.budget().live, 1);
        let events = drain(&mut rx);
        let failed = events
            .iter()
            .find(|e| e.kind == EventKind::AttachFailed)
            .and_then(|e| e.reason.clone());
        assert_eq!(failed.as_deref(), Some("engine_busy"));

        // The next vacated tile retries it.
        run(&mut s, added("B"));
        run(&mut s, removed("B"));
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_detach_failure_still_backfills() {
        let mut s = sched(2);
        for id in ["A", "B", "C"] {
            run(&mut s, added(id));
        }
        let mut rx = s.bus().subscribe();
        let cmds = s.handle(removed("B"));
        let follow = s.handle(Completion::failed(cmds[0].op(), EngineError::Busy));
        assert_eq!(views(&follow), ["+renderer1"]);
        settle(&mut s, follow);

        assert_eq!(layout(&s), ["L", "C", "-", "-", "-", "A"]);
        assert!(has_event(&drain(&mut rx), EventKind::DetachFailed, "B"));
        assert_invariants(&s);
    }

    #[test]
    fn test_removal_while_attaching_detaches_on_completion() {
        let mut s = sched(5);
        run(&mut s, added("A"));
        let attach = s.handle(added("B"));
        assert!(s.handle(removed("B")).is_empty());

        let follow = s.handle(Completion::ok(attach[0].op()));
        assert_eq!(views(&follow), ["-renderer1"]);
        settle(&mut s, follow);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_eviction_revokes_in_flight_attach() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();
        run(&mut s, added("A"));
        let attach = s.handle(added("B"));

        assert!(s.handle(ceiling(1)).is_empty());
        assert!(has_event(&drain(&mut rx), EventKind::Evicted, "B"));
        let follow = s.handle(Completion::ok(attach[0].op()));
        assert_eq!(views(&follow), ["-renderer1"]);
        settle(&mut s, follow);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_swap_with_departed_occupant_backfills_grid_half() {
        let mut s = sched(3);
        let mut rx = s.bus().subscribe();
        for id in ["A", "B", "C", "D"] {
            run(&mut s, added(id));
        }
        let detaches = s.handle(speaker("B"));
        assert!(s.handle(removed("A")).is_empty());

        assert!(s.handle(Completion::ok(detaches[0].op())).is_empty());
        let attaches = s.handle(Completion::ok(detaches[1].op()));
        let placed: Vec<(String, String)> = attaches
            .iter()
            .filter_map(|c| match c {
                Command::Attach { handle, view, .. } => Some((handle.to_string(), view.to_string())),
                Command::Detach { .. } => None,
            })
            .collect();
        assert_eq!(
            placed,
            [
                ("cam-B".to_string(), "renderer5".to_string()),
                ("cam-D".to_string(), "renderer1".to_string()),
            ]
        );
        settle(&mut s, attaches);
        assert_eq!(layout(&s), ["L", "D", "C", "-", "-", "B"]);
        assert!(has_event(&drain(&mut rx), EventKind::StaleCompletion, "A"));
        assert_invariants(&s);
    }

    #[test]
    fn test_least_recently_rendered_evicts_oldest_grid_tiles() {
        let mut s = sched_with(SchedulerConfig {
            eviction: EvictionPolicy::LeastRecentlyRendered,
            ..SchedulerConfig::default()
        });
        for id in ["A", "B", "C", "D"] {
            run(&mut s, added(id));
        }
        let cmds = s.handle(ceiling(2));
        assert_eq!(views(&cmds), ["-renderer1", "-renderer2"]);
        settle(&mut s, cmds);
        assert_eq!(layout(&s), ["L", "-", "-", "D", "-", "A"]);
        assert_invariants(&s);
    }

    #[test]
    fn test_share_readd_detaches_once_then_attaches() {
        let mut s = sched(5);
        let first = s.handle(share("win-1"));
        assert_eq!(views(&first), ["+rendererS"]);
        settle(&mut s, first);
        assert!(s.snapshot().share_active);

        let detach = s.handle(share("win-2"));
        assert_eq!(views(&detach), ["-rendererS"]);
        assert!(!s.snapshot().share_active);
        let attach = s.handle(Completion::ok(detach[0].op()));
        assert!(matches!(
            &attach[..],
            [Command::Attach { handle, view: ViewId::Share, cropped: false, .. }] if handle.as_str() == "win-2"
        ));
        assert!(!s.snapshot().share_active);
        settle(&mut s, attach);
        assert!(s.snapshot().share_active);
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "-"]);
    }

    #[test]
    fn test_share_removed_while_attaching() {
        let mut s = sched(5);
        let attach = s.handle(share("win-1"));
        assert!(s.handle(MediaEvent::ShareRemoved).is_empty());
        let detach = s.handle(Completion::ok(attach[0].op()));
        assert_eq!(views(&detach), ["-rendererS"]);
        assert!(settle(&mut s, detach).len() == 1);
        assert!(!s.snapshot().share_active);
        assert!(s.snapshot().is_quiescent());
    }

    #[test]
    fn test_disconnect_clears_everything() {
        let mut s = sched(5);
        run(&mut s, added("A"));
        run(&mut s, added("B"));
        run(&mut s, share("win-1"));
        run(&mut s, ceiling(3));

        let cmds = s.handle(MediaEvent::Disconnected);
        assert_eq!(views(&cmds), ["-renderer1", "-renderer5", "-rendererS"]);
        settle(&mut s, cmds);
        let snap = s.snapshot();
        assert_eq!(layout(&s), ["L", "-", "-", "-", "-", "-"]);
        assert_eq!((snap.live, snap.rendered, snap.ceiling), (0, 0, 5));
        assert!(!snap.share_active);

        assert_eq!(views(&s.handle(added("X"))), ["+renderer5"]);
    }

    #[test]
    fn test_duplicate_add_and_unknown_completion_are_ignored() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();
        run(&mut s, added("A"));
        assert!(s.handle(added("A")).is_empty());
        assert!(s.handle(Completion::ok(OpId(999))).is_empty());
        assert!(s.handle(removed("nobody")).is_empty());

        let events = drain(&mut rx);
        assert!(has_event(&events, EventKind::SourceIgnored, "A"));
        assert!(has_event(&events, EventKind::SourceIgnored, "nobody"));
        assert!(events.iter().any(|e| e.kind == EventKind::StaleCompletion));
        assert_eq!(s.budget().live, 1);
    }

    #[test]
    fn test_participant_events_do_not_touch_slots() {
        let mut s = sched(5);
        let mut rx = s.bus().subscribe();
        let cmds = s.handle(MediaEvent::ParticipantJoined {
            id: "A".into(),
            name: "Alice".into(),
        });
        assert!(cmds.is_empty());
        let events = drain(&mut rx);
        assert_eq!(events[0].kind, EventKind::ParticipantJoined);
        assert_eq!(events[0].reason.as_deref(), Some("Alice"));
        assert_eq!(s.budget().live, 0);
    }

    /// Deterministic generator for the interleaving test.
    struct Lcg(u64);

    impl Lcg {
        fn below(&mut self, n: usize) -> usize {
            self.0 = self
                .0
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((self.0 >> 33) as usize) % n
        }
    }

    /// Drives a seeded random mix of media events and completions.
    ///
    /// With `fail_one_in = Some(n)` roughly one completion in `n` fails.
    /// The lone-source rule only holds when every engine call succeeds.
    fn interleave(seed: u64, fail_one_in: Option<usize>) {
        let mut rng = Lcg(seed);
        let mut s = sched(5);
        let mut pending: Vec<Command> = Vec::new();
        let mut live: Vec<String> = Vec::new();
        let mut next_id = 0;

        let complete = |s: &mut SlotScheduler, rng: &mut Lcg, cmd: Command| {
            let failed = fail_one_in.is_some_and(|n| rng.below(n) == 0);
            let done = if failed {
                Completion::failed(cmd.op(), EngineError::Busy)
            } else {
                Completion::ok(cmd.op())
            };
            s.handle(done)
        };
        let check = |s: &SlotScheduler| {
            assert_invariants(s);
            if fail_one_in.is_none() {
                assert_lone_source_featured(s);
            }
        };

        for _ in 0..400 {
            if !pending.is_empty() && rng.below(10) < 5 {
                let cmd = pending.swap_remove(rng.below(pending.len()));
                pending.extend(complete(&mut s, &mut rng, cmd));
            } else {
                let ev = match rng.below(8) {
                    0..=2 => {
                        next_id += 1;
                        let id = format!("p{next_id}");
                        live.push(id.clone());
                        added(&id)
                    }
                    3 | 4 if !live.is_empty() => {
                        let id = live.swap_remove(rng.below(live.len()));
                        removed(&id)
                    }
                    5 if !live.is_empty() => speaker(&live[rng.below(live.len())]),
                    6 => ceiling(rng.below(7)),
                    _ => share("win"),
                };
                pending.extend(s.handle(ev));
            }
            if pending.is_empty() {
                check(&s);
            }
        }
        while !pending.is_empty() {
            let cmd = pending.swap_remove(rng.below(pending.len()));
            pending.extend(complete(&mut s, &mut rng, cmd));
        }
        check(&s);
        assert_eq!(s.budget().live, live.len());
    }

    #[test]
    fn test_random_interleavings_keep_invariants() {
        for seed in 0..32u64 {
            interleave(seed, None);
        }
    }

    #[test]
    fn test_random_interleavings_with_engine_failures_keep_invariants() {
        for seed in 0..32u64 {
            interleave(seed, Some(4));
        }
    }
}
