//! # Example: conference
//!
//! Replays a short conference against the in-memory `RecordingEngine` and
//! prints the slot table after each step.
//!
//! Shows how to:
//! - Build a runtime with [`SchedulerBuilder`] and the built-in [`LogWriter`].
//! - Feed [`MediaEvent`]s through a [`SchedulerHandle`](slotvisor::SchedulerHandle).
//! - Wait for a quiescent [`SlotSnapshot`] before reading the layout.
//!
//! ## Flow
//! ```text
//! alice joins        ──► alice featured
//! bob, carol join    ──► grid 1, 2
//! carol speaks       ──► swap: carol featured, alice to grid 2
//! window share       ──► rendererS
//! ceiling 3 -> 2     ──► tail tile evicted
//! bob leaves         ──► grid 1 backfilled from unrendered
//! connection lost    ──► everything released
//! ```
//!
//! ## Run
//! ```bash
//! RUST_LOG=slotvisor=debug cargo run --example conference --features "logging test-util"
//! ```

use std::{sync::Arc, time::Duration};

use slotvisor::{
    LogWriter, MediaEvent, RecordingEngine, SchedulerBuilder, SchedulerConfig, SlotSnapshot,
    Subscribe, Tile,
};
use tracing_subscriber::EnvFilter;

fn render(step: &str, snap: &SlotSnapshot) {
    let tiles: Vec<String> = snap
        .tiles
        .iter()
        .map(|t| match t {
            Tile::Local => "me".to_string(),
            Tile::Open => "--".to_string(),
            Tile::Remote(id) => id.to_string(),
        })
        .collect();
    println!(
        "{step:<22} [{}] share={} rendered={}/{} live={}",
        tiles.join(" | "),
        snap.share_active,
        snap.rendered,
        snap.ceiling,
        snap.live,
    );
}

fn joined(id: &str) -> MediaEvent {
    MediaEvent::SourceAdded {
        id: id.into(),
        handle: format!("cam-{id}").into(),
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("slotvisor=info")),
        )
        .init();

    // 1) Three grid tiles, room for three remote sources.
    let cfg = SchedulerConfig {
        grid_slots: 3,
        initial_ceiling: 3,
        engine_timeout: Duration::from_secs(2),
        ..SchedulerConfig::default()
    };

    // 2) An engine that takes a little while to attach, like a real one.
    let engine = Arc::new(RecordingEngine::with_delay(Duration::from_millis(20)));
    let subs: Vec<Arc<dyn Subscribe>> = vec![Arc::new(LogWriter::new())];

    let rt = SchedulerBuilder::new(cfg, engine.clone())
        .with_subscribers(subs)
        .build()?;
    let handle = rt.handle();

    let script: Vec<(&str, Vec<MediaEvent>)> = vec![
        ("alice joins", vec![joined("alice")]),
        ("bob, carol, dave join", vec![joined("bob"), joined("carol"), joined("dave")]),
        (
            "carol speaks",
            vec![MediaEvent::LoudestSpeakerChanged { id: "carol".into() }],
        ),
        (
            "bob shares a window",
            vec![MediaEvent::ShareAdded {
                handle: "window-bob".into(),
            }],
        ),
        (
            "ceiling drops to 2",
            vec![MediaEvent::ResourceCeilingChanged { ceiling: 2 }],
        ),
        (
            "bob leaves",
            vec![MediaEvent::SourceRemoved { id: "bob".into() }],
        ),
        ("connection lost", vec![MediaEvent::Disconnected]),
    ];

    // 3) Play each step and wait for the engine to settle before printing.
    let mut snapshots = handle.subscribe_snapshots();
    for (step, events) in script {
        snapshots.borrow_and_update();
        for ev in events {
            handle.submit(ev).await?;
        }
        // Every step changes the table; skip the stale quiescent one.
        snapshots.changed().await?;
        let snap = snapshots.wait_for(SlotSnapshot::is_quiescent).await?.clone();
        render(step, &snap);
    }

    println!("engine saw {} calls", engine.calls().len());
    rt.shutdown().await;
    Ok(())
}
