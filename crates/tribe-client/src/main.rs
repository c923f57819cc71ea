//! Headless Tribe chat client.
//!
//! Rehydrates the persisted feed, refreshes it from the server, then keeps
//! it current with the update poller until Ctrl+C.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use tribe_client::view::{feed_rows, FeedRow};
use tribe_client::{init_tracing, ClientConfig, DayBoundary, MergeOutcome, PollPhase, SyncStore};
use tribe_net::HttpChatApi;
use tribe_store::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // -----------------------------------------------------------------------
    // 1. Tracing and configuration
    // -----------------------------------------------------------------------
    init_tracing();
    info!("Starting Tribe chat client v{}", env!("CARGO_PKG_VERSION"));

    let config = ClientConfig::from_env();
    info!(?config, "Loaded configuration");

    // -----------------------------------------------------------------------
    // 2. Collaborators
    // -----------------------------------------------------------------------
    let db = Database::open(config.state_db_path.as_deref()).context("opening state database")?;
    let api = HttpChatApi::new(&config.api_base_url, config.http_timeout)?;

    let store = Arc::new(SyncStore::new(api, Box::new(db)).with_poll_settings(config.poll));
    info!(
        held = store.snapshot().real_messages().count(),
        "state rehydrated"
    );

    // -----------------------------------------------------------------------
    // 3. Refresh, then poll
    // -----------------------------------------------------------------------
    if let MergeOutcome::Unchanged(reason) = store.load_initial().await {
        tracing::warn!(?reason, "initial load did not change the feed");
    }
    store.start_polling().await;

    let mut feed = store.subscribe();
    let mut phase = store.subscribe_poll_phase();
    log_tail(&store.snapshot().messages);

    loop {
        tokio::select! {
            changed = feed.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = feed.borrow_and_update().clone();
                log_tail(&snapshot.messages);
            }
            changed = phase.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *phase.borrow_and_update();
                info!(?current, "poller phase");
                if current == PollPhase::Stopped {
                    tracing::warn!("poller stopped; the feed will no longer update");
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    store.stop_polling().await;
    Ok(())
}

/// Log the newest row of the feed.
fn log_tail(items: &[tribe_shared::FeedItem]) {
    let rows = feed_rows(items, DayBoundary::Local);
    match rows.last() {
        Some(FeedRow::Message(view)) => info!(
            rows = rows.len(),
            from = %view.name,
            time = %view.time,
            edited = view.edited,
            "{}",
            view.text
        ),
        Some(FeedRow::Separator { label, .. }) => info!(rows = rows.len(), %label, "feed ends on separator"),
        None => info!("feed is empty"),
    }
}
