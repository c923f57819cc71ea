//! # tribe-client
//!
//! Message sync engine for the Tribe chat client.
//!
//! - [`directory`] resolves message authors to participants
//! - [`annotate`] inserts date separators into a message run
//! - [`merge`] computes the next feed from the current one and a batch
//! - [`poller`] decides when the next update poll happens
//! - [`store`] owns the state, runs the actions and the poll task

pub mod annotate;
pub mod config;
pub mod directory;
pub mod merge;
pub mod persist;
pub mod poller;
pub mod store;
pub mod view;

use tracing_subscriber::{fmt, EnvFilter};

pub use annotate::{annotate, annotate_with, strip_separators, DayBoundary};
pub use config::ClientConfig;
pub use directory::ParticipantDirectory;
pub use merge::{oldest_anchor, MergeEngine, OlderMerge};
pub use persist::{Ephemeral, Persistence};
pub use poller::{PollPhase, PollSettings, PollerState, TickOutcome, Watermarks};
pub use store::{MergeOutcome, PollHandle, SyncStore, UnchangedReason};

/// Install the global tracing subscriber.  `RUST_LOG` overrides the
/// default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("tribe_client=debug,tribe_net=debug,tribe_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .init();
}
