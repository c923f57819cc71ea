//! The sync store.
//!
//! [`SyncStore`] owns the canonical [`ChatSnapshot`] and is the only thing
//! that replaces it.  Each action fetches what it needs, asks the merge
//! engine for the next snapshot and commits it in one synchronous step, so
//! subscribers never see a half-applied merge.  Every commit is written
//! through to [`Persistence`].

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use tribe_net::{ApiError, ChatApi, Since};
use tribe_shared::{ChatSnapshot, Message, Participant};

use crate::directory::upsert_participants;
use crate::merge::{oldest_anchor, MergeEngine};
use crate::persist::Persistence;
use crate::poller::{PollPhase, PollSettings, PollerState, TickOutcome, Watermarks};

/// What an action did to the held state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The feed was rebuilt from a full fetch.
    Replaced { messages: usize, participants: usize },
    /// An older page was put in front of the feed.
    Prepended {
        added: usize,
        anchor_index: Option<usize>,
    },
    /// Incremental updates were folded in.
    Merged { messages: usize, participants: usize },
    Unchanged(UnchangedReason),
}

impl MergeOutcome {
    pub fn is_changed(&self) -> bool {
        !matches!(self, MergeOutcome::Unchanged(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnchangedReason {
    /// No message to page back from; nothing was requested.
    NoAnchor,
    /// The fetch succeeded but brought nothing new.
    NothingNew,
    /// The fetch failed; the error has been logged.
    FetchFailed(ApiError),
}

/// Cancels the poll task it was returned for.  The poll phase moves to
/// [`PollPhase::Stopped`] once the task is gone.
#[derive(Debug, Clone)]
pub struct PollHandle {
    abort: AbortHandle,
}

impl PollHandle {
    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Moves the poll phase to `Stopped` when dropped.  Lives inside the poll
/// task's future, so an abort triggers it even before the first poll.
struct StopOnDrop(Arc<watch::Sender<PollPhase>>);

impl Drop for StopOnDrop {
    fn drop(&mut self) {
        mark_stopped(&self.0);
    }
}

fn mark_stopped(phase: &watch::Sender<PollPhase>) {
    phase.send_if_modified(|current| {
        let changed = *current != PollPhase::Stopped;
        *current = PollPhase::Stopped;
        changed
    });
}

pub struct SyncStore<A> {
    api: A,
    engine: MergeEngine,
    state: watch::Sender<Arc<ChatSnapshot>>,
    persistence: Mutex<Box<dyn Persistence>>,
    poll_settings: PollSettings,
    poll_task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    poll_phase: Arc<watch::Sender<PollPhase>>,
}

impl<A: ChatApi + 'static> SyncStore<A> {
    /// Create a store and rehydrate whatever `persistence` holds.  A failed
    /// load starts from an empty state.
    pub fn new(api: A, persistence: Box<dyn Persistence>) -> Self {
        let initial = match persistence.load() {
            Ok(snapshot) => snapshot.unwrap_or_default(),
            Err(e) => {
                tracing::warn!(error = %e, "could not load persisted state, starting empty");
                ChatSnapshot::default()
            }
        };

        let (state, _) = watch::channel(Arc::new(initial));
        let (poll_phase, _) = watch::channel(PollPhase::Idle);
        Self {
            api,
            engine: MergeEngine::default(),
            state,
            persistence: Mutex::new(persistence),
            poll_settings: PollSettings::default(),
            poll_task: tokio::sync::Mutex::new(None),
            poll_phase: Arc::new(poll_phase),
        }
    }

    pub fn with_poll_settings(mut self, settings: PollSettings) -> Self {
        self.poll_settings = settings;
        self
    }

    pub fn with_merge_engine(mut self, engine: MergeEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// The current state.
    pub fn snapshot(&self) -> Arc<ChatSnapshot> {
        self.state.borrow().clone()
    }

    /// Watch for committed states.
    pub fn subscribe(&self) -> watch::Receiver<Arc<ChatSnapshot>> {
        self.state.subscribe()
    }

    pub fn poll_phase(&self) -> PollPhase {
        *self.poll_phase.borrow()
    }

    pub fn subscribe_poll_phase(&self) -> watch::Receiver<PollPhase> {
        self.poll_phase.subscribe()
    }

    // ---------------------------------------------------------------------
    // Actions
    // ---------------------------------------------------------------------

    /// Replace the feed with the latest page and the full participant list.
    pub async fn load_initial(&self) -> MergeOutcome {
        let fetched = tokio::try_join!(
            self.api.fetch_latest_messages(),
            self.api.fetch_participants()
        );
        self.replace_all(fetched, "initial load")
    }

    /// Replace the feed with the entire history.
    pub async fn load_all(&self) -> MergeOutcome {
        let fetched = tokio::try_join!(
            self.api.fetch_all_messages(),
            self.api.fetch_participants()
        );
        self.replace_all(fetched, "full history load")
    }

    /// Fetch the page before the oldest held message and prepend it.
    pub async fn load_older(&self) -> MergeOutcome {
        let anchor = oldest_anchor(&self.snapshot().messages).map(str::to_owned);
        let Some(anchor) = anchor else {
            tracing::debug!("no messages held, skipping older page");
            return MergeOutcome::Unchanged(UnchangedReason::NoAnchor);
        };

        let page = match self.api.fetch_older_messages(&anchor).await {
            Ok(page) => page,
            Err(e) => {
                tracing::warn!(error = %e, anchor = %anchor, "older page load failed, keeping current state");
                return MergeOutcome::Unchanged(UnchangedReason::FetchFailed(e));
            }
        };

        let engine = self.engine;
        let outcome = self.commit(|current| {
            let merged = engine.merge_older(&current.messages, page, &current.participants)?;
            let next = ChatSnapshot {
                messages: merged.items,
                participants: current.participants.clone(),
            };
            Some((
                next,
                MergeOutcome::Prepended {
                    added: merged.added,
                    anchor_index: merged.anchor_index,
                },
            ))
        });

        match outcome {
            Some(outcome) => {
                tracing::debug!(?outcome, anchor = %anchor, "older page merged");
                outcome
            }
            None => MergeOutcome::Unchanged(UnchangedReason::NothingNew),
        }
    }

    /// Fold message and participant updates into the held state.
    pub fn apply_updates(&self, messages: Vec<Message>, participants: Vec<Participant>) -> MergeOutcome {
        if messages.is_empty() && participants.is_empty() {
            return MergeOutcome::Unchanged(UnchangedReason::NothingNew);
        }

        let outcome = MergeOutcome::Merged {
            messages: messages.len(),
            participants: participants.len(),
        };
        let engine = self.engine;
        self.commit(|current| {
            let participants = upsert_participants(&current.participants, participants);
            let messages = engine.merge_updates(&current.messages, messages, &participants);
            Some((
                ChatSnapshot {
                    messages,
                    participants,
                },
                (),
            ))
        });
        tracing::debug!(?outcome, "updates merged");
        outcome
    }

    /// Post a message.  On success the created message is merged like any
    /// other update and returned; failures go back to the caller.
    pub async fn send_message(&self, text: &str) -> Result<Message, ApiError> {
        let created = self.api.send_message(text).await.map_err(|e| {
            tracing::warn!(error = %e, "send failed");
            e
        })?;
        self.apply_updates(vec![created.clone()], Vec::new());
        Ok(created)
    }

    // ---------------------------------------------------------------------
    // Polling
    // ---------------------------------------------------------------------

    /// Start the update poller, replacing any poller already running.
    pub async fn start_polling(self: &Arc<Self>) -> PollHandle {
        let mut task = self.poll_task.lock().await;
        if let Some(previous) = task.take() {
            previous.abort();
            let _ = previous.await;
        }

        let store = Arc::clone(self);
        let guard = StopOnDrop(Arc::clone(&self.poll_phase));
        let spawned = tokio::spawn(async move {
            let _guard = guard;
            store.poll_loop().await
        });
        let handle = PollHandle {
            abort: spawned.abort_handle(),
        };
        *task = Some(spawned);
        handle
    }

    /// Stop the update poller.  Safe to call when none is running.
    pub async fn stop_polling(&self) {
        let mut task = self.poll_task.lock().await;
        if let Some(running) = task.take() {
            running.abort();
            let _ = running.await;
            tracing::info!("poller stopped");
        }
        mark_stopped(&self.poll_phase);
    }

    async fn poll_loop(self: Arc<Self>) {
        let mut poller = PollerState::new(self.poll_settings);
        let mut marks = Watermarks::from_snapshot(&self.snapshot());
        let mut delay = poller.start();
        self.poll_phase.send_replace(poller.phase());
        tracing::info!(
            since_messages = marks.messages,
            since_participants = marks.participants,
            "poller started"
        );

        loop {
            tokio::time::sleep(delay).await;
            let outcome = self.poll_once(&mut marks).await;
            match poller.on_tick(outcome) {
                Some(next) => {
                    delay = next;
                    self.poll_phase.send_replace(poller.phase());
                }
                None => {
                    tracing::error!(
                        retries = poller.retries(),
                        "update polling failed repeatedly, giving up"
                    );
                    mark_stopped(&self.poll_phase);
                    return;
                }
            }
        }
    }

    async fn poll_once(&self, marks: &mut Watermarks) -> TickOutcome {
        let messages_since = Since::Millis(marks.messages);
        let participants_since = Since::Millis(marks.participants);
        let fetched = tokio::try_join!(
            self.api.fetch_message_updates(&messages_since),
            self.api.fetch_participant_updates(&participants_since)
        );

        match fetched {
            Ok((messages, participants)) => {
                if messages.is_empty() && participants.is_empty() {
                    return TickOutcome::Empty;
                }
                marks.advance(&messages, &participants);
                self.apply_updates(messages, participants);
                TickOutcome::Updated
            }
            Err(e) => {
                tracing::warn!(error = %e, "poll tick failed");
                TickOutcome::Failed
            }
        }
    }

    // ---------------------------------------------------------------------
    // Commit
    // ---------------------------------------------------------------------

    fn replace_all(
        &self,
        fetched: Result<(Vec<Message>, Vec<Participant>), ApiError>,
        action: &'static str,
    ) -> MergeOutcome {
        let (messages, participants) = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                tracing::warn!(error = %e, action, "fetch failed, keeping current state");
                return MergeOutcome::Unchanged(UnchangedReason::FetchFailed(e));
            }
        };

        let feed = self.engine.merge_initial(messages, &participants);
        let outcome = MergeOutcome::Replaced {
            messages: feed.iter().filter(|i| !i.is_separator()).count(),
            participants: participants.len(),
        };
        self.commit(|_| {
            Some((
                ChatSnapshot {
                    messages: feed,
                    participants,
                },
                (),
            ))
        });
        tracing::info!(?outcome, action, "feed replaced");
        outcome
    }

    /// Derive the next snapshot from the current one and publish it.
    ///
    /// `update` returns `None` to leave the state alone.  The persistence
    /// lock is held from the swap until the write finishes so saves land
    /// in commit order.  A failed save is logged and the in-memory state
    /// stays committed.
    fn commit<R>(&self, update: impl FnOnce(&ChatSnapshot) -> Option<(ChatSnapshot, R)>) -> Option<R> {
        let persistence = self.persistence.lock().unwrap_or_else(PoisonError::into_inner);

        let mut result = None;
        self.state.send_if_modified(|current| match update(&**current) {
            Some((next, r)) => {
                *current = Arc::new(next);
                result = Some(r);
                true
            }
            None => false,
        });

        if result.is_some() {
            let committed = self.snapshot();
            if let Err(e) = persistence.save(&committed) {
                tracing::warn!(error = %e, "could not persist chat state");
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::{HashSet, VecDeque};
    use std::time::Duration;

    use async_trait::async_trait;
    use tribe_net::Operation;
    use tribe_store::Database;

    use crate::annotate::DayBoundary;
    use crate::persist::Ephemeral;

    const DAY_MS: i64 = 86_400_000;
    // 2026-10-17T09:00:00Z
    const D1: i64 = 1_792_227_600_000;

    const M0: &str = "00000000-0000-4000-8000-000000000000";
    const M1: &str = "11111111-1111-4111-8111-111111111111";
    const M2: &str = "22222222-2222-4222-8222-222222222222";
    const M3: &str = "33333333-3333-4333-8333-333333333333";

    /// Scripted stand-in for the chat service.
    #[derive(Default)]
    struct FakeApi {
        latest: Mutex<Vec<Message>>,
        older: Mutex<Vec<Message>>,
        participants: Mutex<Vec<Participant>>,
        message_updates: Mutex<VecDeque<Vec<Message>>>,
        participant_updates: Mutex<VecDeque<Vec<Participant>>>,
        failing: Mutex<HashSet<Operation>>,
        calls: Mutex<Vec<(Operation, String)>>,
    }

    impl FakeApi {
        fn record(&self, op: Operation, arg: impl Into<String>) -> tribe_net::error::Result<()> {
            self.calls.lock().unwrap().push((op, arg.into()));
            if self.failing.lock().unwrap().contains(&op) {
                return Err(ApiError::Http {
                    operation: op,
                    status: 500,
                });
            }
            Ok(())
        }

        fn fail(&self, ops: &[Operation]) {
            self.failing.lock().unwrap().extend(ops.iter().copied());
        }

        fn fail_everything(&self) {
            self.fail(&[
                Operation::FetchAllMessages,
                Operation::FetchLatestMessages,
                Operation::FetchOlderMessages,
                Operation::FetchParticipants,
                Operation::SendMessage,
                Operation::FetchMessageUpdates,
                Operation::FetchParticipantUpdates,
            ]);
        }

        fn calls_to(&self, op: Operation) -> Vec<String> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(o, _)| *o == op)
                .map(|(_, arg)| arg.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ChatApi for FakeApi {
        async fn fetch_all_messages(&self) -> tribe_net::error::Result<Vec<Message>> {
            self.record(Operation::FetchAllMessages, "")?;
            let mut all = self.older.lock().unwrap().clone();
            all.extend(self.latest.lock().unwrap().iter().cloned());
            Ok(all)
        }

        async fn fetch_latest_messages(&self) -> tribe_net::error::Result<Vec<Message>> {
            self.record(Operation::FetchLatestMessages, "")?;
            Ok(self.latest.lock().unwrap().clone())
        }

        async fn fetch_older_messages(&self, ref_uuid: &str) -> tribe_net::error::Result<Vec<Message>> {
            self.record(Operation::FetchOlderMessages, ref_uuid)?;
            Ok(self.older.lock().unwrap().clone())
        }

        async fn fetch_participants(&self) -> tribe_net::error::Result<Vec<Participant>> {
            self.record(Operation::FetchParticipants, "")?;
            Ok(self.participants.lock().unwrap().clone())
        }

        async fn send_message(&self, text: &str) -> tribe_net::error::Result<Message> {
            self.record(Operation::SendMessage, text)?;
            Ok(Message {
                uuid: Some(M3.into()),
                text: Some(text.into()),
                author_keys: vec!["you".into()],
                sent_at: Some(D1 + 3_600_000),
                ..Default::default()
            })
        }

        async fn fetch_message_updates(&self, since: &Since) -> tribe_net::error::Result<Vec<Message>> {
            self.record(Operation::FetchMessageUpdates, since.to_string())?;
            Ok(self.message_updates.lock().unwrap().pop_front().unwrap_or_default())
        }

        async fn fetch_participant_updates(
            &self,
            since: &Since,
        ) -> tribe_net::error::Result<Vec<Participant>> {
            self.record(Operation::FetchParticipantUpdates, since.to_string())?;
            Ok(self
                .participant_updates
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default())
        }
    }

    fn msg(key: &str, sent_at: i64) -> Message {
        Message {
            uuid: Some(key.into()),
            text: Some(format!("text {key}")),
            author_keys: vec!["p-alice".into()],
            sent_at: Some(sent_at),
            ..Default::default()
        }
    }

    fn alice(updated_at: i64) -> Participant {
        Participant {
            uuid: "p-alice".into(),
            name: Some("Alice".into()),
            updated_at: Some(updated_at),
            ..Default::default()
        }
    }

    fn seeded_api() -> FakeApi {
        let api = FakeApi::default();
        *api.latest.lock().unwrap() = vec![msg(M2, D1 + 60_000), msg(M1, D1)];
        *api.participants.lock().unwrap() = vec![alice(500)];
        api
    }

    fn store(api: FakeApi) -> SyncStore<FakeApi> {
        SyncStore::new(api, Box::new(Ephemeral)).with_merge_engine(MergeEngine::new(DayBoundary::utc()))
    }

    fn keys(snapshot: &ChatSnapshot) -> Vec<&str> {
        snapshot.real_messages().filter_map(Message::key).collect()
    }

    #[tokio::test]
    async fn test_initial_load_replaces_state() {
        let store = store(seeded_api());
        let mut rx = store.subscribe();

        let outcome = store.load_initial().await;
        assert_eq!(
            outcome,
            MergeOutcome::Replaced {
                messages: 2,
                participants: 1
            }
        );
        assert!(rx.has_changed().unwrap());

        let snap = rx.borrow_and_update().clone();
        assert!(snap.messages[0].is_separator());
        assert_eq!(keys(&snap), vec![M1, M2]);
        let author = snap.messages[1].as_message().unwrap().participant.clone().unwrap();
        assert_eq!(author.display_name(), "Alice");
    }

    #[tokio::test]
    async fn test_failed_load_keeps_state() {
        let store = store(seeded_api());
        store.load_initial().await;
        let before = store.snapshot();

        store.api().fail_everything();
        let outcome = store.load_initial().await;
        assert!(matches!(
            outcome,
            MergeOutcome::Unchanged(UnchangedReason::FetchFailed(ApiError::Http { status: 500, .. }))
        ));
        assert_eq!(*store.snapshot(), *before);
    }

    #[tokio::test]
    async fn test_initial_load_needs_both_fetches() {
        let store = store(seeded_api());
        store.load_initial().await;
        let before = store.snapshot();

        *store.api().latest.lock().unwrap() = vec![msg(M3, D1 + 120_000)];
        store.api().fail(&[Operation::FetchParticipants]);
        let outcome = store.load_initial().await;
        assert!(matches!(
            outcome,
            MergeOutcome::Unchanged(UnchangedReason::FetchFailed(ApiError::Http {
                operation: Operation::FetchParticipants,
                ..
            }))
        ));
        assert_eq!(*store.snapshot(), *before);
    }

    #[tokio::test]
    async fn test_initial_load_fails_on_messages_alone() {
        let store = store(seeded_api());
        store.api().fail(&[Operation::FetchLatestMessages]);

        let outcome = store.load_initial().await;
        assert!(!outcome.is_changed());
        assert!(store.snapshot().messages.is_empty());
        assert!(store.snapshot().participants.is_empty());
    }

    #[tokio::test]
    async fn test_load_all_uses_full_history() {
        let api = seeded_api();
        *api.older.lock().unwrap() = vec![msg(M0, D1 - DAY_MS)];
        let store = store(api);

        store.load_all().await;
        assert_eq!(keys(&store.snapshot()), vec![M0, M1, M2]);
        assert_eq!(store.api().calls_to(Operation::FetchAllMessages).len(), 1);
        assert!(store.api().calls_to(Operation::FetchLatestMessages).is_empty());
    }

    #[tokio::test]
    async fn test_load_older_without_messages_sends_nothing() {
        let store = store(FakeApi::default());
        assert_eq!(
            store.load_older().await,
            MergeOutcome::Unchanged(UnchangedReason::NoAnchor)
        );
        assert!(store.api().calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_older_prepends_before_anchor() {
        let api = seeded_api();
        *api.older.lock().unwrap() = vec![msg(M0, D1 - DAY_MS)];
        let store = store(api);
        store.load_initial().await;

        let outcome = store.load_older().await;
        assert_eq!(
            outcome,
            MergeOutcome::Prepended {
                added: 1,
                anchor_index: Some(3)
            }
        );
        assert_eq!(store.api().calls_to(Operation::FetchOlderMessages), vec![M1]);

        let snap = store.snapshot();
        assert_eq!(keys(&snap), vec![M0, M1, M2]);
        assert_eq!(snap.messages[3].as_message().unwrap().key(), Some(M1));

        // Same page again: nothing new.
        assert_eq!(
            store.load_older().await,
            MergeOutcome::Unchanged(UnchangedReason::NothingNew)
        );
    }

    #[tokio::test]
    async fn test_failed_older_load_keeps_state() {
        let api = seeded_api();
        *api.older.lock().unwrap() = vec![msg(M0, D1 - DAY_MS)];
        let store = store(api);
        store.load_initial().await;
        let before = store.snapshot();

        store.api().fail(&[Operation::FetchOlderMessages]);
        let outcome = store.load_older().await;
        assert!(matches!(
            outcome,
            MergeOutcome::Unchanged(UnchangedReason::FetchFailed(_))
        ));
        assert_eq!(store.api().calls_to(Operation::FetchOlderMessages), vec![M1]);
        assert_eq!(*store.snapshot(), *before);
    }

    #[tokio::test]
    async fn test_keyless_oldest_message_blocks_older_load() {
        let api = seeded_api();
        let keyless = Message {
            text: Some("no id".into()),
            sent_at: Some(D1 - 1),
            ..Default::default()
        };
        api.latest.lock().unwrap().push(keyless);
        *api.older.lock().unwrap() = vec![msg(M0, D1 - DAY_MS)];
        let store = store(api);
        store.load_initial().await;

        assert_eq!(
            store.load_older().await,
            MergeOutcome::Unchanged(UnchangedReason::NoAnchor)
        );
        assert!(store.api().calls_to(Operation::FetchOlderMessages).is_empty());
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let store = store(seeded_api());
        store.load_initial().await;

        let mut edited = msg(M1, D1);
        edited.text = Some("edited".into());
        edited.updated_at = Some(D1 + 30_000);
        let outcome = store.apply_updates(vec![edited], vec![alice(900)]);
        assert_eq!(
            outcome,
            MergeOutcome::Merged {
                messages: 1,
                participants: 1
            }
        );

        let snap = store.snapshot();
        assert_eq!(keys(&snap), vec![M1, M2]);
        let m1 = snap.real_messages().next().unwrap();
        assert!(m1.is_edited());
        assert_eq!(m1.display_text(), "edited");
        assert_eq!(snap.participants.len(), 1);
        assert_eq!(snap.participants[0].updated_at, Some(900));

        assert_eq!(
            store.apply_updates(vec![], vec![]),
            MergeOutcome::Unchanged(UnchangedReason::NothingNew)
        );
    }

    #[tokio::test]
    async fn test_send_merges_created_message() {
        let store = store(seeded_api());
        store.load_initial().await;

        let created = store.send_message("hello").await.unwrap();
        assert_eq!(created.key(), Some(M3));
        assert_eq!(keys(&store.snapshot()), vec![M1, M2, M3]);
    }

    #[tokio::test]
    async fn test_send_failure_is_surfaced() {
        let store = store(seeded_api());
        store.load_initial().await;
        let before = store.snapshot();

        store.api().fail_everything();
        let err = store.send_message("hello").await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::SendMessage));
        assert_eq!(*store.snapshot(), *before);
    }

    #[tokio::test]
    async fn test_state_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db");

        {
            let db = Database::open_at(&path).unwrap();
            let store = SyncStore::new(seeded_api(), Box::new(db));
            store.load_initial().await;
        }

        let db = Database::open_at(&path).unwrap();
        let store = SyncStore::new(FakeApi::default(), Box::new(db));
        assert_eq!(keys(&store.snapshot()), vec![M1, M2]);
        assert_eq!(store.snapshot().participants[0].uuid, "p-alice");
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_merges_updates_from_watermark() {
        let api = seeded_api();
        api.message_updates
            .lock()
            .unwrap()
            .push_back(vec![msg(M3, D1 + 120_000)]);
        let store = Arc::new(store(api));
        store.load_initial().await;

        store.start_polling().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        assert_eq!(keys(&store.snapshot()), vec![M1, M2, M3]);
        let since = store.api().calls_to(Operation::FetchMessageUpdates);
        assert_eq!(since[0], (D1 + 60_000).to_string());
        assert_eq!(
            store.api().calls_to(Operation::FetchParticipantUpdates)[0],
            "500"
        );
        assert_eq!(
            store.poll_phase(),
            PollPhase::Polling {
                interval: Duration::from_secs(4)
            }
        );

        // The next tick sees the advanced watermark and finds nothing.
        tokio::time::sleep(Duration::from_secs(4)).await;
        let since = store.api().calls_to(Operation::FetchMessageUpdates);
        assert_eq!(since[1], (D1 + 120_000).to_string());
        assert_eq!(
            store.poll_phase(),
            PollPhase::Polling {
                interval: Duration::from_secs(15)
            }
        );

        store.stop_polling().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_participant_only_tick_is_an_update() {
        let api = seeded_api();
        let renamed = Participant {
            name: Some("Alice Smith".into()),
            ..alice(900)
        };
        api.participant_updates.lock().unwrap().push_back(vec![renamed]);
        let store = Arc::new(store(api));
        store.load_initial().await;

        store.start_polling().await;
        tokio::time::sleep(Duration::from_secs(5)).await;

        let snap = store.snapshot();
        assert_eq!(snap.participants[0].name.as_deref(), Some("Alice Smith"));
        let author = snap.real_messages().next().unwrap().participant.clone().unwrap();
        assert_eq!(author.display_name(), "Alice Smith");
        assert_eq!(
            store.poll_phase(),
            PollPhase::Polling {
                interval: Duration::from_secs(4)
            }
        );

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(
            store.api().calls_to(Operation::FetchParticipantUpdates),
            vec!["500".to_string(), "900".to_string()]
        );
        store.stop_polling().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_poller_gives_up_after_repeated_failures() {
        let store = Arc::new(store(seeded_api()));
        store.api().fail(&[Operation::FetchMessageUpdates]);

        store.start_polling().await;
        // 4 + 8 + 16 + 32 + 60 + 60 seconds until the sixth failure.
        tokio::time::sleep(Duration::from_secs(600)).await;

        assert_eq!(store.poll_phase(), PollPhase::Stopped);
        assert_eq!(store.api().calls_to(Operation::FetchMessageUpdates).len(), 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_polling_cancels_ticks() {
        let store = Arc::new(store(seeded_api()));
        store.start_polling().await;
        store.stop_polling().await;

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(store.api().calls_to(Operation::FetchMessageUpdates).is_empty());
        assert_eq!(store.poll_phase(), PollPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_cancels_its_task() {
        let store = Arc::new(store(seeded_api()));
        let handle = store.start_polling().await;
        handle.cancel();

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(handle.is_finished());
        assert!(store.api().calls_to(Operation::FetchMessageUpdates).is_empty());
        assert_eq!(store.poll_phase(), PollPhase::Stopped);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelling_a_running_poller_publishes_stopped() {
        let store = Arc::new(store(seeded_api()));
        let mut phase = store.subscribe_poll_phase();
        let handle = store.start_polling().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(matches!(store.poll_phase(), PollPhase::Polling { .. }));
        let _ = phase.borrow_and_update();

        handle.cancel();
        phase.changed().await.unwrap();
        assert_eq!(*phase.borrow(), PollPhase::Stopped);

        let ticks = store.api().calls_to(Operation::FetchMessageUpdates).len();
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(store.api().calls_to(Operation::FetchMessageUpdates).len(), ticks);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_keeps_a_single_poller() {
        let store = Arc::new(store(seeded_api()));
        store.start_polling().await;
        store.start_polling().await;

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.api().calls_to(Operation::FetchMessageUpdates).len(), 1);
        store.stop_polling().await;
    }

    #[test]
    fn test_outcome_is_changed() {
        assert!(!MergeOutcome::Unchanged(UnchangedReason::NothingNew).is_changed());
        assert!(MergeOutcome::Merged {
            messages: 1,
            participants: 0
        }
        .is_changed());
    }
}
