use tribe_shared::constants::STORAGE_KEY;
use tribe_shared::ChatSnapshot;
use tribe_store::{Database, StoreError};

/// Where the sync store keeps its state between runs.
pub trait Persistence: Send {
    fn load(&self) -> Result<Option<ChatSnapshot>, StoreError>;
    fn save(&self, snapshot: &ChatSnapshot) -> Result<(), StoreError>;
}

impl Persistence for Database {
    fn load(&self) -> Result<Option<ChatSnapshot>, StoreError> {
        let state = self.load_snapshot(STORAGE_KEY)?;
        if let Some(state) = &state {
            tracing::info!(
                saved_at = %state.saved_at,
                messages = state.snapshot.messages.len(),
                participants = state.snapshot.participants.len(),
                "rehydrated chat state"
            );
        }
        Ok(state.map(|s| s.snapshot))
    }

    fn save(&self, snapshot: &ChatSnapshot) -> Result<(), StoreError> {
        self.save_snapshot(STORAGE_KEY, snapshot)
    }
}

/// Keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct Ephemeral;

impl Persistence for Ephemeral {
    fn load(&self) -> Result<Option<ChatSnapshot>, StoreError> {
        Ok(None)
    }

    fn save(&self, _snapshot: &ChatSnapshot) -> Result<(), StoreError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribe_shared::{FeedItem, Message};

    #[test]
    fn test_database_round_trip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(Persistence::load(&db).unwrap(), None);

        let snapshot = ChatSnapshot {
            messages: vec![FeedItem::Message(Message {
                uuid: Some("m-1".into()),
                ..Default::default()
            })],
            participants: vec![],
        };
        Persistence::save(&db, &snapshot).unwrap();
        assert_eq!(Persistence::load(&db).unwrap(), Some(snapshot));
    }

    #[test]
    fn test_ephemeral_forgets() {
        Ephemeral.save(&ChatSnapshot::default()).unwrap();
        assert_eq!(Ephemeral.load().unwrap(), None);
    }
}
