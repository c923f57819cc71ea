//! Persistence of the chat state blob.
//!
//! The whole [`ChatSnapshot`] is stored as one JSON document under a fixed
//! key, mirroring how the view layer expects to rehydrate it on startup.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};

use tribe_shared::ChatSnapshot;

use crate::database::Database;
use crate::error::Result;

/// A snapshot as it sits on disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedState {
    #[serde(flatten)]
    pub snapshot: ChatSnapshot,
    pub saved_at: DateTime<Utc>,
}

impl Database {
    /// Write `snapshot` under `key`, replacing any previous blob.
    pub fn save_snapshot(&self, key: &str, snapshot: &ChatSnapshot) -> Result<()> {
        let state = PersistedState {
            snapshot: snapshot.clone(),
            saved_at: Utc::now(),
        };
        let json = serde_json::to_string(&state)?;

        self.conn().execute(
            "INSERT OR REPLACE INTO kv_store (key, json, updated_at) VALUES (?1, ?2, ?3)",
            params![key, json, state.saved_at.to_rfc3339()],
        )?;

        tracing::trace!(
            key,
            messages = snapshot.messages.len(),
            participants = snapshot.participants.len(),
            "snapshot saved"
        );
        Ok(())
    }

    /// Load the blob stored under `key`, if any.
    pub fn load_snapshot(&self, key: &str) -> Result<Option<PersistedState>> {
        let json: Option<String> = self
            .conn()
            .query_row(
                "SELECT json FROM kv_store WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }
}
