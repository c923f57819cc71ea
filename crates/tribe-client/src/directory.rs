//! Participant directory.
//!
//! Resolves the author keys carried by a message into a display identity
//! and attaches it to the message.  Everything here is pure: inputs are
//! borrowed, outputs are fresh values.

use std::collections::HashMap;

use url::form_urlencoded;

use tribe_shared::constants::{AVATAR_FALLBACK_BASE, AVATAR_FALLBACK_NAME};
use tribe_shared::{Message, Participant, ResolvedParticipant};

/// Lookup of participants by uuid.
#[derive(Debug, Clone, Default)]
pub struct ParticipantDirectory {
    by_uuid: HashMap<String, Participant>,
}

impl ParticipantDirectory {
    /// Build the lookup.  Later entries win over earlier ones with the same
    /// uuid.
    pub fn new(participants: &[Participant]) -> Self {
        let by_uuid = participants
            .iter()
            .map(|p| (p.uuid.clone(), p.clone()))
            .collect();
        Self { by_uuid }
    }

    pub fn get(&self, uuid: &str) -> Option<&Participant> {
        self.by_uuid.get(uuid)
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }

    /// Resolve the first candidate key that names a known participant.
    pub fn resolve(&self, author_keys: &[String]) -> ResolvedParticipant {
        match author_keys.iter().find_map(|k| self.by_uuid.get(k)) {
            Some(p) => ResolvedParticipant {
                uuid: Some(p.uuid.clone()),
                name: p.name.clone(),
                avatar_url: p.avatar_url.clone(),
                updated_at: p.updated_at,
                avatar: p
                    .avatar_url
                    .clone()
                    .unwrap_or_else(|| fallback_avatar_url(p.name.as_deref())),
            },
            None => ResolvedParticipant {
                avatar: fallback_avatar_url(None),
                ..Default::default()
            },
        }
    }

    /// A copy of `message` (and its quoted reply) with `participant` set.
    pub fn enrich_message(&self, message: &Message) -> Message {
        let mut enriched = message.clone();
        self.enrich_in_place(&mut enriched);
        enriched
    }

    pub fn enrich(&self, messages: &[Message]) -> Vec<Message> {
        messages.iter().map(|m| self.enrich_message(m)).collect()
    }

    /// Owned variant used by the merge engine, which already holds fresh
    /// copies.
    pub(crate) fn enrich_owned(&self, mut messages: Vec<Message>) -> Vec<Message> {
        for m in &mut messages {
            self.enrich_in_place(m);
        }
        messages
    }

    fn enrich_in_place(&self, message: &mut Message) {
        message.participant = Some(self.resolve(&message.author_keys));
        if let Some(reply) = message.reply_to_message.as_deref_mut() {
            self.enrich_in_place(reply);
        }
    }
}

/// Deterministic placeholder avatar keyed by display name.
pub fn fallback_avatar_url(name: Option<&str>) -> String {
    let name = name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or(AVATAR_FALLBACK_NAME);
    let encoded: String = form_urlencoded::byte_serialize(name.as_bytes()).collect();
    format!("{AVATAR_FALLBACK_BASE}{encoded}")
}

/// Last-write-wins merge of participant updates into `existing`.
///
/// Known participants keep their position; unknown ones are appended in
/// arrival order.
pub fn upsert_participants(existing: &[Participant], updates: Vec<Participant>) -> Vec<Participant> {
    let mut merged = existing.to_vec();
    let mut index: HashMap<String, usize> = merged
        .iter()
        .enumerate()
        .map(|(i, p)| (p.uuid.clone(), i))
        .collect();

    for update in updates {
        match index.get(&update.uuid) {
            Some(&i) => merged[i] = update,
            None => {
                index.insert(update.uuid.clone(), merged.len());
                merged.push(update);
            }
        }
    }
    merged
}

/// Newest participant modification time, if any participant carries one.
pub fn latest_participant_update(participants: &[Participant]) -> Option<i64> {
    participants.iter().filter_map(|p| p.updated_at).max()
}
