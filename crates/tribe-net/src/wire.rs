//! JSON shapes exchanged with the chat service and their normalisation
//! into the domain model.
//!
//! The service is duck-typed: ids may be strings or numbers, the author may
//! hide behind several field names, timestamps come in several units and
//! reactions are either bare symbols or objects.  All of that is resolved
//! here, once, so the rest of the workspace only sees [`Message`] and
//! [`Participant`].

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use tribe_shared::time::coerce_millis;
use tribe_shared::{Attachment, Message, Participant, PrimaryImage, Reaction};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMessage {
    pub uuid: Option<Value>,
    pub id: Option<Value>,
    pub author_uuid: Option<Value>,
    pub author: Option<Value>,
    pub participant_uuid: Option<Value>,
    pub sender_uuid: Option<Value>,
    pub sender: Option<Value>,
    pub participant: Option<Value>,
    pub text: Option<Value>,
    pub content: Option<Value>,
    pub sent_at: Option<Value>,
    pub updated_at: Option<Value>,
    pub time: Option<Value>,
    pub created_at: Option<Value>,
    pub timestamp: Option<Value>,
    pub image: Option<Value>,
    pub image_url: Option<Value>,
    pub attachments: Option<Vec<WireAttachment>>,
    pub reactions: Option<Vec<WireReaction>>,
    pub reaction: Option<Vec<WireReaction>>,
    pub reply_to_message: Option<Box<WireMessage>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct WireAttachment {
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub url: Option<String>,
    pub width: Option<Value>,
    pub height: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum WireReaction {
    Text(String),
    Number(serde_json::Number),
    Entry {
        #[serde(default)]
        uuid: Option<Value>,
        #[serde(default)]
        id: Option<Value>,
        #[serde(default)]
        value: Option<Value>,
    },
    Other(Value),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireParticipant {
    pub uuid: Option<Value>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: Option<Value>,
}

/// Body of `POST /messages/new`.
#[derive(Debug, Clone, Serialize)]
pub struct NewMessageRequest<'a> {
    pub text: &'a str,
}

// ---------------------------------------------------------------------------
// Normalisation
// ---------------------------------------------------------------------------

impl From<WireMessage> for Message {
    fn from(w: WireMessage) -> Self {
        let author_keys = [
            &w.author_uuid,
            &w.author,
            &w.participant_uuid,
            &w.sender_uuid,
            &w.sender,
            &w.participant,
        ]
        .into_iter()
        .filter_map(|v| v.as_ref().and_then(author_key))
        .fold(Vec::new(), |mut keys, key| {
            if !keys.contains(&key) {
                keys.push(key);
            }
            keys
        });

        let attachments: Vec<Attachment> = w
            .attachments
            .unwrap_or_default()
            .into_iter()
            .map(Attachment::from)
            .collect();

        let explicit_image = w
            .image
            .as_ref()
            .and_then(Value::as_str)
            .or_else(|| w.image_url.as_ref().and_then(Value::as_str));
        let primary_image = PrimaryImage::derive(explicit_image, &attachments);

        let reactions = w
            .reactions
            .or(w.reaction)
            .unwrap_or_default()
            .into_iter()
            .filter_map(WireReaction::into_reaction)
            .collect();

        let text = body_text(w.text.as_ref()).or_else(|| body_text(w.content.as_ref()));

        Message {
            uuid: w.uuid.as_ref().and_then(id_string),
            id: w.id.as_ref().and_then(id_string),
            author_keys,
            text,
            sent_at: w.sent_at.as_ref().and_then(coerce_millis),
            updated_at: w.updated_at.as_ref().and_then(coerce_millis),
            time: w.time.as_ref().and_then(coerce_millis),
            created_at: w.created_at.as_ref().and_then(coerce_millis),
            timestamp: w.timestamp.as_ref().and_then(coerce_millis),
            attachments,
            primary_image,
            reactions,
            reply_to_message: w.reply_to_message.map(|r| Box::new(Message::from(*r))),
            participant: None,
        }
    }
}

impl From<WireAttachment> for Attachment {
    fn from(w: WireAttachment) -> Self {
        Attachment {
            kind: w.kind.unwrap_or_default(),
            url: w.url,
            width: w.width.as_ref().and_then(dimension),
            height: w.height.as_ref().and_then(dimension),
        }
    }
}

impl WireReaction {
    /// Normalise into a [`Reaction`]; entries with nothing to show are
    /// dropped.
    pub fn into_reaction(self) -> Option<Reaction> {
        match self {
            WireReaction::Text(s) => Some(Reaction::Symbol(s)),
            WireReaction::Number(n) => Some(Reaction::Symbol(n.to_string())),
            WireReaction::Entry { uuid, id, value } => {
                let value = match value? {
                    Value::Null => return None,
                    Value::String(s) => s,
                    other => other.to_string(),
                };
                let id = uuid
                    .as_ref()
                    .and_then(id_string)
                    .or_else(|| id.as_ref().and_then(id_string));
                Some(Reaction::Tagged { id, value })
            }
            WireReaction::Other(v) => {
                debug!(reaction = %v, "Dropping unrecognised reaction");
                None
            }
        }
    }
}

impl WireParticipant {
    /// Normalise into a [`Participant`]; entries without a uuid are dropped.
    pub fn into_participant(self) -> Option<Participant> {
        let Some(uuid) = self.uuid.as_ref().and_then(id_string) else {
            debug!(name = ?self.name, "Dropping participant without uuid");
            return None;
        };
        Some(Participant {
            uuid,
            name: self.name.filter(|n| !n.is_empty()),
            avatar_url: self.avatar_url.filter(|u| !u.is_empty()),
            updated_at: self.updated_at.as_ref().and_then(coerce_millis),
        })
    }
}

pub fn into_messages(wire: Vec<WireMessage>) -> Vec<Message> {
    wire.into_iter().map(Message::from).collect()
}

pub fn into_participants(wire: Vec<WireParticipant>) -> Vec<Participant> {
    wire.into_iter()
        .filter_map(WireParticipant::into_participant)
        .collect()
}

fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Author references are plain ids or embedded objects carrying `uuid`.
fn author_key(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) => map.get("uuid").and_then(id_string),
        other => id_string(other),
    }
}

fn body_text(v: Option<&Value>) -> Option<String> {
    match v? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn dimension(v: &Value) -> Option<u32> {
    match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64))
            .and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
