use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_IMAGE_EDGE, IMAGE_ATTACHMENT_TYPE, SELF_PARTICIPANT_UUID, UNKNOWN_PARTICIPANT_NAME,
};

// ---------------------------------------------------------------------------
// Participant
// ---------------------------------------------------------------------------

/// A chat participant as known to the directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub uuid: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    /// Last modification time, epoch millis.
    pub updated_at: Option<i64>,
}

impl Participant {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_PARTICIPANT_NAME)
    }

    pub fn is_you(&self) -> bool {
        self.uuid == SELF_PARTICIPANT_UUID
    }
}

/// The participant attached to a message after enrichment.
///
/// Every field of the directory entry is optional because the author may
/// not resolve, but `avatar` is always a usable URL.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedParticipant {
    pub uuid: Option<String>,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub updated_at: Option<i64>,
    pub avatar: String,
}

impl ResolvedParticipant {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or(UNKNOWN_PARTICIPANT_NAME)
    }

    pub fn is_you(&self) -> bool {
        self.uuid.as_deref() == Some(SELF_PARTICIPANT_UUID)
    }
}

// ---------------------------------------------------------------------------
// Attachments and reactions
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// The single image surfaced for a message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PrimaryImage {
    pub url: String,
    pub width: u32,
    pub height: u32,
}

impl PrimaryImage {
    /// Pick the primary image: an explicit image URL wins, otherwise the
    /// first image attachment that carries a URL.
    pub fn derive(explicit: Option<&str>, attachments: &[Attachment]) -> Option<Self> {
        if let Some(url) = explicit.filter(|u| !u.is_empty()) {
            return Some(Self {
                url: url.to_string(),
                width: DEFAULT_IMAGE_EDGE,
                height: DEFAULT_IMAGE_EDGE,
            });
        }

        attachments
            .iter()
            .filter(|a| a.kind == IMAGE_ATTACHMENT_TYPE)
            .find_map(|a| {
                let url = a.url.as_deref().filter(|u| !u.is_empty())?;
                Some(Self {
                    url: url.to_string(),
                    width: a.width.filter(|w| *w > 0).unwrap_or(DEFAULT_IMAGE_EDGE),
                    height: a.height.filter(|h| *h > 0).unwrap_or(DEFAULT_IMAGE_EDGE),
                })
            })
    }
}

/// A reaction on a message: either a bare symbol or an identified entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Reaction {
    Symbol(String),
    Tagged { id: Option<String>, value: String },
}

impl Reaction {
    pub fn display(&self) -> &str {
        match self {
            Reaction::Symbol(s) => s,
            Reaction::Tagged { value, .. } => value,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Reaction::Symbol(_) => None,
            Reaction::Tagged { id, .. } => id.as_deref(),
        }
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A chat message, normalised at ingestion.  All timestamps are epoch millis.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub uuid: Option<String>,
    pub id: Option<String>,
    /// Candidate participant keys, most specific first.
    pub author_keys: Vec<String>,
    pub text: Option<String>,
    pub sent_at: Option<i64>,
    pub updated_at: Option<i64>,
    pub time: Option<i64>,
    pub created_at: Option<i64>,
    pub timestamp: Option<i64>,
    pub attachments: Vec<Attachment>,
    pub primary_image: Option<PrimaryImage>,
    pub reactions: Vec<Reaction>,
    pub reply_to_message: Option<Box<Message>>,
    /// Set by participant enrichment.
    pub participant: Option<ResolvedParticipant>,
}

impl Message {
    /// Logical identity: `uuid`, falling back to `id`.
    pub fn key(&self) -> Option<&str> {
        self.uuid
            .as_deref()
            .or(self.id.as_deref())
            .filter(|k| !k.is_empty())
    }

    /// Ordering time: `updatedAt ?? sentAt ?? time ?? 0`.
    pub fn effective_time(&self) -> i64 {
        self.updated_at.or(self.sent_at).or(self.time).unwrap_or(0)
    }

    /// Instant whose calendar day decides date separators.
    pub fn calendar_time(&self) -> Option<i64> {
        self.created_at
            .or(self.timestamp)
            .or(self.time)
            .or(self.sent_at)
    }

    /// Time shown next to the message.
    pub fn display_time(&self) -> Option<i64> {
        self.sent_at
            .or(self.time)
            .or(self.created_at)
            .or(self.timestamp)
    }

    pub fn is_edited(&self) -> bool {
        matches!((self.sent_at, self.updated_at), (Some(sent), Some(updated)) if updated > sent)
    }

    pub fn display_text(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }
}

// ---------------------------------------------------------------------------
// Feed
// ---------------------------------------------------------------------------

/// Synthetic entry marking the start of a calendar day.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DateSeparator {
    pub id: String,
    /// Human readable label, e.g. "October 17, 2026".
    pub date: String,
    pub day: NaiveDate,
}

/// One renderable row of the feed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum FeedItem {
    DateSeparator(DateSeparator),
    Message(Message),
}

impl FeedItem {
    pub fn as_message(&self) -> Option<&Message> {
        match self {
            FeedItem::Message(m) => Some(m),
            FeedItem::DateSeparator(_) => None,
        }
    }

    pub fn as_separator(&self) -> Option<&DateSeparator> {
        match self {
            FeedItem::DateSeparator(s) => Some(s),
            FeedItem::Message(_) => None,
        }
    }

    pub fn is_separator(&self) -> bool {
        matches!(self, FeedItem::DateSeparator(_))
    }
}

impl From<Message> for FeedItem {
    fn from(m: Message) -> Self {
        FeedItem::Message(m)
    }
}

/// The canonical state shared between the sync engine, the view layer and
/// persistence.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatSnapshot {
    pub messages: Vec<FeedItem>,
    pub participants: Vec<Participant>,
}

impl ChatSnapshot {
    /// Real messages in feed order.
    pub fn real_messages(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter_map(FeedItem::as_message)
    }
}
