//! Display rows derived from a feed.
//!
//! Everything a message row needs is computed here so a front end only has
//! to lay it out.

use serde::Serialize;

use tribe_shared::{FeedItem, Message, PrimaryImage};

use crate::annotate::DayBoundary;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum FeedRow {
    Separator { id: String, label: String },
    Message(MessageView),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageView {
    pub key: Option<String>,
    pub name: String,
    pub avatar: Option<String>,
    pub is_you: bool,
    /// e.g. "9:05:00 AM", empty when the message carries no time.
    pub time: String,
    pub text: String,
    pub reactions: Vec<String>,
    pub image: Option<PrimaryImage>,
    pub edited: bool,
    /// False when the previous row is a message by the same author.
    pub show_header: bool,
    pub reply_to: Option<Box<MessageView>>,
}

impl MessageView {
    pub fn from_message(message: &Message, boundary: DayBoundary) -> Self {
        let participant = message.participant.as_ref();
        Self {
            key: message.key().map(str::to_owned),
            name: participant
                .map(|p| p.display_name().to_owned())
                .unwrap_or_else(|| tribe_shared::constants::UNKNOWN_PARTICIPANT_NAME.to_owned()),
            avatar: participant.map(|p| p.avatar.clone()),
            is_you: participant.is_some_and(|p| p.is_you()),
            time: message
                .display_time()
                .and_then(|t| boundary.local_datetime(t))
                .map(|dt| dt.format("%-I:%M:%S %p").to_string())
                .unwrap_or_default(),
            text: message.display_text().to_owned(),
            reactions: message.reactions.iter().map(|r| r.display().to_owned()).collect(),
            image: message.primary_image.clone(),
            edited: message.is_edited(),
            show_header: true,
            reply_to: message
                .reply_to_message
                .as_deref()
                .map(|r| Box::new(Self::from_message(r, boundary))),
        }
    }
}

/// Rows for a whole feed, with consecutive messages by one author grouped
/// under a single header.
pub fn feed_rows(items: &[FeedItem], boundary: DayBoundary) -> Vec<FeedRow> {
    let mut rows = Vec::with_capacity(items.len());
    let mut previous_author: Option<&str> = None;

    for item in items {
        match item {
            FeedItem::DateSeparator(sep) => {
                previous_author = None;
                rows.push(FeedRow::Separator {
                    id: sep.id.clone(),
                    label: sep.date.clone(),
                });
            }
            FeedItem::Message(m) => {
                let author = m.participant.as_ref().and_then(|p| p.uuid.as_deref());
                let mut view = MessageView::from_message(m, boundary);
                view.show_header = author.is_none() || author != previous_author;
                previous_author = author;
                rows.push(FeedRow::Message(view));
            }
        }
    }
    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use tribe_shared::{Participant, Reaction};

    use crate::merge::MergeEngine;

    // 2026-10-17T09:00:00Z
    const D1: i64 = 1_792_227_600_000;

    fn msg(key: &str, author: &str, sent_at: i64) -> Message {
        Message {
            uuid: Some(key.into()),
            author_keys: vec![author.into()],
            text: Some(format!("hi from {author}")),
            sent_at: Some(sent_at),
            ..Default::default()
        }
    }

    fn people() -> Vec<Participant> {
        vec![
            Participant {
                uuid: "you".into(),
                name: Some("Me".into()),
                ..Default::default()
            },
            Participant {
                uuid: "p-bob".into(),
                name: Some("Bob".into()),
                ..Default::default()
            },
        ]
    }

    #[test]
    fn test_rows_group_by_author() {
        let engine = MergeEngine::new(DayBoundary::utc());
        let feed = engine.merge_initial(
            vec![
                msg("m1", "p-bob", D1),
                msg("m2", "p-bob", D1 + 1_000),
                msg("m3", "you", D1 + 2_000),
            ],
            &people(),
        );
        let rows = feed_rows(&feed, DayBoundary::utc());

        assert_eq!(
            rows[0],
            FeedRow::Separator {
                id: "date-2026-10-17".into(),
                label: "October 17, 2026".into()
            }
        );
        let headers: Vec<_> = rows
            .iter()
            .filter_map(|r| match r {
                FeedRow::Message(v) => Some((v.name.as_str(), v.show_header, v.is_you)),
                FeedRow::Separator { .. } => None,
            })
            .collect();
        assert_eq!(
            headers,
            vec![("Bob", true, false), ("Bob", false, false), ("Me", true, true)]
        );
    }

    #[test]
    fn test_message_view_fields() {
        let mut m = msg("m1", "p-bob", D1);
        m.updated_at = Some(D1 + 5);
        m.reactions = vec![
            Reaction::Symbol("👍".into()),
            Reaction::Tagged {
                id: Some("r1".into()),
                value: "🎉".into(),
            },
        ];
        let view = MessageView::from_message(&m, DayBoundary::utc());

        assert_eq!(view.time, "9:00:00 AM");
        assert_eq!(view.name, "Unknown");
        assert!(view.edited);
        assert_eq!(view.reactions, vec!["👍", "🎉"]);
        assert!(view.avatar.is_none());
    }
}
