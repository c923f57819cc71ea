//! Message merge engine.
//!
//! Pure transformations from (current feed, incoming batch, participants)
//! to the next feed.  The sync store owns the state and commits whatever
//! these functions return; nothing in here performs I/O.

use std::collections::{HashMap, HashSet};

use tribe_shared::{FeedItem, Message, Participant};

use crate::annotate::{annotate_with, strip_separators, DayBoundary};
use crate::directory::ParticipantDirectory;

/// Result of prepending an older page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OlderMerge {
    pub items: Vec<FeedItem>,
    /// Number of real messages the page contributed.
    pub added: usize,
    /// Position of the previously-first real message in `items`, so a view
    /// can keep it in place after the prepend.
    pub anchor_index: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeEngine {
    boundary: DayBoundary,
}

impl MergeEngine {
    pub fn new(boundary: DayBoundary) -> Self {
        Self { boundary }
    }

    pub fn boundary(&self) -> DayBoundary {
        self.boundary
    }

    /// Build a fresh feed from a full batch.
    pub fn merge_initial(&self, messages: Vec<Message>, participants: &[Participant]) -> Vec<FeedItem> {
        let mut messages = dedup_last_wins(messages);
        sort_by_effective_time(&mut messages);
        let messages = ParticipantDirectory::new(participants).enrich_owned(messages);
        annotate_with(messages, false, self.boundary)
    }

    /// Prepend an older page to `current`.
    ///
    /// Returns `None` when the page holds nothing the feed does not already
    /// have.
    pub fn merge_older(
        &self,
        current: &[FeedItem],
        page: Vec<Message>,
        participants: &[Participant],
    ) -> Option<OlderMerge> {
        let held: HashSet<&str> = current
            .iter()
            .filter_map(FeedItem::as_message)
            .filter_map(Message::key)
            .collect();

        let mut fresh: Vec<Message> = dedup_last_wins(page)
            .into_iter()
            .filter(|m| m.key().map_or(true, |k| !held.contains(k)))
            .collect();
        if fresh.is_empty() {
            return None;
        }
        sort_by_effective_time(&mut fresh);

        let added = fresh.len();
        let fresh = ParticipantDirectory::new(participants).enrich_owned(fresh);
        let mut items = annotate_with(fresh, true, self.boundary);

        let page_last_day = items.iter().rev().find_map(FeedItem::as_separator).map(|s| s.day);
        let mut tail = current;
        if let (Some(day), Some(FeedItem::DateSeparator(leading))) = (page_last_day, current.first()) {
            if leading.day == day {
                tail = &current[1..];
            }
        }

        let anchor_index = tail
            .iter()
            .position(|i| !i.is_separator())
            .map(|i| i + items.len());
        items.extend_from_slice(tail);

        Some(OlderMerge {
            items,
            added,
            anchor_index,
        })
    }

    /// Fold updated or new messages into `current`.
    ///
    /// A message whose key is already held is replaced where it stands;
    /// anything else is appended.  The result is re-sorted, re-enriched and
    /// re-annotated as a whole.
    pub fn merge_updates(
        &self,
        current: &[FeedItem],
        updates: Vec<Message>,
        participants: &[Participant],
    ) -> Vec<FeedItem> {
        let mut messages = strip_separators(current);
        let mut index: HashMap<String, usize> = messages
            .iter()
            .enumerate()
            .filter_map(|(i, m)| m.key().map(|k| (k.to_string(), i)))
            .collect();

        for update in dedup_last_wins(updates) {
            match update.key().and_then(|k| index.get(k)).copied() {
                Some(i) => messages[i] = update,
                None => {
                    if let Some(k) = update.key() {
                        index.insert(k.to_string(), messages.len());
                    }
                    messages.push(update);
                }
            }
        }

        sort_by_effective_time(&mut messages);
        let messages = ParticipantDirectory::new(participants).enrich_owned(messages);
        annotate_with(messages, false, self.boundary)
    }
}

/// Key of the oldest real message, the anchor for the next older page.
/// `None` when the feed is empty or its oldest message has no key.
pub fn oldest_anchor(current: &[FeedItem]) -> Option<&str> {
    current
        .iter()
        .find_map(FeedItem::as_message)
        .and_then(Message::key)
}

/// Newest effective time among the real messages of a feed.
pub fn latest_message_time(current: &[FeedItem]) -> Option<i64> {
    current
        .iter()
        .filter_map(FeedItem::as_message)
        .map(Message::effective_time)
        .max()
}

/// Drop repeated keys.  The survivor sits at the first occurrence and
/// carries the last occurrence's content.  Keyless messages are kept.
fn dedup_last_wins(messages: Vec<Message>) -> Vec<Message> {
    let mut out: Vec<Message> = Vec::with_capacity(messages.len());
    let mut seen: HashMap<String, usize> = HashMap::new();
    for m in messages {
        match m.key().and_then(|k| seen.get(k)).copied() {
            Some(i) => out[i] = m,
            None => {
                if let Some(k) = m.key() {
                    seen.insert(k.to_string(), out.len());
                }
                out.push(m);
            }
        }
    }
    out
}

// Stable, so equal times keep arrival order.
fn sort_by_effective_time(messages: &mut [Message]) {
    messages.sort_by_key(Message::effective_time);
}
