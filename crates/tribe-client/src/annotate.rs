//! Date-boundary annotation.
//!
//! Walks an ordered run of messages once and inserts a [`DateSeparator`]
//! before the first message of every calendar day.  Callers annotate each
//! fetched batch exactly once; the function only accepts plain messages so
//! an already annotated feed cannot be fed back in by accident.

use chrono::{FixedOffset, Local, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};

use tribe_shared::{DateSeparator, FeedItem, Message};

/// Which clock decides where one calendar day ends.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum DayBoundary {
    /// The device's local time zone.
    #[default]
    Local,
    /// A fixed UTC offset.
    Fixed(FixedOffset),
}

impl DayBoundary {
    pub fn utc() -> Self {
        DayBoundary::Fixed(Utc.fix())
    }

    /// Wall-clock time of an epoch-millis instant, `None` if out of range.
    pub fn local_datetime(&self, millis: i64) -> Option<NaiveDateTime> {
        match self {
            DayBoundary::Local => Local
                .timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.naive_local()),
            DayBoundary::Fixed(offset) => offset
                .timestamp_millis_opt(millis)
                .single()
                .map(|dt| dt.naive_local()),
        }
    }

    pub fn day_of(&self, millis: i64) -> Option<NaiveDate> {
        self.local_datetime(millis).map(|dt| dt.date())
    }
}

/// Label shown on a separator, e.g. "October 17, 2026".
pub fn day_label(day: NaiveDate) -> String {
    day.format("%B %-d, %Y").to_string()
}

/// Build the separator for `day`.  Randomised ids keep separators from a
/// prepended history page distinct from one already rendered for the same
/// day.
pub fn separator_for(day: NaiveDate, randomize_id: bool) -> DateSeparator {
    let id = if randomize_id {
        format!("date-{day}-{:08x}", rand::random::<u32>())
    } else {
        format!("date-{day}")
    };
    DateSeparator {
        id,
        date: day_label(day),
        day,
    }
}

/// Annotate using the local time zone.
pub fn annotate(messages: Vec<Message>, randomize_ids: bool) -> Vec<FeedItem> {
    annotate_with(messages, randomize_ids, DayBoundary::Local)
}

pub fn annotate_with(
    messages: Vec<Message>,
    randomize_ids: bool,
    boundary: DayBoundary,
) -> Vec<FeedItem> {
    let mut out = Vec::with_capacity(messages.len() + 4);
    let mut last_day: Option<NaiveDate> = None;

    for message in messages {
        let day = message.calendar_time().and_then(|t| boundary.day_of(t));
        if let Some(day) = day {
            if last_day != Some(day) {
                out.push(FeedItem::DateSeparator(separator_for(day, randomize_ids)));
                last_day = Some(day);
            }
        }
        out.push(FeedItem::Message(message));
    }
    out
}

/// The real messages of a feed, in order.
pub fn strip_separators(items: &[FeedItem]) -> Vec<Message> {
    items
        .iter()
        .filter_map(FeedItem::as_message)
        .cloned()
        .collect()
}
