//! Message Normalizer
//!
//! Turns raw backend message records into the canonical transcript: ordered
//! oldest-first, role-tagged, with missing content filled in.
//!
//! Ordering rules, applied pairwise:
//! 1. Both records carry a parseable `createdAt` → compare timestamps.
//! 2. Otherwise both ids coerce to numbers → compare ids ascending.
//! 3. Otherwise the pair is equal and keeps its input order.
//!
//! Because rule 3 makes the comparison non-transitive for mixed input, the
//! sort is a plain stable insertion sort rather than `slice::sort_by`, which
//! requires a total order.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::messages::{ChatEntry, ChatRole, RawMessage};

/// Normalize a backend message list into transcript order
///
/// Pure: the same input always yields the same output.
#[must_use]
pub fn normalize_messages(messages: &[RawMessage]) -> Vec<ChatEntry> {
    let mut keyed: Vec<(Option<DateTime<Utc>>, &RawMessage)> = messages
        .iter()
        .map(|m| (m.created_at.as_deref().and_then(parse_timestamp), m))
        .collect();

    stable_insertion_sort(&mut keyed, |a, b| compare_records(a.0, a.1, b.0, b.1));

    keyed
        .into_iter()
        .map(|(created_at, message)| ChatEntry {
            role: normalize_role(message.role.as_deref()),
            text: message.content.clone().unwrap_or_default(),
            created_at,
            id: message.id.clone(),
        })
        .collect()
}

/// Map a backend role string onto a transcript role
///
/// Only a case-insensitive `assistant` is the assistant; anything else,
/// including no role at all, is the user.
#[must_use]
pub fn normalize_role(role: Option<&str>) -> ChatRole {
    match role {
        Some(r) if r.eq_ignore_ascii_case("assistant") => ChatRole::Assistant,
        _ => ChatRole::User,
    }
}

/// Normalize a single record (e.g. the reply embedded in a send response)
///
/// A record without a usable timestamp is stamped now so it sorts after the
/// optimistic user entry.
#[must_use]
pub fn normalize_message(message: &RawMessage) -> ChatEntry {
    ChatEntry {
        role: normalize_role(message.role.as_deref()),
        text: message.content.clone().unwrap_or_default(),
        created_at: Some(
            message
                .created_at
                .as_deref()
                .and_then(parse_timestamp)
                .unwrap_or_else(Utc::now),
        ),
        id: message.id.clone(),
    }
}

/// Parse a backend timestamp
///
/// Accepts RFC 3339 and zone-less ISO-8601 date-times or dates, the latter
/// read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(naive.and_utc());
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn compare_records(
    a_time: Option<DateTime<Utc>>,
    a: &RawMessage,
    b_time: Option<DateTime<Utc>>,
    b: &RawMessage,
) -> Ordering {
    if let (Some(a_time), Some(b_time)) = (a_time, b_time) {
        return a_time.cmp(&b_time);
    }

    let a_id = a.id.as_ref().and_then(|id| id.as_number());
    let b_id = b.id.as_ref().and_then(|id| id.as_number());
    match (a_id, b_id) {
        (Some(a_id), Some(b_id)) => a_id.partial_cmp(&b_id).unwrap_or(Ordering::Equal),
        _ => Ordering::Equal,
    }
}

/// Stable sort that tolerates comparators without a total order
fn stable_insertion_sort<T>(items: &mut [T], mut compare: impl FnMut(&T, &T) -> Ordering) {
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && compare(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::MessageId;
    use pretty_assertions::assert_eq;

    fn raw(id: Option<MessageId>, role: &str, content: &str, created_at: Option<&str>) -> RawMessage {
        RawMessage {
            id,
            role: Some(role.to_string()),
            content: Some(content.to_string()),
            created_at: created_at.map(String::from),
        }
    }

    fn texts(entries: &[ChatEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.text.as_str()).collect()
    }

    fn back_to_raw(entries: &[ChatEntry]) -> Vec<RawMessage> {
        entries
            .iter()
            .map(|e| RawMessage {
                id: e.id.clone(),
                role: Some(format!("{:?}", e.role)),
                content: Some(e.text.clone()),
                created_at: e.created_at.map(|t| t.to_rfc3339()),
            })
            .collect()
    }

    #[test]
    fn test_sorts_by_timestamp() {
        let messages = vec![
            raw(Some(2_i64.into()), "ASSISTANT", "Oi", Some("2024-01-01T12:01:00Z")),
            raw(Some(1_i64.into()), "USER", "Olá", Some("2024-01-01T12:00:00Z")),
        ];

        let entries = normalize_messages(&messages);

        assert_eq!(texts(&entries), vec!["Olá", "Oi"]);
        assert_eq!(entries[0].role, ChatRole::User);
        assert_eq!(entries[1].role, ChatRole::Assistant);
        assert_eq!(entries[1].id, Some(MessageId::from(2_i64)));
    }

    #[test]
    fn test_timestamp_beats_id_order() {
        let messages = vec![
            raw(Some(1_i64.into()), "USER", "later", Some("2024-01-02T00:00:00Z")),
            raw(Some(9_i64.into()), "USER", "earlier", Some("2024-01-01T00:00:00Z")),
        ];
        assert_eq!(texts(&normalize_messages(&messages)), vec!["earlier", "later"]);
    }

    #[test]
    fn test_falls_back_to_numeric_ids() {
        let messages = vec![
            raw(Some("10".into()), "USER", "c", None),
            raw(Some(2_i64.into()), "USER", "a", None),
            raw(Some("3".into()), "USER", "b", Some("2024-01-01T00:00:00Z")),
        ];
        assert_eq!(texts(&normalize_messages(&messages)), vec!["a", "b", "c"]);
    }

    #[test]
    fn test_preserves_order_when_incomparable() {
        let messages = vec![
            raw(Some("x".into()), "USER", "first", None),
            raw(None, "ASSISTANT", "second", None),
            raw(Some("y".into()), "USER", "third", Some("not a date")),
        ];
        assert_eq!(
            texts(&normalize_messages(&messages)),
            vec!["first", "second", "third"]
        );
    }

    #[test]
    fn test_role_and_content_defaults() {
        let messages = vec![
            RawMessage {
                role: Some("Assistant".to_string()),
                ..RawMessage::default()
            },
            RawMessage {
                role: Some("system".to_string()),
                content: Some("hi".to_string()),
                ..RawMessage::default()
            },
            RawMessage::default(),
        ];

        let entries = normalize_messages(&messages);

        assert_eq!(entries[0].role, ChatRole::Assistant);
        assert_eq!(entries[0].text, "");
        assert_eq!(entries[1].role, ChatRole::User);
        assert_eq!(entries[2].role, ChatRole::User);
        assert_eq!(entries[2].created_at, None);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let messages = vec![
            raw(Some(5_i64.into()), "ASSISTANT", "e", Some("2024-03-01T10:00:05Z")),
            raw(Some(1_i64.into()), "USER", "a", Some("2024-03-01T10:00:01Z")),
            raw(Some(3_i64.into()), "USER", "c", Some("2024-03-01T10:00:03Z")),
            raw(Some(2_i64.into()), "ASSISTANT", "b", Some("2024-03-01T10:00:02Z")),
            raw(Some(4_i64.into()), "ASSISTANT", "d", Some("2024-03-01T10:00:04Z")),
        ];

        let once = normalize_messages(&messages);
        let twice = normalize_messages(&back_to_raw(&once));

        assert_eq!(texts(&once), texts(&twice));
        assert!(once
            .windows(2)
            .all(|w| w[0].created_at <= w[1].created_at));
    }

    #[test]
    fn test_normalize_is_idempotent_with_mixed_keys() {
        // Untimed records are placed by numeric id among the timed ones;
        // the record with neither key stays where it was
        let messages = vec![
            raw(Some(4_i64.into()), "ASSISTANT", "d", None),
            raw(Some(1_i64.into()), "USER", "a", Some("2024-03-01T10:00:01Z")),
            raw(Some("3".into()), "USER", "c", None),
            raw(Some(2_i64.into()), "ASSISTANT", "b", Some("2024-03-01T10:00:02Z")),
            raw(None, "USER", "e", None),
        ];

        let once = normalize_messages(&messages);
        assert_eq!(texts(&once), vec!["a", "b", "c", "d", "e"]);

        let twice = normalize_messages(&back_to_raw(&once));
        assert_eq!(once, twice);
    }

    #[test]
    fn test_parse_timestamp_formats() {
        let zoned = parse_timestamp("2024-01-01T12:00:00+02:00").unwrap();
        assert_eq!(zoned.to_rfc3339(), "2024-01-01T10:00:00+00:00");

        let naive = parse_timestamp("2024-01-01T12:00:00.250").unwrap();
        assert_eq!(naive.timestamp_millis() % 1000, 250);

        assert!(parse_timestamp("2024-01-01").is_some());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("  ").is_none());
    }

    #[test]
    fn test_normalize_single_message_stamps_missing_time() {
        let entry = normalize_message(&RawMessage {
            id: Some(8_i64.into()),
            role: Some("ASSISTANT".to_string()),
            content: None,
            created_at: None,
        });
        assert_eq!(entry.role, ChatRole::Assistant);
        assert!(entry.created_at.is_some());
        assert_eq!(entry.text, "");
    }
}
