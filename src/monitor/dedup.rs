use crate::monitor::message::{Message, Role, Source};
use crate::monitor::store::{MessageStore, decode_bucket};
use crate::monitor::util::messages_key;
use anyhow::Result;
use chrono::{DateTime, Utc};

/// Two captures of the same text and role closer than this are one message.
pub const RECAPTURE_WINDOW_MS: i64 = 5_000;

/// Whether `candidate` is new relative to the bucket's `existing` messages.
pub fn should_accept(candidate: &Message, existing: &[Message]) -> bool {
    !existing.iter().any(|stored| {
        stored.id == candidate.id
            || (stored.content == candidate.content
                && stored.role == candidate.role
                && (stored.timestamp - candidate.timestamp)
                    .num_milliseconds()
                    .abs()
                    < RECAPTURE_WINDOW_MS)
    })
}

/// Append `message` to the `date` bucket unless it is a duplicate.
/// Returns whether it was stored.
pub fn append_message(store: &dyn MessageStore, date: &str, message: Message) -> Result<bool> {
    let key = messages_key(date);
    let mut stored = false;
    let mut pending = Some(message);
    store.update(&key, &mut |current| {
        let mut bucket = match current {
            Some(value) => decode_bucket(&key, value)?,
            None => Vec::new(),
        };
        let Some(candidate) = pending.take() else {
            return Ok(None);
        };
        if !should_accept(&candidate, &bucket) {
            return Ok(None);
        }
        bucket.push(candidate);
        stored = true;
        Ok(Some(serde_json::to_value(&bucket)?))
    })?;
    Ok(stored)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntry {
    pub role: Role,
    pub content: String,
    pub platform: String,
}

/// Store pasted messages under `date`. A pasted message is skipped when the
/// bucket already holds the same text for the same role, at any time.
pub fn append_manual(
    store: &dyn MessageStore,
    date: &str,
    entries: &[ManualEntry],
    now: DateTime<Utc>,
) -> Result<usize> {
    let key = messages_key(date);
    let mut added = 0usize;
    store.update(&key, &mut |current| {
        let mut bucket = match current {
            Some(value) => decode_bucket(&key, value)?,
            None => Vec::new(),
        };
        added = 0;
        for entry in entries {
            if entry.content.trim().is_empty() {
                continue;
            }
            let duplicate = bucket
                .iter()
                .any(|m| m.content == entry.content && m.role == entry.role);
            if duplicate {
                continue;
            }
            let platform = if entry.platform.trim().is_empty() {
                "manual"
            } else {
                entry.platform.as_str()
            };
            let id = format!("manual_{}_{}", now.timestamp_millis(), added);
            let mut message = Message::new(id, entry.role, entry.content.clone(), platform, now);
            message.source = Source::Manual;
            bucket.push(message);
            added += 1;
        }
        if added == 0 {
            return Ok(None);
        }
        Ok(Some(serde_json::to_value(&bucket)?))
    })?;
    Ok(added)
}
