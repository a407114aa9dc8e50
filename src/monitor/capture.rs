use crate::monitor::message::{PLATFORMS, RawMessage, Role, platform_for_host};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_500;
pub const DEFAULT_MIN_CONTENT_CHARS: usize = 10;

/// A producer of raw turns from one kind of page capture.
pub trait PlatformAdapter {
    type Snapshot: ?Sized;

    fn platform(&self) -> &str;
    fn extract_messages(&self, snapshot: &Self::Snapshot) -> Vec<RawMessage>;
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapturedTurn {
    #[serde(default)]
    pub id: Option<String>,
    pub role: Role,
    pub content: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
}

/// One observation of a chat page, as written by a capture script.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureFrame {
    pub platform: String,
    pub observed_at: DateTime<Utc>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub turns: Vec<CapturedTurn>,
}

/// Reads structured capture frames. Turns without a native id are
/// identified by their position on the page.
#[derive(Debug, Clone)]
pub struct TranscriptAdapter {
    platform: String,
}

impl TranscriptAdapter {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }
}

impl PlatformAdapter for TranscriptAdapter {
    type Snapshot = CaptureFrame;

    fn platform(&self) -> &str {
        &self.platform
    }

    fn extract_messages(&self, frame: &CaptureFrame) -> Vec<RawMessage> {
        frame
            .turns
            .iter()
            .filter(|turn| !turn.content.trim().is_empty())
            .map(|turn| RawMessage {
                role: turn.role,
                content: turn.content.trim().to_string(),
                platform_hint: self.platform.clone(),
                native_id: turn.id.clone(),
                conversation_id: turn.conversation_id.clone(),
                url: frame.url.clone(),
            })
            .collect()
    }
}

const USER_LABELS: &[&str] = &["user", "human", "me", "用户", "我"];
const ASSISTANT_LABELS: &[&str] = &["assistant", "ai", "bot", "model", "助手", "模型"];

fn split_role_prefix(line: &str) -> Option<(Role, &str)> {
    let tables = [(Role::User, USER_LABELS), (Role::Assistant, ASSISTANT_LABELS)];
    for (role, labels) in tables {
        for label in labels {
            let Some(head) = line.get(..label.len()) else {
                continue;
            };
            if !head.eq_ignore_ascii_case(label) {
                continue;
            }
            let rest = line[label.len()..].trim_start();
            if let Some(body) = rest.strip_prefix(':').or_else(|| rest.strip_prefix('：')) {
                return Some((role, body.trim_start()));
            }
        }
    }
    None
}

/// Parses a transcript pasted by hand, one `Role: text` block per turn.
/// Lines without a prefix continue the open turn; before any prefix they
/// are standalone user turns.
#[derive(Debug, Clone)]
pub struct PastedTextAdapter {
    platform: String,
}

impl PastedTextAdapter {
    pub fn new(platform: impl Into<String>) -> Self {
        Self {
            platform: platform.into(),
        }
    }

    fn raw(&self, role: Role, content: String) -> RawMessage {
        RawMessage {
            role,
            content,
            platform_hint: self.platform.clone(),
            native_id: None,
            conversation_id: None,
            url: None,
        }
    }
}

impl PlatformAdapter for PastedTextAdapter {
    type Snapshot = str;

    fn platform(&self) -> &str {
        &self.platform
    }

    fn extract_messages(&self, text: &str) -> Vec<RawMessage> {
        let mut out = Vec::new();
        let mut open: Option<(Role, String)> = None;

        for line in text.lines() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Some((role, body)) = split_role_prefix(trimmed) {
                if let Some((prev_role, prev)) = open.take()
                    && !prev.trim().is_empty()
                {
                    out.push(self.raw(prev_role, prev.trim().to_string()));
                }
                open = Some((role, body.to_string()));
            } else if let Some((_, content)) = open.as_mut() {
                content.push('\n');
                content.push_str(trimmed);
            } else {
                out.push(self.raw(Role::User, trimmed.to_string()));
            }
        }
        if let Some((role, content)) = open
            && !content.trim().is_empty()
        {
            out.push(self.raw(role, content.trim().to_string()));
        }
        out
    }
}

#[derive(Debug, Clone)]
struct Pending {
    raw: RawMessage,
    stable_since: DateTime<Utc>,
}

/// Holds each capture identity back until its content has stopped changing
/// for the debounce interval. A changed observation replaces the pending
/// emission for that identity and restarts its timer.
#[derive(Debug, Clone)]
pub struct QuiescenceGate {
    debounce: Duration,
    min_chars: usize,
    pending: BTreeMap<String, Pending>,
    emitted: BTreeMap<String, String>,
}

impl QuiescenceGate {
    pub fn new(debounce_ms: u64, min_chars: usize) -> Self {
        Self {
            debounce: Duration::milliseconds(debounce_ms as i64),
            min_chars,
            pending: BTreeMap::new(),
            emitted: BTreeMap::new(),
        }
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn observe(&mut self, identity: &str, raw: RawMessage, now: DateTime<Utc>) {
        if self.emitted.get(identity) == Some(&raw.content) {
            return;
        }
        match self.pending.get_mut(identity) {
            Some(entry) if entry.raw.content == raw.content => {}
            Some(entry) => {
                entry.raw = raw;
                entry.stable_since = now;
            }
            None => {
                self.pending.insert(
                    identity.to_string(),
                    Pending {
                        raw,
                        stable_since: now,
                    },
                );
            }
        }
    }

    /// Release every identity that has been quiet for the debounce interval.
    /// Each released message carries the instant its final content appeared.
    pub fn drain_ready(&mut self, now: DateTime<Utc>) -> Vec<(RawMessage, DateTime<Utc>)> {
        let ready: Vec<String> = self
            .pending
            .iter()
            .filter(|(_, p)| now - p.stable_since >= self.debounce)
            .map(|(id, _)| id.clone())
            .collect();
        self.release(ready)
    }

    /// Release everything still pending, quiet or not.
    pub fn flush(&mut self) -> Vec<(RawMessage, DateTime<Utc>)> {
        let all: Vec<String> = self.pending.keys().cloned().collect();
        self.release(all)
    }

    fn release(&mut self, identities: Vec<String>) -> Vec<(RawMessage, DateTime<Utc>)> {
        let mut out = Vec::new();
        for identity in identities {
            let Some(entry) = self.pending.remove(&identity) else {
                continue;
            };
            if entry.raw.content.chars().count() < self.min_chars {
                continue;
            }
            self.emitted.insert(identity, entry.raw.content.clone());
            out.push((entry.raw, entry.stable_since));
        }
        out.sort_by_key(|(_, at)| *at);
        out
    }
}

fn host_of(url: &str) -> Option<&str> {
    let rest = url.split_once("://").map_or(url, |(_, rest)| rest);
    rest.split(['/', '?', '#']).next().filter(|host| !host.is_empty())
}

/// Registry key for a capture: a known key or host in `hint` wins, then the
/// page URL's host, then the hint as given.
pub fn resolve_platform(hint: &str, url: Option<&str>) -> String {
    let hint = hint.trim().to_ascii_lowercase();
    if PLATFORMS.iter().any(|p| p.key == hint) {
        return hint;
    }
    if !hint.is_empty()
        && let Some(info) = platform_for_host(&hint)
    {
        return info.key.to_string();
    }
    if let Some(info) = url.and_then(host_of).and_then(platform_for_host) {
        return info.key.to_string();
    }
    if hint.is_empty() {
        "other".to_string()
    } else {
        hint
    }
}

/// Identity of a turn across successive frames of the same page.
pub fn turn_identity(raw: &RawMessage, position: usize) -> String {
    match raw.native_id.as_deref() {
        Some(id) if !id.trim().is_empty() => format!("{}:{id}", raw.platform_hint),
        _ => format!(
            "{}:{}#{position}",
            raw.platform_hint,
            raw.conversation_id.as_deref().unwrap_or("-")
        ),
    }
}
