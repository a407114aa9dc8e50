use chrono::{DateTime, Local, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    /// Speaker label used in prompts and text exports.
    pub fn speaker(self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "AI",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Ok(Role::User),
            "assistant" | "ai" | "bot" | "model" => Ok(Role::Assistant),
            other => Err(format!("unknown role `{other}`; use `user` or `assistant`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    #[default]
    Scraped,
    Manual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub platform: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub word_count: usize,
    #[serde(default)]
    pub source: Source,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

impl Message {
    pub fn new(
        id: impl Into<String>,
        role: Role,
        content: impl Into<String>,
        platform: impl Into<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            role,
            word_count: content.chars().count(),
            content,
            platform: platform.into(),
            timestamp,
            source: Source::Scraped,
            conversation_id: None,
            url: None,
        }
    }

    /// Build a stored message from an adapter's raw output.
    pub fn from_raw(raw: RawMessage, timestamp: DateTime<Utc>) -> Self {
        let id = raw
            .native_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| content_id(&raw.platform_hint, raw.role, &raw.content));
        let mut message = Message::new(id, raw.role, raw.content, raw.platform_hint, timestamp);
        message.conversation_id = raw.conversation_id;
        message.url = raw.url;
        message
    }
}

/// What a capture adapter hands to the ingest path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub role: Role,
    pub content: String,
    pub platform_hint: String,
    pub native_id: Option<String>,
    pub conversation_id: Option<String>,
    pub url: Option<String>,
}

/// Stable content-derived id used when the platform exposes none.
pub fn content_id(platform: &str, role: Role, content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(platform.as_bytes());
    hasher.update([0u8]);
    hasher.update(role.as_str().as_bytes());
    hasher.update([0u8]);
    hasher.update(content.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

/// Calendar date of `ts` in `tz`, or the system zone when none is configured.
pub fn bucket_date(ts: DateTime<Utc>, tz: Option<Tz>) -> String {
    match tz {
        Some(tz) => ts.with_timezone(&tz).format("%Y-%m-%d").to_string(),
        None => ts.with_timezone(&Local).format("%Y-%m-%d").to_string(),
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PlatformInfo {
    pub key: &'static str,
    pub name: &'static str,
    pub domains: &'static [&'static str],
}

pub const PLATFORMS: &[PlatformInfo] = &[
    PlatformInfo {
        key: "chatgpt",
        name: "ChatGPT",
        domains: &["chatgpt.com", "chat.openai.com"],
    },
    PlatformInfo {
        key: "claude",
        name: "Claude",
        domains: &["claude.ai", "console.anthropic.com"],
    },
    PlatformInfo {
        key: "copilot",
        name: "Copilot",
        domains: &["copilot.microsoft.com"],
    },
    PlatformInfo {
        key: "gemini",
        name: "Gemini",
        domains: &["gemini.google.com"],
    },
    PlatformInfo {
        key: "deepseek",
        name: "DeepSeek",
        domains: &["chat.deepseek.com"],
    },
    PlatformInfo {
        key: "perplexity",
        name: "Perplexity",
        domains: &["www.perplexity.ai"],
    },
];

pub fn platform_for_host(host: &str) -> Option<&'static PlatformInfo> {
    let host = host.trim().to_ascii_lowercase();
    PLATFORMS
        .iter()
        .find(|p| p.domains.iter().any(|d| host.contains(d)))
}

pub fn platform_display_name(key: &str) -> String {
    if let Some(info) = PLATFORMS.iter().find(|p| p.key == key) {
        return info.name.to_string();
    }
    match key {
        "manual" => "Manual".to_string(),
        "" => "Unknown".to_string(),
        other => other.to_string(),
    }
}
