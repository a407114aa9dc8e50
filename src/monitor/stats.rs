use crate::monitor::cluster::cluster;
use crate::monitor::message::{Message, Role, platform_display_name};
use crate::monitor::util::char_len;
use chrono::Duration;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DayStats {
    pub date: String,
    pub total_messages: usize,
    pub user_messages: usize,
    pub ai_messages: usize,
    pub total_words: usize,
    pub conversations: usize,
    pub platforms: BTreeMap<String, usize>,
}

pub fn day_stats(date: &str, messages: &[Message], gap: Duration) -> DayStats {
    let mut platforms = BTreeMap::new();
    for message in messages {
        *platforms.entry(message.platform.clone()).or_insert(0) += 1;
    }
    DayStats {
        date: date.to_string(),
        total_messages: messages.len(),
        user_messages: messages.iter().filter(|m| m.role == Role::User).count(),
        ai_messages: messages.iter().filter(|m| m.role == Role::Assistant).count(),
        total_words: messages.iter().map(|m| char_len(&m.content)).sum(),
        conversations: cluster(messages, gap).len(),
        platforms,
    }
}

/// One-paragraph daily report, or a note that nothing was recorded.
pub fn daily_report(stats: &DayStats) -> String {
    if stats.total_messages == 0 {
        return format!("No AI conversations recorded on {}.", stats.date);
    }
    let breakdown = stats
        .platforms
        .iter()
        .map(|(platform, count)| format!("{} {count}", platform_display_name(platform)))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "On {} you exchanged {} messages with AI ({} questions, {} replies) in {} conversations across {} platforms: {}.",
        stats.date,
        stats.total_messages,
        stats.user_messages,
        stats.ai_messages,
        stats.conversations,
        stats.platforms.len(),
        breakdown
    )
}
