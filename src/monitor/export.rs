use crate::error::MonitorError;
use crate::monitor::cluster::cluster;
use crate::monitor::message::{Message, Role, platform_display_name};
use crate::monitor::util::{char_len, keywords, matches_all};
use chrono::{DateTime, Duration, Local, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::str::FromStr;

#[derive(Debug, Clone)]
pub struct ExportRequest {
    pub date_from: String,
    pub date_to: String,
    /// Empty keeps every platform.
    pub platforms: Vec<String>,
    /// Whitespace-separated keywords, all required. Blank disables.
    pub keyword: String,
    pub session_gap: Duration,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub platform: String,
    pub date: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSession {
    pub session_index: usize,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub message_count: usize,
    pub word_count: usize,
    pub messages: Vec<ExportedMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportStats {
    pub total_messages: usize,
    pub total_words: usize,
    pub total_sessions: usize,
    pub date_from: String,
    pub date_to: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ContextExport {
    pub platforms: BTreeMap<String, Vec<ExportSession>>,
    pub stats: ExportStats,
}

pub fn export_context(
    corpus: &BTreeMap<String, Vec<Message>>,
    request: &ExportRequest,
) -> Result<ContextExport, MonitorError> {
    let date_from = request.date_from.trim();
    let date_to = request.date_to.trim();
    if date_from.is_empty() || date_to.is_empty() {
        return Err(MonitorError::Validation(
            "both a start and an end date are required".to_string(),
        ));
    }
    if request.session_gap <= Duration::zero() {
        return Err(MonitorError::Validation(
            "session gap must be positive".to_string(),
        ));
    }

    let kws = keywords(&request.keyword);
    let mut tagged: Vec<(Message, &str)> = Vec::new();
    let in_range = corpus
        .iter()
        .filter(|(date, _)| date.as_str() >= date_from && date.as_str() <= date_to);
    for (date, messages) in in_range {
        for message in messages {
            if !request.platforms.is_empty() && !request.platforms.contains(&message.platform) {
                continue;
            }
            if !kws.is_empty() && !matches_all(&message.content, &kws) {
                continue;
            }
            tagged.push((message.clone(), date.as_str()));
        }
    }
    tagged.sort_by_key(|(m, _)| m.timestamp);

    let total_messages = tagged.len();
    let total_words = tagged.iter().map(|(m, _)| char_len(&m.content)).sum();

    // Each group is already in timestamp order, so the stable sort inside
    // `cluster` keeps messages in step with their bucket dates.
    let mut by_platform: BTreeMap<String, (Vec<Message>, Vec<&str>)> = BTreeMap::new();
    for (message, date) in tagged {
        let platform = if message.platform.is_empty() {
            "unknown".to_string()
        } else {
            message.platform.clone()
        };
        let group = by_platform.entry(platform).or_default();
        group.0.push(message);
        group.1.push(date);
    }

    let mut platforms = BTreeMap::new();
    let mut total_sessions = 0usize;
    for (platform, (messages, dates)) in by_platform {
        let mut dates = dates.into_iter();
        let sessions: Vec<ExportSession> = cluster(&messages, request.session_gap)
            .into_iter()
            .enumerate()
            .map(|(idx, c)| ExportSession {
                session_index: idx + 1,
                start_time: c.start_time,
                end_time: c.end_time,
                message_count: c.message_count,
                word_count: c.word_count,
                messages: c
                    .messages
                    .into_iter()
                    .map(|m| ExportedMessage {
                        date: dates.next().unwrap_or_default().to_string(),
                        id: m.id,
                        role: m.role,
                        content: m.content,
                        timestamp: m.timestamp,
                        platform: m.platform,
                    })
                    .collect(),
            })
            .collect();
        total_sessions += sessions.len();
        platforms.insert(platform, sessions);
    }

    Ok(ContextExport {
        platforms,
        stats: ExportStats {
            total_messages,
            total_words,
            total_sessions,
            date_from: date_from.to_string(),
            date_to: date_to.to_string(),
        },
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextFormat {
    Conversation,
    Markdown,
    Qa,
}

impl FromStr for TextFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "conversation" | "chat" | "" => Ok(Self::Conversation),
            "markdown" | "md" => Ok(Self::Markdown),
            "qa" | "q&a" => Ok(Self::Qa),
            other => Err(format!(
                "unknown export format `{other}`; use conversation, markdown, or qa"
            )),
        }
    }
}

fn hh_mm(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&Local).format("%H:%M").to_string()
}

/// Paste-ready text for handing the exported context to another model.
pub fn render_text(export: &ContextExport, format: TextFormat, with_guide: bool) -> String {
    let mut text = String::new();
    let multi_platform = export.platforms.len() > 1;

    match format {
        TextFormat::Conversation => {
            if with_guide {
                text.push_str(
                    "Below are my earlier conversations with AI assistants. Continue from this context:\n\n",
                );
            }
            for (platform, sessions) in &export.platforms {
                if multi_platform {
                    text.push_str(&format!("--- {} ---\n\n", platform_display_name(platform)));
                }
                for message in sessions.iter().flat_map(|s| &s.messages) {
                    text.push_str(&format!("{}: {}\n\n", message.role.speaker(), message.content));
                }
            }
            if with_guide {
                text.push_str("---\nPlease answer my next question based on the conversation above.\n");
            }
        }
        TextFormat::Markdown => {
            if with_guide {
                text.push_str("> Earlier conversations with AI assistants\n\n");
            }
            for (platform, sessions) in &export.platforms {
                if multi_platform {
                    text.push_str(&format!("## {}\n\n", platform_display_name(platform)));
                }
                for message in sessions.iter().flat_map(|s| &s.messages) {
                    text.push_str(&format!(
                        "**{}** ({}): {}\n\n",
                        message.role.speaker(),
                        hh_mm(message.timestamp),
                        message.content
                    ));
                }
            }
        }
        TextFormat::Qa => {
            if with_guide {
                text.push_str("[Conversation context]\n\n");
            }
            for message in export
                .platforms
                .values()
                .flat_map(|sessions| sessions.iter().flat_map(|s| &s.messages))
            {
                let tag = match message.role {
                    Role::User => "Q",
                    Role::Assistant => "A",
                };
                text.push_str(&format!("{tag}: {}\n\n", message.content));
            }
        }
    }

    text.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, h, m, 0).unwrap()
    }

    fn msg(id: &str, platform: &str, role: Role, content: &str, ts: DateTime<Utc>) -> Message {
        Message::new(id, role, content, platform, ts)
    }

    fn sample_corpus() -> BTreeMap<String, Vec<Message>> {
        let mut corpus = BTreeMap::new();
        corpus.insert(
            "2024-01-01".to_string(),
            vec![
                msg("a1", "chatgpt", Role::User, "rust lifetimes?", at(1, 9, 0)),
                msg("a2", "chatgpt", Role::Assistant, "lifetimes tie borrows", at(1, 9, 2)),
                msg("c1", "claude", Role::User, "write a haiku", at(1, 9, 5)),
            ],
        );
        corpus.insert(
            "2024-01-02".to_string(),
            vec![msg("a3", "chatgpt", Role::User, "rust traits", at(2, 9, 0))],
        );
        corpus.insert(
            "2024-01-05".to_string(),
            vec![msg("z1", "chatgpt", Role::User, "out of range", at(5, 9, 0))],
        );
        corpus
    }

    fn request(from: &str, to: &str) -> ExportRequest {
        ExportRequest {
            date_from: from.to_string(),
            date_to: to.to_string(),
            platforms: Vec::new(),
            keyword: String::new(),
            session_gap: Duration::minutes(30),
        }
    }

    #[test]
    fn groups_by_platform_then_session_with_dates_tagged() {
        let export = export_context(&sample_corpus(), &request("2024-01-01", "2024-01-02"))
            .expect("export");

        let chatgpt = &export.platforms["chatgpt"];
        assert_eq!(chatgpt.len(), 2);
        assert_eq!(chatgpt[0].session_index, 1);
        assert_eq!(chatgpt[0].message_count, 2);
        assert_eq!(chatgpt[1].session_index, 2);
        assert_eq!(chatgpt[1].messages[0].date, "2024-01-02");
        assert_eq!(export.platforms["claude"].len(), 1);

        assert_eq!(export.stats.total_messages, 4);
        assert_eq!(export.stats.total_sessions, 3);
        assert_eq!(export.stats.date_from, "2024-01-01");
    }

    #[test]
    fn stats_agree_with_session_counts() {
        let export = export_context(&sample_corpus(), &request("2024-01-01", "2024-01-31"))
            .expect("export");
        let summed: usize = export
            .platforms
            .values()
            .flat_map(|s| s.iter().map(|x| x.message_count))
            .sum();
        assert_eq!(export.stats.total_messages, summed);
        let words: usize = export
            .platforms
            .values()
            .flat_map(|s| s.iter().map(|x| x.word_count))
            .sum();
        assert_eq!(export.stats.total_words, words);
    }

    #[test]
    fn platform_and_keyword_filters_apply_before_grouping() {
        let mut req = request("2024-01-01", "2024-01-31");
        req.platforms = vec!["chatgpt".to_string()];
        req.keyword = "RUST".to_string();
        let export = export_context(&sample_corpus(), &req).expect("export");
        assert_eq!(export.platforms.len(), 1);
        assert_eq!(export.stats.total_messages, 2);
    }

    #[test]
    fn missing_dates_are_rejected() {
        let err = export_context(&sample_corpus(), &request("", "2024-01-02"))
            .expect_err("should fail");
        assert!(matches!(err, MonitorError::Validation(_)));
    }

    #[test]
    fn conversation_text_labels_platforms_when_mixed() {
        let export = export_context(&sample_corpus(), &request("2024-01-01", "2024-01-01"))
            .expect("export");
        let text = render_text(&export, TextFormat::Conversation, true);
        assert!(text.starts_with("Below are my earlier conversations"));
        assert!(text.contains("--- ChatGPT ---"));
        assert!(text.contains("--- Claude ---"));
        assert!(text.contains("User: rust lifetimes?"));
        assert!(text.contains("AI: lifetimes tie borrows"));
        assert!(text.ends_with("based on the conversation above."));
    }

    #[test]
    fn qa_text_uses_question_answer_tags() {
        let export = export_context(&sample_corpus(), &request("2024-01-02", "2024-01-02"))
            .expect("export");
        assert_eq!(render_text(&export, TextFormat::Qa, false), "Q: rust traits");
    }
}
