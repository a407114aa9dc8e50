use crate::monitor::message::{Message, Role};
use crate::monitor::util::{keywords, matches_all};
use serde::Serialize;
use std::collections::BTreeMap;

pub const DEFAULT_MAX_RESULTS: usize = 50;
pub const EXCERPT_RADIUS: usize = 100;
pub const EXCERPT_FALLBACK_CHARS: usize = 200;

#[derive(Debug, Clone)]
pub struct SearchFilters {
    /// `None` matches every platform.
    pub platform: Option<String>,
    /// `None` matches both roles.
    pub role: Option<Role>,
    pub max_results: usize,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            platform: None,
            role: None,
            max_results: DEFAULT_MAX_RESULTS,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    #[serde(flatten)]
    pub message: Message,
    pub date: String,
    pub excerpt: String,
}

/// Window of `radius` characters either side of the first case-insensitive
/// occurrence of `keyword`, marked with `…` where cut.
pub fn excerpt(text: &str, keyword: &str, radius: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let head = || chars.iter().take(EXCERPT_FALLBACK_CHARS).collect::<String>();
    if keyword.is_empty() {
        return head();
    }

    // Same casing rule as `matches_all`. `str::to_lowercase` emits exactly
    // `char::to_lowercase` chars per input char (final sigma included), so
    // `owner` maps each lowered char back to its source char.
    let lower: Vec<char> = text.to_lowercase().chars().collect();
    let owner: Vec<usize> = chars
        .iter()
        .enumerate()
        .flat_map(|(i, c)| std::iter::repeat_n(i, c.to_lowercase().count()))
        .collect();
    let needle: Vec<char> = keyword.to_lowercase().chars().collect();
    if owner.len() != lower.len() {
        return head();
    }
    let Some(pos) = lower
        .windows(needle.len())
        .position(|window| window == needle.as_slice())
    else {
        return head();
    };
    let idx = owner[pos];
    let match_end = owner[pos + needle.len() - 1] + 1;

    let start = idx.saturating_sub(radius);
    let end = (match_end + radius).min(chars.len());
    let mut out = String::new();
    if start > 0 {
        out.push('…');
    }
    out.extend(&chars[start..end]);
    if end < chars.len() {
        out.push('…');
    }
    out
}

fn passes_filters(message: &Message, filters: &SearchFilters) -> bool {
    if let Some(platform) = filters.platform.as_deref()
        && message.platform != platform
    {
        return false;
    }
    if let Some(role) = filters.role
        && message.role != role
    {
        return false;
    }
    true
}

/// Most recent dates first, stored order within a date, stopping once
/// `max_results` matches are collected.
pub fn search(
    query: &str,
    filters: &SearchFilters,
    corpus: &BTreeMap<String, Vec<Message>>,
) -> Vec<SearchResult> {
    let kws = keywords(query);
    let mut results = Vec::new();
    if kws.is_empty() || filters.max_results == 0 {
        return results;
    }

    for (date, messages) in corpus.iter().rev() {
        for message in messages {
            if results.len() >= filters.max_results {
                return results;
            }
            if !passes_filters(message, filters) || !matches_all(&message.content, &kws) {
                continue;
            }
            results.push(SearchResult {
                excerpt: excerpt(&message.content, &kws[0], EXCERPT_RADIUS),
                message: message.clone(),
                date: date.clone(),
            });
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn msg(id: &str, platform: &str, role: Role, content: &str) -> Message {
        let ts = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        Message::new(id, role, content, platform, ts)
    }

    fn corpus(entries: Vec<(&str, Vec<Message>)>) -> BTreeMap<String, Vec<Message>> {
        entries
            .into_iter()
            .map(|(d, m)| (d.to_string(), m))
            .collect()
    }

    #[test]
    fn finds_only_messages_with_every_keyword() {
        let corpus = corpus(vec![
            (
                "2024-01-01",
                vec![msg("a", "chatgpt", Role::User, "react components only")],
            ),
            (
                "2024-01-02",
                vec![
                    msg("b", "claude", Role::User, "How do React hooks work?"),
                    msg("c", "claude", Role::Assistant, "hooks are functions"),
                ],
            ),
        ]);
        let results = search("react hooks", &SearchFilters::default(), &corpus);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].date, "2024-01-02");
        assert_eq!(results[0].message.id, "b");
    }

    #[test]
    fn blank_query_returns_nothing() {
        let corpus = corpus(vec![("2024-01-01", vec![msg("a", "x", Role::User, "hi")])]);
        assert!(search("   ", &SearchFilters::default(), &corpus).is_empty());
    }

    #[test]
    fn newest_dates_first_and_bounded_by_max_results() {
        let corpus = corpus(vec![
            (
                "2024-01-01",
                vec![
                    msg("old-1", "x", Role::User, "rust tip"),
                    msg("old-2", "x", Role::User, "rust tip"),
                ],
            ),
            ("2024-01-03", vec![msg("new-1", "x", Role::User, "rust tip")]),
        ]);
        let filters = SearchFilters {
            max_results: 2,
            ..SearchFilters::default()
        };
        let results = search("rust", &filters, &corpus);
        let ids: Vec<&str> = results.iter().map(|r| r.message.id.as_str()).collect();
        assert_eq!(ids, vec!["new-1", "old-1"]);
    }

    #[test]
    fn platform_and_role_filters_are_exact() {
        let corpus = corpus(vec![(
            "2024-01-01",
            vec![
                msg("a", "chatgpt", Role::User, "tokio question"),
                msg("b", "claude", Role::User, "tokio question"),
                msg("c", "claude", Role::Assistant, "tokio answer"),
            ],
        )]);
        let filters = SearchFilters {
            platform: Some("claude".to_string()),
            role: Some(Role::User),
            ..SearchFilters::default()
        };
        let results = search("TOKIO", &filters, &corpus);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].message.id, "b");
    }

    #[test]
    fn excerpt_windows_around_first_keyword() {
        let text = format!("{}needle{}", "a".repeat(150), "b".repeat(150));
        let got = excerpt(&text, "NEEDLE", 100);
        assert!(got.starts_with('…'));
        assert!(got.ends_with('…'));
        assert_eq!(got.chars().count(), 100 + 6 + 100 + 2);
    }

    #[test]
    fn excerpt_without_truncation_has_no_markers() {
        assert_eq!(excerpt("short needle text", "needle", 100), "short needle text");
    }

    #[test]
    fn excerpt_finds_keywords_whose_lowercase_depends_on_context() {
        let padding = "a".repeat(300);
        let query = keywords("ΟΔΟΣ");
        let text = format!("{padding} ΟΔΟΣ tail");
        assert!(matches_all(&text, &query));
        let got = excerpt(&text, &query[0], 100);
        assert!(got.starts_with('…'));
        assert!(got.ends_with("ΟΔΟΣ tail"));

        let query = keywords("İstanbul");
        let text = format!("{padding} İstanbul trip");
        assert!(matches_all(&text, &query));
        let got = excerpt(&text, &query[0], 100);
        assert!(got.ends_with("İstanbul trip"));
        assert_eq!(got.chars().count(), 1 + 100 + "İstanbul trip".chars().count());
    }

    #[test]
    fn excerpt_falls_back_to_head_when_keyword_missing() {
        let text = "z".repeat(300);
        assert_eq!(excerpt(&text, "needle", 100).chars().count(), 200);
    }

    #[test]
    fn search_result_serializes_message_fields_flat() {
        let corpus = corpus(vec![("2024-01-01", vec![msg("a", "x", Role::User, "serde flatten")])]);
        let results = search("serde", &SearchFilters::default(), &corpus);
        let json = serde_json::to_value(&results[0]).expect("serialize");
        assert_eq!(json["id"], "a");
        assert_eq!(json["date"], "2024-01-01");
        assert_eq!(json["excerpt"], "serde flatten");
    }
}
