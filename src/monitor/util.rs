use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::time::{SystemTime, UNIX_EPOCH};

pub const MESSAGES_PREFIX: &str = "messages_";
pub const SUMMARY_PREFIX: &str = "summary_";
pub const CONFIRMED_PREFIX: &str = "summary_confirmed_";

/// Largest clustering gap accepted anywhere: one year.
pub const MAX_GAP_MINUTES: u64 = 366 * 24 * 60;

/// Current Unix epoch in milliseconds.
pub fn now_epoch_millis() -> Result<u64> {
    Ok(SystemTime::now().duration_since(UNIX_EPOCH)?.as_millis() as u64)
}

pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Truncate `input` to at most `max_chars` Unicode characters, appending
/// `…` when truncated.
pub fn truncate_with_ellipsis(input: &str, max_chars: usize) -> String {
    if input.chars().count() > max_chars {
        let mut s: String = input.chars().take(max_chars).collect();
        s.push('…');
        s
    } else {
        input.to_string()
    }
}

pub fn char_len(input: &str) -> usize {
    input.chars().count()
}

/// Clustering gap for a user-supplied minute count; `None` outside
/// `1..=MAX_GAP_MINUTES`.
pub fn gap_from_minutes(minutes: u64) -> Option<Duration> {
    if minutes == 0 || minutes > MAX_GAP_MINUTES {
        return None;
    }
    i64::try_from(minutes).ok().and_then(Duration::try_minutes)
}

/// Split a free-text query into lowercase keywords.
pub fn keywords(query: &str) -> Vec<String> {
    query
        .to_lowercase()
        .split_whitespace()
        .map(ToOwned::to_owned)
        .collect()
}

/// AND-match: every keyword is a substring of the lowercased content.
pub fn matches_all(content: &str, keywords: &[String]) -> bool {
    let lower = content.to_lowercase();
    keywords.iter().all(|kw| lower.contains(kw.as_str()))
}

pub fn messages_key(date: &str) -> String {
    format!("{MESSAGES_PREFIX}{date}")
}

pub fn summary_key(date: &str) -> String {
    format!("{SUMMARY_PREFIX}{date}")
}

pub fn confirmed_key(date: &str) -> String {
    format!("{CONFIRMED_PREFIX}{date}")
}

/// Extract the date from a `messages_<date>` key.
pub fn date_of_messages_key(key: &str) -> Option<&str> {
    key.strip_prefix(MESSAGES_PREFIX)
}

/// Extract the date from either summary key shape.
pub fn date_of_summary_key(key: &str) -> Option<&str> {
    key.strip_prefix(CONFIRMED_PREFIX)
        .or_else(|| key.strip_prefix(SUMMARY_PREFIX))
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_counts_characters_not_bytes() {
        assert_eq!(truncate_with_ellipsis("你好世界", 2), "你好…");
        assert_eq!(truncate_with_ellipsis("short", 10), "short");
    }

    #[test]
    fn keywords_lowercase_and_split_on_whitespace() {
        assert_eq!(keywords("  React\tHooks  "), vec!["react", "hooks"]);
        assert!(keywords("   ").is_empty());
    }

    #[test]
    fn gap_from_minutes_rejects_zero_and_huge_values() {
        assert_eq!(gap_from_minutes(10), Some(Duration::minutes(10)));
        assert_eq!(
            gap_from_minutes(MAX_GAP_MINUTES),
            Some(Duration::minutes(MAX_GAP_MINUTES as i64))
        );
        assert_eq!(gap_from_minutes(0), None);
        assert_eq!(gap_from_minutes(MAX_GAP_MINUTES + 1), None);
        assert_eq!(gap_from_minutes(200_000_000_000_000), None);
        assert_eq!(gap_from_minutes(u64::MAX), None);
    }

    #[test]
    fn matches_all_requires_every_keyword() {
        let kws = keywords("python list");
        assert!(matches_all("I love Python and lists", &kws));
        assert!(!matches_all("I love Python", &kws));
    }

    #[test]
    fn summary_key_date_handles_confirmed_variant() {
        assert_eq!(date_of_summary_key("summary_2024-01-02"), Some("2024-01-02"));
        assert_eq!(
            date_of_summary_key("summary_confirmed_2024-01-02"),
            Some("2024-01-02")
        );
        assert_eq!(date_of_messages_key("messages_2024-01-02"), Some("2024-01-02"));
        assert_eq!(date_of_messages_key("llmConfig"), None);
    }
}
