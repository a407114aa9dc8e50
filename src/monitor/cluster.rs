use crate::monitor::message::{Message, Role};
use crate::monitor::util::{char_len, truncate_with_ellipsis};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

pub const TITLE_MAX_CHARS: usize = 60;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationCluster {
    pub platform: String,
    pub messages: Vec<Message>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub title: String,
    pub word_count: usize,
    pub message_count: usize,
}

fn cluster_title(messages: &[Message]) -> String {
    let source = messages
        .iter()
        .find(|m| m.role == Role::User)
        .or_else(|| messages.first());
    let Some(source) = source else {
        return String::new();
    };
    let flat = source.content.replace(['\r', '\n'], " ");
    truncate_with_ellipsis(flat.trim(), TITLE_MAX_CHARS)
}

fn finish(platform: String, messages: Vec<Message>) -> ConversationCluster {
    let start_time = messages.first().map(|m| m.timestamp).unwrap_or_default();
    let end_time = messages.last().map(|m| m.timestamp).unwrap_or_default();
    ConversationCluster {
        title: cluster_title(&messages),
        word_count: messages.iter().map(|m| char_len(&m.content)).sum(),
        message_count: messages.len(),
        platform,
        messages,
        start_time,
        end_time,
    }
}

/// Group messages into conversations: a message joins the open cluster when
/// it has the same platform and arrives less than `gap` after the cluster's
/// last message. Input order only matters for equal timestamps.
pub fn cluster(messages: &[Message], gap: Duration) -> Vec<ConversationCluster> {
    let mut sorted = messages.to_vec();
    sorted.sort_by_key(|m| m.timestamp);

    let mut clusters = Vec::new();
    let mut current: Option<(String, DateTime<Utc>, Vec<Message>)> = None;

    for message in sorted {
        match current.as_mut() {
            Some((platform, end, members))
                if *platform == message.platform && message.timestamp - *end < gap =>
            {
                *end = message.timestamp;
                members.push(message);
            }
            _ => {
                if let Some((platform, _, members)) = current.take() {
                    clusters.push(finish(platform, members));
                }
                current = Some((message.platform.clone(), message.timestamp, vec![message]));
            }
        }
    }
    if let Some((platform, _, members)) = current {
        clusters.push(finish(platform, members));
    }
    clusters
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, h, m, 0).unwrap()
    }

    fn msg(id: &str, platform: &str, role: Role, content: &str, ts: DateTime<Utc>) -> Message {
        Message::new(id, role, content, platform, ts)
    }

    #[test]
    fn splits_on_gap_at_or_above_threshold() {
        let messages = vec![
            msg("1", "A", Role::User, "first", at(10, 0)),
            msg("2", "A", Role::Assistant, "second", at(10, 5)),
            msg("3", "A", Role::User, "third", at(10, 20)),
        ];
        let clusters = cluster(&messages, Duration::minutes(10));
        assert_eq!(clusters.len(), 2);
        let ids: Vec<Vec<&str>> = clusters
            .iter()
            .map(|c| c.messages.iter().map(|m| m.id.as_str()).collect())
            .collect();
        assert_eq!(ids, vec![vec!["1", "2"], vec!["3"]]);
    }

    #[test]
    fn gap_exactly_equal_to_threshold_starts_new_cluster() {
        let messages = vec![
            msg("1", "A", Role::User, "one", at(10, 0)),
            msg("2", "A", Role::User, "two", at(10, 10)),
        ];
        assert_eq!(cluster(&messages, Duration::minutes(10)).len(), 2);
    }

    #[test]
    fn platform_change_starts_new_cluster() {
        let messages = vec![
            msg("1", "A", Role::User, "one", at(10, 0)),
            msg("2", "B", Role::User, "two", at(10, 1)),
            msg("3", "A", Role::User, "three", at(10, 2)),
        ];
        let clusters = cluster(&messages, Duration::minutes(10));
        assert_eq!(clusters.len(), 3);
    }

    #[test]
    fn sorts_by_timestamp_and_keeps_input_order_for_ties() {
        let messages = vec![
            msg("late", "A", Role::User, "late", at(10, 3)),
            msg("tie-1", "A", Role::User, "tie one", at(10, 1)),
            msg("tie-2", "A", Role::Assistant, "tie two", at(10, 1)),
        ];
        let clusters = cluster(&messages, Duration::minutes(10));
        let ids: Vec<&str> = clusters[0].messages.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["tie-1", "tie-2", "late"]);
        assert_eq!(clusters[0].start_time, at(10, 1));
        assert_eq!(clusters[0].end_time, at(10, 3));
    }

    #[test]
    fn adjacent_gaps_inside_clusters_stay_below_threshold() {
        let gap = Duration::minutes(10);
        let minutes = [0u32, 4, 13, 14, 30, 39, 55];
        let messages: Vec<Message> = minutes
            .iter()
            .enumerate()
            .map(|(i, m)| msg(&i.to_string(), "A", Role::User, "x", at(10, *m)))
            .collect();
        let clusters = cluster(&messages, gap);
        for c in &clusters {
            for pair in c.messages.windows(2) {
                assert!(pair[1].timestamp - pair[0].timestamp < gap);
            }
        }
        for pair in clusters.windows(2) {
            assert!(pair[1].start_time - pair[0].end_time >= gap);
        }
    }

    #[test]
    fn repeated_runs_produce_identical_partitions() {
        let gap = Duration::minutes(10);
        let messages = vec![
            msg("c", "A", Role::User, "c", at(10, 20)),
            msg("a", "A", Role::User, "a", at(10, 0)),
            msg("x", "B", Role::User, "x", at(10, 1)),
            msg("b", "A", Role::Assistant, "b", at(10, 0)),
            msg("d", "A", Role::User, "d", at(10, 25)),
        ];
        let partition = |clusters: Vec<ConversationCluster>| -> Vec<(String, Vec<String>)> {
            clusters
                .into_iter()
                .map(|c| (c.platform, c.messages.into_iter().map(|m| m.id).collect()))
                .collect()
        };
        let first = partition(cluster(&messages, gap));
        assert_eq!(first, partition(cluster(&messages, gap)));
        assert_eq!(
            first,
            vec![
                ("A".to_string(), vec!["a".to_string(), "b".to_string()]),
                ("B".to_string(), vec!["x".to_string()]),
                ("A".to_string(), vec!["c".to_string(), "d".to_string()]),
            ]
        );
    }

    #[test]
    fn title_prefers_first_user_message_and_truncates() {
        let long = format!("line one\n{}", "x".repeat(80));
        let messages = vec![
            msg("1", "A", Role::Assistant, "greeting from the bot", at(10, 0)),
            msg("2", "A", Role::User, &long, at(10, 1)),
        ];
        let clusters = cluster(&messages, Duration::minutes(10));
        let title = &clusters[0].title;
        assert!(title.starts_with("line one x"));
        assert!(title.ends_with('…'));
        assert_eq!(title.chars().count(), TITLE_MAX_CHARS + 1);
    }

    #[test]
    fn title_falls_back_to_first_message_and_counts_chars() {
        let messages = vec![msg("1", "A", Role::Assistant, "你好世界", at(10, 0))];
        let clusters = cluster(&messages, Duration::minutes(10));
        assert_eq!(clusters[0].title, "你好世界");
        assert_eq!(clusters[0].word_count, 4);
        assert_eq!(clusters[0].message_count, 1);
    }

    #[test]
    fn empty_input_yields_no_clusters() {
        assert!(cluster(&[], Duration::minutes(10)).is_empty());
    }
}
