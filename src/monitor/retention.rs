use crate::monitor::store::MessageStore;
use crate::monitor::util::{date_of_messages_key, date_of_summary_key, parse_date};
use anyhow::Result;
use chrono::{Days, NaiveDate};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub cutoff: String,
    pub removed_keys: Vec<String>,
}

/// Dated message and summary keys strictly older than `cutoff`. Keys whose
/// date does not parse are kept.
pub fn expired_keys<'a>(keys: impl IntoIterator<Item = &'a str>, cutoff: NaiveDate) -> Vec<String> {
    keys.into_iter()
        .filter(|key| {
            date_of_messages_key(key)
                .or_else(|| date_of_summary_key(key))
                .and_then(parse_date)
                .is_some_and(|date| date < cutoff)
        })
        .map(ToOwned::to_owned)
        .collect()
}

pub fn cleanup(store: &dyn MessageStore, today: NaiveDate, retention_days: u64) -> Result<CleanupReport> {
    let cutoff = today
        .checked_sub_days(Days::new(retention_days))
        .unwrap_or(NaiveDate::MIN);
    let all = store.get_all()?;
    let removed_keys = expired_keys(all.keys().map(String::as_str), cutoff);
    store.remove(&removed_keys)?;
    Ok(CleanupReport {
        cutoff: cutoff.format("%Y-%m-%d").to_string(),
        removed_keys,
    })
}
