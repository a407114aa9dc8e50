use crate::error::MonitorError;
use crate::monitor::message::Message;
use crate::monitor::store::MessageStore;
use crate::monitor::util::{confirmed_key, summary_key};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryRecord {
    pub content: String,
    pub message_count: usize,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmedSummary {
    pub text: String,
    pub confirmed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SummaryOrigin {
    Confirmed,
    Cached,
    Generated,
}

impl SummaryOrigin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Confirmed => "confirmed",
            Self::Cached => "cached",
            Self::Generated => "generated",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryOutcome {
    pub date: String,
    pub content: String,
    pub origin: SummaryOrigin,
    pub message_count: usize,
}

fn storage(err: anyhow::Error) -> MonitorError {
    MonitorError::Storage(format!("{err:#}"))
}

/// Decides whether a day's summary can be served from the store or must be
/// regenerated, and serializes generation per date.
pub struct SummaryCacheGate<'a> {
    store: &'a dyn MessageStore,
    locks_dir: PathBuf,
}

impl<'a> SummaryCacheGate<'a> {
    pub fn new(store: &'a dyn MessageStore, locks_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            locks_dir: locks_dir.into(),
        }
    }

    fn read<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, MonitorError> {
        let Some(value) = self.store.get(key).map_err(storage)? else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|err| MonitorError::Storage(format!("failed to decode {key}: {err}")))
    }

    pub fn confirmed(&self, date: &str) -> Result<Option<ConfirmedSummary>, MonitorError> {
        self.read(&confirmed_key(date))
    }

    pub fn cached(&self, date: &str) -> Result<Option<SummaryRecord>, MonitorError> {
        self.read(&summary_key(date))
    }

    /// Non-blocking per-date lock. Dropping the file releases it.
    fn acquire(&self, date: &str) -> Result<File, MonitorError> {
        fs::create_dir_all(&self.locks_dir).map_err(|err| {
            MonitorError::Storage(format!(
                "failed to create {}: {err}",
                self.locks_dir.display()
            ))
        })?;
        let path = self.locks_dir.join(format!("summary-{date}.lock"));
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&path)
            .map_err(|err| {
                MonitorError::Storage(format!("failed to open {}: {err}", path.display()))
            })?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(file),
            Err(err) if err.kind() == fs2::lock_contended_error().kind() => {
                Err(MonitorError::SummaryInFlight(date.to_string()))
            }
            Err(err) => Err(MonitorError::Storage(format!(
                "failed to lock {}: {err}",
                path.display()
            ))),
        }
    }

    /// A confirmed summary wins unless `force`. A cached one is reused while
    /// its message count still matches. Otherwise `generate` runs once and
    /// its non-empty output is cached; the confirmed record is never touched.
    pub fn get_or_refresh<F>(
        &self,
        date: &str,
        force: bool,
        messages: &[Message],
        generate: F,
    ) -> Result<SummaryOutcome, MonitorError>
    where
        F: FnOnce(&[Message]) -> Result<String, MonitorError>,
    {
        if messages.is_empty() {
            return Err(MonitorError::NoMessages(date.to_string()));
        }
        let outcome = |content: String, origin: SummaryOrigin| SummaryOutcome {
            date: date.to_string(),
            content,
            origin,
            message_count: messages.len(),
        };

        if !force {
            if let Some(confirmed) = self.confirmed(date)? {
                return Ok(outcome(confirmed.text, SummaryOrigin::Confirmed));
            }
            if let Some(cached) = self.cached(date)?
                && cached.message_count == messages.len()
            {
                return Ok(outcome(cached.content, SummaryOrigin::Cached));
            }
        }

        let _guard = self.acquire(date)?;
        let content = generate(messages)?;
        if !content.trim().is_empty() {
            let record = SummaryRecord {
                content: content.clone(),
                message_count: messages.len(),
                generated_at: Utc::now(),
            };
            let value = serde_json::to_value(&record)
                .map_err(|err| MonitorError::Storage(err.to_string()))?;
            self.store
                .set(&summary_key(date), value)
                .map_err(storage)?;
        }
        Ok(outcome(content, SummaryOrigin::Generated))
    }

    pub fn confirm(
        &self,
        date: &str,
        text: &str,
        now: DateTime<Utc>,
    ) -> Result<ConfirmedSummary, MonitorError> {
        if text.trim().is_empty() {
            return Err(MonitorError::Validation(
                "confirmed summary text must not be empty".to_string(),
            ));
        }
        let record = ConfirmedSummary {
            text: text.trim().to_string(),
            confirmed_at: now,
        };
        let value =
            serde_json::to_value(&record).map_err(|err| MonitorError::Storage(err.to_string()))?;
        self.store
            .set(&confirmed_key(date), value)
            .map_err(storage)?;
        Ok(record)
    }

    /// Returns whether a confirmed record existed.
    pub fn unconfirm(&self, date: &str) -> Result<bool, MonitorError> {
        let removed = self
            .store
            .remove(&[confirmed_key(date)])
            .map_err(storage)?;
        Ok(removed > 0)
    }
}
