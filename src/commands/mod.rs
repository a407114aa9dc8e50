pub mod add;
pub mod capture;
pub mod cleanup;
pub mod config;
pub mod confirm;
pub mod conversations;
pub mod export;
pub mod messages;
pub mod search;
pub mod stats;
pub mod status;
pub mod summary;
pub mod test_api;

use anyhow::{Result, anyhow};
use serde::Serialize;
use serde_json::Value;

use crate::error::MonitorError;
use crate::monitor::config::{ConfigStore, MonitorConfig};
use crate::monitor::message::bucket_date;
use crate::monitor::paths::{MonitorPaths, resolve_paths};
use crate::monitor::store::JsonFileStore;
use crate::monitor::util::{now_utc, parse_date};

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
            data: None,
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    /// Structured payload for `--json` output.
    pub fn set_data<T: Serialize>(&mut self, value: &T) -> Result<()> {
        self.data = Some(serde_json::to_value(value)?);
        Ok(())
    }

    pub fn monitor_issue(&mut self, err: &MonitorError) {
        self.issue(format!("{}: {err}", err.code()));
    }
}

/// Everything a command needs: resolved paths, the effective config, and
/// the store it points at.
#[derive(Debug, Clone)]
pub struct MonitorContext {
    pub paths: MonitorPaths,
    pub config: MonitorConfig,
    pub store: JsonFileStore,
}

impl MonitorContext {
    pub fn load() -> Result<Self> {
        let paths = resolve_paths()?;
        let config = ConfigStore::new(&paths.config_file).load()?;
        let store = JsonFileStore::open(&paths.store_file);
        Ok(Self {
            paths,
            config,
            store,
        })
    }

    pub fn today(&self) -> String {
        bucket_date(now_utc(), self.config.tz())
    }

    /// Validated `YYYY-MM-DD`, defaulting to today.
    pub fn date_or_today(&self, date: Option<&str>) -> Result<String> {
        match date.map(str::trim) {
            None | Some("") => Ok(self.today()),
            Some(raw) => {
                let parsed =
                    parse_date(raw).ok_or_else(|| anyhow!("invalid date `{raw}`: use YYYY-MM-DD"))?;
                Ok(parsed.format("%Y-%m-%d").to_string())
            }
        }
    }
}
