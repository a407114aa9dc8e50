use anyhow::Result;
use std::env;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::store::MessageStore;
use crate::monitor::util::{MESSAGES_PREFIX, SUMMARY_PREFIX};

include!(concat!(env!("OUT_DIR"), "/chatmon_env_allowlist.rs"));

/// `CHATMON_*` variables this build never reads, usually typos.
pub fn unknown_env_vars<I>(names: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unknown: Vec<String> = names
        .into_iter()
        .filter(|name| name.starts_with("CHATMON_"))
        .filter(|name| !GENERATED_ENV_ALLOWLIST.contains(&name.as_str()))
        .collect();
    unknown.sort();
    unknown
}

pub fn run() -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("status");

    report.detail(format!("build={}", env!("BUILD_UUID")));
    report.detail(format!("home={}", ctx.paths.home.display()));
    report.detail(format!("store_file={}", ctx.paths.store_file.display()));
    report.detail(format!("config_file={}", ctx.paths.config_file.display()));
    report.detail(format!("logs_dir={}", ctx.paths.logs_dir.display()));
    report.detail(format!("today={}", ctx.today()));

    let all = ctx.store.get_all()?;
    let buckets = all.keys().filter(|k| k.starts_with(MESSAGES_PREFIX)).count();
    let summaries = all.keys().filter(|k| k.starts_with(SUMMARY_PREFIX)).count();
    let messages: usize = all
        .iter()
        .filter(|(k, _)| k.starts_with(MESSAGES_PREFIX))
        .filter_map(|(_, v)| v.as_array().map(Vec::len))
        .sum();
    report.detail(format!("date_buckets={buckets}"));
    report.detail(format!("messages={messages}"));
    report.detail(format!("summaries={summaries}"));

    let snapshot = ctx.config.llm_snapshot();
    report.detail(format!(
        "llm={} model={} api_key={}",
        snapshot.provider,
        snapshot.model,
        snapshot.masked_api_key()
    ));
    if snapshot.api_key.is_empty() {
        report.detail("warning: no API key configured; summaries are unavailable");
    }

    let names = env::vars_os().filter_map(|(k, _)| k.into_string().ok());
    for name in unknown_env_vars(names) {
        report.detail(format!("warning: unrecognized environment variable {name}"));
    }

    report.set_data(&serde_json::json!({
        "home": ctx.paths.home,
        "storeFile": ctx.paths.store_file,
        "dateBuckets": buckets,
        "messages": messages,
        "summaries": summaries,
        "provider": snapshot.provider,
        "model": snapshot.model,
    }))?;
    Ok(report)
}
