use anyhow::Result;

use crate::commands::CommandReport;
use crate::monitor::config::ConfigStore;
use crate::monitor::llm::PROVIDERS;
use crate::monitor::paths::resolve_paths;

#[derive(Debug, Clone, Default)]
pub struct ConfigSetOptions {
    pub provider: Option<String>,
    pub model: Option<String>,
    pub api_key: Option<String>,
    pub api_url: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    pub system_prompt: Option<String>,
    pub timezone: Option<String>,
    pub view_gap_minutes: Option<u64>,
    pub export_gap_minutes: Option<u64>,
    pub max_results: Option<usize>,
    pub debounce_ms: Option<u64>,
    pub retention_days: Option<u64>,
}

pub fn show() -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let store = ConfigStore::new(&paths.config_file);
    let mut report = CommandReport::new("config-show");

    let cfg = store.load()?;
    let snapshot = cfg.llm_snapshot();
    report.detail(format!("config_file={}", store.path().display()));
    report.detail(format!("llm.provider={}", snapshot.provider));
    report.detail(format!("llm.model={}", snapshot.model));
    report.detail(format!("llm.api_url={}", snapshot.api_url));
    report.detail(format!("llm.api_key={}", snapshot.masked_api_key()));
    report.detail(format!("llm.temperature={}", snapshot.temperature));
    report.detail(format!("llm.max_tokens={}", snapshot.max_tokens));
    report.detail(format!("llm.context_length={}", snapshot.context_length));
    report.detail(format!("llm.max_input_chars={}", snapshot.max_input_chars()));
    report.detail(format!(
        "timezone={}",
        if cfg.timezone.trim().is_empty() { "system" } else { cfg.timezone.trim() }
    ));
    report.detail(format!(
        "clustering.view_gap_minutes={}",
        cfg.clustering.view_gap_minutes
    ));
    report.detail(format!(
        "clustering.export_gap_minutes={}",
        cfg.clustering.export_gap_minutes
    ));
    report.detail(format!("search.max_results={}", cfg.search.max_results));
    report.detail(format!("capture.debounce_ms={}", cfg.capture.debounce_ms));
    report.detail(format!(
        "capture.min_content_chars={}",
        cfg.capture.min_content_chars
    ));
    report.detail(format!("retention.days={}", cfg.retention.days));
    report.detail(format!(
        "providers={}",
        PROVIDERS.iter().map(|p| p.key).collect::<Vec<_>>().join(",")
    ));

    let mut masked = cfg.clone();
    masked.llm.api_key = snapshot.masked_api_key();
    report.set_data(&masked)?;
    Ok(report)
}

pub fn set(opts: &ConfigSetOptions) -> Result<CommandReport> {
    let paths = resolve_paths()?;
    let store = ConfigStore::new(&paths.config_file);
    let mut report = CommandReport::new("config-set");

    let mut cfg = store.load_file()?;
    let mut changed = Vec::new();

    if let Some(provider) = &opts.provider {
        let provider = provider.trim().to_ascii_lowercase();
        if provider != cfg.llm.provider && opts.model.is_none() {
            // Model ids are provider-specific.
            cfg.llm.model.clear();
        }
        cfg.llm.provider = provider;
        changed.push("llm.provider");
    }
    if let Some(model) = &opts.model {
        cfg.llm.model = model.trim().to_string();
        changed.push("llm.model");
    }
    if let Some(api_key) = &opts.api_key {
        cfg.llm.api_key = api_key.trim().to_string();
        changed.push("llm.api_key");
    }
    if let Some(api_url) = &opts.api_url {
        cfg.llm.api_url = api_url.trim().to_string();
        changed.push("llm.api_url");
    }
    if let Some(temperature) = opts.temperature {
        cfg.llm.temperature = temperature;
        changed.push("llm.temperature");
    }
    if let Some(max_tokens) = opts.max_tokens {
        cfg.llm.max_tokens = max_tokens;
        changed.push("llm.max_tokens");
    }
    if let Some(prompt) = &opts.system_prompt {
        cfg.llm.system_prompt = prompt.clone();
        changed.push("llm.system_prompt");
    }
    if let Some(timezone) = &opts.timezone {
        cfg.timezone = timezone.trim().to_string();
        changed.push("timezone");
    }
    if let Some(minutes) = opts.view_gap_minutes {
        cfg.clustering.view_gap_minutes = minutes;
        changed.push("clustering.view_gap_minutes");
    }
    if let Some(minutes) = opts.export_gap_minutes {
        cfg.clustering.export_gap_minutes = minutes;
        changed.push("clustering.export_gap_minutes");
    }
    if let Some(max_results) = opts.max_results {
        cfg.search.max_results = max_results;
        changed.push("search.max_results");
    }
    if let Some(debounce_ms) = opts.debounce_ms {
        cfg.capture.debounce_ms = debounce_ms;
        changed.push("capture.debounce_ms");
    }
    if let Some(days) = opts.retention_days {
        cfg.retention.days = days;
        changed.push("retention.days");
    }

    if changed.is_empty() {
        report.issue("nothing to set; pass at least one option");
        return Ok(report);
    }
    if let Err(err) = store.save(&cfg) {
        report.issue(format!("config not saved: {err:#}"));
        return Ok(report);
    }
    report.detail(format!("config_file={}", store.path().display()));
    for key in changed {
        report.detail(format!("updated {key}"));
    }
    Ok(report)
}
