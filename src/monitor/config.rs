use crate::monitor::capture::{DEFAULT_DEBOUNCE_MS, DEFAULT_MIN_CONTENT_CHARS};
use crate::monitor::util::MAX_GAP_MINUTES;
use crate::monitor::llm::{
    DEFAULT_MAX_TOKENS, DEFAULT_SYSTEM_PROMPT, DEFAULT_TEMPERATURE, LlmConfig, PROVIDERS,
    REQUEST_TIMEOUT_SECS, context_length_for, provider_preset,
};
use anyhow::{Context, Result, anyhow};
use chrono::Duration;
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    pub provider: String,
    /// Blank selects the provider's default model.
    pub model: String,
    pub api_key: String,
    /// Blank selects the provider's preset endpoint.
    pub api_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    /// Blank selects the built-in summary prompt.
    pub system_prompt: String,
    /// Overrides the preset context window when set.
    pub context_length: Option<usize>,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: String::new(),
            api_key: String::new(),
            api_url: String::new(),
            temperature: DEFAULT_TEMPERATURE,
            max_tokens: DEFAULT_MAX_TOKENS,
            system_prompt: String::new(),
            context_length: None,
            timeout_secs: REQUEST_TIMEOUT_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusteringSection {
    pub view_gap_minutes: u64,
    pub export_gap_minutes: u64,
}

impl Default for ClusteringSection {
    fn default() -> Self {
        Self {
            view_gap_minutes: 10,
            export_gap_minutes: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub max_results: usize,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self { max_results: 50 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSection {
    pub debounce_ms: u64,
    pub min_content_chars: usize,
}

impl Default for CaptureSection {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            min_content_chars: DEFAULT_MIN_CONTENT_CHARS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetentionSection {
    pub days: u64,
}

impl Default for RetentionSection {
    fn default() -> Self {
        Self { days: 30 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct MonitorConfig {
    /// IANA zone used for date buckets. Blank means the system zone.
    #[serde(default)]
    pub timezone: String,
    pub llm: LlmSection,
    pub clustering: ClusteringSection,
    pub search: SearchSection,
    pub capture: CaptureSection,
    pub retention: RetentionSection,
}

#[derive(Debug, Clone, Deserialize, Default)]
struct PartialMonitorConfig {
    timezone: Option<String>,
    llm: Option<LlmSection>,
    clustering: Option<ClusteringSection>,
    search: Option<SearchSection>,
    capture: Option<CaptureSection>,
    retention: Option<RetentionSection>,
}

impl MonitorConfig {
    pub fn tz(&self) -> Option<Tz> {
        let name = self.timezone.trim();
        if name.is_empty() {
            return None;
        }
        name.parse::<Tz>().ok()
    }

    /// Validated configs convert exactly; anything else is clamped into range.
    pub fn view_gap(&self) -> Duration {
        clamped_gap(self.clustering.view_gap_minutes)
    }

    pub fn export_gap(&self) -> Duration {
        clamped_gap(self.clustering.export_gap_minutes)
    }

    /// Resolve presets into the settings one LLM call runs with.
    pub fn llm_snapshot(&self) -> LlmConfig {
        let section = &self.llm;
        let preset = provider_preset(&section.provider);
        let model = if section.model.trim().is_empty() {
            preset.map(|p| p.default_model).unwrap_or("custom-model").to_string()
        } else {
            section.model.trim().to_string()
        };
        let api_url = if section.api_url.trim().is_empty() {
            preset.map(|p| p.api_url).unwrap_or_default().to_string()
        } else {
            section.api_url.trim().to_string()
        };
        let system_prompt = if section.system_prompt.trim().is_empty() {
            DEFAULT_SYSTEM_PROMPT.to_string()
        } else {
            section.system_prompt.clone()
        };
        LlmConfig {
            provider: section.provider.trim().to_ascii_lowercase(),
            context_length: section
                .context_length
                .unwrap_or_else(|| context_length_for(&section.provider, &model)),
            api_url,
            model,
            api_key: section.api_key.trim().to_string(),
            temperature: section.temperature,
            max_tokens: section.max_tokens,
            system_prompt,
            timeout_secs: section.timeout_secs,
        }
    }
}

fn clamped_gap(minutes: u64) -> Duration {
    Duration::minutes(minutes.clamp(1, MAX_GAP_MINUTES) as i64)
}

fn env_or_f64(var: &str, fallback: f64) -> f64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<f64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_u64(var: &str, fallback: u64) -> u64 {
    match env::var(var) {
        Ok(v) => v.trim().parse::<u64>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_usize(var: &str, fallback: usize) -> usize {
    match env::var(var) {
        Ok(v) => v.trim().parse::<usize>().ok().unwrap_or(fallback),
        Err(_) => fallback,
    }
}

fn env_or_string(var: &str, fallback: &str) -> String {
    match env::var(var) {
        Ok(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => fallback.to_string(),
    }
}

pub fn validate(cfg: &MonitorConfig) -> Result<()> {
    let provider = cfg.llm.provider.trim().to_ascii_lowercase();
    if provider_preset(&provider).is_none() {
        let known: Vec<&str> = PROVIDERS.iter().map(|p| p.key).collect();
        return Err(anyhow!(
            "invalid llm provider `{provider}`: use one of {}",
            known.join(", ")
        ));
    }
    if provider == "custom" && cfg.llm.api_url.trim().is_empty() {
        return Err(anyhow!("invalid llm config: provider `custom` requires api_url"));
    }
    if !(0.0..=2.0).contains(&cfg.llm.temperature) {
        return Err(anyhow!("invalid llm temperature: require 0 <= temperature <= 2"));
    }
    if cfg.llm.max_tokens == 0 {
        return Err(anyhow!("invalid llm max tokens: must be >= 1"));
    }
    if cfg.llm.timeout_secs == 0 {
        return Err(anyhow!("invalid llm timeout: must be >= 1 second"));
    }
    for minutes in [cfg.clustering.view_gap_minutes, cfg.clustering.export_gap_minutes] {
        if !(1..=MAX_GAP_MINUTES).contains(&minutes) {
            return Err(anyhow!(
                "invalid clustering gap: require 1 <= minutes <= {MAX_GAP_MINUTES}"
            ));
        }
    }
    if cfg.search.max_results == 0 {
        return Err(anyhow!("invalid search max results: must be >= 1"));
    }
    if cfg.retention.days == 0 {
        return Err(anyhow!("invalid retention days: must be >= 1"));
    }
    let tz = cfg.timezone.trim();
    if !tz.is_empty() && tz.parse::<Tz>().is_err() {
        return Err(anyhow!("invalid timezone `{tz}`: use an IANA name such as Asia/Shanghai"));
    }
    Ok(())
}

fn merge_partial(base: &mut MonitorConfig, raw: &str, origin: &Path) -> Result<()> {
    let parsed: PartialMonitorConfig = toml::from_str(raw)
        .map_err(|err| anyhow!("failed to parse config {}: {err}", origin.display()))?;
    if let Some(timezone) = parsed.timezone {
        base.timezone = timezone;
    }
    if let Some(llm) = parsed.llm {
        base.llm = llm;
    }
    if let Some(clustering) = parsed.clustering {
        base.clustering = clustering;
    }
    if let Some(search) = parsed.search {
        base.search = search;
    }
    if let Some(capture) = parsed.capture {
        base.capture = capture;
    }
    if let Some(retention) = parsed.retention {
        base.retention = retention;
    }
    Ok(())
}

fn apply_env_overrides(cfg: &mut MonitorConfig) {
    cfg.llm.provider = env_or_string("CHATMON_LLM_PROVIDER", &cfg.llm.provider);
    cfg.llm.model = env_or_string("CHATMON_LLM_MODEL", &cfg.llm.model);
    cfg.llm.api_key = env_or_string("CHATMON_LLM_API_KEY", &cfg.llm.api_key);
    cfg.llm.api_url = env_or_string("CHATMON_LLM_API_URL", &cfg.llm.api_url);
    cfg.llm.temperature = env_or_f64("CHATMON_LLM_TEMPERATURE", cfg.llm.temperature);
    cfg.llm.max_tokens =
        env_or_u64("CHATMON_LLM_MAX_TOKENS", cfg.llm.max_tokens as u64).min(u32::MAX as u64) as u32;
    cfg.llm.timeout_secs = env_or_u64("CHATMON_LLM_TIMEOUT_SECS", cfg.llm.timeout_secs);
    cfg.clustering.view_gap_minutes =
        env_or_u64("CHATMON_VIEW_GAP_MINUTES", cfg.clustering.view_gap_minutes);
    cfg.clustering.export_gap_minutes =
        env_or_u64("CHATMON_EXPORT_GAP_MINUTES", cfg.clustering.export_gap_minutes);
    cfg.search.max_results = env_or_usize("CHATMON_SEARCH_MAX_RESULTS", cfg.search.max_results);
    cfg.capture.debounce_ms = env_or_u64("CHATMON_DEBOUNCE_MS", cfg.capture.debounce_ms);
    cfg.capture.min_content_chars =
        env_or_usize("CHATMON_MIN_CONTENT_CHARS", cfg.capture.min_content_chars);
    cfg.retention.days = env_or_u64("CHATMON_RETENTION_DAYS", cfg.retention.days);
    cfg.timezone = env_or_string("CHATMON_TIMEZONE", &cfg.timezone);
}

/// The TOML file behind `MonitorConfig`. Readers get immutable snapshots;
/// only `save` writes.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Defaults overlaid with the file only.
    pub fn load_file(&self) -> Result<MonitorConfig> {
        let mut cfg = MonitorConfig::default();
        if self.path.exists() {
            let raw = fs::read_to_string(&self.path)
                .with_context(|| format!("failed to read {}", self.path.display()))?;
            merge_partial(&mut cfg, &raw, &self.path)?;
        }
        Ok(cfg)
    }

    /// Effective configuration: defaults, then file, then environment.
    pub fn load(&self) -> Result<MonitorConfig> {
        let mut cfg = self.load_file()?;
        apply_env_overrides(&mut cfg);
        validate(&cfg)?;
        Ok(cfg)
    }

    pub fn save(&self, cfg: &MonitorConfig) -> Result<()> {
        validate(cfg)?;
        let parent = self
            .path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
        let data = toml::to_string_pretty(cfg)?;
        let mut tmp = tempfile::NamedTempFile::new_in(parent)
            .with_context(|| format!("failed to stage write in {}", parent.display()))?;
        tmp.write_all(data.as_bytes())?;
        tmp.persist(&self.path)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }
}
