use anyhow::{Context, Result, anyhow};
use std::fs;
use std::str::FromStr;

use crate::commands::{CommandReport, MonitorContext};
use crate::error::MonitorError;
use crate::monitor::export::{ExportRequest, TextFormat, export_context, render_text};
use crate::monitor::store::load_corpus;
use crate::monitor::util::{MAX_GAP_MINUTES, gap_from_minutes};

#[derive(Debug, Clone, Default)]
pub struct ExportOptions {
    pub from: Option<String>,
    pub to: Option<String>,
    pub platforms: Vec<String>,
    pub keyword: String,
    pub gap_minutes: Option<u64>,
    /// `json` or a text format name.
    pub format: String,
    pub guide: bool,
    pub output: Option<String>,
}

pub fn run(opts: &ExportOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("export");

    let format = opts.format.trim().to_ascii_lowercase();
    let text_format = if format == "json" {
        None
    } else {
        Some(TextFormat::from_str(&format).map_err(|err| anyhow!(err))?)
    };

    let session_gap = match opts.gap_minutes.map(gap_from_minutes) {
        Some(Some(gap)) => gap,
        Some(None) => {
            report.monitor_issue(&MonitorError::Validation(format!(
                "session gap must be between 1 and {MAX_GAP_MINUTES} minutes"
            )));
            return Ok(report);
        }
        None => ctx.config.export_gap(),
    };

    let request = ExportRequest {
        date_from: opts.from.clone().unwrap_or_default(),
        date_to: opts.to.clone().unwrap_or_default(),
        platforms: opts
            .platforms
            .iter()
            .map(|p| p.trim().to_ascii_lowercase())
            .filter(|p| !p.is_empty())
            .collect(),
        keyword: opts.keyword.clone(),
        session_gap,
    };

    let corpus = load_corpus(&ctx.store)?;
    let export = match export_context(&corpus, &request) {
        Ok(export) => export,
        Err(err) => {
            report.monitor_issue(&err);
            return Ok(report);
        }
    };

    let rendered = match text_format {
        Some(format) => render_text(&export, format, opts.guide),
        None => serde_json::to_string_pretty(&export)?,
    };

    report.detail(format!(
        "messages={} sessions={} words={} platforms={}",
        export.stats.total_messages,
        export.stats.total_sessions,
        export.stats.total_words,
        export.platforms.len()
    ));
    match opts.output.as_deref() {
        Some(path) => {
            fs::write(path, format!("{rendered}\n"))
                .with_context(|| format!("failed to write {path}"))?;
            report.detail(format!("wrote {path}"));
        }
        None => report.detail(rendered),
    }
    report.set_data(&export)?;
    Ok(report)
}
