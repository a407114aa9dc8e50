use anyhow::Result;

use crate::commands::capture::read_input;
use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::audit;
use crate::monitor::capture::{PastedTextAdapter, PlatformAdapter};
use crate::monitor::dedup::{ManualEntry, append_manual};
use crate::monitor::message::Role;
use crate::monitor::util::now_utc;

#[derive(Debug, Clone)]
pub struct AddOptions {
    pub platform: String,
    pub date: Option<String>,
    pub text: Option<String>,
    /// Path or `-`; used when `text` is absent.
    pub file: Option<String>,
    /// Store the whole input as one message of this role instead of parsing
    /// role prefixes.
    pub role: Option<Role>,
}

pub fn run(opts: &AddOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("add");
    let date = ctx.date_or_today(opts.date.as_deref())?;

    let raw = match (&opts.text, &opts.file) {
        (Some(text), _) => text.clone(),
        (None, Some(file)) => read_input(file)?,
        (None, None) => read_input("-")?,
    };

    let platform = if opts.platform.trim().is_empty() {
        "manual".to_string()
    } else {
        opts.platform.trim().to_ascii_lowercase()
    };
    let entries: Vec<ManualEntry> = match opts.role {
        Some(role) => vec![ManualEntry {
            role,
            content: raw.trim().to_string(),
            platform: platform.clone(),
        }],
        None => PastedTextAdapter::new(platform.clone())
            .extract_messages(&raw)
            .into_iter()
            .map(|m| ManualEntry {
                role: m.role,
                content: m.content,
                platform: m.platform_hint,
            })
            .collect(),
    };
    let parsed = entries.iter().filter(|e| !e.content.is_empty()).count();
    if parsed == 0 {
        report.issue("no messages found in input");
        return Ok(report);
    }

    let added = append_manual(&ctx.store, &date, &entries, now_utc())?;
    report.detail(format!("date={date}"));
    report.detail(format!("parsed={parsed}"));
    report.detail(format!("added={added}"));
    report.detail(format!("skipped_existing={}", parsed - added));
    report.set_data(&serde_json::json!({
        "date": date,
        "parsed": parsed,
        "added": added,
    }))?;

    audit::append_event(
        &ctx.paths,
        "manual-add",
        "ok",
        &format!("date={date} platform={platform} added={added}"),
    )?;
    Ok(report)
}
