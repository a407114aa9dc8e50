use anyhow::Result;

use crate::commands::capture::read_input;
use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::audit;
use crate::monitor::summary::SummaryCacheGate;
use crate::monitor::util::now_utc;

#[derive(Debug, Clone, Default)]
pub struct ConfirmOptions {
    pub date: Option<String>,
    pub text: Option<String>,
    pub file: Option<String>,
    /// Adopt the cached generated summary as the confirmed one.
    pub from_cache: bool,
    pub clear: bool,
}

pub fn run(opts: &ConfirmOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("confirm");
    let date = ctx.date_or_today(opts.date.as_deref())?;
    let gate = SummaryCacheGate::new(&ctx.store, &ctx.paths.locks_dir);

    if opts.clear {
        match gate.unconfirm(&date) {
            Ok(true) => report.detail(format!("date={date} confirmed summary cleared")),
            Ok(false) => report.detail(format!("date={date} had no confirmed summary")),
            Err(err) => report.monitor_issue(&err),
        }
        audit::append_event(&ctx.paths, "confirm", "cleared", &format!("date={date}"))?;
        return Ok(report);
    }

    let text = match (&opts.text, &opts.file, opts.from_cache) {
        (Some(text), _, _) => text.clone(),
        (None, Some(file), _) => read_input(file)?,
        (None, None, true) => match gate.cached(&date) {
            Ok(Some(record)) => record.content,
            Ok(None) => {
                report.issue(format!("no generated summary cached for {date}"));
                return Ok(report);
            }
            Err(err) => {
                report.monitor_issue(&err);
                return Ok(report);
            }
        },
        (None, None, false) => {
            report.issue("provide --text, --file, --from-cache, or --clear");
            return Ok(report);
        }
    };

    match gate.confirm(&date, &text, now_utc()) {
        Ok(record) => {
            report.detail(format!(
                "date={date} confirmed_at={}",
                record.confirmed_at.to_rfc3339()
            ));
            report.set_data(&record)?;
            audit::append_event(&ctx.paths, "confirm", "ok", &format!("date={date}"))?;
        }
        Err(err) => report.monitor_issue(&err),
    }
    Ok(report)
}
