use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::audit;
use crate::monitor::retention::cleanup;
use crate::monitor::util::parse_date;

pub fn run(days: Option<u64>) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("cleanup");

    let days = days.unwrap_or(ctx.config.retention.days);
    if days == 0 {
        report.issue("retention must keep at least 1 day");
        return Ok(report);
    }
    let Some(today) = parse_date(&ctx.today()) else {
        report.issue("could not determine today's date");
        return Ok(report);
    };

    let result = cleanup(&ctx.store, today, days)?;
    report.detail(format!("cutoff={}", result.cutoff));
    report.detail(format!("removed={}", result.removed_keys.len()));
    for key in &result.removed_keys {
        report.detail(format!("removed {key}"));
    }
    report.set_data(&result)?;

    audit::append_event(
        &ctx.paths,
        "cleanup",
        "ok",
        &format!("cutoff={} removed={}", result.cutoff, result.removed_keys.len()),
    )?;
    Ok(report)
}
