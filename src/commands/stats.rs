use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::stats::{daily_report, day_stats};
use crate::monitor::store::load_bucket;

pub fn run(date: Option<&str>) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("stats");
    let date = ctx.date_or_today(date)?;

    let messages = load_bucket(&ctx.store, &date)?;
    let stats = day_stats(&date, &messages, ctx.config.view_gap());
    report.detail(daily_report(&stats));
    report.detail(format!("total_words={}", stats.total_words));
    report.set_data(&stats)?;
    Ok(report)
}
