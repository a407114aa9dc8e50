use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::cluster::cluster;
use crate::monitor::message::platform_display_name;
use crate::monitor::store::load_bucket;
use crate::monitor::util::{MAX_GAP_MINUTES, gap_from_minutes};

#[derive(Debug, Clone, Default)]
pub struct ConversationsOptions {
    pub date: Option<String>,
    pub gap_minutes: Option<u64>,
}

pub fn run(opts: &ConversationsOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("conversations");
    let date = ctx.date_or_today(opts.date.as_deref())?;

    let gap = match opts.gap_minutes.map(gap_from_minutes) {
        Some(Some(gap)) => gap,
        Some(None) => {
            report.issue(format!("gap must be between 1 and {MAX_GAP_MINUTES} minutes"));
            return Ok(report);
        }
        None => ctx.config.view_gap(),
    };

    let messages = load_bucket(&ctx.store, &date)?;
    let clusters = cluster(&messages, gap);
    let tz = ctx.config.tz();
    let clock = |ts: chrono::DateTime<chrono::Utc>| match tz {
        Some(tz) => ts.with_timezone(&tz).format("%H:%M").to_string(),
        None => ts.with_timezone(&chrono::Local).format("%H:%M").to_string(),
    };

    report.detail(format!(
        "date={date} conversations={} gap_minutes={}",
        clusters.len(),
        gap.num_minutes()
    ));
    for (idx, c) in clusters.iter().enumerate() {
        report.detail(format!(
            "#{} {}-{} [{}] {} ({} messages, {} chars)",
            idx + 1,
            clock(c.start_time),
            clock(c.end_time),
            platform_display_name(&c.platform),
            c.title,
            c.message_count,
            c.word_count
        ));
    }
    report.set_data(&clusters)?;
    Ok(report)
}
