use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::message::platform_display_name;
use crate::monitor::store::load_bucket;
use crate::monitor::util::truncate_with_ellipsis;

const PREVIEW_CHARS: usize = 120;

#[derive(Debug, Clone, Default)]
pub struct MessagesOptions {
    pub date: Option<String>,
    pub platform: Option<String>,
}

pub fn run(opts: &MessagesOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("messages");
    let date = ctx.date_or_today(opts.date.as_deref())?;
    let tz = ctx.config.tz();

    let mut messages = load_bucket(&ctx.store, &date)?;
    if let Some(platform) = opts.platform.as_deref() {
        messages.retain(|m| m.platform == platform);
    }

    report.detail(format!("date={date} count={}", messages.len()));
    for message in &messages {
        let clock = match tz {
            Some(tz) => message.timestamp.with_timezone(&tz).format("%H:%M:%S").to_string(),
            None => message
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string(),
        };
        let flat = message.content.replace(['\r', '\n'], " ");
        report.detail(format!(
            "{clock} [{}] {}: {}",
            platform_display_name(&message.platform),
            message.role.speaker(),
            truncate_with_ellipsis(flat.trim(), PREVIEW_CHARS)
        ));
    }
    report.set_data(&messages)?;
    Ok(report)
}
