use anyhow::Result;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::llm::OpenAiCompatClient;
use crate::monitor::util::truncate_with_ellipsis;

pub fn run() -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("test-api");
    let snapshot = ctx.config.llm_snapshot();

    report.detail(format!("provider={}", snapshot.provider));
    report.detail(format!("model={}", snapshot.model));
    report.detail(format!("api_url={}", snapshot.api_url));

    let reply = OpenAiCompatClient::new(snapshot).and_then(|client| client.test_connection());
    match reply {
        Ok(text) => report.detail(format!(
            "connection ok; reply={}",
            truncate_with_ellipsis(text.trim(), 80)
        )),
        Err(err) => report.monitor_issue(&err),
    }
    Ok(report)
}
