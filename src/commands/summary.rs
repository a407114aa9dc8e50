use anyhow::Result;
use std::cell::Cell;
use std::io::Write;

use crate::commands::{CommandReport, MonitorContext};
use crate::error::MonitorError;
use crate::monitor::audit;
use crate::monitor::llm::{ChatCompletion, OpenAiCompatClient, summary_request};
use crate::monitor::message::Message;
use crate::monitor::store::load_bucket;
use crate::monitor::summary::{SummaryCacheGate, SummaryOrigin};

#[derive(Debug, Clone, Default)]
pub struct SummaryOptions {
    pub date: Option<String>,
    pub force: bool,
    /// Print the reply as it streams in.
    pub stream: bool,
}

pub fn run(opts: &SummaryOptions, json: bool) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("summary");
    let date = ctx.date_or_today(opts.date.as_deref())?;
    let messages = load_bucket(&ctx.store, &date)?;

    let snapshot = ctx.config.llm_snapshot();
    let tz = ctx.config.tz();
    let live = opts.stream && !json;
    let streamed = Cell::new(false);

    let generate = |day: &[Message]| -> Result<String, MonitorError> {
        let client = OpenAiCompatClient::new(snapshot.clone())?;
        let request = summary_request(client.config(), day, tz);
        if !live {
            return client.complete(&request);
        }
        let mut stdout = std::io::stdout();
        let text = client.stream_complete(&request, &mut |delta: &str| {
            let _ = write!(stdout, "{delta}");
            let _ = stdout.flush();
        })?;
        let _ = writeln!(stdout);
        streamed.set(true);
        Ok(text)
    };

    let gate = SummaryCacheGate::new(&ctx.store, &ctx.paths.locks_dir);
    let outcome = match gate.get_or_refresh(&date, opts.force, &messages, generate) {
        Ok(outcome) => outcome,
        Err(err) => {
            report.monitor_issue(&err);
            let _ = audit::append_event(
                &ctx.paths,
                "summary",
                "error",
                &format!("date={date} code={}", err.code()),
            );
            return Ok(report);
        }
    };

    report.detail(format!(
        "date={date} origin={} messages={}",
        outcome.origin.as_str(),
        outcome.message_count
    ));
    if !streamed.get() {
        report.detail(outcome.content.clone());
    }
    if outcome.origin == SummaryOrigin::Generated {
        audit::append_event(
            &ctx.paths,
            "summary",
            "ok",
            &format!("date={date} model={} messages={}", snapshot.model, outcome.message_count),
        )?;
    }
    report.set_data(&outcome)?;
    Ok(report)
}
