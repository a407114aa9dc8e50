use anyhow::{Context, Result};
use std::fs;
use std::io::Read;

use crate::commands::{CommandReport, MonitorContext};
use crate::monitor::audit;
use crate::monitor::capture::{
    CaptureFrame, PlatformAdapter, QuiescenceGate, TranscriptAdapter, resolve_platform,
    turn_identity,
};
use crate::monitor::dedup::append_message;
use crate::monitor::message::{Message, bucket_date};
use crate::monitor::warn::{self, WarnEvent};

#[derive(Debug, Clone)]
pub struct CaptureOptions {
    /// `-` reads stdin.
    pub input: String,
    pub platform: Option<String>,
}

pub fn read_input(input: &str) -> Result<String> {
    if input.trim() == "-" {
        let mut raw = String::new();
        std::io::stdin()
            .read_to_string(&mut raw)
            .context("failed to read stdin")?;
        return Ok(raw);
    }
    fs::read_to_string(input).with_context(|| format!("failed to read {input}"))
}

/// One JSON frame per line; blank lines are ignored and malformed ones are
/// skipped with a warning.
fn parse_frames(raw: &str) -> (Vec<CaptureFrame>, usize) {
    let mut frames = Vec::new();
    let mut skipped = 0usize;
    for (idx, line) in raw.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match serde_json::from_str::<CaptureFrame>(trimmed) {
            Ok(frame) => frames.push(frame),
            Err(err) => {
                skipped += 1;
                warn::emit(WarnEvent {
                    code: "FRAME_INVALID",
                    stage: "capture",
                    action: "skip-frame",
                    key: &format!("line-{}", idx + 1),
                    reason: "parse-failed",
                    err: &err.to_string(),
                });
            }
        }
    }
    (frames, skipped)
}

pub fn run(opts: &CaptureOptions) -> Result<CommandReport> {
    let ctx = MonitorContext::load()?;
    let mut report = CommandReport::new("capture");

    let raw = read_input(&opts.input)?;
    let (frames, skipped) = parse_frames(&raw);
    let mut gate = QuiescenceGate::new(
        ctx.config.capture.debounce_ms,
        ctx.config.capture.min_content_chars,
    );

    let mut ready = Vec::new();
    for frame in &frames {
        let hint = opts.platform.as_deref().unwrap_or(&frame.platform);
        let adapter = TranscriptAdapter::new(resolve_platform(hint, frame.url.as_deref()));
        for (position, raw) in adapter.extract_messages(frame).into_iter().enumerate() {
            let identity = turn_identity(&raw, position);
            gate.observe(&identity, raw, frame.observed_at);
        }
        ready.extend(gate.drain_ready(frame.observed_at));
    }
    ready.extend(gate.flush());

    let tz = ctx.config.tz();
    let mut stored = 0usize;
    let mut duplicates = 0usize;
    for (raw, at) in ready {
        let message = Message::from_raw(raw, at);
        let date = bucket_date(at, tz);
        if append_message(&ctx.store, &date, message)? {
            stored += 1;
        } else {
            duplicates += 1;
        }
    }

    report.detail(format!("frames={}", frames.len()));
    report.detail(format!("stored={stored}"));
    report.detail(format!("duplicates={duplicates}"));
    if skipped > 0 {
        report.detail(format!("skipped_frames={skipped}"));
    }
    report.set_data(&serde_json::json!({
        "frames": frames.len(),
        "stored": stored,
        "duplicates": duplicates,
        "skippedFrames": skipped,
    }))?;

    audit::append_event(
        &ctx.paths,
        "capture",
        "ok",
        &format!("frames={} stored={stored} duplicates={duplicates}", frames.len()),
    )?;
    Ok(report)
}
