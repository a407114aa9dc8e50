use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

fn chatmon(home: &Path) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("chatmon");
    cmd.current_dir(home)
        .env("CHATMON_HOME", home)
        .env("CHATMON_TIMEZONE", "UTC");
    cmd
}

fn seed(home: &Path) {
    chatmon(home)
        .args(["add", "--platform", "chatgpt", "--date", "2024-01-01"])
        .args(["--text", "User: explain rust lifetimes\nAI: lifetimes name how long borrows live"])
        .assert()
        .success();
    chatmon(home)
        .args(["add", "--platform", "claude", "--date", "2024-01-02"])
        .args(["--text", "User: write a haiku about rust\nAI: borrow checker hums"])
        .assert()
        .success();
    chatmon(home)
        .args(["add", "--platform", "claude", "--date", "2024-02-01"])
        .args(["--text", "User: out of range question"])
        .assert()
        .success();
}

#[test]
fn json_export_groups_platform_sessions() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    let out = chatmon(tmp.path())
        .args(["--json", "export", "--from", "2024-01-01", "--to", "2024-01-31"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&out).expect("json");
    let export = &report["data"];

    assert_eq!(export["stats"]["totalMessages"], 4);
    assert_eq!(export["stats"]["dateFrom"], "2024-01-01");
    let chatgpt = export["platforms"]["chatgpt"].as_array().expect("chatgpt sessions");
    assert_eq!(chatgpt[0]["sessionIndex"], 1);
    assert_eq!(chatgpt[0]["messages"][0]["date"], "2024-01-01");
    assert!(export["platforms"]["claude"].is_array());

    let sessions: u64 = export["platforms"]
        .as_object()
        .expect("platforms")
        .values()
        .map(|s| s.as_array().map_or(0, |a| a.len() as u64))
        .sum();
    assert_eq!(export["stats"]["totalSessions"], sessions);
}

#[test]
fn text_export_filters_and_writes_file() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());
    let target = tmp.path().join("context.txt");

    chatmon(tmp.path())
        .args(["export", "--from", "2024-01-01", "--to", "2024-01-31"])
        .args(["--platform", "claude", "--keyword", "haiku", "--format", "qa"])
        .arg("--output")
        .arg(&target)
        .assert()
        .success()
        .stdout(predicates::str::contains("messages=1"));

    let text = fs::read_to_string(&target).expect("read export");
    assert_eq!(text.trim(), "Q: write a haiku about rust");
}

#[test]
fn conversation_export_with_guide_labels_platforms() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    chatmon(tmp.path())
        .args(["export", "--from", "2024-01-01", "--to", "2024-01-02"])
        .args(["--format", "conversation", "--guide"])
        .assert()
        .success()
        .stdout(predicates::str::contains("--- ChatGPT ---"))
        .stdout(predicates::str::contains("AI: borrow checker hums"))
        .stdout(predicates::str::contains("based on the conversation above"));
}

#[test]
fn export_without_range_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    chatmon(tmp.path())
        .args(["export", "--to", "2024-01-31"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("E001_VALIDATION"));
}

#[test]
fn out_of_range_session_gap_is_a_validation_issue() {
    let tmp = tempdir().expect("tempdir");
    seed(tmp.path());

    chatmon(tmp.path())
        .args(["export", "--from", "2024-01-01", "--to", "2024-01-31"])
        .args(["--gap-minutes", "200000000000000"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("E001_VALIDATION: session gap must be between 1 and"))
        .stderr(predicates::str::contains("panicked").not());
}

#[test]
fn unknown_text_format_is_rejected() {
    let tmp = tempdir().expect("tempdir");
    chatmon(tmp.path())
        .args(["export", "--from", "2024-01-01", "--to", "2024-01-02", "--format", "yaml"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("unknown export format"));
}
