use serde_json::Value;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::tempdir;

/// Answers `count` chat-completion requests with `reply`, then returns the
/// request bodies it saw.
fn fake_llm(count: usize, status: &'static str, reply: &'static str) -> (String, thread::JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let url = format!("http://{}/v1/chat/completions", listener.local_addr().expect("addr"));
    let handle = thread::spawn(move || {
        let mut bodies = Vec::new();
        for _ in 0..count {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone"));
            let mut content_length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("header");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some(v) = line.to_ascii_lowercase().strip_prefix("content-length:") {
                    content_length = v.trim().parse().unwrap_or(0);
                }
            }
            let mut body = vec![0u8; content_length];
            reader.read_exact(&mut body).expect("body");
            bodies.push(String::from_utf8_lossy(&body).into_owned());
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{reply}",
                reply.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
        }
        bodies
    });
    (url, handle)
}

fn chatmon(home: &Path, url: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("chatmon");
    cmd.current_dir(home)
        .env("CHATMON_HOME", home)
        .env("CHATMON_TIMEZONE", "UTC")
        .env("CHATMON_LLM_PROVIDER", "custom")
        .env("CHATMON_LLM_API_URL", url)
        .env("CHATMON_LLM_API_KEY", "sk-test-key-123456")
        .env("CHATMON_LLM_TIMEOUT_SECS", "5");
    cmd
}

fn seed(home: &Path, url: &str) {
    chatmon(home, url)
        .args(["add", "--platform", "deepseek", "--date", "2024-01-02"])
        .args(["--text", "User: what is a monad?\nAI: a monoid in the category of endofunctors"])
        .assert()
        .success();
}

const OK_REPLY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"Today: monads."}}]}"#;

#[test]
fn summary_is_generated_once_then_served_from_cache() {
    let tmp = tempdir().expect("tempdir");
    let (url, server) = fake_llm(1, "200 OK", OK_REPLY);
    seed(tmp.path(), &url);

    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=generated"))
        .stdout(predicates::str::contains("Today: monads."));

    let out = chatmon(tmp.path(), &url)
        .args(["--json", "summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let report: Value = serde_json::from_slice(&out).expect("json");
    assert_eq!(report["data"]["origin"], "cached");
    assert_eq!(report["data"]["content"], "Today: monads.");

    let bodies = server.join().expect("server");
    let request: Value = serde_json::from_str(&bodies[0]).expect("request json");
    assert_eq!(request["model"], "custom-model");
    assert_eq!(request["messages"][0]["role"], "system");
    let prompt = request["messages"][1]["content"].as_str().expect("prompt");
    assert!(prompt.contains("- deepseek] User: what is a monad?"));
    assert!(prompt.contains("] AI: a monoid"));
}

#[test]
fn confirmed_summary_overrides_generation() {
    let tmp = tempdir().expect("tempdir");
    let (url, server) = fake_llm(1, "200 OK", OK_REPLY);
    seed(tmp.path(), &url);

    chatmon(tmp.path(), &url)
        .args(["confirm", "--date", "2024-01-02", "--text", "My own notes on monads."])
        .assert()
        .success();

    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=confirmed"))
        .stdout(predicates::str::contains("My own notes on monads."));

    chatmon(tmp.path(), &url)
        .args(["add", "--platform", "deepseek", "--date", "2024-01-02"])
        .args(["--text", "User: and a functor?"])
        .assert()
        .success();
    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=confirmed messages=3"));

    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02", "--force"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=generated"));
    server.join().expect("server");

    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=confirmed"));

    chatmon(tmp.path(), &url)
        .args(["confirm", "--date", "2024-01-02", "--clear"])
        .assert()
        .success();
    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .success()
        .stdout(predicates::str::contains("origin=cached"))
        .stdout(predicates::str::contains("Today: monads."));
}

#[test]
fn empty_day_reports_no_messages() {
    let tmp = tempdir().expect("tempdir");
    chatmon(tmp.path(), "http://127.0.0.1:9/v1/chat/completions")
        .args(["summary", "--date", "2023-12-31"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("E002_NO_MESSAGES"));
}

#[test]
fn rejected_key_is_reported_and_not_cached() {
    let tmp = tempdir().expect("tempdir");
    let (url, server) = fake_llm(1, "401 Unauthorized", r#"{"error":"invalid key"}"#);
    seed(tmp.path(), &url);

    chatmon(tmp.path(), &url)
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("E004_INVALID_CREDENTIAL"));
    server.join().expect("server");

    let store = std::fs::read_to_string(tmp.path().join("store.json")).expect("store");
    assert!(!store.contains("summary_2024-01-02"));
}

#[test]
fn missing_api_key_fails_before_any_request() {
    let tmp = tempdir().expect("tempdir");
    let url = "http://127.0.0.1:9/v1/chat/completions";
    seed(tmp.path(), url);

    chatmon(tmp.path(), url)
        .env("CHATMON_LLM_API_KEY", "")
        .args(["summary", "--date", "2024-01-02"])
        .assert()
        .failure()
        .stderr(predicates::str::contains("E003_MISSING_API_KEY"));
}

#[test]
fn test_api_reports_reply() {
    let tmp = tempdir().expect("tempdir");
    let (url, server) = fake_llm(1, "200 OK", r#"{"choices":[{"message":{"content":"pong"}}]}"#);

    chatmon(tmp.path(), &url)
        .arg("test-api")
        .assert()
        .success()
        .stdout(predicates::str::contains("connection ok; reply=pong"));

    let bodies = server.join().expect("server");
    let request: Value = serde_json::from_str(&bodies[0]).expect("json");
    assert_eq!(request["max_tokens"], 10);
}
