use crate::error::MonitorError;
use crate::monitor::message::Message;
use chrono::Local;
use chrono_tz::Tz;
use reqwest::blocking::{Client, Response};
use serde::Serialize;
use serde_json::{Value, json};
use std::io::Read;
use std::time::Duration;

pub const REQUEST_TIMEOUT_SECS: u64 = 120;
pub const PROMPT_MESSAGE_CHARS: usize = 500;
pub const DEFAULT_CONTEXT_LENGTH: usize = 8_000;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;
pub const DEFAULT_MAX_TOKENS: u32 = 2_000;
const TRUNCATION_MARKER: &str = "\n\n...(content truncated)";

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a learning-summary assistant. The user will give you one day of their conversations with various AI assistants.
Analyse them and write a short, structured daily learning summary with these parts:
1. Topics: the main subjects discussed today (2-5).
2. Key takeaways: the most important facts or insights (3-8 bullets).
3. Practical notes: techniques that can be applied right away.
4. Overview: number of conversations, platforms involved, main areas.
5. Next steps: what to study next based on today.
Keep it concise and clearly formatted.";

#[derive(Debug, Clone, Copy)]
pub struct ModelPreset {
    pub id: &'static str,
    pub context_length: usize,
}

#[derive(Debug, Clone, Copy)]
pub struct ProviderPreset {
    pub key: &'static str,
    pub name: &'static str,
    pub api_url: &'static str,
    pub default_model: &'static str,
    pub models: &'static [ModelPreset],
}

pub const PROVIDERS: &[ProviderPreset] = &[
    ProviderPreset {
        key: "moonshot",
        name: "Moonshot / Kimi",
        api_url: "https://api.moonshot.cn/v1/chat/completions",
        default_model: "kimi-k2.5",
        models: &[
            ModelPreset { id: "kimi-k2.5", context_length: 128_000 },
            ModelPreset { id: "moonshot-v1-8k", context_length: 8_000 },
            ModelPreset { id: "moonshot-v1-32k", context_length: 32_000 },
            ModelPreset { id: "moonshot-v1-128k", context_length: 128_000 },
        ],
    },
    ProviderPreset {
        key: "openai",
        name: "OpenAI",
        api_url: "https://api.openai.com/v1/chat/completions",
        default_model: "gpt-4o-mini",
        models: &[
            ModelPreset { id: "gpt-4o-mini", context_length: 128_000 },
            ModelPreset { id: "gpt-4o", context_length: 128_000 },
            ModelPreset { id: "gpt-3.5-turbo", context_length: 16_000 },
        ],
    },
    ProviderPreset {
        key: "deepseek",
        name: "DeepSeek",
        api_url: "https://api.deepseek.com/v1/chat/completions",
        default_model: "deepseek-chat",
        models: &[
            ModelPreset { id: "deepseek-chat", context_length: 64_000 },
            ModelPreset { id: "deepseek-reasoner", context_length: 64_000 },
        ],
    },
    ProviderPreset {
        key: "zhipu",
        name: "Zhipu / GLM",
        api_url: "https://open.bigmodel.cn/api/paas/v4/chat/completions",
        default_model: "glm-4-flash",
        models: &[
            ModelPreset { id: "glm-4-flash", context_length: 128_000 },
            ModelPreset { id: "glm-4", context_length: 128_000 },
        ],
    },
    ProviderPreset {
        key: "minimax",
        name: "MiniMax",
        api_url: "https://api.minimax.chat/v1/text/chatcompletion_v2",
        default_model: "MiniMax-M2.5",
        models: &[ModelPreset { id: "MiniMax-M2.5", context_length: 100_000 }],
    },
    ProviderPreset {
        key: "custom",
        name: "Custom (OpenAI-compatible)",
        api_url: "",
        default_model: "custom-model",
        models: &[ModelPreset { id: "custom-model", context_length: 8_000 }],
    },
];

pub fn provider_preset(key: &str) -> Option<&'static ProviderPreset> {
    let key = key.trim().to_ascii_lowercase();
    PROVIDERS.iter().find(|p| p.key == key)
}

/// Context window of a known model, or the conservative default.
pub fn context_length_for(provider: &str, model: &str) -> usize {
    provider_preset(provider)
        .and_then(|p| p.models.iter().find(|m| m.id == model))
        .map(|m| m.context_length)
        .unwrap_or(DEFAULT_CONTEXT_LENGTH)
}

/// Frozen view of the provider settings used for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LlmConfig {
    pub provider: String,
    pub api_url: String,
    pub model: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub context_length: usize,
    pub timeout_secs: u64,
}

impl LlmConfig {
    /// Character budget for conversation text, sized from the model's
    /// context window.
    pub fn max_input_chars(&self) -> usize {
        (self.context_length as f64 * 1.5 * 0.7).floor() as usize
    }

    pub fn masked_api_key(&self) -> String {
        let chars: Vec<char> = self.api_key.chars().collect();
        match chars.len() {
            0 => "(unset)".to_string(),
            n if n <= 8 => "****".to_string(),
            n => format!(
                "{}****{}",
                chars[..4].iter().collect::<String>(),
                chars[n - 4..].iter().collect::<String>()
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

fn clock_time(message: &Message, tz: Option<Tz>) -> String {
    match tz {
        Some(tz) => message.timestamp.with_timezone(&tz).format("%H:%M:%S").to_string(),
        None => message.timestamp.with_timezone(&Local).format("%H:%M:%S").to_string(),
    }
}

/// One `[time - platform] Speaker: text` block per message, each capped at
/// `PROMPT_MESSAGE_CHARS`, the whole capped at `max_chars`.
pub fn build_prompt_text(messages: &[Message], max_chars: usize, tz: Option<Tz>) -> String {
    let text = messages
        .iter()
        .map(|m| {
            let platform = if m.platform.is_empty() {
                "unknown"
            } else {
                m.platform.as_str()
            };
            let body: String = m.content.chars().take(PROMPT_MESSAGE_CHARS).collect();
            format!(
                "[{} - {platform}] {}: {body}",
                clock_time(m, tz),
                m.role.speaker()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    if text.chars().count() > max_chars {
        let mut cut: String = text.chars().take(max_chars).collect();
        cut.push_str(TRUNCATION_MARKER);
        cut
    } else {
        text
    }
}

pub fn summary_request(config: &LlmConfig, messages: &[Message], tz: Option<Tz>) -> Vec<ChatMessage> {
    let prompt_text = build_prompt_text(messages, config.max_input_chars(), tz);
    vec![
        ChatMessage::system(config.system_prompt.clone()),
        ChatMessage::user(format!(
            "Here are my conversations with AI assistants today. Please write my learning summary:\n\n{prompt_text}"
        )),
    ]
}

fn extract_openai_compatible_text(json: &Value) -> Option<String> {
    let first = json.get("choices")?.as_array()?.first()?;
    let content = first.get("message")?.get("content")?;
    match content {
        Value::String(s) => Some(s.to_string()),
        Value::Array(parts) => {
            let chunks: Vec<&str> = parts
                .iter()
                .filter_map(|part| part.get("text").and_then(Value::as_str))
                .collect();
            if chunks.is_empty() {
                None
            } else {
                Some(chunks.join("\n"))
            }
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseEvent {
    Delta(String),
    Done,
    Skip,
}

/// Classify one line of an event stream. Comments, keep-alives, frames
/// without content, and frames that are not JSON are skipped.
pub fn parse_sse_line(line: &str) -> SseEvent {
    let Some(data) = line.trim().strip_prefix("data:") else {
        return SseEvent::Skip;
    };
    let data = data.trim_start();
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(json) = serde_json::from_str::<Value>(data) else {
        return SseEvent::Skip;
    };
    match json.pointer("/choices/0/delta/content").and_then(Value::as_str) {
        Some(delta) if !delta.is_empty() => SseEvent::Delta(delta.to_string()),
        _ => SseEvent::Skip,
    }
}

/// Reassembles lines from arbitrarily split network reads and accumulates
/// the streamed text.
#[derive(Debug, Default)]
pub struct SseAccumulator {
    pending: Vec<u8>,
    text: String,
    done: bool,
}

impl SseAccumulator {
    /// Feed raw bytes; returns the deltas completed by this chunk.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut deltas = Vec::new();
        if self.done {
            return deltas;
        }
        self.pending.extend_from_slice(bytes);
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            match parse_sse_line(&String::from_utf8_lossy(&line)) {
                SseEvent::Delta(delta) => {
                    self.text.push_str(&delta);
                    deltas.push(delta);
                }
                SseEvent::Done => {
                    self.done = true;
                    self.pending.clear();
                    break;
                }
                SseEvent::Skip => {}
            }
        }
        deltas
    }

    /// Flush a trailing line that arrived without a newline.
    pub fn finish(mut self) -> String {
        if !self.done && !self.pending.is_empty() {
            let line = String::from_utf8_lossy(&self.pending).into_owned();
            if let SseEvent::Delta(delta) = parse_sse_line(&line) {
                self.text.push_str(&delta);
            }
        }
        self.text
    }

    pub fn is_done(&self) -> bool {
        self.done
    }
}

pub trait ChatCompletion {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, MonitorError>;

    /// Streams deltas to `on_chunk` and returns the full text.
    fn stream_complete(
        &self,
        messages: &[ChatMessage],
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String, MonitorError>;
}

/// Client for `/chat/completions`-style endpoints with bearer auth.
pub struct OpenAiCompatClient {
    config: LlmConfig,
    client: Client,
}

impl OpenAiCompatClient {
    pub fn new(config: LlmConfig) -> Result<Self, MonitorError> {
        if config.api_key.trim().is_empty() {
            return Err(MonitorError::MissingApiKey);
        }
        if config.api_url.trim().is_empty() {
            return Err(MonitorError::Validation(format!(
                "provider `{}` has no API URL; set llm.api_url",
                config.provider
            )));
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build()?;
        Ok(Self { config, client })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    fn payload(&self, messages: &[ChatMessage], max_tokens: u32, stream: bool) -> Value {
        let mut payload = json!({
            "model": self.config.model,
            "messages": messages,
            "temperature": self.config.temperature,
            "max_tokens": max_tokens,
        });
        if stream {
            payload["stream"] = Value::Bool(true);
        }
        payload
    }

    fn send(&self, payload: &Value) -> Result<Response, MonitorError> {
        let response = self
            .client
            .post(self.config.api_url.trim())
            .bearer_auth(self.config.api_key.trim())
            .json(payload)
            .send()?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(MonitorError::from_status(status.as_u16(), body));
        }
        Ok(response)
    }

    fn complete_with_limit(
        &self,
        messages: &[ChatMessage],
        max_tokens: u32,
    ) -> Result<String, MonitorError> {
        let response = self.send(&self.payload(messages, max_tokens, false))?;
        let status = response.status().as_u16();
        let json: Value = response.json()?;
        extract_openai_compatible_text(&json).ok_or_else(|| MonitorError::Api {
            status,
            body: "response missing choices[0].message.content".to_string(),
        })
    }

    /// Minimal round trip to check the URL, key, and model.
    pub fn test_connection(&self) -> Result<String, MonitorError> {
        self.complete_with_limit(&[ChatMessage::user("Hello")], 10)
    }
}

impl ChatCompletion for OpenAiCompatClient {
    fn complete(&self, messages: &[ChatMessage]) -> Result<String, MonitorError> {
        self.complete_with_limit(messages, self.config.max_tokens)
    }

    fn stream_complete(
        &self,
        messages: &[ChatMessage],
        on_chunk: &mut dyn FnMut(&str),
    ) -> Result<String, MonitorError> {
        let mut response = self.send(&self.payload(messages, self.config.max_tokens, true))?;
        let mut accumulator = SseAccumulator::default();
        let mut buf = [0u8; 4096];
        loop {
            let read = response
                .read(&mut buf)
                .map_err(|err| MonitorError::Transport(err.to_string()))?;
            if read == 0 {
                break;
            }
            for delta in accumulator.push(&buf[..read]) {
                on_chunk(&delta);
            }
            if accumulator.is_done() {
                break;
            }
        }
        Ok(accumulator.finish())
    }
}
