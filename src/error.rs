use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("invalid request: {0}")]
    Validation(String),
    #[error("no conversation records for {0}")]
    NoMessages(String),
    #[error("no API key configured; set CHATMON_LLM_API_KEY or run `chatmon config set --api-key`")]
    MissingApiKey,
    #[error("API key rejected by provider (401)")]
    InvalidCredential,
    #[error("provider rate limit hit (429); try again later")]
    RateLimited,
    #[error("provider API call failed ({status}): {body}")]
    Api { status: u16, body: String },
    #[error("provider request failed: {0}")]
    Transport(String),
    #[error("storage failure: {0}")]
    Storage(String),
    #[error("a summary for {0} is already being generated")]
    SummaryInFlight(String),
}

impl MonitorError {
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => Self::InvalidCredential,
            429 => Self::RateLimited,
            _ => Self::Api { status, body },
        }
    }

    /// Stable machine-readable code for reports and audit lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E001_VALIDATION",
            Self::NoMessages(_) => "E002_NO_MESSAGES",
            Self::MissingApiKey => "E003_MISSING_API_KEY",
            Self::InvalidCredential => "E004_INVALID_CREDENTIAL",
            Self::RateLimited => "E005_RATE_LIMITED",
            Self::Api { .. } => "E006_API",
            Self::Transport(_) => "E007_TRANSPORT",
            Self::Storage(_) => "E008_STORAGE",
            Self::SummaryInFlight(_) => "E009_SUMMARY_IN_FLIGHT",
        }
    }
}

impl From<reqwest::Error> for MonitorError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
