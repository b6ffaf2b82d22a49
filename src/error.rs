//! Error types for Looper.

use std::time::Duration;

use serde::Serialize;

/// Top-level error type for the interpreter.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("API error: {0}")]
    Api(#[from] ApiError),

    #[error("Context error: {0}")]
    Context(#[from] ContextError),

    #[error("Stage {stage} timed out after {after:?}")]
    Timeout {
        stage: PipelineStage,
        after: Duration,
    },
}

/// Command handler pipeline stages.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    Idle,
    ComposingContext,
    Rendering,
    Extracting,
    Validating,
    Dispatching,
    Rejecting,
    Done,
}

impl PipelineStage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ComposingContext => "composing_context",
            Self::Rendering => "rendering",
            Self::Extracting => "extracting",
            Self::Validating => "validating",
            Self::Dispatching => "dispatching",
            Self::Rejecting => "rejecting",
            Self::Done => "done",
        }
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Missing required configuration: {key}. {hint}")]
    MissingRequired { key: String, hint: String },

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// LLM provider errors.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Provider {provider} request failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Provider {provider} rate limited, retry after {retry_after:?}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Authentication failed for provider {provider}")]
    AuthFailed { provider: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Downstream service errors (volatility and trading).
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{service} credential is not configured")]
    MissingCredential { service: String },

    #[error("{service} request failed: {reason}")]
    RequestFailed { service: String, reason: String },

    #[error("{service} returned HTTP {status}: {body}")]
    Status {
        service: String,
        status: u16,
        body: String,
    },

    #[error("Invalid response from {service}: {reason}")]
    InvalidResponse { service: String, reason: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Conversation state composition errors.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Failed to compose state for room {room_id}: {reason}")]
    ComposeFailed { room_id: String, reason: String },

    #[error("Failed to record message in room {room_id}: {reason}")]
    RecordFailed { room_id: String, reason: String },
}

impl Error {
    /// Stable code used as a structured log field.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Config(_) => "config.invalid",
            Self::Llm(err) => match err {
                LlmError::AuthFailed { .. } => "llm.auth_failed",
                LlmError::RateLimited { .. } => "llm.rate_limited",
                LlmError::InvalidResponse { .. } | LlmError::Json(_) => "llm.invalid_response",
                LlmError::RequestFailed { .. } | LlmError::Http(_) => "llm.request_failed",
            },
            Self::Api(err) => match err {
                ApiError::MissingCredential { .. } => "api.missing_credential",
                ApiError::Status { status, .. } if *status == 401 || *status == 403 => {
                    "api.auth_failed"
                }
                ApiError::Status { .. } => "api.http_status",
                ApiError::InvalidResponse { .. } => "api.invalid_response",
                ApiError::RequestFailed { .. } | ApiError::Http(_) => "api.request_failed",
            },
            Self::Context(_) => "context.failed",
            Self::Timeout { .. } => "pipeline.timeout",
        }
    }

    /// Whether a later invocation could reasonably succeed unchanged.
    pub fn retryable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Context(_) => false,
            Self::Llm(err) => !matches!(
                err,
                LlmError::AuthFailed { .. } | LlmError::InvalidResponse { .. } | LlmError::Json(_)
            ),
            Self::Api(err) => match err {
                ApiError::MissingCredential { .. } | ApiError::InvalidResponse { .. } => false,
                ApiError::Status { status, .. } => *status == 429 || *status >= 500,
                ApiError::RequestFailed { .. } | ApiError::Http(_) => true,
            },
            Self::Timeout { .. } => true,
        }
    }
}

/// Result type alias for the interpreter.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_llm_auth_failures() {
        let err = Error::from(LlmError::AuthFailed {
            provider: "openai".to_string(),
        });

        assert_eq!(err.code(), "llm.auth_failed");
        assert!(!err.retryable());
    }

    #[test]
    fn classifies_downstream_status_codes() {
        let forbidden = Error::from(ApiError::Status {
            service: "xtreamly".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        });
        assert_eq!(forbidden.code(), "api.auth_failed");
        assert!(!forbidden.retryable());

        let unavailable = Error::from(ApiError::Status {
            service: "xtreamly".to_string(),
            status: 503,
            body: "maintenance".to_string(),
        });
        assert_eq!(unavailable.code(), "api.http_status");
        assert!(unavailable.retryable());
    }

    #[test]
    fn timeout_display_names_the_stage() {
        let err = Error::Timeout {
            stage: PipelineStage::Extracting,
            after: Duration::from_secs(30),
        };

        assert_eq!(err.code(), "pipeline.timeout");
        assert_eq!(err.to_string(), "Stage extracting timed out after 30s");
    }
}
