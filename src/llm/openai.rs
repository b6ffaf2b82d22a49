//! OpenAI-compatible chat completions extractor.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{StructuredExtractor, extract_json_object};
use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::prompt::PromptText;
use crate::schema::{ExtractionCandidate, FieldSpec, json_schema};

/// Max characters of an error body kept in the error message.
const ERROR_BODY_MAX: usize = 400;

const SYSTEM_PROMPT: &str = "You extract structured parameters from a conversation. \
Reply with a single JSON object that follows this JSON Schema. \
Leave out any field the user has not stated.";

pub struct OpenAiExtractor {
    http: reqwest::Client,
    config: LlmConfig,
}

impl OpenAiExtractor {
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("looper/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn provider_name(&self) -> String {
        self.config.backend.to_string()
    }
}

#[async_trait]
impl StructuredExtractor for OpenAiExtractor {
    fn provider(&self) -> &str {
        self.config.backend.as_str()
    }

    async fn extract(
        &self,
        prompt: &PromptText,
        fields: &[FieldSpec],
    ) -> Result<ExtractionCandidate, LlmError> {
        let schema = serde_json::to_string(&json_schema(fields))?;
        let request = ChatCompletionRequest {
            model: &self.config.model,
            messages: vec![
                RequestMessage {
                    role: "system",
                    content: format!("{SYSTEM_PROMPT}\n{schema}"),
                },
                RequestMessage {
                    role: "user",
                    content: prompt.as_str().to_string(),
                },
            ],
            temperature: self.config.temperature,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };

        let mut http_req = self.http.post(self.endpoint()).json(&request);
        if let Some(key) = &self.config.api_key {
            http_req = http_req.bearer_auth(key.expose_secret());
        }

        tracing::debug!(
            provider = %self.provider_name(),
            model = %self.config.model,
            fields = fields.len(),
            "Requesting structured extraction"
        );

        let response = http_req.send().await.map_err(|e| LlmError::RequestFailed {
            provider: self.provider_name(),
            reason: e.to_string(),
        })?;

        let status = response.status();
        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(LlmError::AuthFailed {
                provider: self.provider_name(),
            });
        }
        if status.as_u16() == 429 {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            return Err(LlmError::RateLimited {
                provider: self.provider_name(),
                retry_after,
            });
        }

        let body = response.text().await?;
        if !status.is_success() {
            let snippet: String = body.chars().take(ERROR_BODY_MAX).collect();
            return Err(LlmError::RequestFailed {
                provider: self.provider_name(),
                reason: format!("HTTP {}: {}", status.as_u16(), snippet),
            });
        }

        let parsed: ChatCompletionResponse =
            serde_json::from_str(&body).map_err(|e| LlmError::InvalidResponse {
                provider: self.provider_name(),
                reason: e.to_string(),
            })?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        candidate_from_reply(&self.provider_name(), &content)
    }
}

/// Parse a reply into a candidate. Any JSON value is a candidate; only an
/// unparseable reply is an error.
fn candidate_from_reply(provider: &str, content: &str) -> Result<ExtractionCandidate, LlmError> {
    match extract_json_object(content) {
        Some(Value::Null) | None => Err(LlmError::InvalidResponse {
            provider: provider.to_string(),
            reason: format!(
                "reply did not contain JSON: {}",
                content.chars().take(ERROR_BODY_MAX).collect::<String>()
            ),
        }),
        Some(value) => Ok(ExtractionCandidate::new(value)),
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    response_format: ResponseFormat,
}

#[derive(Debug, Serialize)]
struct RequestMessage {
    role: &'static str,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessageOut>,
}

#[derive(Debug, Deserialize)]
struct ChatMessageOut {
    content: Option<String>,
}
