//! Structured extraction through a language model.

mod openai;

pub use openai::OpenAiExtractor;

use std::sync::LazyLock;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;

use crate::error::LlmError;
use crate::prompt::PromptText;
use crate::schema::{ExtractionCandidate, FieldSpec};

/// Produces a best-effort candidate object from a rendered prompt.
///
/// The candidate is never trusted; callers run it through
/// [`crate::schema::validate`]. A transport or model failure is an error,
/// an unhelpful answer is just a bad candidate.
#[async_trait]
pub trait StructuredExtractor: Send + Sync {
    fn provider(&self) -> &str;

    async fn extract(
        &self,
        prompt: &PromptText,
        fields: &[FieldSpec],
    ) -> Result<ExtractionCandidate, LlmError>;
}

static FENCED_JSON: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").ok());

/// Pull the first JSON object out of a model reply.
///
/// Accepts bare JSON, a fenced ```json block, or an object embedded in
/// prose. Returns `None` when nothing parses.
pub fn extract_json_object(reply: &str) -> Option<Value> {
    let trimmed = reply.trim();
    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        return Some(value);
    }

    if let Some(re) = FENCED_JSON.as_ref()
        && let Some(body) = re.captures(trimmed).and_then(|c| c.get(1))
        && let Ok(value) = serde_json::from_str::<Value>(body.as_str())
    {
        return Some(value);
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&trimmed[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_bare_json() {
        assert_eq!(
            extract_json_object(r#"{"symbol": "ETH"}"#),
            Some(json!({"symbol": "ETH"}))
        );
    }

    #[test]
    fn parses_fenced_block() {
        let reply = "Sure thing.\n```json\n{\n    \"amount\": 1000,\n    \"stopLoss\": 14,\n    \"risk\": true\n}\n```";
        assert_eq!(
            extract_json_object(reply),
            Some(json!({"amount": 1000, "stopLoss": 14, "risk": true}))
        );
    }

    #[test]
    fn parses_object_inside_prose() {
        let reply = "Here you go: {\"symbol\": \"BTC\"} hope that helps";
        assert_eq!(extract_json_object(reply), Some(json!({"symbol": "BTC"})));
    }

    #[test]
    fn gives_up_on_garbage() {
        assert_eq!(extract_json_object("I need more details."), None);
        assert_eq!(extract_json_object("} nope {"), None);
    }
}
