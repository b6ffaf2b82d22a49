//! Command actions exposed to the agent runtime.

mod open_loop_trading;
mod pipeline;
mod retrieve_volatility_state;

pub use open_loop_trading::OpenLoopTrading;
pub use pipeline::{CommandHandler, CommandSpec, PipelineOutcome, PreconditionUnmet};
pub use retrieve_volatility_state::RetrieveVolatilityState;

use async_trait::async_trait;
use serde::Serialize;

use crate::channels::{IncomingMessage, ResponseSink};
use crate::context::ConversationContext;

/// Reply sent when the extracted parameters fail validation.
pub const INVALID_PARAMS_TEXT: &str = "Invalid query params. Please check the inputs.";

/// Terminal result of one action invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "text", rename_all = "snake_case")]
pub enum CommandResult {
    Success(String),
    Failure(String),
}

impl CommandResult {
    pub fn text(&self) -> &str {
        match self {
            Self::Success(text) | Self::Failure(text) => text,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// One example exchange shown to the action selector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionExample {
    pub user: &'static str,
    pub reply: &'static str,
}

/// A named capability the runtime can route a message to.
#[async_trait]
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    fn similes(&self) -> &'static [&'static str] {
        &[]
    }

    fn description(&self) -> &'static str;

    fn examples(&self) -> Vec<ActionExample> {
        Vec::new()
    }

    /// Whether the action applies at all. `false` means "not applicable",
    /// never an error.
    async fn validate(&self, message: &IncomingMessage) -> bool;

    /// Run the action. Emits exactly one response to `sink`.
    async fn handle(
        &self,
        message: &IncomingMessage,
        state: Option<ConversationContext>,
        sink: &dyn ResponseSink,
    ) -> CommandResult;

    /// Whether `token` names this action, by name or simile.
    fn answers_to(&self, token: &str) -> bool {
        let token = token.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        self.name() == token || self.similes().iter().any(|s| *s == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn result_serializes_with_status_tag() {
        let value = serde_json::to_value(CommandResult::Failure(INVALID_PARAMS_TEXT.into())).unwrap();
        assert_eq!(value["status"], "failure");
        assert_eq!(value["text"], INVALID_PARAMS_TEXT);
    }
}
