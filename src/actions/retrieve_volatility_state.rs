use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::ActionExample;
use super::pipeline::{CommandSpec, PreconditionUnmet};
use crate::error::Error;
use crate::prompt::{PromptTemplate, TemplateSpec};
use crate::schema::{VOLATILITY_QUERY_FIELDS, VolatilityQueryRequest};
use crate::xtreamly::VolatilityService;

pub(crate) fn template_spec() -> TemplateSpec<'static> {
    TemplateSpec::new(VOLATILITY_QUERY_FIELDS)
        .example(
            "Example for fetching volatility for Ethereum:",
            json!({"symbol": "ETH"}),
        )
        .example(
            "Example for fetching volatility for Bitcoin:",
            json!({"symbol": "BTC"}),
        )
}

/// Retrieves the live volatility state of a symbol.
pub struct RetrieveVolatilityState {
    service: Arc<dyn VolatilityService>,
    template: PromptTemplate,
}

impl RetrieveVolatilityState {
    pub fn new(service: Arc<dyn VolatilityService>) -> Self {
        Self {
            service,
            template: template_spec().build(),
        }
    }
}

#[async_trait]
impl CommandSpec for RetrieveVolatilityState {
    type Request = VolatilityQueryRequest;

    const NAME: &'static str = "RETRIEVE_VOLATILITY_STATE";
    const SIMILES: &'static [&'static str] = &["RETRIEVE_LIVE_VOLATILITY_STATE"];
    const DESCRIPTION: &'static str = "Retrieve live volatility state of a given symbol.";
    const FAULT_TEXT: &'static str =
        "❌ An error occurred while retrieving Xtreamly volatility state. Please try again later.";

    fn template(&self) -> &PromptTemplate {
        &self.template
    }

    fn examples(&self) -> Vec<ActionExample> {
        vec![ActionExample {
            user: "Retrieve Ethereum market volatility state.",
            reply: "ETH price in highly volatile short momentum, requiring protective measures and caution.",
        }]
    }

    async fn precondition(&self) -> Result<(), PreconditionUnmet> {
        if !self.service.api_key_configured() {
            return Err(PreconditionUnmet::new("XTREAMLY_API_KEY is not configured"));
        }
        if !self.service.is_ok().await {
            return Err(PreconditionUnmet::new("Xtreamly health check failed"));
        }
        Ok(())
    }

    async fn dispatch(&self, request: VolatilityQueryRequest) -> Result<String, Error> {
        tracing::info!(
            action = Self::NAME,
            symbol = %request.symbol(),
            "Querying volatility state"
        );
        let state = self.service.state(request.symbol()).await?;
        Ok(state.classification_description)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ExtractionCandidate, validate_as};

    #[test]
    fn template_lists_symbols_and_examples() {
        let template = template_spec().build();
        let text = template.as_str();

        assert!(text.contains("- **symbol** (string, required): The symbol of the token."));
        assert!(text.contains("Supported symbols:\n- ETH\n- BTC"));
        assert!(text.contains("Example for fetching volatility for Bitcoin:"));
    }

    #[test]
    fn template_examples_validate() {
        for example in template_spec().examples() {
            assert!(
                validate_as::<VolatilityQueryRequest>(&ExtractionCandidate::new(example.clone()))
                    .is_ok()
            );
        }
    }
}
