use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use super::ActionExample;
use super::pipeline::CommandSpec;
use crate::error::Error;
use crate::prompt::{PromptTemplate, TemplateSpec};
use crate::schema::{OPEN_LOOP_TRADING_FIELDS, OpenLoopTradingRequest};
use crate::xtreamly::TradingService;

pub(crate) fn template_spec() -> TemplateSpec<'static> {
    TemplateSpec::new(OPEN_LOOP_TRADING_FIELDS)
        .note(
            "⚠️ All fields are required. If any is missing, ask the user to provide it. \
             Do not make assumptions or guesses.",
        )
        .example(
            "Example:",
            json!({"amount": 1000, "risk": false, "stopLoss": 10}),
        )
}

/// Opens a loop trading strategy.
pub struct OpenLoopTrading {
    trading: Arc<dyn TradingService>,
    template: PromptTemplate,
}

impl OpenLoopTrading {
    pub fn new(trading: Arc<dyn TradingService>) -> Self {
        Self {
            trading,
            template: template_spec().build(),
        }
    }
}

/// Success reply for an opened strategy.
pub(crate) fn confirmation(request: &OpenLoopTradingRequest) -> String {
    format!(
        "Opened a loop trading strategy for: ${} | stopLoss {}% | {} risk",
        request.amount().normalize(),
        request.stop_loss().normalize(),
        request.risk_label()
    )
}

#[async_trait]
impl CommandSpec for OpenLoopTrading {
    type Request = OpenLoopTradingRequest;

    const NAME: &'static str = "OPEN_LOOP_TRADING";
    const SIMILES: &'static [&'static str] = &["OPEN_LOOP_TRADING"];
    const DESCRIPTION: &'static str = "Opens a new loop trading strategy.";
    const FAULT_TEXT: &'static str =
        "❌ An error occurred while opening your loop trading position. Please try again later.";

    fn template(&self) -> &PromptTemplate {
        &self.template
    }

    fn examples(&self) -> Vec<ActionExample> {
        vec![ActionExample {
            user: "Open my loop trading position for $1000, with stop loss 14 and be risky.",
            reply: "Opened a loop trading strategy for: $1000 | stopLoss 14% | high risk",
        }]
    }

    async fn dispatch(&self, request: OpenLoopTradingRequest) -> Result<String, Error> {
        let position = self.trading.open_loop(&request).await?;
        tracing::info!(
            action = Self::NAME,
            position_id = %position.id,
            "Opened loop trading strategy"
        );
        Ok(confirmation(&request))
    }
}
