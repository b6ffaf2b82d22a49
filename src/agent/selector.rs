//! LLM-backed action selection.
//!
//! Reuses the extraction pipeline: a template generated from a single
//! enumerated `action` field, one extraction, then schema validation. Any
//! answer outside the registered names counts as no selection.

use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::actions::Action;
use crate::context::ConversationContext;
use crate::error::{Error, PipelineStage};
use crate::llm::StructuredExtractor;
use crate::prompt::{TemplateSpec, render};
use crate::schema::{Constraint, ExtractionCandidate, FieldKind, FieldSpec, validate};

pub const NO_ACTION: &str = "NONE";

const HEADING: &str = "Choose the action that best answers the last user message:";

pub struct ActionSelector {
    extractor: Arc<dyn StructuredExtractor>,
    timeout: Duration,
}

impl ActionSelector {
    pub fn new(extractor: Arc<dyn StructuredExtractor>, timeout: Duration) -> Self {
        Self { extractor, timeout }
    }

    pub fn extractor(&self) -> Arc<dyn StructuredExtractor> {
        Arc::clone(&self.extractor)
    }

    /// Pick one of `actions` for the conversation, or `None`.
    pub async fn select(
        &self,
        context: &ConversationContext,
        actions: &[Arc<dyn Action>],
    ) -> Result<Option<&'static str>, Error> {
        if actions.is_empty() {
            return Ok(None);
        }

        let fields = selection_fields(actions);
        let catalog = catalog(actions);
        let template = TemplateSpec::new(&fields)
            .heading(HEADING)
            .note(&catalog)
            .build();
        let prompt = render(&template, context);

        let candidate = tokio::time::timeout(self.timeout, self.extractor.extract(&prompt, &fields))
            .await
            .map_err(|_| Error::Timeout {
                stage: PipelineStage::Extracting,
                after: self.timeout,
            })??;

        Ok(chosen(&candidate, &fields, actions))
    }
}

fn selection_fields(actions: &[Arc<dyn Action>]) -> Vec<FieldSpec> {
    let mut names: Vec<&'static str> = actions.iter().map(|a| a.name()).collect();
    names.push(NO_ACTION);

    vec![FieldSpec {
        name: "action",
        label: "Action",
        kind: FieldKind::String,
        required: true,
        constraint: Some(Constraint::OneOf(Cow::Owned(names))),
        unit: None,
        description: "Name of the action to run, or NONE if no action fits.",
    }]
}

fn catalog(actions: &[Arc<dyn Action>]) -> String {
    let mut lines = vec!["Available actions:".to_string()];
    for action in actions {
        lines.push(format!("- {}: {}", action.name(), action.description()));
        for example in action.examples() {
            lines.push(format!("  user: {}", example.user));
        }
    }
    lines.join("\n")
}

fn chosen(
    candidate: &ExtractionCandidate,
    fields: &[FieldSpec],
    actions: &[Arc<dyn Action>],
) -> Option<&'static str> {
    let validated = match validate(candidate, fields) {
        Ok(validated) => validated,
        Err(errors) => {
            tracing::debug!("Action selection rejected: {}", errors);
            return None;
        }
    };
    let name = validated.text("action")?;
    actions
        .iter()
        .map(|a| a.name())
        .find(|registered| *registered == name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{ActionExample, CommandResult};
    use crate::channels::{IncomingMessage, ResponseSink};
    use async_trait::async_trait;
    use serde_json::json;

    struct Named(&'static str);

    #[async_trait]
    impl Action for Named {
        fn name(&self) -> &'static str {
            self.0
        }

        fn description(&self) -> &'static str {
            "test action"
        }

        fn examples(&self) -> Vec<ActionExample> {
            vec![ActionExample {
                user: "do the thing",
                reply: "done",
            }]
        }

        async fn validate(&self, _message: &IncomingMessage) -> bool {
            true
        }

        async fn handle(
            &self,
            _message: &IncomingMessage,
            _state: Option<ConversationContext>,
            _sink: &dyn ResponseSink,
        ) -> CommandResult {
            CommandResult::Success(String::new())
        }
    }

    fn actions() -> Vec<Arc<dyn Action>> {
        vec![
            Arc::new(Named("OPEN_LOOP_TRADING")),
            Arc::new(Named("RETRIEVE_VOLATILITY_STATE")),
        ]
    }

    #[test]
    fn accepts_registered_names_only() {
        let actions = actions();
        let fields = selection_fields(&actions);

        let pick = |value| chosen(&ExtractionCandidate::new(value), &fields, &actions);
        assert_eq!(
            pick(json!({"action": "RETRIEVE_VOLATILITY_STATE"})),
            Some("RETRIEVE_VOLATILITY_STATE")
        );
        assert_eq!(pick(json!({"action": "NONE"})), None);
        assert_eq!(pick(json!({"action": "open_loop_trading"})), None);
        assert_eq!(pick(json!({})), None);
    }

    #[test]
    fn catalog_lists_descriptions_and_examples() {
        let text = catalog(&actions());
        assert!(text.contains("- OPEN_LOOP_TRADING: test action"));
        assert!(text.contains("  user: do the thing"));
    }
}
