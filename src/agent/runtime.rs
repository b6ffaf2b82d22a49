//! Agent runtime: routes each inbound message to at most one action.

use std::sync::Arc;

use crate::actions::{
    Action, CommandHandler, CommandResult, OpenLoopTrading, RetrieveVolatilityState,
};
use crate::channels::{IncomingMessage, OutgoingResponse, ResponseSink};
use crate::character::Character;
use crate::config::{Config, PipelineConfig};
use crate::context::{ChatMessage, ContextComposer, ConversationContext, MemoryComposer};
use crate::error::{Error, PipelineStage};
use crate::llm::{OpenAiExtractor, StructuredExtractor};
use crate::xtreamly::{PaperLoopTrading, TradingService, VolatilityService, XtreamlyClient};

use super::router::{MessageIntent, Router};
use super::selector::ActionSelector;

/// What one call to [`AgentRuntime::process_message`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// An action ran and replied.
    Action {
        name: &'static str,
        result: CommandResult,
    },
    /// The runtime replied itself (help, listings, fallbacks).
    Reply(String),
    /// The user asked to leave. Nothing was sent.
    Quit,
}

pub struct AgentRuntime {
    character: Character,
    actions: Vec<Arc<dyn Action>>,
    composer: Arc<dyn ContextComposer>,
    selector: ActionSelector,
    router: Router,
    limits: PipelineConfig,
}

impl AgentRuntime {
    pub fn new(
        character: Character,
        composer: Arc<dyn ContextComposer>,
        extractor: Arc<dyn StructuredExtractor>,
        limits: PipelineConfig,
    ) -> Self {
        Self {
            character,
            actions: Vec::new(),
            composer,
            selector: ActionSelector::new(extractor, limits.extract_timeout),
            router: Router::new(),
            limits,
        }
    }

    /// Build the runtime with the shipped clients and both commands.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let composer: Arc<dyn ContextComposer> = Arc::new(MemoryComposer::new(
            &config.character.name,
            config.pipeline.recent_message_limit,
        ));
        let extractor: Arc<dyn StructuredExtractor> =
            Arc::new(OpenAiExtractor::new(config.llm.clone())?);
        let volatility: Arc<dyn VolatilityService> =
            Arc::new(XtreamlyClient::new(config.xtreamly.clone())?);
        let trading: Arc<dyn TradingService> = Arc::new(PaperLoopTrading::new());

        Ok(Self::new(
            config.character.clone(),
            composer,
            extractor,
            config.pipeline,
        )
        .with_standard_actions(volatility, trading))
    }

    /// Register the loop trading and volatility commands.
    pub fn with_standard_actions(
        self,
        volatility: Arc<dyn VolatilityService>,
        trading: Arc<dyn TradingService>,
    ) -> Self {
        let extractor = self.selector.extractor();
        let composer = Arc::clone(&self.composer);
        let limits = self.limits;

        self.with_action(Arc::new(CommandHandler::new(
            OpenLoopTrading::new(trading),
            Arc::clone(&composer),
            Arc::clone(&extractor),
            limits,
        )))
        .with_action(Arc::new(CommandHandler::new(
            RetrieveVolatilityState::new(volatility),
            composer,
            extractor,
            limits,
        )))
    }

    pub fn with_action(mut self, action: Arc<dyn Action>) -> Self {
        self.actions.push(action);
        self
    }

    pub fn character(&self) -> &Character {
        &self.character
    }

    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }

    /// Handle one inbound message. At most one response reaches `sink`.
    pub async fn process_message(
        &self,
        message: &IncomingMessage,
        sink: &dyn ResponseSink,
    ) -> Turn {
        let intent = self.router.route(message);
        if intent == MessageIntent::Quit {
            return Turn::Quit;
        }

        self.record(&message.room_id, logged_message(message, &intent))
            .await;

        let turn = match intent {
            MessageIntent::Help => self.reply(sink, self.help_text()),
            MessageIntent::ListActions => self.reply(sink, self.actions_text()),
            MessageIntent::Clear => {
                if let Err(e) = self.composer.clear(&message.room_id).await {
                    tracing::warn!(room_id = %message.room_id, "Failed to clear room: {}", e);
                }
                // Nothing to record into a room that was just cleared.
                return self.reply(sink, "Conversation cleared.".to_string());
            }
            MessageIntent::Quit => Turn::Quit,
            MessageIntent::Invoke { token, .. } => self.invoke(message, &token, sink).await,
            MessageIntent::Chat { .. } => self.converse(message, sink).await,
        };

        match &turn {
            Turn::Action { result, .. } => self.record_reply(&message.room_id, result.text()).await,
            Turn::Reply(text) => self.record_reply(&message.room_id, text).await,
            Turn::Quit => {}
        }
        turn
    }

    async fn invoke(&self, message: &IncomingMessage, token: &str, sink: &dyn ResponseSink) -> Turn {
        let Some(action) = self.resolve(token) else {
            return self.reply(sink, format!("Unknown command /{token}. Try /help."));
        };

        if !action.validate(message).await {
            return self.reply(
                sink,
                format!("{} is not available right now.", action.name()),
            );
        }

        self.run(action, message, None, sink).await
    }

    async fn converse(&self, message: &IncomingMessage, sink: &dyn ResponseSink) -> Turn {
        let mut applicable = Vec::new();
        for action in &self.actions {
            if action.validate(message).await {
                applicable.push(Arc::clone(action));
            }
        }
        if applicable.is_empty() {
            return self.reply(sink, self.help_text());
        }

        let state = match tokio::time::timeout(
            self.limits.compose_timeout,
            self.composer.compose(message),
        )
        .await
        {
            Ok(Ok(state)) => state,
            Ok(Err(e)) => {
                tracing::error!(room_id = %message.room_id, "Failed to compose state: {}", e);
                return self.reply(sink, self.help_text());
            }
            Err(_) => {
                let err = Error::Timeout {
                    stage: PipelineStage::ComposingContext,
                    after: self.limits.compose_timeout,
                };
                tracing::error!(room_id = %message.room_id, code = err.code(), "{}", err);
                return self.reply(sink, self.help_text());
            }
        };

        let chosen = match self.selector.select(&state, &applicable).await {
            Ok(chosen) => chosen,
            Err(e) => {
                tracing::error!(code = e.code(), "Action selection failed: {}", e);
                None
            }
        };

        match chosen.and_then(|name| applicable.iter().find(|a| a.name() == name)) {
            Some(action) => self.run(action, message, Some(state), sink).await,
            None => self.reply(sink, self.help_text()),
        }
    }

    async fn run(
        &self,
        action: &Arc<dyn Action>,
        message: &IncomingMessage,
        state: Option<ConversationContext>,
        sink: &dyn ResponseSink,
    ) -> Turn {
        tracing::info!(action = action.name(), room_id = %message.room_id, "Running action");
        let result = action.handle(message, state, sink).await;
        Turn::Action {
            name: action.name(),
            result,
        }
    }

    /// Find an action by name, simile, or a fragment matching exactly one.
    fn resolve(&self, token: &str) -> Option<&Arc<dyn Action>> {
        if let Some(exact) = self.actions.iter().find(|a| a.answers_to(token)) {
            return Some(exact);
        }

        let fragment = token.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        if fragment.is_empty() {
            return None;
        }
        let mut matches = self.actions.iter().filter(|a| {
            a.name().contains(&fragment) || a.similes().iter().any(|s| s.contains(&fragment))
        });
        match (matches.next(), matches.next()) {
            (Some(only), None) => Some(only),
            _ => None,
        }
    }

    fn reply(&self, sink: &dyn ResponseSink, text: String) -> Turn {
        sink.respond(OutgoingResponse::text(text.clone()));
        Turn::Reply(text)
    }

    async fn record(&self, room_id: &str, message: ChatMessage) {
        if let Err(e) = self.composer.record(room_id, message).await {
            tracing::warn!(room_id = %room_id, "Failed to record message: {}", e);
        }
    }

    async fn record_reply(&self, room_id: &str, text: &str) {
        self.record(room_id, ChatMessage::new(&self.character.name, text))
            .await;
    }

    pub fn help_text(&self) -> String {
        let mut lines = vec![format!(
            "I'm {}. Tell me what you need, or use a command:",
            self.character.name
        )];
        for action in &self.actions {
            lines.push(format!(
                "- /{} : {}",
                action.name().to_ascii_lowercase(),
                action.description()
            ));
        }
        lines.push("- /actions : list actions with examples".to_string());
        lines.push("- /clear : forget this conversation".to_string());
        lines.push("- /quit : leave".to_string());
        lines.join("\n")
    }

    fn actions_text(&self) -> String {
        let mut lines = Vec::new();
        for action in &self.actions {
            lines.push(format!("{}: {}", action.name(), action.description()));
            if !action.similes().is_empty() {
                lines.push(format!("  similes: {}", action.similes().join(", ")));
            }
            for example in action.examples() {
                lines.push(format!("  e.g. \"{}\"", example.user));
            }
        }
        lines.join("\n")
    }
}

/// Log line for an inbound message. An explicit command with arguments is
/// logged as just its arguments so prompts read as plain conversation.
fn logged_message(message: &IncomingMessage, intent: &MessageIntent) -> ChatMessage {
    let mut logged = ChatMessage::from(message);
    if let MessageIntent::Invoke { args, .. } = intent
        && !args.is_empty()
    {
        logged.text = args.clone();
    }
    logged
}
