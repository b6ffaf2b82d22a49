//! Shared extraction-and-dispatch pipeline.
//!
//! Every command walks the same stages:
//!
//! ```text
//! Idle -> ComposingContext -> Rendering -> Extracting -> Validating
//!      -> Dispatching | Rejecting -> Done
//! ```
//!
//! Any fault before `Done` ends the invocation with the command's fault
//! text. A validation failure ends it with [`INVALID_PARAMS_TEXT`]. In all
//! cases exactly one response reaches the sink.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::{Action, ActionExample, CommandResult, INVALID_PARAMS_TEXT};
use crate::channels::{IncomingMessage, OutgoingResponse, ResponseSink};
use crate::config::PipelineConfig;
use crate::context::{ContextComposer, ConversationContext};
use crate::error::{Error, PipelineStage};
use crate::llm::StructuredExtractor;
use crate::prompt::{PromptTemplate, render};
use crate::schema::{CommandRequest, CommandSchema, ValidationErrors, validate_as};

/// Why a command declined to activate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreconditionUnmet {
    pub reason: String,
}

impl PreconditionUnmet {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// The command-specific parts of a pipeline.
#[async_trait]
pub trait CommandSpec: Send + Sync + 'static {
    type Request: CommandSchema + Clone + Into<CommandRequest> + std::fmt::Debug + Send + Sync;

    const NAME: &'static str;
    const SIMILES: &'static [&'static str];
    const DESCRIPTION: &'static str;
    /// Reply sent when any stage faults.
    const FAULT_TEXT: &'static str;

    fn template(&self) -> &PromptTemplate;

    fn examples(&self) -> Vec<ActionExample>;

    async fn precondition(&self) -> Result<(), PreconditionUnmet> {
        Ok(())
    }

    /// Perform the single downstream call and format the success reply.
    async fn dispatch(&self, request: Self::Request) -> Result<String, Error>;
}

/// How an invocation ended.
#[derive(Debug)]
pub enum PipelineOutcome {
    Dispatched {
        request: CommandRequest,
        reply: String,
    },
    Rejected(ValidationErrors),
    Faulted(Error),
}

/// Runs a [`CommandSpec`] through the pipeline.
pub struct CommandHandler<C> {
    command: C,
    composer: Arc<dyn ContextComposer>,
    extractor: Arc<dyn StructuredExtractor>,
    limits: PipelineConfig,
}

impl<C: CommandSpec> CommandHandler<C> {
    pub fn new(
        command: C,
        composer: Arc<dyn ContextComposer>,
        extractor: Arc<dyn StructuredExtractor>,
        limits: PipelineConfig,
    ) -> Self {
        Self {
            command,
            composer,
            extractor,
            limits,
        }
    }

    pub fn command(&self) -> &C {
        &self.command
    }

    /// Run every stage and report the outcome without responding.
    pub async fn run(
        &self,
        message: &IncomingMessage,
        state: Option<ConversationContext>,
    ) -> PipelineOutcome {
        match self.execute(message, state).await {
            Ok(Ok((request, reply))) => PipelineOutcome::Dispatched { request, reply },
            Ok(Err(errors)) => PipelineOutcome::Rejected(errors),
            Err(err) => PipelineOutcome::Faulted(err),
        }
    }

    async fn execute(
        &self,
        message: &IncomingMessage,
        state: Option<ConversationContext>,
    ) -> Result<Result<(CommandRequest, String), ValidationErrors>, Error> {
        self.enter(PipelineStage::ComposingContext);
        let context = bounded(
            PipelineStage::ComposingContext,
            self.limits.compose_timeout,
            async {
                match state {
                    Some(state) => self.composer.update_recent_messages(state).await,
                    None => self.composer.compose(message).await,
                }
            },
        )
        .await?;

        self.enter(PipelineStage::Rendering);
        let prompt = render(self.command.template(), &context);

        self.enter(PipelineStage::Extracting);
        let candidate = bounded(
            PipelineStage::Extracting,
            self.limits.extract_timeout,
            self.extractor.extract(&prompt, C::Request::FIELDS),
        )
        .await?;

        self.enter(PipelineStage::Validating);
        let request = match validate_as::<C::Request>(&candidate) {
            Ok(request) => request,
            Err(errors) => {
                self.enter(PipelineStage::Rejecting);
                return Ok(Err(errors));
            }
        };

        self.enter(PipelineStage::Dispatching);
        let wire: CommandRequest = request.clone().into();
        tracing::info!(action = C::NAME, request = ?wire, "Dispatching command");
        let reply = bounded(
            PipelineStage::Dispatching,
            self.limits.dispatch_timeout,
            self.command.dispatch(request),
        )
        .await?;

        Ok(Ok((wire, reply)))
    }

    fn enter(&self, stage: PipelineStage) {
        tracing::debug!(action = C::NAME, stage = %stage, "Pipeline stage");
    }
}

/// Await `fut` for at most `limit`, mapping both failure kinds to [`Error`].
async fn bounded<T, E, F>(stage: PipelineStage, limit: Duration, fut: F) -> Result<T, Error>
where
    F: Future<Output = Result<T, E>>,
    E: Into<Error>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(Error::Timeout {
            stage,
            after: limit,
        }),
    }
}

#[async_trait]
impl<C: CommandSpec> Action for CommandHandler<C> {
    fn name(&self) -> &'static str {
        C::NAME
    }

    fn similes(&self) -> &'static [&'static str] {
        C::SIMILES
    }

    fn description(&self) -> &'static str {
        C::DESCRIPTION
    }

    fn examples(&self) -> Vec<ActionExample> {
        self.command.examples()
    }

    async fn validate(&self, _message: &IncomingMessage) -> bool {
        match self.command.precondition().await {
            Ok(()) => true,
            Err(unmet) => {
                tracing::debug!(action = C::NAME, reason = %unmet.reason, "Action not applicable");
                false
            }
        }
    }

    async fn handle(
        &self,
        message: &IncomingMessage,
        state: Option<ConversationContext>,
        sink: &dyn ResponseSink,
    ) -> CommandResult {
        let (result, response) = match self.run(message, state).await {
            PipelineOutcome::Dispatched { reply, .. } => (
                CommandResult::Success(reply.clone()),
                OutgoingResponse::text(reply),
            ),
            PipelineOutcome::Rejected(errors) => {
                tracing::warn!(
                    action = C::NAME,
                    fields = ?errors.fields(),
                    "Missing or invalid fields: {}",
                    errors
                );
                (
                    CommandResult::Failure(INVALID_PARAMS_TEXT.to_string()),
                    OutgoingResponse::text(INVALID_PARAMS_TEXT).with_attachments(Vec::new()),
                )
            }
            PipelineOutcome::Faulted(err) => {
                tracing::error!(
                    action = C::NAME,
                    code = err.code(),
                    retryable = err.retryable(),
                    "Command failed: {}",
                    err
                );
                (
                    CommandResult::Failure(C::FAULT_TEXT.to_string()),
                    OutgoingResponse::text(C::FAULT_TEXT),
                )
            }
        };

        self.enter(PipelineStage::Done);
        sink.respond(response);
        result
    }
}
