//! Hand-written service doubles shared by the scenario tests.

#![allow(dead_code)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::{Map, Value};
use uuid::Uuid;

use looper::config::PipelineConfig;
use looper::error::{ApiError, LlmError};
use looper::llm::StructuredExtractor;
use looper::prompt::PromptText;
use looper::schema::{ExtractionCandidate, FieldSpec, OpenLoopTradingRequest, VolatilitySymbol};
use looper::xtreamly::{LoopPosition, TradingService, VolatilityService, VolatilityState};

pub const ETH_DESCRIPTION: &str =
    "ETH price in highly volatile short momentum, requiring protective measures and caution.";

/// Short bounds so timeout scenarios finish quickly.
pub fn fast_limits() -> PipelineConfig {
    PipelineConfig {
        compose_timeout: Duration::from_millis(200),
        extract_timeout: Duration::from_millis(200),
        dispatch_timeout: Duration::from_millis(200),
        recent_message_limit: 16,
    }
}

/// Extractor that answers from a script.
///
/// Action-selection prompts (a single `action` field) get `selection`;
/// every other prompt gets `params`.
pub struct ScriptedExtractor {
    selection: Option<Value>,
    params: Result<Value, String>,
    delay: Option<Duration>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedExtractor {
    pub fn params(params: Value) -> Self {
        Self {
            selection: None,
            params: Ok(params),
            delay: None,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(reason: &str) -> Self {
        Self {
            params: Err(reason.to_string()),
            ..Self::params(Value::Null)
        }
    }

    pub fn selecting(mut self, action: &str) -> Self {
        self.selection = Some(serde_json::json!({ "action": action }));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StructuredExtractor for ScriptedExtractor {
    fn provider(&self) -> &str {
        "scripted"
    }

    async fn extract(
        &self,
        prompt: &PromptText,
        fields: &[FieldSpec],
    ) -> Result<ExtractionCandidate, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.as_str().to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let selecting = fields.len() == 1 && fields[0].name == "action";
        if selecting {
            return Ok(ExtractionCandidate::new(
                self.selection
                    .clone()
                    .unwrap_or_else(|| serde_json::json!({ "action": "NONE" })),
            ));
        }

        match &self.params {
            Ok(value) => Ok(ExtractionCandidate::new(value.clone())),
            Err(reason) => Err(LlmError::RequestFailed {
                provider: "scripted".to_string(),
                reason: reason.clone(),
            }),
        }
    }
}

/// Volatility service double.
pub struct MockVolatility {
    configured: bool,
    healthy: bool,
    reply: Result<String, u16>,
    delay: Option<Duration>,
    queried: Mutex<Vec<VolatilitySymbol>>,
}

impl MockVolatility {
    pub fn answering(description: &str) -> Self {
        Self {
            configured: true,
            healthy: true,
            reply: Ok(description.to_string()),
            delay: None,
            queried: Mutex::new(Vec::new()),
        }
    }

    pub fn unconfigured() -> Self {
        Self {
            configured: false,
            ..Self::answering(ETH_DESCRIPTION)
        }
    }

    pub fn unhealthy() -> Self {
        Self {
            healthy: false,
            ..Self::answering(ETH_DESCRIPTION)
        }
    }

    pub fn failing_with(status: u16) -> Self {
        Self {
            reply: Err(status),
            ..Self::answering(ETH_DESCRIPTION)
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn queried(&self) -> Vec<VolatilitySymbol> {
        self.queried.lock().unwrap().clone()
    }
}

#[async_trait]
impl VolatilityService for MockVolatility {
    fn api_key_configured(&self) -> bool {
        self.configured
    }

    async fn is_ok(&self) -> bool {
        self.configured && self.healthy
    }

    async fn state(&self, symbol: VolatilitySymbol) -> Result<VolatilityState, ApiError> {
        self.queried.lock().unwrap().push(symbol);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Ok(description) => Ok(VolatilityState {
                classification_description: description.clone(),
                extra: Map::new(),
            }),
            Err(status) => Err(ApiError::Status {
                service: "xtreamly".to_string(),
                status: *status,
                body: "upstream failure".to_string(),
            }),
        }
    }
}

/// Trading service double that records every request it accepts.
#[derive(Default)]
pub struct MockTrading {
    fail: bool,
    opened: Mutex<Vec<(Decimal, Decimal, bool)>>,
}

impl MockTrading {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> Vec<(Decimal, Decimal, bool)> {
        self.opened.lock().unwrap().clone()
    }
}

#[async_trait]
impl TradingService for MockTrading {
    async fn open_loop(&self, request: &OpenLoopTradingRequest) -> Result<LoopPosition, ApiError> {
        if self.fail {
            return Err(ApiError::RequestFailed {
                service: "trading".to_string(),
                reason: "connection reset".to_string(),
            });
        }
        self.opened
            .lock()
            .unwrap()
            .push((request.amount(), request.stop_loss(), request.risk()));
        Ok(LoopPosition {
            id: Uuid::new_v4(),
            amount: request.amount(),
            stop_loss: request.stop_loss(),
            risk: request.risk(),
            opened_at: Utc::now(),
        })
    }
}
