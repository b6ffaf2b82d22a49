//! Downstream services: Xtreamly volatility state and loop trading.

mod client;
mod health;
mod trading;

pub use client::XtreamlyClient;
pub use health::{VolatilityHealth, VolatilityHealthState};
pub use trading::{LoopPosition, PaperLoopTrading, TradingService};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ApiError;
use crate::schema::VolatilitySymbol;

/// Live volatility classification for a symbol.
///
/// Only `classification_description` is relied on. Everything else the
/// service returns is kept in `extra` for logging and display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolatilityState {
    pub classification_description: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Volatility state source.
#[async_trait]
pub trait VolatilityService: Send + Sync {
    /// Whether a credential is configured at all.
    fn api_key_configured(&self) -> bool;

    /// Health check used as the handler precondition.
    async fn is_ok(&self) -> bool;

    async fn state(&self, symbol: VolatilitySymbol) -> Result<VolatilityState, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn state_keeps_unknown_fields() {
        let state: VolatilityState = serde_json::from_value(json!({
            "classification_description": "ETH price in highly volatile short momentum, requiring protective measures and caution.",
            "classification": "highvol_short",
            "timestamp": 1718000000000u64
        }))
        .unwrap();

        assert_eq!(state.extra["classification"], "highvol_short");
        assert!(state.classification_description.starts_with("ETH price"));
    }

    #[test]
    fn state_requires_description() {
        let parsed = serde_json::from_value::<VolatilityState>(json!({"classification": "lowvol"}));
        assert!(parsed.is_err());
    }
}
