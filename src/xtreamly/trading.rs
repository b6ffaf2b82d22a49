//! Loop trading service seam.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::ApiError;
use crate::schema::OpenLoopTradingRequest;

/// Receipt for an opened loop strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopPosition {
    pub id: Uuid,
    pub amount: Decimal,
    pub stop_loss: Decimal,
    pub risk: bool,
    pub opened_at: DateTime<Utc>,
}

/// Accepts validated loop trading requests.
#[async_trait]
pub trait TradingService: Send + Sync {
    async fn open_loop(&self, request: &OpenLoopTradingRequest) -> Result<LoopPosition, ApiError>;
}

/// Receipts kept by [`PaperLoopTrading`] before the oldest is dropped.
pub const PAPER_POSITION_LIMIT: usize = 1_000;

/// Records positions in memory without touching any exchange.
///
/// Only the most recent `limit` receipts are kept.
#[derive(Debug)]
pub struct PaperLoopTrading {
    limit: usize,
    positions: Mutex<VecDeque<LoopPosition>>,
}

impl PaperLoopTrading {
    pub fn new() -> Self {
        Self::with_limit(PAPER_POSITION_LIMIT)
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            positions: Mutex::new(VecDeque::new()),
        }
    }

    /// Kept receipts, oldest first.
    pub async fn positions(&self) -> Vec<LoopPosition> {
        self.positions.lock().await.iter().cloned().collect()
    }
}

impl Default for PaperLoopTrading {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TradingService for PaperLoopTrading {
    async fn open_loop(&self, request: &OpenLoopTradingRequest) -> Result<LoopPosition, ApiError> {
        let position = LoopPosition {
            id: Uuid::new_v4(),
            amount: request.amount(),
            stop_loss: request.stop_loss(),
            risk: request.risk(),
            opened_at: Utc::now(),
        };
        tracing::info!(
            position_id = %position.id,
            amount = %position.amount,
            stop_loss = %position.stop_loss,
            risk = position.risk,
            "Opened paper loop position"
        );
        let mut positions = self.positions.lock().await;
        positions.push_back(position.clone());
        while positions.len() > self.limit {
            positions.pop_front();
        }
        Ok(position)
    }
}
