//! Typed request shapes for the supported commands.

use std::borrow::Cow;

use rust_decimal::Decimal;
use serde::Serialize;

use super::{CommandSchema, Constraint, FieldKind, FieldSpec, ValidatedFields};

pub const VOLATILITY_SYMBOLS: &[&str] = &["ETH", "BTC"];

pub const OPEN_LOOP_TRADING_FIELDS: &[FieldSpec] = &[
    FieldSpec {
        name: "amount",
        label: "Amount",
        kind: FieldKind::Number,
        required: true,
        constraint: Some(Constraint::GreaterThan(Decimal::ZERO)),
        unit: None,
        description: "",
    },
    FieldSpec {
        name: "stopLoss",
        label: "Stop loss",
        kind: FieldKind::Number,
        required: true,
        constraint: Some(Constraint::Between {
            min: Decimal::ZERO,
            max: Decimal::ONE_HUNDRED,
        }),
        unit: Some("%"),
        description: "",
    },
    FieldSpec {
        name: "risk",
        label: "Risk",
        kind: FieldKind::Boolean,
        required: true,
        constraint: None,
        unit: None,
        description: "Whether risk mode is enabled.",
    },
];

pub const VOLATILITY_QUERY_FIELDS: &[FieldSpec] = &[FieldSpec {
    name: "symbol",
    label: "Symbol",
    kind: FieldKind::String,
    required: true,
    constraint: Some(Constraint::OneOf(Cow::Borrowed(VOLATILITY_SYMBOLS))),
    unit: None,
    description: "The symbol of the token.",
}];

/// Validated request to open a loop trading strategy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenLoopTradingRequest {
    amount: Decimal,
    stop_loss: Decimal,
    risk: bool,
}

impl OpenLoopTradingRequest {
    pub fn amount(&self) -> Decimal {
        self.amount
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    pub fn risk(&self) -> bool {
        self.risk
    }

    pub fn risk_label(&self) -> &'static str {
        if self.risk { "high" } else { "low" }
    }
}

impl CommandSchema for OpenLoopTradingRequest {
    const FIELDS: &'static [FieldSpec] = OPEN_LOOP_TRADING_FIELDS;

    fn from_validated(fields: &ValidatedFields) -> Option<Self> {
        Some(Self {
            amount: fields.number("amount")?,
            stop_loss: fields.number("stopLoss")?,
            risk: fields.boolean("risk")?,
        })
    }
}

/// Symbols with a live volatility model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VolatilitySymbol {
    #[serde(rename = "ETH")]
    Eth,
    #[serde(rename = "BTC")]
    Btc,
}

impl VolatilitySymbol {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Eth => "ETH",
            Self::Btc => "BTC",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "ETH" => Some(Self::Eth),
            "BTC" => Some(Self::Btc),
            _ => None,
        }
    }
}

impl std::fmt::Display for VolatilitySymbol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated volatility state query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VolatilityQueryRequest {
    symbol: VolatilitySymbol,
}

impl VolatilityQueryRequest {
    pub fn symbol(&self) -> VolatilitySymbol {
        self.symbol
    }
}

impl CommandSchema for VolatilityQueryRequest {
    const FIELDS: &'static [FieldSpec] = VOLATILITY_QUERY_FIELDS;

    fn from_validated(fields: &ValidatedFields) -> Option<Self> {
        Some(Self {
            symbol: VolatilitySymbol::parse(fields.text("symbol")?)?,
        })
    }
}

/// Any request the interpreter can dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "command", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandRequest {
    OpenLoopTrading(OpenLoopTradingRequest),
    RetrieveVolatilityState(VolatilityQueryRequest),
}

impl From<OpenLoopTradingRequest> for CommandRequest {
    fn from(request: OpenLoopTradingRequest) -> Self {
        Self::OpenLoopTrading(request)
    }
}

impl From<VolatilityQueryRequest> for CommandRequest {
    fn from(request: VolatilityQueryRequest) -> Self {
        Self::RetrieveVolatilityState(request)
    }
}
