//! Core types for the DLMM order bot

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Order kind, fixed at creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderKind {
    Limit,
    StopLoss,
}

impl OrderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderKind::Limit => "limit",
            OrderKind::StopLoss => "stop-loss",
        }
    }
}

impl fmt::Display for OrderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "limit" => Ok(OrderKind::Limit),
            "stop-loss" | "stoploss" => Ok(OrderKind::StopLoss),
            other => Err(format!("unknown order kind: {}", other)),
        }
    }
}

/// Which side of the pair the order intends to take.
///
/// Recorded explicitly so the assumed trade direction is visible in the data
/// instead of being an implicit convention. The trigger comparison treats
/// `token_from -> token_to` as the sell leg regardless of this field; see
/// `services::trigger`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    Buy,
    Sell,
}

impl TradeDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeDirection::Buy => "buy",
            TradeDirection::Sell => "sell",
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for TradeDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "buy" => Ok(TradeDirection::Buy),
            "sell" => Ok(TradeDirection::Sell),
            other => Err(format!("unknown trade direction: {}", other)),
        }
    }
}

/// Order lifecycle status.
///
/// `Claimed` is the short-lived state held while the execution engine owns
/// the order; every other non-`Active` state is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    Active,
    Claimed,
    Executed,
    Cancelled,
    Expired,
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Active => "Active",
            OrderStatus::Claimed => "Claimed",
            OrderStatus::Executed => "Executed",
            OrderStatus::Cancelled => "Cancelled",
            OrderStatus::Expired => "Expired",
            OrderStatus::Failed => "Failed",
        }
    }

    /// Terminal statuses never transition again
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Executed
                | OrderStatus::Cancelled
                | OrderStatus::Expired
                | OrderStatus::Failed
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Active" => Ok(OrderStatus::Active),
            "Claimed" => Ok(OrderStatus::Claimed),
            "Executed" => Ok(OrderStatus::Executed),
            "Cancelled" => Ok(OrderStatus::Cancelled),
            "Expired" => Ok(OrderStatus::Expired),
            "Failed" => Ok(OrderStatus::Failed),
            other => Err(format!("unknown order status: {}", other)),
        }
    }
}

/// A persisted trade intent with a trigger condition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub kind: OrderKind,
    pub direction: TradeDirection,
    /// Mint of the token being sold
    pub token_from: String,
    /// Mint of the token being bought
    pub token_to: String,
    /// Quantity of `token_from` to sell
    pub amount: Decimal,
    /// Trigger threshold, in `token_to` per unit of `token_from`
    pub target_price: Decimal,
    /// Last observed market price; zero until the first successful quote
    pub current_price: Decimal,
    pub status: OrderStatus,
    /// DLMM pair used for both pricing and execution
    pub pair_address: String,
    pub owner_wallet: String,
    /// Failed execution attempts so far (claims that were rolled back)
    pub execution_attempts: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Optional expiry; the monitor retires the order once this passes
    pub expires_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Build a fresh Active order from a creation request
    pub fn from_request(req: NewOrder, current_price: Decimal) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: req.kind,
            direction: req.direction,
            token_from: req.token_from,
            token_to: req.token_to,
            amount: req.amount,
            target_price: req.target_price,
            current_price,
            status: OrderStatus::Active,
            pair_address: req.pair_address,
            owner_wallet: req.owner_wallet,
            execution_attempts: 0,
            created_at: now,
            updated_at: now,
            expires_at: req.expires_at,
        }
    }
}

/// Request to create a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub kind: OrderKind,
    pub direction: TradeDirection,
    pub token_from: String,
    pub token_to: String,
    pub amount: Decimal,
    pub target_price: Decimal,
    pub pair_address: String,
    pub owner_wallet: String,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Point-in-time quote from a DLMM pair
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Quote {
    /// Amount of `token_to` received for the quoted input
    pub amount_out: Decimal,
    /// Price as `token_to` per unit of `token_from`
    pub exchange_rate: Decimal,
}

/// Aggregate order counts for reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrderStats {
    pub active: i64,
    pub executed: i64,
    pub cancelled: i64,
    pub expired: i64,
    pub failed: i64,
}

impl OrderStats {
    pub fn total(&self) -> i64 {
        self.active + self.executed + self.cancelled + self.expired + self.failed
    }
}
