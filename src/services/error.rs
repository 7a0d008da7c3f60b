//! Error taxonomy for order management and execution

use crate::types::OrderStatus;
use thiserror::Error;

/// Errors surfaced by the order manager, monitor, and execution engine
#[derive(Error, Debug)]
pub enum OrderError {
    /// Malformed order request; never persisted
    #[error("invalid order: {0}")]
    Validation(String),

    /// The oracle could not produce a quote this attempt
    #[error("pricing unavailable: {0}")]
    PricingUnavailable(String),

    /// Swap build, broadcast, or confirmation failed
    #[error("execution failed: {0}")]
    Execution(String),

    /// Order store unreachable or query failed
    #[error("order store error: {0}")]
    Persistence(#[from] sqlx::Error),

    #[error("order {0} not found")]
    NotFound(String),

    /// Operation requires an Active order
    #[error("order {id} is {status}, expected Active")]
    NotActive { id: String, status: OrderStatus },
}

impl OrderError {
    /// Recoverable errors leave the order Active and are retried on a later tick
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            OrderError::PricingUnavailable(_) | OrderError::Execution(_)
        )
    }
}
