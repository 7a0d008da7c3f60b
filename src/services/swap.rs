//! Swap build/broadcast contract
//!
//! The engine never holds the signing key; it hands a built transaction to
//! the broker, which forwards it to the delegated signer service for
//! signing and broadcast.

use crate::services::OrderError;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Parameters for building a swap transaction
#[derive(Debug, Clone, Serialize)]
pub struct SwapRequest {
    pub pair_address: String,
    pub token_from: String,
    pub token_to: String,
    pub amount_in: Decimal,
    /// Minimum-received bound derived from the fresh quote and slippage
    pub min_amount_out: Decimal,
    /// Wallet that pays for and signs the swap
    pub payer: String,
}

/// An unsigned swap transaction ready for the signer service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwapTransaction {
    /// Base64-encoded transaction payload
    pub payload: String,
}

/// Handle for tracking a submitted transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmissionHandle {
    pub signature: String,
}

/// Builds, submits, and confirms swaps against a DLMM pool
#[async_trait]
pub trait SwapBroker: Send + Sync {
    async fn build_swap(&self, request: &SwapRequest) -> Result<SwapTransaction, OrderError>;

    async fn submit(&self, txn: &SwapTransaction) -> Result<SubmissionHandle, OrderError>;

    /// Wait for the submitted transaction to land. `Ok(false)` means the
    /// chain rejected it.
    async fn confirm(&self, handle: &SubmissionHandle) -> Result<bool, OrderError>;
}
