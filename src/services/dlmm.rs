//! HTTP client for the Saros DLMM quote/swap API
//!
//! Implements both the [`PriceOracle`] and [`SwapBroker`] contracts against
//! the hosted DLMM service. Quote math and swap construction stay on the
//! server side; this client only moves parameters and payloads.

use crate::config::Config;
use crate::services::oracle::PriceOracle;
use crate::services::swap::{SubmissionHandle, SwapBroker, SwapRequest, SwapTransaction};
use crate::services::OrderError;
use crate::types::Quote;
use async_trait::async_trait;
use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::debug;

/// Client for the DLMM REST API
pub struct DlmmClient {
    client: Client,
    base_url: String,
}

/// Quote response from the DLMM API
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    amount_out: Decimal,
    exchange_rate: Decimal,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BuildSwapResponse {
    /// Base64-encoded unsigned transaction
    transaction: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitResponse {
    signature: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TxStatusResponse {
    confirmed: bool,
    #[serde(default)]
    error: Option<String>,
}

impl DlmmClient {
    pub fn new(config: &Config) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url: config.dlmm_api_url.trim_end_matches('/').to_string(),
        }
    }

    fn pricing_error(context: &str, err: impl std::fmt::Display) -> OrderError {
        OrderError::PricingUnavailable(format!("{}: {}", context, err))
    }

    fn execution_error(context: &str, err: impl std::fmt::Display) -> OrderError {
        OrderError::Execution(format!("{}: {}", context, err))
    }
}

#[async_trait]
impl PriceOracle for DlmmClient {
    async fn quote(
        &self,
        pair_address: &str,
        token_from: &str,
        token_to: &str,
        amount_in: Decimal,
    ) -> Result<Quote, OrderError> {
        let url = format!("{}/pair/{}/quote", self.base_url, pair_address);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("tokenIn", token_from),
                ("tokenOut", token_to),
                ("amountIn", &amount_in.to_string()),
            ])
            .send()
            .await
            .map_err(|e| Self::pricing_error("quote request failed", e))?;

        if !response.status().is_success() {
            return Err(OrderError::PricingUnavailable(format!(
                "quote returned HTTP {} for pair {}",
                response.status(),
                pair_address
            )));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| Self::pricing_error("bad quote response", e))?;

        debug!(
            "Quote for {}: {} -> {} out, rate {}",
            pair_address, amount_in, quote.amount_out, quote.exchange_rate
        );

        Ok(Quote {
            amount_out: quote.amount_out,
            exchange_rate: quote.exchange_rate,
        })
    }
}

#[async_trait]
impl SwapBroker for DlmmClient {
    async fn build_swap(&self, request: &SwapRequest) -> Result<SwapTransaction, OrderError> {
        let url = format!("{}/swap/build", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| Self::execution_error("swap build request failed", e))?;

        if !response.status().is_success() {
            return Err(OrderError::Execution(format!(
                "swap build returned HTTP {}",
                response.status()
            )));
        }

        let built: BuildSwapResponse = response
            .json()
            .await
            .map_err(|e| Self::execution_error("bad swap build response", e))?;

        Ok(SwapTransaction {
            payload: built.transaction,
        })
    }

    async fn submit(&self, txn: &SwapTransaction) -> Result<SubmissionHandle, OrderError> {
        let url = format!("{}/swap/submit", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "transaction": txn.payload }))
            .send()
            .await
            .map_err(|e| Self::execution_error("swap submit failed", e))?;

        if !response.status().is_success() {
            return Err(OrderError::Execution(format!(
                "swap submit returned HTTP {}",
                response.status()
            )));
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| Self::execution_error("bad submit response", e))?;

        Ok(SubmissionHandle {
            signature: submitted.signature,
        })
    }

    async fn confirm(&self, handle: &SubmissionHandle) -> Result<bool, OrderError> {
        let url = format!("{}/tx/{}/status", self.base_url, handle.signature);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Self::execution_error("confirmation poll failed", e))?;

        if !response.status().is_success() {
            return Err(OrderError::Execution(format!(
                "confirmation returned HTTP {}",
                response.status()
            )));
        }

        let status: TxStatusResponse = response
            .json()
            .await
            .map_err(|e| Self::execution_error("bad confirmation response", e))?;

        if let Some(err) = status.error {
            return Err(OrderError::Execution(format!(
                "transaction {} failed on-chain: {}",
                handle.signature, err
            )));
        }

        Ok(status.confirmed)
    }
}
