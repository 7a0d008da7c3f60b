//! Shared test doubles for the oracle and broker seams

use crate::services::oracle::PriceOracle;
use crate::services::swap::{SubmissionHandle, SwapBroker, SwapRequest, SwapTransaction};
use crate::services::OrderError;
use crate::types::Quote;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

/// Oracle that replays a script of exchange rates.
///
/// Each quote pops the next entry: `Some(rate)` yields a quote at that rate,
/// `None` yields `PricingUnavailable`. When the script runs dry the fallback
/// rate is served, or an error if there is none.
pub struct MockOracle {
    script: Mutex<VecDeque<Option<Decimal>>>,
    fallback: Option<Decimal>,
    pub calls: AtomicU32,
}

impl MockOracle {
    pub fn scripted(rates: Vec<Option<Decimal>>) -> Self {
        Self {
            script: Mutex::new(rates.into()),
            fallback: None,
            calls: AtomicU32::new(0),
        }
    }

    pub fn fixed(rate: Decimal) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Some(rate),
            calls: AtomicU32::new(0),
        }
    }

    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Scripted rates, then a steady fallback once the script is spent
    pub fn scripted_then(rates: Vec<Option<Decimal>>, fallback: Decimal) -> Self {
        Self {
            script: Mutex::new(rates.into()),
            fallback: Some(fallback),
            calls: AtomicU32::new(0),
        }
    }
}

#[async_trait]
impl PriceOracle for MockOracle {
    async fn quote(
        &self,
        pair_address: &str,
        _token_from: &str,
        _token_to: &str,
        amount_in: Decimal,
    ) -> Result<Quote, OrderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let next = self.script.lock().unwrap().pop_front();
        let rate = match next {
            Some(entry) => entry,
            None => self.fallback,
        };

        match rate {
            Some(rate) => Ok(Quote {
                amount_out: rate * amount_in,
                exchange_rate: rate,
            }),
            None => Err(OrderError::PricingUnavailable(format!(
                "no quote for {}",
                pair_address
            ))),
        }
    }
}

/// Broker that counts calls and can be told to fail at each stage
pub struct MockBroker {
    pub builds: AtomicU32,
    pub submissions: AtomicU32,
    pub confirmations: AtomicU32,
    pub fail_build: AtomicBool,
    pub fail_submit: AtomicBool,
    pub confirm_result: AtomicBool,
}

impl Default for MockBroker {
    fn default() -> Self {
        Self {
            builds: AtomicU32::new(0),
            submissions: AtomicU32::new(0),
            confirmations: AtomicU32::new(0),
            fail_build: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            confirm_result: AtomicBool::new(true),
        }
    }
}

impl MockBroker {
    pub fn failing_build() -> Self {
        let broker = Self::default();
        broker.fail_build.store(true, Ordering::SeqCst);
        broker
    }

    pub fn rejecting_confirmation() -> Self {
        let broker = Self::default();
        broker.confirm_result.store(false, Ordering::SeqCst);
        broker
    }

    pub fn submission_count(&self) -> u32 {
        self.submissions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SwapBroker for MockBroker {
    async fn build_swap(&self, request: &SwapRequest) -> Result<SwapTransaction, OrderError> {
        self.builds.fetch_add(1, Ordering::SeqCst);
        if self.fail_build.load(Ordering::SeqCst) {
            return Err(OrderError::Execution("build refused".to_string()));
        }
        Ok(SwapTransaction {
            payload: format!("txn:{}:{}", request.pair_address, request.amount_in),
        })
    }

    async fn submit(&self, txn: &SwapTransaction) -> Result<SubmissionHandle, OrderError> {
        self.submissions.fetch_add(1, Ordering::SeqCst);
        if self.fail_submit.load(Ordering::SeqCst) {
            return Err(OrderError::Execution("submit refused".to_string()));
        }
        Ok(SubmissionHandle {
            signature: format!("sig:{}", txn.payload),
        })
    }

    async fn confirm(&self, _handle: &SubmissionHandle) -> Result<bool, OrderError> {
        self.confirmations.fetch_add(1, Ordering::SeqCst);
        Ok(self.confirm_result.load(Ordering::SeqCst))
    }
}
