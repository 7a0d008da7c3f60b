//! Execution engine
//!
//! Walks a firing order through claim -> fresh quote -> build -> submit ->
//! confirm -> finalize. The claim is a compare-and-set on the order store,
//! so two overlapping sweeps can both see a firing price but only one ever
//! reaches the broker.

use crate::config::Config;
use crate::db::Database;
use crate::services::oracle::PriceOracle;
use crate::services::swap::{SwapBroker, SwapRequest};
use crate::services::{trigger, OrderError};
use crate::types::{Order, OrderStatus};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::time::timeout;
use tracing::{debug, info, warn};

/// How an execution attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// Swap confirmed, order finalized at this price
    Executed { price: Decimal },
    /// Another execution holds the claim, or the order went terminal
    AlreadyClaimed,
    /// The fresh quote no longer meets the trigger; claim released, no
    /// attempt counted
    Aborted,
}

pub struct ExecutionEngine {
    db: Arc<Database>,
    oracle: Arc<dyn PriceOracle>,
    broker: Arc<dyn SwapBroker>,
    config: Config,
}

impl ExecutionEngine {
    pub fn new(
        db: Arc<Database>,
        oracle: Arc<dyn PriceOracle>,
        broker: Arc<dyn SwapBroker>,
        config: Config,
    ) -> Self {
        Self {
            db,
            oracle,
            broker,
            config,
        }
    }

    /// Execute a firing order at most once.
    ///
    /// Recoverable failures release the claim back to Active so the next
    /// tick retries; execution-phase failures count toward the attempt cap
    /// and eventually park the order as Failed.
    pub async fn execute(&self, order: &Order) -> Result<ExecutionOutcome, OrderError> {
        if !self.db.claim_order(&order.id).await? {
            debug!("Order {} already claimed or terminal, skipping", order.id);
            return Ok(ExecutionOutcome::AlreadyClaimed);
        }

        match self.run_claimed(order).await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                // Pricing hiccups don't count toward the retry cap; only
                // failures past the point of building/broadcasting do.
                let count_attempt = matches!(err, OrderError::Execution(_));
                let landed = self
                    .db
                    .release_claim(&order.id, count_attempt, self.config.max_execution_attempts)
                    .await?;

                if landed == OrderStatus::Failed {
                    warn!(
                        "Order {} exhausted {} execution attempts, parked as Failed",
                        order.id, self.config.max_execution_attempts
                    );
                }

                Err(err)
            }
        }
    }

    /// Body of an execution while the claim is held. Any error here is
    /// handled by `execute`, which releases the claim.
    async fn run_claimed(&self, order: &Order) -> Result<ExecutionOutcome, OrderError> {
        // Freshness guard: the sweep's cached price may be stale by the time
        // this runs, so re-derive a quote immediately before acting.
        let quote = timeout(
            self.config.quote_timeout(),
            self.oracle
                .quote(&order.pair_address, &order.token_from, &order.token_to, order.amount),
        )
        .await
        .map_err(|_| {
            OrderError::PricingUnavailable(format!("quote timed out for {}", order.pair_address))
        })??;

        if !trigger::should_execute(order, quote.exchange_rate) {
            debug!(
                "Order {} no longer triggers at fresh price {}, releasing claim",
                order.id, quote.exchange_rate
            );
            self.db.release_claim(&order.id, false, 0).await?;
            return Ok(ExecutionOutcome::Aborted);
        }

        let min_amount_out = quote.amount_out * (Decimal::ONE - self.config.slippage_tolerance);
        let request = SwapRequest {
            pair_address: order.pair_address.clone(),
            token_from: order.token_from.clone(),
            token_to: order.token_to.clone(),
            amount_in: order.amount,
            min_amount_out,
            payer: order.owner_wallet.clone(),
        };

        let confirmed = timeout(self.config.execution_timeout(), async {
            let txn = self.broker.build_swap(&request).await?;
            let handle = self.broker.submit(&txn).await?;
            info!("Order {} submitted as {}", order.id, handle.signature);
            self.broker.confirm(&handle).await
        })
        .await
        .map_err(|_| OrderError::Execution(format!("execution timed out for order {}", order.id)))??;

        if !confirmed {
            return Err(OrderError::Execution(format!(
                "swap for order {} was not confirmed",
                order.id
            )));
        }

        if !self
            .db
            .finalize_executed(&order.id, quote.exchange_rate)
            .await?
        {
            // The claim disappeared underneath a confirmed swap; surface it
            // loudly rather than double-report.
            return Err(OrderError::Execution(format!(
                "order {} lost its claim before finalize",
                order.id
            )));
        }

        info!("Order {} executed at {}", order.id, quote.exchange_rate);
        Ok(ExecutionOutcome::Executed {
            price: quote.exchange_rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockBroker, MockOracle};
    use crate::types::{NewOrder, OrderKind, TradeDirection};
    use rust_decimal_macros::dec;
    use std::sync::atomic::Ordering;

    fn test_config() -> Config {
        Config {
            max_execution_attempts: 2,
            ..Config::default()
        }
    }

    async fn seeded_limit_order(db: &Database, target: Decimal) -> Order {
        let order = Order::from_request(
            NewOrder {
                kind: OrderKind::Limit,
                direction: TradeDirection::Sell,
                token_from: "SOL".to_string(),
                token_to: "USDC".to_string(),
                amount: dec!(2),
                target_price: target,
                pair_address: "pair-1".to_string(),
                owner_wallet: "wallet-1".to_string(),
                expires_at: None,
            },
            dec!(0),
        );
        db.create_order(&order).await.unwrap();
        order
    }

    fn engine(
        db: &Arc<Database>,
        oracle: Arc<MockOracle>,
        broker: Arc<MockBroker>,
    ) -> ExecutionEngine {
        ExecutionEngine::new(db.clone(), oracle, broker, test_config())
    }

    #[tokio::test]
    async fn executes_and_finalizes() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::default());
        let engine = engine(&db, Arc::new(MockOracle::fixed(dec!(11))), broker.clone());

        let outcome = engine.execute(&order).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Executed { price: dec!(11) });
        assert_eq!(broker.submission_count(), 1);

        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Executed);
        assert_eq!(loaded.current_price, dec!(11));
    }

    #[tokio::test]
    async fn claimed_order_is_skipped() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        db.claim_order(&order.id).await.unwrap();

        let broker = Arc::new(MockBroker::default());
        let engine = engine(&db, Arc::new(MockOracle::fixed(dec!(11))), broker.clone());

        let outcome = engine.execute(&order).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::AlreadyClaimed);
        assert_eq!(broker.submission_count(), 0);
    }

    #[tokio::test]
    async fn pricing_failure_releases_without_counting() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::default());
        let engine = engine(&db, Arc::new(MockOracle::unavailable()), broker.clone());

        let err = engine.execute(&order).await.unwrap_err();
        assert!(matches!(err, OrderError::PricingUnavailable(_)));
        assert_eq!(broker.submission_count(), 0);

        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Active);
        assert_eq!(loaded.execution_attempts, 0);
    }

    #[tokio::test]
    async fn stale_trigger_aborts_without_submitting() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::default());
        // Fresh quote dropped back below the target
        let engine = engine(&db, Arc::new(MockOracle::fixed(dec!(9))), broker.clone());

        let outcome = engine.execute(&order).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::Aborted);
        assert_eq!(broker.submission_count(), 0);

        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Active);
        assert_eq!(loaded.execution_attempts, 0);
    }

    #[tokio::test]
    async fn build_failure_counts_attempts_until_failed() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::failing_build());
        let engine = engine(&db, Arc::new(MockOracle::fixed(dec!(11))), broker.clone());

        // max_execution_attempts = 2: first failure retries, second parks
        let err = engine.execute(&order).await.unwrap_err();
        assert!(matches!(err, OrderError::Execution(_)));
        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Active);
        assert_eq!(loaded.execution_attempts, 1);

        engine.execute(&order).await.unwrap_err();
        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Failed);
        assert_eq!(loaded.execution_attempts, 2);

        // Terminal: a further sweep can no longer touch it
        let outcome = engine.execute(&order).await.unwrap();
        assert_eq!(outcome, ExecutionOutcome::AlreadyClaimed);
        assert_eq!(broker.submission_count(), 0);
    }

    #[tokio::test]
    async fn unconfirmed_swap_is_retried() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::rejecting_confirmation());
        let engine = engine(&db, Arc::new(MockOracle::fixed(dec!(11))), broker.clone());

        let err = engine.execute(&order).await.unwrap_err();
        assert!(matches!(err, OrderError::Execution(_)));

        let loaded = db.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Active);
        assert_eq!(loaded.execution_attempts, 1);

        // Broker recovers; the next attempt goes through
        broker.confirm_result.store(true, Ordering::SeqCst);
        let outcome = engine.execute(&order).await.unwrap();
        assert!(matches!(outcome, ExecutionOutcome::Executed { .. }));
    }

    #[tokio::test]
    async fn concurrent_executions_submit_once() {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        let order = seeded_limit_order(&db, dec!(10)).await;
        let broker = Arc::new(MockBroker::default());
        let engine = Arc::new(engine(&db, Arc::new(MockOracle::fixed(dec!(11))), broker.clone()));

        let (a, b) = tokio::join!(
            {
                let engine = engine.clone();
                let order = order.clone();
                async move { engine.execute(&order).await }
            },
            {
                let engine = engine.clone();
                let order = order.clone();
                async move { engine.execute(&order).await }
            }
        );

        let outcomes = [a.unwrap(), b.unwrap()];
        let executed = outcomes
            .iter()
            .filter(|o| matches!(o, ExecutionOutcome::Executed { .. }))
            .count();
        let skipped = outcomes
            .iter()
            .filter(|o| matches!(o, ExecutionOutcome::AlreadyClaimed))
            .count();

        assert_eq!(executed, 1);
        assert_eq!(skipped, 1);
        assert_eq!(broker.submission_count(), 1);
        assert_eq!(
            db.get_order(&order.id).await.unwrap().status,
            OrderStatus::Executed
        );
    }
}
