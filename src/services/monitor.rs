//! Monitor loop
//!
//! Periodic scheduler over the set of Active orders. Each tick snapshots the
//! store, fans out one task per order to re-price and re-evaluate it, and
//! dispatches firing orders to the execution engine. Ticks are strictly
//! sequential: a sweep, and every execution it dispatched, completes before
//! the next tick starts.

use crate::config::Config;
use crate::db::Database;
use crate::services::executor::{ExecutionEngine, ExecutionOutcome};
use crate::services::oracle::PriceOracle;
use crate::services::{trigger, OrderError};
use crate::types::{Order, OrderStatus};
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{timeout, MissedTickBehavior};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct MonitorLoop {
    db: Arc<Database>,
    oracle: Arc<dyn PriceOracle>,
    executor: Arc<ExecutionEngine>,
    config: Config,
}

impl MonitorLoop {
    pub fn new(
        db: Arc<Database>,
        oracle: Arc<dyn PriceOracle>,
        executor: Arc<ExecutionEngine>,
        config: Config,
    ) -> Self {
        Self {
            db,
            oracle,
            executor,
            config,
        }
    }

    /// Drive sweeps on the configured cadence until the shutdown flag flips.
    /// An in-progress sweep always runs to completion.
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Order monitor started (sweep every {}s)",
            self.config.tick_interval_seconds
        );

        let mut interval = tokio::time::interval(self.config.tick_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep().await {
                        warn!("Sweep failed: {}", e);
                    }
                }
                result = shutdown.changed() => {
                    if result.is_err() || *shutdown.borrow() {
                        info!("Order monitor stopping");
                        break;
                    }
                }
            }
        }
    }

    /// One pass over the Active orders.
    ///
    /// The snapshot is taken up front; orders created or cancelled after it
    /// are picked up on the next tick. Per-order failures are contained in
    /// their own task and never abort the sweep.
    pub async fn sweep(&self) -> Result<(), OrderError> {
        let orders = self.db.get_orders_by_status(OrderStatus::Active).await?;
        if orders.is_empty() {
            return Ok(());
        }

        debug!("Sweeping {} active orders", orders.len());

        let mut tasks = JoinSet::new();
        for order in orders {
            let monitor = self.clone();
            tasks.spawn(async move { monitor.check_order(order).await });
        }

        // The tick is only accounted for once every per-order task,
        // including any execution it dispatched, has finished.
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Order check task panicked: {}", e);
            }
        }

        Ok(())
    }

    /// Re-price one order and dispatch it if the trigger fires
    async fn check_order(&self, order: Order) {
        if let Some(expires_at) = order.expires_at {
            if expires_at <= Utc::now() {
                match self.db.expire_order(&order.id).await {
                    Ok(true) => info!("Order {} expired", order.id),
                    Ok(false) => {}
                    Err(e) => warn!("Failed to expire order {}: {}", order.id, e),
                }
                return;
            }
        }

        let quote = match timeout(
            self.config.quote_timeout(),
            self.oracle
                .quote(&order.pair_address, &order.token_from, &order.token_to, order.amount),
        )
        .await
        {
            Ok(Ok(quote)) => quote,
            Ok(Err(e)) => {
                // No observation this tick; the order stays as it was.
                debug!("No quote for order {} this tick: {}", order.id, e);
                return;
            }
            Err(_) => {
                debug!("Quote timed out for order {}", order.id);
                return;
            }
        };

        if let Err(e) = self
            .db
            .update_order_price(&order.id, quote.exchange_rate)
            .await
        {
            warn!("Failed to persist price for order {}: {}", order.id, e);
            return;
        }

        if !trigger::should_execute(&order, quote.exchange_rate) {
            return;
        }

        info!(
            "Order {} ({}) triggered at {} against target {}",
            order.id, order.kind, quote.exchange_rate, order.target_price
        );

        match self.executor.execute(&order).await {
            Ok(ExecutionOutcome::Executed { price }) => {
                info!("Order {} filled at {}", order.id, price);
            }
            Ok(ExecutionOutcome::AlreadyClaimed) => {
                debug!("Order {} already being executed elsewhere", order.id);
            }
            Ok(ExecutionOutcome::Aborted) => {
                debug!("Order {} backed off, price moved away", order.id);
            }
            Err(e) if e.is_recoverable() => {
                warn!(
                    "Execution failed for order {}, retrying on a later tick: {}",
                    order.id, e
                );
            }
            Err(e) => {
                error!("Execution failed for order {}: {}", order.id, e);
            }
        }
    }
}
