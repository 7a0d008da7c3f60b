//! Order manager
//!
//! Public face of the engine: order creation, cancellation, and listing, plus
//! ownership of the monitor loop's lifecycle. The monitor is started lazily
//! on the first order and torn down by `stop()`.

use crate::config::Config;
use crate::db::Database;
use crate::services::executor::ExecutionEngine;
use crate::services::monitor::MonitorLoop;
use crate::services::oracle::PriceOracle;
use crate::services::swap::SwapBroker;
use crate::services::OrderError;
use crate::types::{NewOrder, Order, OrderStats, OrderStatus};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, info};

pub struct OrderManager {
    db: Arc<Database>,
    oracle: Arc<dyn PriceOracle>,
    monitor: MonitorLoop,
    config: Config,
    shutdown_tx: watch::Sender<bool>,
    monitor_handle: Mutex<Option<JoinHandle<()>>>,
}

impl OrderManager {
    pub fn new(
        db: Arc<Database>,
        oracle: Arc<dyn PriceOracle>,
        broker: Arc<dyn SwapBroker>,
        config: Config,
    ) -> Self {
        let executor = Arc::new(ExecutionEngine::new(
            db.clone(),
            oracle.clone(),
            broker,
            config.clone(),
        ));
        let monitor = MonitorLoop::new(db.clone(), oracle.clone(), executor, config.clone());
        let (shutdown_tx, _) = watch::channel(false);

        Self {
            db,
            oracle,
            monitor,
            config,
            shutdown_tx,
            monitor_handle: Mutex::new(None),
        }
    }

    /// Validate and persist a new order, seeding its price from an immediate
    /// best-effort quote. Starts the monitor if it isn't running yet.
    pub async fn create_order(&self, request: NewOrder) -> Result<Order, OrderError> {
        validate_request(&request)?;

        // Best-effort reference price; zero means "not yet observed" and is
        // never treated as a trigger observation.
        let current_price = match timeout(
            self.config.quote_timeout(),
            self.oracle.quote(
                &request.pair_address,
                &request.token_from,
                &request.token_to,
                request.amount,
            ),
        )
        .await
        {
            Ok(Ok(quote)) => quote.exchange_rate,
            Ok(Err(e)) => {
                debug!("No initial quote for new order: {}", e);
                Decimal::ZERO
            }
            Err(_) => {
                debug!("Initial quote timed out for new order");
                Decimal::ZERO
            }
        };

        let order = Order::from_request(request, current_price);
        self.db.create_order(&order).await?;

        info!(
            "Created {} order {} on {} (target {})",
            order.kind, order.id, order.pair_address, order.target_price
        );

        self.ensure_monitoring().await;
        Ok(order)
    }

    /// Cancel an Active order. Rejected once the execution engine has
    /// claimed it or it has reached a terminal status.
    pub async fn cancel_order(&self, id: &str) -> Result<(), OrderError> {
        self.db.cancel_order(id).await?;
        info!("Cancelled order {}", id);
        Ok(())
    }

    pub async fn get_order(&self, id: &str) -> Result<Order, OrderError> {
        self.db.get_order(id).await
    }

    pub async fn list_orders_for_wallet(&self, wallet: &str) -> Result<Vec<Order>, OrderError> {
        self.db.get_orders_by_wallet(wallet).await
    }

    pub async fn list_active_orders(&self) -> Result<Vec<Order>, OrderError> {
        self.db.get_orders_by_status(OrderStatus::Active).await
    }

    pub async fn stats(&self) -> Result<OrderStats, OrderError> {
        self.db.get_stats().await
    }

    /// Start the monitor loop if it isn't already running. Safe to call any
    /// number of times; only one loop ever exists.
    pub async fn ensure_monitoring(&self) {
        let mut handle = self.monitor_handle.lock().await;
        if let Some(existing) = handle.as_ref() {
            if !existing.is_finished() {
                return;
            }
        }

        self.shutdown_tx.send_replace(false);
        let monitor = self.monitor.clone();
        let shutdown_rx = self.shutdown_tx.subscribe();
        *handle = Some(tokio::spawn(async move {
            monitor.run(shutdown_rx).await;
        }));
    }

    /// Whether the monitor loop is currently running
    pub async fn is_monitoring(&self) -> bool {
        let handle = self.monitor_handle.lock().await;
        handle.as_ref().map(|h| !h.is_finished()).unwrap_or(false)
    }

    /// Stop the monitor loop. An in-progress sweep and its dispatched
    /// executions run to completion before this returns.
    pub async fn stop(&self) {
        let handle = {
            let mut guard = self.monitor_handle.lock().await;
            guard.take()
        };

        if let Some(handle) = handle {
            self.shutdown_tx.send_replace(true);
            if let Err(e) = handle.await {
                debug!("Monitor task ended abnormally: {}", e);
            }
            info!("Order monitoring stopped");
        }
    }
}

/// Synchronous validation of a creation request; invalid orders are never
/// persisted.
fn validate_request(request: &NewOrder) -> Result<(), OrderError> {
    if request.amount <= Decimal::ZERO {
        return Err(OrderError::Validation("amount must be positive".to_string()));
    }
    if request.target_price <= Decimal::ZERO {
        return Err(OrderError::Validation(
            "target price must be positive".to_string(),
        ));
    }
    if request.token_from.is_empty() || request.token_to.is_empty() {
        return Err(OrderError::Validation("token mints are required".to_string()));
    }
    if request.token_from == request.token_to {
        return Err(OrderError::Validation(
            "cannot trade a token against itself".to_string(),
        ));
    }
    if request.pair_address.is_empty() {
        return Err(OrderError::Validation("pair address is required".to_string()));
    }
    if request.owner_wallet.is_empty() {
        return Err(OrderError::Validation("owner wallet is required".to_string()));
    }
    if let Some(expires_at) = request.expires_at {
        if expires_at <= Utc::now() {
            return Err(OrderError::Validation(
                "expiry must be in the future".to_string(),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::testing::{MockBroker, MockOracle};
    use crate::types::{OrderKind, TradeDirection};
    use rust_decimal_macros::dec;

    fn request() -> NewOrder {
        NewOrder {
            kind: OrderKind::Limit,
            direction: TradeDirection::Sell,
            token_from: "SOL".to_string(),
            token_to: "USDC".to_string(),
            amount: dec!(1),
            target_price: dec!(150),
            pair_address: "pair-1".to_string(),
            owner_wallet: "wallet-1".to_string(),
            expires_at: None,
        }
    }

    async fn manager(oracle: MockOracle) -> OrderManager {
        let db = Arc::new(Database::new_in_memory().await.unwrap());
        OrderManager::new(
            db,
            Arc::new(oracle),
            Arc::new(MockBroker::default()),
            Config::default(),
        )
    }

    #[tokio::test]
    async fn create_seeds_price_from_quote() {
        let manager = manager(MockOracle::fixed(dec!(140))).await;

        let order = manager.create_order(request()).await.unwrap();
        assert_eq!(order.status, OrderStatus::Active);
        assert_eq!(order.current_price, dec!(140));
        assert!(manager.is_monitoring().await);

        manager.stop().await;
        assert!(!manager.is_monitoring().await);
    }

    #[tokio::test]
    async fn create_survives_a_pricing_outage() {
        let manager = manager(MockOracle::unavailable()).await;

        let order = manager.create_order(request()).await.unwrap();
        assert_eq!(order.current_price, Decimal::ZERO);
        assert_eq!(order.status, OrderStatus::Active);

        manager.stop().await;
    }

    #[tokio::test]
    async fn rejects_invalid_requests_without_persisting() {
        let manager = manager(MockOracle::fixed(dec!(1))).await;

        let bad_amount = NewOrder {
            amount: dec!(0),
            ..request()
        };
        assert!(matches!(
            manager.create_order(bad_amount).await,
            Err(OrderError::Validation(_))
        ));

        let bad_price = NewOrder {
            target_price: dec!(-5),
            ..request()
        };
        assert!(matches!(
            manager.create_order(bad_price).await,
            Err(OrderError::Validation(_))
        ));

        let same_token = NewOrder {
            token_to: "SOL".to_string(),
            ..request()
        };
        assert!(matches!(
            manager.create_order(same_token).await,
            Err(OrderError::Validation(_))
        ));

        let stale_expiry = NewOrder {
            expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
            ..request()
        };
        assert!(matches!(
            manager.create_order(stale_expiry).await,
            Err(OrderError::Validation(_))
        ));

        assert!(manager.list_active_orders().await.unwrap().is_empty());
        // Nothing valid was created, so monitoring never started
        assert!(!manager.is_monitoring().await);
    }

    #[tokio::test]
    async fn cancel_moves_active_to_cancelled_once() {
        let manager = manager(MockOracle::fixed(dec!(140))).await;
        let order = manager.create_order(request()).await.unwrap();

        manager.cancel_order(&order.id).await.unwrap();
        let loaded = manager.get_order(&order.id).await.unwrap();
        assert_eq!(loaded.status, OrderStatus::Cancelled);

        assert!(matches!(
            manager.cancel_order(&order.id).await,
            Err(OrderError::NotActive { .. })
        ));

        manager.stop().await;
    }

    #[tokio::test]
    async fn listing_is_scoped_by_wallet() {
        let manager = manager(MockOracle::fixed(dec!(140))).await;
        manager.create_order(request()).await.unwrap();
        manager
            .create_order(NewOrder {
                owner_wallet: "wallet-2".to_string(),
                ..request()
            })
            .await
            .unwrap();

        assert_eq!(
            manager
                .list_orders_for_wallet("wallet-1")
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(manager.list_active_orders().await.unwrap().len(), 2);

        manager.stop().await;
    }

    #[tokio::test]
    async fn monitoring_start_is_idempotent() {
        let manager = manager(MockOracle::fixed(dec!(140))).await;

        manager.ensure_monitoring().await;
        manager.ensure_monitoring().await;
        assert!(manager.is_monitoring().await);

        manager.stop().await;
        assert!(!manager.is_monitoring().await);

        // Can be restarted after a stop
        manager.ensure_monitoring().await;
        assert!(manager.is_monitoring().await);
        manager.stop().await;
    }
}
