//! SQLite order store
//!
//! The `status` column is the single serialization point for the whole
//! engine: claim, cancel, and finalize are all conditional updates keyed on
//! the current status, so overlapping sweeps and user actions cannot move an
//! order out of Active twice.

use crate::services::OrderError;
use crate::types::{Order, OrderKind, OrderStats, OrderStatus, TradeDirection};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::info;

/// Database connection pool
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database at the given path
    pub async fn new(path: &str) -> Result<Self, OrderError> {
        let options = SqliteConnectOptions::from_str(path)?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;

        Ok(db)
    }

    /// In-memory database for tests. A single connection keeps every query
    /// on the same SQLite instance.
    #[cfg(test)]
    pub async fn new_in_memory() -> Result<Self, OrderError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.initialize().await?;
        Ok(db)
    }

    /// Initialize database schema
    async fn initialize(&self) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS orders (
                id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                direction TEXT NOT NULL,
                token_from TEXT NOT NULL,
                token_to TEXT NOT NULL,
                amount TEXT NOT NULL,
                target_price TEXT NOT NULL,
                current_price TEXT NOT NULL DEFAULT '0',
                status TEXT NOT NULL DEFAULT 'Active',
                pair_address TEXT NOT NULL,
                owner_wallet TEXT NOT NULL,
                execution_attempts INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                expires_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_status ON orders(status)")
            .execute(&self.pool)
            .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_orders_wallet ON orders(owner_wallet)")
            .execute(&self.pool)
            .await?;

        info!("Order database initialized");
        Ok(())
    }

    // ==================== CRUD ====================

    /// Persist a freshly created order
    pub async fn create_order(&self, order: &Order) -> Result<(), OrderError> {
        sqlx::query(
            r#"
            INSERT INTO orders (
                id, kind, direction, token_from, token_to,
                amount, target_price, current_price, status,
                pair_address, owner_wallet, execution_attempts,
                created_at, updated_at, expires_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&order.id)
        .bind(order.kind.as_str())
        .bind(order.direction.as_str())
        .bind(&order.token_from)
        .bind(&order.token_to)
        .bind(order.amount.to_string())
        .bind(order.target_price.to_string())
        .bind(order.current_price.to_string())
        .bind(order.status.as_str())
        .bind(&order.pair_address)
        .bind(&order.owner_wallet)
        .bind(order.execution_attempts as i64)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .bind(order.expires_at.map(|d| d.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_order(&self, id: &str) -> Result<Order, OrderError> {
        let row = sqlx::query("SELECT * FROM orders WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| OrderError::NotFound(id.to_string()))?;

        row_to_order(&row)
    }

    pub async fn get_orders_by_status(
        &self,
        status: OrderStatus,
    ) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE status = ? ORDER BY created_at DESC",
        )
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    pub async fn get_orders_by_wallet(&self, wallet: &str) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE owner_wallet = ? ORDER BY created_at DESC",
        )
        .bind(wallet)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    pub async fn get_orders_by_pair(&self, pair_address: &str) -> Result<Vec<Order>, OrderError> {
        let rows = sqlx::query(
            "SELECT * FROM orders WHERE pair_address = ? ORDER BY created_at DESC",
        )
        .bind(pair_address)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_order).collect()
    }

    /// Remove an order outright. Maintenance only; the engine never deletes.
    pub async fn delete_order(&self, id: &str) -> Result<bool, OrderError> {
        let result = sqlx::query("DELETE FROM orders WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() == 1)
    }

    // ==================== STATUS TRANSITIONS ====================

    /// Refresh the observed market price. Only touches Active rows so a
    /// stale sweep can never overwrite a terminal or claimed order.
    pub async fn update_order_price(&self, id: &str, price: Decimal) -> Result<bool, OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET current_price = ?, updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(price.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Reserve an Active order for exclusive execution.
    ///
    /// Returns false when the order was already claimed, cancelled, or
    /// otherwise not Active; the caller must then back off.
    pub async fn claim_order(&self, id: &str) -> Result<bool, OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'Claimed', updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Roll a failed claim back to Active.
    ///
    /// With `count_attempt`, the attempt counter is bumped and the order goes
    /// terminal Failed once it reaches `max_attempts` (0 = no cap). Returns
    /// the status the order landed on.
    pub async fn release_claim(
        &self,
        id: &str,
        count_attempt: bool,
        max_attempts: u32,
    ) -> Result<OrderStatus, OrderError> {
        let increment = if count_attempt { 1i64 } else { 0 };
        sqlx::query(
            r#"
            UPDATE orders
               SET execution_attempts = execution_attempts + ?1,
                   status = CASE
                       WHEN ?2 > 0 AND execution_attempts + ?1 >= ?2 THEN 'Failed'
                       ELSE 'Active'
                   END,
                   updated_at = ?3
             WHERE id = ?4 AND status = 'Claimed'
            "#,
        )
        .bind(increment)
        .bind(max_attempts as i64)
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(self.get_order(id).await?.status)
    }

    /// Commit a confirmed execution, stamping the executed price
    pub async fn finalize_executed(&self, id: &str, price: Decimal) -> Result<bool, OrderError> {
        let result = sqlx::query(
            r#"
            UPDATE orders SET status = 'Executed', current_price = ?, updated_at = ?
             WHERE id = ? AND status = 'Claimed'
            "#,
        )
        .bind(price.to_string())
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    /// Cancel an Active order. Rejected once execution has claimed it or the
    /// order is already terminal.
    pub async fn cancel_order(&self, id: &str) -> Result<(), OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'Cancelled', updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 1 {
            return Ok(());
        }

        let order = self.get_order(id).await?;
        Err(OrderError::NotActive {
            id: id.to_string(),
            status: order.status,
        })
    }

    /// Retire an Active order whose expiry has passed
    pub async fn expire_order(&self, id: &str) -> Result<bool, OrderError> {
        let result = sqlx::query(
            "UPDATE orders SET status = 'Expired', updated_at = ? WHERE id = ? AND status = 'Active'",
        )
        .bind(Utc::now().to_rfc3339())
        .bind(id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    // ==================== REPORTING ====================

    /// Order counts per status
    pub async fn get_stats(&self) -> Result<OrderStats, OrderError> {
        let mut stats = OrderStats::default();

        let rows: Vec<(String, i64)> =
            sqlx::query_as("SELECT status, COUNT(*) FROM orders GROUP BY status")
                .fetch_all(&self.pool)
                .await?;

        for (status, count) in rows {
            match status.as_str() {
                "Active" | "Claimed" => stats.active += count,
                "Executed" => stats.executed += count,
                "Cancelled" => stats.cancelled += count,
                "Expired" => stats.expired += count,
                "Failed" => stats.failed += count,
                _ => {}
            }
        }

        Ok(stats)
    }
}

fn row_to_order(row: &SqliteRow) -> Result<Order, OrderError> {
    let parse_error = |msg: String| OrderError::Persistence(sqlx::Error::Decode(msg.into()));

    let kind_str: String = row.get("kind");
    let kind = OrderKind::from_str(&kind_str).map_err(parse_error)?;

    let direction_str: String = row.get("direction");
    let direction = TradeDirection::from_str(&direction_str).map_err(parse_error)?;

    let status_str: String = row.get("status");
    let status = OrderStatus::from_str(&status_str).map_err(parse_error)?;

    let amount_str: String = row.get("amount");
    let target_price_str: String = row.get("target_price");
    let current_price_str: String = row.get("current_price");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");
    let expires_at_str: Option<String> = row.get("expires_at");
    let execution_attempts: i64 = row.get("execution_attempts");

    Ok(Order {
        id: row.get("id"),
        kind,
        direction,
        token_from: row.get("token_from"),
        token_to: row.get("token_to"),
        amount: parse_decimal(&amount_str)?,
        target_price: parse_decimal(&target_price_str)?,
        current_price: parse_decimal(&current_price_str)?,
        status,
        pair_address: row.get("pair_address"),
        owner_wallet: row.get("owner_wallet"),
        execution_attempts: execution_attempts as u32,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
        expires_at: expires_at_str.as_deref().map(parse_timestamp).transpose()?,
    })
}

fn parse_decimal(s: &str) -> Result<Decimal, OrderError> {
    Decimal::from_str(s).map_err(|e| {
        OrderError::Persistence(sqlx::Error::Decode(
            format!("bad decimal {:?}: {}", s, e).into(),
        ))
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, OrderError> {
    DateTime::parse_from_rfc3339(s)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| {
            OrderError::Persistence(sqlx::Error::Decode(
                format!("bad timestamp {:?}: {}", s, e).into(),
            ))
        })
}
