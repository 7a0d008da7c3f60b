//! DLMM Order Bot Library
//!
//! Price-triggered limit and stop-loss orders for Saros DLMM liquidity
//! pools. Orders are persisted in SQLite; a monitor loop re-prices every
//! active order against the pool on a fixed cadence and hands firing orders
//! to an execution engine that builds, submits, and confirms the swap with
//! an at-most-once guarantee per order.

pub mod config;
pub mod db;
pub mod services;
pub mod types;

pub use config::Config;
pub use db::Database;
pub use services::{
    DlmmClient, ExecutionEngine, MonitorLoop, OrderError, OrderManager, PriceOracle, SwapBroker,
};
pub use types::{NewOrder, Order, OrderKind, OrderStats, OrderStatus, Quote, TradeDirection};
