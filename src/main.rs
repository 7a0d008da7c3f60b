//! DLMM Order Bot CLI
//!
//! Registers price-triggered orders against Saros DLMM pools and runs the
//! monitoring/execution loop.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dlmm_order_bot::{
    Config, Database, DlmmClient, NewOrder, Order, OrderKind, OrderManager, TradeDirection,
};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "dlmm-order-bot")]
#[command(about = "Price-triggered limit and stop-loss orders for Saros DLMM pools")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the order monitor until interrupted
    Run,

    /// Create a new order
    Create {
        /// Order kind: limit or stop-loss
        #[arg(short, long, default_value = "limit")]
        kind: OrderKind,

        /// Trade direction: buy or sell
        #[arg(short, long, default_value = "sell")]
        direction: TradeDirection,

        /// Mint of the token to sell
        #[arg(long)]
        token_from: String,

        /// Mint of the token to buy
        #[arg(long)]
        token_to: String,

        /// Amount of token_from to sell
        #[arg(short, long)]
        amount: Decimal,

        /// Trigger price, in token_to per unit of token_from
        #[arg(short, long)]
        target_price: Decimal,

        /// DLMM pair address used for pricing and execution
        #[arg(short, long)]
        pair: String,

        /// Owner wallet address
        #[arg(short, long)]
        wallet: String,

        /// Optional expiry, in hours from now
        #[arg(long)]
        expires_in_hours: Option<f64>,
    },

    /// Cancel an active order
    Cancel {
        /// Order id
        id: String,
    },

    /// List orders
    List {
        /// Only orders for this wallet
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// Show order statistics
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .compact()
        .init();

    // Load configuration
    let config = Config::from_env()?;

    match cli.command {
        Commands::Run => run_monitor(&config).await?,
        Commands::Create {
            kind,
            direction,
            token_from,
            token_to,
            amount,
            target_price,
            pair,
            wallet,
            expires_in_hours,
        } => {
            let expires_at = expires_in_hours
                .map(|h| chrono::Utc::now() + chrono::Duration::seconds((h * 3600.0) as i64));
            let request = NewOrder {
                kind,
                direction,
                token_from,
                token_to,
                amount,
                target_price,
                pair_address: pair,
                owner_wallet: wallet,
                expires_at,
            };
            create_order(&config, request).await?;
        }
        Commands::Cancel { id } => cancel_order(&config, &id).await?,
        Commands::List { wallet } => list_orders(&config, wallet.as_deref()).await?,
        Commands::Stats => show_stats(&config).await?,
    }

    Ok(())
}

async fn build_manager(config: &Config) -> Result<OrderManager> {
    let db = Arc::new(Database::new(&config.database_path).await?);
    let client = Arc::new(DlmmClient::new(config));
    Ok(OrderManager::new(
        db,
        client.clone(),
        client,
        config.clone(),
    ))
}

async fn run_monitor(config: &Config) -> Result<()> {
    println!("\n{}", "=".repeat(70));
    println!("  DLMM ORDER MONITOR");
    println!(
        "  Sweep: {}s | Quote timeout: {}s | Max attempts: {}",
        config.tick_interval_seconds, config.quote_timeout_seconds, config.max_execution_attempts
    );
    println!("{}\n", "=".repeat(70));

    let manager = build_manager(config).await?;

    let active = manager.list_active_orders().await?;
    println!("Monitoring {} active orders (Ctrl+C to stop)\n", active.len());

    manager.ensure_monitoring().await;

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    manager.stop().await;

    Ok(())
}

async fn create_order(config: &Config, request: NewOrder) -> Result<()> {
    let manager = build_manager(config).await?;
    let order = manager.create_order(request).await?;

    println!("Created order {}", order.id);
    println!(
        "  {} {} {} -> {} | target {} | reference price {}",
        order.kind, order.amount, order.token_from, order.token_to, order.target_price,
        order.current_price
    );
    println!("\nRun `dlmm-order-bot run` to start monitoring.");

    // The create command exits; the long-running `run` command owns the loop
    manager.stop().await;
    Ok(())
}

async fn cancel_order(config: &Config, id: &str) -> Result<()> {
    let manager = build_manager(config).await?;
    manager.cancel_order(id).await?;
    println!("Order {} cancelled", id);
    Ok(())
}

async fn list_orders(config: &Config, wallet: Option<&str>) -> Result<()> {
    let manager = build_manager(config).await?;
    let orders = match wallet {
        Some(wallet) => manager.list_orders_for_wallet(wallet).await?,
        None => manager.list_active_orders().await?,
    };

    if orders.is_empty() {
        println!("No orders found.");
        return Ok(());
    }

    println!("\n{}", "-".repeat(70));
    for order in &orders {
        print_order(order);
    }
    println!("{}", "-".repeat(70));
    println!("{} orders", orders.len());

    Ok(())
}

fn print_order(order: &Order) {
    println!(
        "{} [{}] {} {} -> {}",
        order.id, order.status, order.amount, order.token_from, order.token_to
    );
    println!(
        "    target {} | last price {} | attempts {} | pair {}",
        order.target_price, order.current_price, order.execution_attempts, order.pair_address
    );
}

async fn show_stats(config: &Config) -> Result<()> {
    let db = Database::new(&config.database_path).await?;
    let stats = db.get_stats().await?;

    println!("\n{}", "=".repeat(70));
    println!("  ORDER STATISTICS");
    println!("{}\n", "=".repeat(70));

    println!("  Active:     {}", stats.active);
    println!("  Executed:   {}", stats.executed);
    println!("  Cancelled:  {}", stats.cancelled);
    println!("  Expired:    {}", stats.expired);
    println!("  Failed:     {}", stats.failed);
    println!("  Total:      {}", stats.total());

    Ok(())
}
