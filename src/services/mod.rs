//! Order monitoring and execution services

pub mod dlmm;
pub mod error;
pub mod executor;
pub mod manager;
pub mod monitor;
pub mod oracle;
pub mod swap;
pub mod trigger;

#[cfg(test)]
pub mod testing;

pub use dlmm::DlmmClient;
pub use error::OrderError;
pub use executor::{ExecutionEngine, ExecutionOutcome};
pub use manager::OrderManager;
pub use monitor::MonitorLoop;
pub use oracle::PriceOracle;
pub use swap::{SubmissionHandle, SwapBroker, SwapRequest, SwapTransaction};
