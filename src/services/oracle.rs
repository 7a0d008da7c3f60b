//! Price oracle contract

use crate::services::OrderError;
use crate::types::Quote;
use async_trait::async_trait;
use rust_decimal::Decimal;

/// Best-effort point-in-time pricing for a DLMM pair.
///
/// A failure means "no observation this attempt", never order failure: the
/// caller leaves the order untouched and asks again on a later tick.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// Quote selling `amount_in` of `token_from` for `token_to` on the pair.
    ///
    /// Fails with [`OrderError::PricingUnavailable`] on network or pool
    /// trouble.
    async fn quote(
        &self,
        pair_address: &str,
        token_from: &str,
        token_to: &str,
        amount_in: Decimal,
    ) -> Result<Quote, OrderError>;
}
