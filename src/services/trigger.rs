//! Trigger evaluation
//!
//! Pure decision function: an order plus an observed price either fires or
//! it doesn't. No side effects, so the same inputs always give the same
//! answer.
//!
//! The policy assumes `token_from -> token_to` is the sell leg: a limit
//! order fires once the price rises to the target, a stop-loss once it falls
//! to it. The recorded `direction` field does not change the comparison.
//! Whether a buy-side limit should instead fire on `<=` is an open product
//! question; see DESIGN.md.

use crate::types::{Order, OrderKind};
use rust_decimal::Decimal;

/// Decide whether an order's trigger condition is met at the given price.
///
/// Non-positive prices are treated as "no observation" and never fire;
/// a freshly created order that could not be quoted carries a zero
/// `current_price`, which must not trip a stop-loss.
pub fn should_execute(order: &Order, current_price: Decimal) -> bool {
    if current_price <= Decimal::ZERO {
        return false;
    }

    match order.kind {
        OrderKind::Limit => current_price >= order.target_price,
        OrderKind::StopLoss => current_price <= order.target_price,
    }
}
