//! Fee calculator.
//!
//! Turns a listing's base price into the final amount held at the payment
//! gateway, folding in shipping, the platform margin, and a gross-up for
//! the processor's percentage-plus-fixed fee so the merchant still nets the
//! intended amount after the processor takes its cut.

use common::Money;

use crate::error::DomainError;

/// Processor percentage fee (2.9%).
pub const PROCESSOR_PCT: f64 = 0.029;

/// Processor fixed fee per charge ($0.30).
pub const PROCESSOR_FIXED_FEE: f64 = 0.30;

/// Platform margin (5%).
pub const PLATFORM_PCT: f64 = 0.05;

/// Flat shipping fee ($1.95) for orders under the free-shipping threshold.
pub const FLAT_SHIPPING: f64 = 1.95;

/// Orders at or above this base price ($30) ship free.
pub const FREE_SHIPPING_THRESHOLD: f64 = 30.0;

/// Calculates the final price to charge for a listing.
///
/// `shipping` is added below the free-shipping threshold, the platform
/// margin is applied on top, and the result is grossed up by
/// `(x + fixed) / (1 - pct)` so that after the processor deducts its fee
/// the net still covers store cost plus margin. Rounded to the cent;
/// deterministic for a given base price.
pub fn final_price(base_price: Money) -> Result<Money, DomainError> {
    if !base_price.is_positive() {
        return Err(DomainError::NonPositivePrice(base_price));
    }

    let base = base_price.as_dollars();
    let shipping = if base < FREE_SHIPPING_THRESHOLD {
        FLAT_SHIPPING
    } else {
        0.0
    };

    let store_cost = base + shipping;
    let after_margin = store_cost * (1.0 + PLATFORM_PCT);
    let grossed_up = (after_margin + PROCESSOR_FIXED_FEE) / (1.0 - PROCESSOR_PCT);

    Ok(Money::round_dollars(grossed_up))
}
