//! Domain error types.

use common::{Money, MoneyParseError};
use thiserror::Error;

use crate::order::OrderStatus;

/// Errors raised by domain rules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// A price that must be positive was zero or negative.
    #[error("price must be positive, got {0}")]
    NonPositivePrice(Money),

    /// An order status transition outside the state machine.
    #[error("invalid order status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: OrderStatus,
        to: OrderStatus,
    },

    /// A required field was missing or empty.
    #[error("missing required field: {0}")]
    MissingField(&'static str),

    /// A stored decimal amount failed to parse.
    #[error(transparent)]
    Money(#[from] MoneyParseError),
}
