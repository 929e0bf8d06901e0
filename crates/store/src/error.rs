//! Store error types.

use common::{OrderId, UserId};
use domain::DomainError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No order with the given id.
    #[error("order not found: {0}")]
    OrderNotFound(OrderId),

    /// No user with the given id.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A status update violated the order state machine.
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row failed to map back into a domain value.
    #[error("corrupt row for {entity}: {detail}")]
    CorruptRow {
        entity: &'static str,
        detail: String,
    },
}
