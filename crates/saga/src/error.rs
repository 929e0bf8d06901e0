//! Saga error types.

use common::UserId;
use thiserror::Error;

/// Errors that can occur while running the purchase saga.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request was rejected before any side effect happened.
    #[error("validation error: {0}")]
    Validation(String),

    /// The payment gateway rejected or failed a call.
    #[error("payment gateway error: {0}")]
    Gateway(String),

    /// The card issuing service rejected or failed a call.
    #[error("card issuing error: {0}")]
    Issuing(String),

    /// The browser automation could not complete the vendor purchase.
    #[error("automation error: {0}")]
    Automation(String),

    /// No user with the given id.
    #[error("user not found: {0}")]
    UserNotFound(UserId),

    /// A domain rule was violated.
    #[error(transparent)]
    Domain(#[from] domain::DomainError),

    /// The durable store failed.
    #[error(transparent)]
    Store(#[from] store::StoreError),
}
