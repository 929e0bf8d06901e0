//! Shared types for the purchase fulfillment service.

pub mod ids;
pub mod money;

pub use ids::{OrderId, UserId};
pub use money::{Money, MoneyParseError};
