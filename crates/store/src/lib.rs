//! Persistence for the purchase fulfillment service.
//!
//! Two traits — [`OrderStore`] for the durable order audit trail and
//! [`UserStore`] for user records carrying the cached billing identity and
//! shipping address — each with an in-memory implementation for tests and
//! default wiring, and a PostgreSQL implementation backed by sqlx.

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::StoreError;
pub use memory::{InMemoryOrderStore, InMemoryUserStore};
pub use postgres::{PostgresOrderStore, PostgresUserStore};
pub use store::{OrderStore, Result, UserRecord, UserStore};
