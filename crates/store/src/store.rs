//! Store trait definitions.

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Address, Order, OrderStatus};
use serde::{Deserialize, Serialize};

use crate::error::StoreError;

/// Convenience type alias for store results.
pub type Result<T> = std::result::Result<T, StoreError>;

/// A user record as the fulfillment service sees it.
///
/// `cardholder_id`/`customer_id` cache the billing identity provisioned on
/// the user's first successful purchase; later orders reuse them instead of
/// registering a duplicate cardholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub id: UserId,
    pub email: String,
    pub cardholder_id: Option<String>,
    pub customer_id: Option<String>,
    pub shipping_address: Option<Address>,
}

impl UserRecord {
    /// Creates a record with nothing cached yet.
    pub fn new(id: UserId, email: impl Into<String>) -> Self {
        Self {
            id,
            email: email.into(),
            cardholder_id: None,
            customer_id: None,
            shipping_address: None,
        }
    }
}

/// Durable storage for order records.
///
/// Orders are an audit trail: implementations must never delete rows, and
/// `update_status` must enforce the forward-only state machine while
/// treating exact repeats as a no-op (no duplicate rows, no duplicated
/// `error_details` text).
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persists a freshly created order.
    async fn create(&self, order: Order) -> Result<Order>;

    /// Loads an order by id.
    async fn get(&self, order_id: OrderId) -> Result<Option<Order>>;

    /// Lists a user's orders, newest first.
    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>>;

    /// Attaches the issuer ids once card issuance has succeeded.
    ///
    /// Ids are never cleared afterwards; compensation needs them.
    async fn set_card_details(
        &self,
        order_id: OrderId,
        cardholder_id: &str,
        card_id: &str,
    ) -> Result<Order>;

    /// Applies a validated, idempotent status update.
    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        error_details: Option<&str>,
    ) -> Result<Order>;
}

#[async_trait]
impl<T: OrderStore + ?Sized> OrderStore for std::sync::Arc<T> {
    async fn create(&self, order: Order) -> Result<Order> {
        (**self).create(order).await
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        (**self).get(order_id).await
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        (**self).list_for_user(user_id).await
    }

    async fn set_card_details(
        &self,
        order_id: OrderId,
        cardholder_id: &str,
        card_id: &str,
    ) -> Result<Order> {
        (**self).set_card_details(order_id, cardholder_id, card_id).await
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        error_details: Option<&str>,
    ) -> Result<Order> {
        (**self).update_status(order_id, status, error_details).await
    }
}

/// Storage for user records and the cached billing identity.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Loads a user record.
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>>;

    /// Inserts or replaces a user record.
    async fn upsert(&self, record: UserRecord) -> Result<()>;

    /// Caches the provisioned cardholder and gateway customer ids.
    async fn set_billing_identity(
        &self,
        user_id: UserId,
        cardholder_id: &str,
        customer_id: &str,
    ) -> Result<()>;

    /// Returns the user's shipping address, if one is on file.
    async fn shipping_address(&self, user_id: UserId) -> Result<Option<Address>>;
}

#[async_trait]
impl<T: UserStore + ?Sized> UserStore for std::sync::Arc<T> {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        (**self).get(user_id).await
    }

    async fn upsert(&self, record: UserRecord) -> Result<()> {
        (**self).upsert(record).await
    }

    async fn set_billing_identity(
        &self,
        user_id: UserId,
        cardholder_id: &str,
        customer_id: &str,
    ) -> Result<()> {
        (**self)
            .set_billing_identity(user_id, cardholder_id, customer_id)
            .await
    }

    async fn shipping_address(&self, user_id: UserId) -> Result<Option<Address>> {
        (**self).shipping_address(user_id).await
    }
}
