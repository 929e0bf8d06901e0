//! In-memory store implementations for testing and default wiring.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use common::{OrderId, UserId};
use domain::{Address, Order, OrderStatus};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::{OrderStore, Result, UserRecord, UserStore};

/// In-memory order store with the same semantics as the PostgreSQL
/// implementation.
#[derive(Clone, Default)]
pub struct InMemoryOrderStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
}

impl InMemoryOrderStore {
    /// Creates a new empty in-memory order store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of orders stored.
    pub async fn order_count(&self) -> usize {
        self.orders.read().await.len()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create(&self, order: Order) -> Result<Order> {
        let mut orders = self.orders.write().await;
        orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn get(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.orders.read().await.get(&order_id).cloned())
    }

    async fn list_for_user(&self, user_id: UserId) -> Result<Vec<Order>> {
        let orders = self.orders.read().await;
        let mut result: Vec<Order> = orders
            .values()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }

    async fn set_card_details(
        &self,
        order_id: OrderId,
        cardholder_id: &str,
        card_id: &str,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.attach_card(cardholder_id, card_id);
        Ok(order.clone())
    }

    async fn update_status(
        &self,
        order_id: OrderId,
        status: OrderStatus,
        error_details: Option<&str>,
    ) -> Result<Order> {
        let mut orders = self.orders.write().await;
        let order = orders
            .get_mut(&order_id)
            .ok_or(StoreError::OrderNotFound(order_id))?;
        order.apply_status(status, error_details)?;
        Ok(order.clone())
    }
}

/// In-memory user store.
#[derive(Clone, Default)]
pub struct InMemoryUserStore {
    users: Arc<RwLock<HashMap<UserId, UserRecord>>>,
}

impl InMemoryUserStore {
    /// Creates a new empty in-memory user store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, user_id: UserId) -> Result<Option<UserRecord>> {
        Ok(self.users.read().await.get(&user_id).cloned())
    }

    async fn upsert(&self, record: UserRecord) -> Result<()> {
        self.users.write().await.insert(record.id, record);
        Ok(())
    }

    async fn set_billing_identity(
        &self,
        user_id: UserId,
        cardholder_id: &str,
        customer_id: &str,
    ) -> Result<()> {
        let mut users = self.users.write().await;
        let user = users
            .get_mut(&user_id)
            .ok_or(StoreError::UserNotFound(user_id))?;
        user.cardholder_id = Some(cardholder_id.to_string());
        user.customer_id = Some(customer_id.to_string());
        Ok(())
    }

    async fn shipping_address(&self, user_id: UserId) -> Result<Option<Address>> {
        let users = self.users.read().await;
        Ok(users
            .get(&user_id)
            .and_then(|u| u.shipping_address.clone()))
    }
}
