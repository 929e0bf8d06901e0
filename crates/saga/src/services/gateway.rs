//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::Money;
use domain::Address;

use crate::error::SagaError;

/// The single line item shown on a checkout page.
#[derive(Debug, Clone)]
pub struct LineItem {
    pub name: String,
    pub image_url: Option<String>,
}

/// An open checkout session holding the customer's payment.
#[derive(Debug, Clone)]
pub struct CheckoutHold {
    /// Session id; this is the saga's compensation handle.
    pub session_id: String,
    /// Secret the frontend embeds to render the payment form.
    pub client_secret: String,
}

/// What the gateway knows about a session after the customer paid.
#[derive(Debug, Clone, Default)]
pub struct SessionDetails {
    pub payment_intent_id: Option<String>,
    pub customer_id: Option<String>,
}

/// Billing details the customer entered at checkout.
#[derive(Debug, Clone)]
pub struct GatewayCustomer {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub billing_address: Option<Address>,
}

/// Trait for the payment gateway holding the customer's money.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a checkout session charging `amount` for the given line item.
    ///
    /// Passing a known `customer_id` reattaches the session to an existing
    /// gateway customer instead of creating a new one.
    async fn open_hold(
        &self,
        amount: Money,
        line_item: LineItem,
        customer_id: Option<&str>,
    ) -> Result<CheckoutHold, SagaError>;

    /// Reads a session back after the customer completed payment.
    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, SagaError>;

    /// Reads the billing details of a gateway customer.
    async fn get_customer(&self, customer_id: &str) -> Result<GatewayCustomer, SagaError>;

    /// Refunds the payment behind a session in full.
    ///
    /// Keyed by session id so compensation works even when the saga failed
    /// before it ever read the session details. Returns the refund id.
    async fn refund(&self, session_id: &str) -> Result<String, SagaError>;
}

#[async_trait]
impl<T: PaymentGateway + ?Sized> PaymentGateway for std::sync::Arc<T> {
    async fn open_hold(
        &self,
        amount: Money,
        line_item: LineItem,
        customer_id: Option<&str>,
    ) -> Result<CheckoutHold, SagaError> {
        (**self).open_hold(amount, line_item, customer_id).await
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, SagaError> {
        (**self).get_session(session_id).await
    }

    async fn get_customer(&self, customer_id: &str) -> Result<GatewayCustomer, SagaError> {
        (**self).get_customer(customer_id).await
    }

    async fn refund(&self, session_id: &str) -> Result<String, SagaError> {
        (**self).refund(session_id).await
    }
}

#[derive(Debug, Default)]
struct InMemoryGatewayState {
    sessions: HashMap<String, SessionRecord>,
    customers: HashMap<String, GatewayCustomer>,
    next_id: u32,
    fail_on_open_hold: bool,
    fail_on_get_session: bool,
    fail_on_refund: bool,
    refund_count: u32,
}

#[derive(Debug)]
struct SessionRecord {
    amount: Money,
    customer_id: String,
    refunded: bool,
}

/// In-memory payment gateway for testing and default wiring.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryGatewayState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a new in-memory gateway.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the gateway to fail the next `open_hold` call.
    pub fn set_fail_on_open_hold(&self, fail: bool) {
        self.state.write().unwrap().fail_on_open_hold = fail;
    }

    /// Configures the gateway to fail the next `get_session` call.
    pub fn set_fail_on_get_session(&self, fail: bool) {
        self.state.write().unwrap().fail_on_get_session = fail;
    }

    /// Configures the gateway to fail the next `refund` call.
    pub fn set_fail_on_refund(&self, fail: bool) {
        self.state.write().unwrap().fail_on_refund = fail;
    }

    /// Seeds a customer as if they had completed checkout before.
    pub fn seed_customer(&self, customer: GatewayCustomer) {
        let mut state = self.state.write().unwrap();
        state.customers.insert(customer.id.clone(), customer);
    }

    /// Returns the number of open sessions.
    pub fn session_count(&self) -> usize {
        self.state.read().unwrap().sessions.len()
    }

    /// Returns how many refunds have been issued.
    pub fn refund_count(&self) -> u32 {
        self.state.read().unwrap().refund_count
    }

    /// True if the session's payment was refunded.
    pub fn is_refunded(&self, session_id: &str) -> bool {
        self.state
            .read()
            .unwrap()
            .sessions
            .get(session_id)
            .is_some_and(|s| s.refunded)
    }

    /// The amount held by a session, if it exists.
    pub fn held_amount(&self, session_id: &str) -> Option<Money> {
        self.state
            .read()
            .unwrap()
            .sessions
            .get(session_id)
            .map(|s| s.amount)
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn open_hold(
        &self,
        amount: Money,
        line_item: LineItem,
        customer_id: Option<&str>,
    ) -> Result<CheckoutHold, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_open_hold {
            return Err(SagaError::Gateway("checkout session declined".to_string()));
        }

        state.next_id += 1;
        let customer_id = match customer_id {
            Some(id) => id.to_string(),
            None => {
                let id = format!("cus_{:04}", state.next_id);
                state.customers.insert(
                    id.clone(),
                    GatewayCustomer {
                        id: id.clone(),
                        name: None,
                        email: None,
                        phone: None,
                        billing_address: None,
                    },
                );
                id
            }
        };

        let session_id = format!("cs_{:04}", state.next_id);
        tracing::debug!(%session_id, item = %line_item.name, "opened checkout hold");
        state.sessions.insert(
            session_id.clone(),
            SessionRecord {
                amount,
                customer_id,
                refunded: false,
            },
        );

        Ok(CheckoutHold {
            client_secret: format!("{session_id}_secret"),
            session_id,
        })
    }

    async fn get_session(&self, session_id: &str) -> Result<SessionDetails, SagaError> {
        let state = self.state.read().unwrap();
        if state.fail_on_get_session {
            return Err(SagaError::Gateway("session lookup failed".to_string()));
        }
        let session = state
            .sessions
            .get(session_id)
            .ok_or_else(|| SagaError::Gateway(format!("no such session: {session_id}")))?;
        Ok(SessionDetails {
            payment_intent_id: Some(format!("pi_for_{session_id}")),
            customer_id: Some(session.customer_id.clone()),
        })
    }

    async fn get_customer(&self, customer_id: &str) -> Result<GatewayCustomer, SagaError> {
        let state = self.state.read().unwrap();
        state
            .customers
            .get(customer_id)
            .cloned()
            .ok_or_else(|| SagaError::Gateway(format!("no such customer: {customer_id}")))
    }

    async fn refund(&self, session_id: &str) -> Result<String, SagaError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_refund {
            return Err(SagaError::Gateway("refund rejected".to_string()));
        }

        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or_else(|| SagaError::Gateway(format!("no such session: {session_id}")))?;
        if session.refunded {
            return Err(SagaError::Gateway(format!(
                "session already refunded: {session_id}"
            )));
        }
        session.refunded = true;
        state.refund_count += 1;
        Ok(format!("re_{:04}", state.refund_count))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_item() -> LineItem {
        LineItem {
            name: "Ethiopia Natural".to_string(),
            image_url: None,
        }
    }

    #[tokio::test]
    async fn test_hold_session_and_refund() {
        let gateway = InMemoryPaymentGateway::new();

        let hold = gateway
            .open_hold(Money::from_cents(2404), line_item(), None)
            .await
            .unwrap();
        assert!(hold.session_id.starts_with("cs_"));
        assert_eq!(
            gateway.held_amount(&hold.session_id),
            Some(Money::from_cents(2404))
        );

        let session = gateway.get_session(&hold.session_id).await.unwrap();
        assert!(session.customer_id.is_some());
        assert!(session.payment_intent_id.is_some());

        let refund_id = gateway.refund(&hold.session_id).await.unwrap();
        assert!(refund_id.starts_with("re_"));
        assert!(gateway.is_refunded(&hold.session_id));
    }

    #[tokio::test]
    async fn test_double_refund_rejected() {
        let gateway = InMemoryPaymentGateway::new();
        let hold = gateway
            .open_hold(Money::from_cents(2404), line_item(), None)
            .await
            .unwrap();

        gateway.refund(&hold.session_id).await.unwrap();
        assert!(gateway.refund(&hold.session_id).await.is_err());
        assert_eq!(gateway.refund_count(), 1);
    }

    #[tokio::test]
    async fn test_reuses_known_customer() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.seed_customer(GatewayCustomer {
            id: "cus_known".to_string(),
            name: Some("Ada Lovelace".to_string()),
            email: Some("ada@example.com".to_string()),
            phone: None,
            billing_address: None,
        });

        let hold = gateway
            .open_hold(Money::from_cents(2404), line_item(), Some("cus_known"))
            .await
            .unwrap();
        let session = gateway.get_session(&hold.session_id).await.unwrap();
        assert_eq!(session.customer_id.as_deref(), Some("cus_known"));
    }

    #[tokio::test]
    async fn test_fail_toggles() {
        let gateway = InMemoryPaymentGateway::new();
        gateway.set_fail_on_open_hold(true);
        assert!(
            gateway
                .open_hold(Money::from_cents(100), line_item(), None)
                .await
                .is_err()
        );
        assert_eq!(gateway.session_count(), 0);
    }
}
