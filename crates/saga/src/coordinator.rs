//! The purchase fulfillment saga.
//!
//! Drives the fixed pipeline: provision cardholder, issue a disposable
//! card, fetch the shipping address, run the vendor automation. A failure
//! at any step after the payment hold triggers best-effort compensation:
//! the order is marked failed with an audit narrative, the card (if one
//! exists) is deactivated, and the hold is refunded. The automation step
//! runs at most once per order; there are no retries.

use common::{OrderId, UserId};
use domain::{Order, OrderStatus, ProductListing, PurchaseRequest, pricing};
use store::{OrderStore, UserRecord, UserStore};

use crate::automation::{OrderDetails, PurchaseAutomation, Vendor};
use crate::error::SagaError;
use crate::pipeline;
use crate::services::gateway::PaymentGateway;
use crate::services::issuing::{CardIssuer, CardMetadata, CardholderRecord};

/// How a finished saga run left the order.
#[derive(Debug, Clone)]
pub struct PurchaseOutcome {
    pub order_id: OrderId,
    pub status: OrderStatus,
    pub card_id: Option<String>,
    /// Confirmation details scraped by the automation, when it succeeded.
    pub order_details: Option<OrderDetails>,
    /// The failure narrative, when the saga compensated.
    pub error: Option<String>,
    /// True when compensation itself failed and an operator must step in.
    pub needs_manual_review: bool,
}

/// Orchestrates one purchase from paid checkout session to terminal order
/// status.
pub struct PurchaseSaga<O, U, G, I, A> {
    orders: O,
    users: U,
    gateway: G,
    issuer: I,
    automation: A,
}

impl<O, U, G, I, A> PurchaseSaga<O, U, G, I, A>
where
    O: OrderStore,
    U: UserStore,
    G: PaymentGateway,
    I: CardIssuer,
    A: PurchaseAutomation,
{
    /// Creates a new saga over the given stores and services.
    pub fn new(orders: O, users: U, gateway: G, issuer: I, automation: A) -> Self {
        Self {
            orders,
            users,
            gateway,
            issuer,
            automation,
        }
    }

    /// Runs the saga for a paid checkout session.
    ///
    /// `Err` means the request was rejected before any side effect; once an
    /// order row exists, failures are absorbed into the returned
    /// [`PurchaseOutcome`] after compensation.
    #[tracing::instrument(
        skip(self, listing),
        fields(saga_type = pipeline::SAGA_TYPE, product = %listing.handle)
    )]
    pub async fn run(
        &self,
        user_id: UserId,
        session_id: &str,
        listing: &ProductListing,
        vendor: Vendor,
    ) -> Result<PurchaseOutcome, SagaError> {
        metrics::counter!("purchase_saga_executions_total").increment(1);
        let saga_start = std::time::Instant::now();

        listing
            .validate()
            .map_err(|e| SagaError::Validation(e.to_string()))?;
        if session_id.trim().is_empty() {
            return Err(SagaError::Validation("session handle is required".to_string()));
        }

        let user = self
            .users
            .get(user_id)
            .await?
            .ok_or(SagaError::UserNotFound(user_id))?;
        let price = pricing::final_price(listing.base_price)
            .map_err(|e| SagaError::Validation(e.to_string()))?;

        let order = self
            .orders
            .create(Order::new(
                user_id,
                &listing.handle,
                &listing.name,
                price,
                session_id,
            ))
            .await?;
        let order_id = order.id;
        tracing::info!(%order_id, "purchase saga started");

        // Step 1: provision cardholder
        tracing::info!(step = pipeline::STEP_PROVISION_CARDHOLDER, "saga step started");
        let cardholder_id = match self.provision_cardholder(&user, session_id).await {
            Ok(id) => id,
            Err(e) => {
                return Ok(self
                    .compensate(order_id, session_id, None, pipeline::STEP_PROVISION_CARDHOLDER, e)
                    .await
                    .finish(saga_start));
            }
        };

        // Step 2: issue card and read credentials
        tracing::info!(step = pipeline::STEP_ISSUE_CARD, "saga step started");
        let (credentials, holder) = match self
            .issue_card(&cardholder_id, session_id, user_id)
            .await
        {
            Ok(issued) => issued,
            Err((card_id, e)) => {
                return Ok(self
                    .compensate(order_id, session_id, card_id, pipeline::STEP_ISSUE_CARD, e)
                    .await
                    .finish(saga_start));
            }
        };
        let card_id = credentials.card_id.clone();

        if let Err(e) = self
            .orders
            .set_card_details(order_id, &cardholder_id, &card_id)
            .await
        {
            return Ok(self
                .compensate(
                    order_id,
                    session_id,
                    Some(card_id),
                    pipeline::STEP_ISSUE_CARD,
                    e.into(),
                )
                .await
                .finish(saga_start));
        }

        // Step 3: shipping address, falling back to the cardholder's
        // billing address when none is on file.
        tracing::info!(
            step = pipeline::STEP_FETCH_SHIPPING_ADDRESS,
            "saga step started"
        );
        let shipping_address = match self.users.shipping_address(user_id).await {
            Ok(Some(address)) => address,
            Ok(None) => holder.identity.billing_address.clone(),
            Err(e) => {
                return Ok(self
                    .compensate(
                        order_id,
                        session_id,
                        Some(card_id),
                        pipeline::STEP_FETCH_SHIPPING_ADDRESS,
                        e.into(),
                    )
                    .await
                    .finish(saga_start));
            }
        };

        if let Err(e) = self
            .orders
            .update_status(order_id, OrderStatus::Processing, None)
            .await
        {
            return Ok(self
                .compensate(
                    order_id,
                    session_id,
                    Some(card_id),
                    pipeline::STEP_RUN_AUTOMATION,
                    e.into(),
                )
                .await
                .finish(saga_start));
        }

        // Step 4: the automation attempt. At most one; never retried.
        tracing::info!(step = pipeline::STEP_RUN_AUTOMATION, "saga step started");
        let request = PurchaseRequest {
            product_handle: listing.handle.clone(),
            credentials,
            email: holder.identity.email.clone(),
            first_name: holder.identity.first_name.clone(),
            last_name: holder.identity.last_name.clone(),
            shipping_address,
            billing_address: Some(holder.identity.billing_address.clone()),
        };
        let result = self.automation.execute(vendor, &request).await;

        if !result.success {
            return Ok(self
                .compensate(
                    order_id,
                    session_id,
                    Some(card_id),
                    pipeline::STEP_RUN_AUTOMATION,
                    SagaError::Automation(result.failure_narrative()),
                )
                .await
                .finish(saga_start));
        }

        // The goods are bought; a bookkeeping failure here must never
        // trigger a refund.
        let status = match self
            .orders
            .update_status(order_id, OrderStatus::Completed, None)
            .await
        {
            Ok(order) => order.status,
            Err(e) => {
                tracing::error!(%order_id, error = %e, "could not record completion");
                OrderStatus::Processing
            }
        };

        metrics::counter!("purchase_saga_completed").increment(1);
        let duration = saga_start.elapsed().as_secs_f64();
        metrics::histogram!("purchase_saga_duration_seconds").record(duration);
        tracing::info!(%order_id, duration, "purchase saga completed");

        Ok(PurchaseOutcome {
            order_id,
            status,
            card_id: Some(card_id),
            order_details: result.order_details,
            error: None,
            needs_manual_review: false,
        })
    }

    /// Reuses the user's cached cardholder or registers a new one from the
    /// identity the customer entered at checkout.
    async fn provision_cardholder(
        &self,
        user: &UserRecord,
        session_id: &str,
    ) -> Result<String, SagaError> {
        if let Some(cardholder_id) = &user.cardholder_id {
            tracing::debug!(cardholder_id, "reusing cached cardholder");
            return Ok(cardholder_id.clone());
        }

        let session = self.gateway.get_session(session_id).await?;
        let customer_id = session
            .customer_id
            .ok_or_else(|| SagaError::Gateway("no customer created during checkout".to_string()))?;
        let customer = self.gateway.get_customer(&customer_id).await?;

        let email = customer.email.as_deref().unwrap_or(&user.email);
        let identity = domain::BillingIdentity::derive(
            customer.name.as_deref(),
            email,
            customer.phone.as_deref(),
            customer.billing_address.clone(),
        );

        let cardholder_id = self.issuer.create_cardholder(&identity).await?;
        self.users
            .set_billing_identity(user.id, &cardholder_id, &customer_id)
            .await?;
        tracing::info!(cardholder_id, "cardholder registered");
        Ok(cardholder_id)
    }

    /// Issues the disposable card and reads its credentials.
    ///
    /// On failure after issuance succeeded, the card id travels with the
    /// error so compensation can still deactivate it.
    async fn issue_card(
        &self,
        cardholder_id: &str,
        session_id: &str,
        user_id: UserId,
    ) -> Result<(domain::CardCredentials, CardholderRecord), (Option<String>, SagaError)> {
        let metadata = CardMetadata {
            session_id: session_id.to_string(),
            user_id,
        };
        let card_id = self
            .issuer
            .create_virtual_card(cardholder_id, &metadata)
            .await
            .map_err(|e| (None, e))?;

        let credentials = self
            .issuer
            .get_card_credentials(&card_id)
            .await
            .map_err(|e| (Some(card_id.clone()), e))?;
        let holder = self
            .issuer
            .get_cardholder(cardholder_id)
            .await
            .map_err(|e| (Some(card_id.clone()), e))?;

        Ok((credentials, holder))
    }

    /// Best-effort compensation after a mid-saga failure.
    ///
    /// Records the failure narrative first so the audit trail survives even
    /// if compensation dies, then deactivates the card (failure logged,
    /// never raised) and refunds the hold. A successful refund moves the
    /// order to `refunded`; a failed one appends to the narrative and
    /// flags the outcome for manual follow-up.
    #[tracing::instrument(skip(self, cause))]
    async fn compensate(
        &self,
        order_id: OrderId,
        session_id: &str,
        card_id: Option<String>,
        step: &'static str,
        cause: SagaError,
    ) -> PurchaseOutcome {
        metrics::counter!("purchase_saga_failed").increment(1);
        tracing::warn!(%order_id, step, error = %cause, "saga step failed, compensating");

        let narrative = format!("{step}: {cause}");
        if let Err(e) = self
            .orders
            .update_status(order_id, OrderStatus::Failed, Some(&narrative))
            .await
        {
            tracing::error!(%order_id, error = %e, "could not record order failure");
        }

        if let Some(card_id) = &card_id {
            match self.issuer.deactivate_card(card_id).await {
                Ok(()) => tracing::info!(%order_id, card_id, "card deactivated"),
                Err(e) => {
                    metrics::counter!("compensation_card_deactivation_failures_total")
                        .increment(1);
                    tracing::error!(%order_id, card_id, error = %e, "card deactivation failed");
                }
            }
        }

        let mut status = OrderStatus::Failed;
        let mut needs_manual_review = false;
        match self.gateway.refund(session_id).await {
            Ok(refund_id) => {
                metrics::counter!("compensation_refunds_total").increment(1);
                tracing::info!(%order_id, refund_id, "hold refunded");
                match self
                    .orders
                    .update_status(order_id, OrderStatus::Refunded, None)
                    .await
                {
                    Ok(order) => status = order.status,
                    Err(e) => {
                        tracing::error!(%order_id, error = %e, "could not record refund")
                    }
                }
            }
            Err(e) => {
                metrics::counter!("compensation_refund_failures_total").increment(1);
                needs_manual_review = true;
                tracing::error!(%order_id, error = %e, "refund failed, manual follow-up required");
                let refund_narrative = format!("refund failed: {e}; manual follow-up required");
                if let Err(e) = self
                    .orders
                    .update_status(order_id, OrderStatus::Failed, Some(&refund_narrative))
                    .await
                {
                    tracing::error!(%order_id, error = %e, "could not record refund failure");
                }
            }
        }

        PurchaseOutcome {
            order_id,
            status,
            card_id,
            order_details: None,
            error: Some(narrative),
            needs_manual_review,
        }
    }
}

impl PurchaseOutcome {
    fn finish(self, saga_start: std::time::Instant) -> Self {
        metrics::histogram!("purchase_saga_duration_seconds")
            .record(saga_start.elapsed().as_secs_f64());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::StubAutomation;
    use crate::services::gateway::{InMemoryPaymentGateway, LineItem};
    use common::Money;
    use domain::Address;
    use store::{InMemoryOrderStore, InMemoryUserStore};

    use crate::services::issuing::InMemoryCardIssuer;

    type TestSaga = PurchaseSaga<
        InMemoryOrderStore,
        InMemoryUserStore,
        InMemoryPaymentGateway,
        InMemoryCardIssuer,
        StubAutomation,
    >;

    async fn setup() -> (
        TestSaga,
        InMemoryOrderStore,
        InMemoryUserStore,
        InMemoryPaymentGateway,
        InMemoryCardIssuer,
        StubAutomation,
    ) {
        let orders = InMemoryOrderStore::new();
        let users = InMemoryUserStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let issuer = InMemoryCardIssuer::new();
        let automation = StubAutomation::new();

        let saga = PurchaseSaga::new(
            orders.clone(),
            users.clone(),
            gateway.clone(),
            issuer.clone(),
            automation.clone(),
        );
        (saga, orders, users, gateway, issuer, automation)
    }

    fn listing() -> ProductListing {
        ProductListing {
            handle: "ethiopia-natural".to_string(),
            name: "Ethiopia Natural".to_string(),
            base_price: Money::from_cents(2000),
            image_url: None,
        }
    }

    async fn seed_user(users: &InMemoryUserStore) -> UserId {
        let user_id = UserId::new();
        let mut record = store::UserRecord::new(user_id, "ada@example.com");
        record.shipping_address = Some(Address {
            line1: "500 Market St".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            postal_code: "94105".to_string(),
            country: "US".to_string(),
        });
        users.upsert(record).await.unwrap();
        user_id
    }

    async fn paid_session(gateway: &InMemoryPaymentGateway) -> String {
        gateway
            .open_hold(
                Money::from_cents(2404),
                LineItem {
                    name: "Ethiopia Natural".to_string(),
                    image_url: None,
                },
                None,
            )
            .await
            .unwrap()
            .session_id
    }

    #[tokio::test]
    async fn test_happy_path() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Completed);
        assert!(outcome.error.is_none());
        assert!(!outcome.needs_manual_review);
        assert_eq!(
            outcome.order_details.as_ref().unwrap().order_number,
            "#1001"
        );

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.price, Money::from_cents(2404));
        assert!(order.card_id.is_some());
        assert!(order.cardholder_id.is_some());
        assert!(order.error_details.is_none());

        // card stays active on success, hold is kept
        assert_eq!(issuer.active_card_count(), 1);
        assert!(!gateway.is_refunded(&session_id));
        assert_eq!(automation.attempt_count(), 1);
        assert_eq!(automation.last_vendor(), Some(Vendor::TradeCoffee));

        // billing identity cached for the next purchase
        let user = users.get(user_id).await.unwrap().unwrap();
        assert!(user.cardholder_id.is_some());
        assert!(user.customer_id.is_some());
    }

    #[tokio::test]
    async fn test_validation_creates_nothing() {
        let (saga, orders, users, gateway, _, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        let mut bad = listing();
        bad.handle = "".to_string();
        let err = saga
            .run(user_id, &session_id, &bad, Vendor::TradeCoffee)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::Validation(_)));

        let blank = saga
            .run(user_id, "  ", &listing(), Vendor::TradeCoffee)
            .await
            .unwrap_err();
        assert!(matches!(blank, SagaError::Validation(_)));

        assert_eq!(orders.order_count().await, 0);
        assert_eq!(automation.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_unknown_user_rejected() {
        let (saga, orders, _, gateway, _, _) = setup().await;
        let session_id = paid_session(&gateway).await;

        let err = saga
            .run(UserId::new(), &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap_err();
        assert!(matches!(err, SagaError::UserNotFound(_)));
        assert_eq!(orders.order_count().await, 0);
    }

    #[tokio::test]
    async fn test_cardholder_failure_refunds_without_card() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        issuer.set_fail_on_create_cardholder(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Refunded);
        assert!(outcome.card_id.is_none());
        let narrative = outcome.error.unwrap();
        assert!(narrative.starts_with("provision_cardholder:"));

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        assert!(order.error_details.unwrap().contains("cardholder rejected"));

        assert!(gateway.is_refunded(&session_id));
        assert_eq!(issuer.deactivated_count(), 0);
        assert_eq!(automation.attempt_count(), 0);
    }

    #[tokio::test]
    async fn test_partial_issuance_deactivates_card() {
        let (saga, orders, users, gateway, issuer, _) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        // card creation succeeds, credential read fails
        issuer.set_fail_on_credentials(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Refunded);
        assert!(outcome.card_id.is_some());
        assert!(gateway.is_refunded(&session_id));
        assert_eq!(issuer.deactivated_count(), 1);
        assert_eq!(issuer.active_card_count(), 0);

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert!(
            order
                .error_details
                .unwrap()
                .starts_with("issue_card: card issuing error")
        );
    }

    #[tokio::test]
    async fn test_automation_failure_compensates_fully() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        automation.set_fail(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::SandboxStore)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Refunded);
        assert!(!outcome.needs_manual_review);
        assert_eq!(automation.attempt_count(), 1);
        assert!(gateway.is_refunded(&session_id));
        assert_eq!(issuer.deactivated_count(), 1);

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
        let details = order.error_details.unwrap();
        assert!(details.starts_with("run_automation:"));
        assert!(details.contains("timed out waiting for"));
    }

    #[tokio::test]
    async fn test_refund_failure_flags_manual_review() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        automation.set_fail(true);
        gateway.set_fail_on_refund(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Failed);
        assert!(outcome.needs_manual_review);
        // card deactivation still ran
        assert_eq!(issuer.deactivated_count(), 1);
        assert!(!gateway.is_refunded(&session_id));

        // narrative captures both the trigger and the compensation failure
        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Failed);
        let details = order.error_details.unwrap();
        assert!(details.contains("run_automation:"));
        assert!(details.contains("refund failed"));
        assert!(details.contains("manual follow-up required"));
    }

    #[tokio::test]
    async fn test_deactivation_failure_does_not_block_refund() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        automation.set_fail(true);
        issuer.set_fail_on_deactivate(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        assert_eq!(outcome.status, OrderStatus::Refunded);
        assert!(gateway.is_refunded(&session_id));
        assert_eq!(issuer.deactivated_count(), 0);

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Refunded);
    }

    #[tokio::test]
    async fn test_cached_cardholder_is_reused() {
        let (saga, _, users, gateway, issuer, _) = setup().await;
        let user_id = seed_user(&users).await;

        let first_session = paid_session(&gateway).await;
        saga.run(user_id, &first_session, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();
        assert_eq!(issuer.cardholder_count(), 1);

        let second_session = paid_session(&gateway).await;
        saga.run(user_id, &second_session, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        // second purchase reuses the cached cardholder
        assert_eq!(issuer.cardholder_count(), 1);
        assert_eq!(issuer.active_card_count(), 2);
    }

    #[tokio::test]
    async fn test_missing_shipping_address_uses_billing_fallback() {
        let (saga, orders, users, gateway, _, _) = setup().await;
        let user_id = UserId::new();
        users
            .upsert(store::UserRecord::new(user_id, "ada@example.com"))
            .await
            .unwrap();
        let session_id = paid_session(&gateway).await;

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        // identity falls back to the default billing address, so the saga
        // still completes
        assert_eq!(outcome.status, OrderStatus::Completed);
        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
    }

    #[tokio::test]
    async fn test_narrative_never_contains_card_number() {
        let (saga, orders, users, gateway, issuer, automation) = setup().await;
        let user_id = seed_user(&users).await;
        let session_id = paid_session(&gateway).await;

        automation.set_fail(true);

        let outcome = saga
            .run(user_id, &session_id, &listing(), Vendor::TradeCoffee)
            .await
            .unwrap();

        let order = orders.get(outcome.order_id).await.unwrap().unwrap();
        let details = order.error_details.unwrap();
        assert!(!details.contains("4242"));
        assert!(!outcome.error.unwrap().contains("4242"));
        assert_eq!(issuer.deactivated_count(), 1);
    }
}
