//! End-to-end tests for the purchase saga with the real automation
//! dispatcher running against a scripted browser.

use common::{Money, UserId};
use domain::{Address, OrderStatus, ProductListing};
use saga::automation::AutomationDispatcher;
use saga::services::gateway::LineItem;
use saga::{
    CheckoutService, InMemoryCardIssuer, InMemoryPaymentGateway, PaymentGateway, PurchaseSaga,
    ScriptedBrowser, ScriptedPageBuilder, Vendor,
};
use store::{InMemoryOrderStore, InMemoryUserStore, OrderStore, UserRecord, UserStore};

type TestSaga = PurchaseSaga<
    InMemoryOrderStore,
    InMemoryUserStore,
    InMemoryPaymentGateway,
    InMemoryCardIssuer,
    AutomationDispatcher<ScriptedBrowser>,
>;

struct TestHarness {
    saga: TestSaga,
    orders: InMemoryOrderStore,
    users: InMemoryUserStore,
    gateway: InMemoryPaymentGateway,
    issuer: InMemoryCardIssuer,
    browser: ScriptedBrowser,
}

impl TestHarness {
    fn new(browser: ScriptedBrowser) -> Self {
        let orders = InMemoryOrderStore::new();
        let users = InMemoryUserStore::new();
        let gateway = InMemoryPaymentGateway::new();
        let issuer = InMemoryCardIssuer::new();
        let dispatcher = AutomationDispatcher::new(browser.clone(), "https://sandbox.example");

        let saga = PurchaseSaga::new(
            orders.clone(),
            users.clone(),
            gateway.clone(),
            issuer.clone(),
            dispatcher,
        );
        Self {
            saga,
            orders,
            users,
            gateway,
            issuer,
            browser,
        }
    }

    async fn seed_user(&self) -> UserId {
        let user_id = UserId::new();
        let mut record = UserRecord::new(user_id, "ada@example.com");
        record.shipping_address = Some(Address {
            line1: "500 Market St".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            postal_code: "94105".to_string(),
            country: "US".to_string(),
        });
        self.users.upsert(record).await.unwrap();
        user_id
    }

    async fn paid_session(&self) -> String {
        self.gateway
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
}

fn listing() -> ProductListing {
    ProductListing {
        handle: "ethiopia-natural".to_string(),
        name: "Ethiopia Natural".to_string(),
        base_price: Money::from_cents(2000),
        image_url: None,
    }
}

// Selectors the sandbox-store routine waits for.
const CONFIRMATION: &str = "h1.order-confirmed";
const ORDER_NUMBER: &str = "span.order-number";
const ORDER_TOTAL: &str = "span.order-total";
const CHECKOUT_ERROR: &str = "div.checkout-error";

#[tokio::test]
async fn test_full_purchase_through_scripted_storefront() {
    let browser = ScriptedPageBuilder::new()
        .visible(CONFIRMATION)
        .text(ORDER_NUMBER, "SBX-1001")
        .text(ORDER_TOTAL, "$24.04")
        .build_browser();
    let harness = TestHarness::new(browser);
    let user_id = harness.seed_user().await;
    let session_id = harness.paid_session().await;

    let outcome = harness
        .saga
        .run(user_id, &session_id, &listing(), Vendor::SandboxStore)
        .await
        .unwrap();

    assert_eq!(outcome.status, OrderStatus::Completed);
    let details = outcome.order_details.unwrap();
    assert_eq!(details.order_number, "SBX-1001");
    assert_eq!(details.total, "$24.04");

    // the issued card's real number reached the storefront form
    let actions = harness.browser.actions();
    assert!(
        actions
            .iter()
            .any(|a| a == "fill input[name='card_number']=4242424242424242")
    );
    assert!(
        actions
            .iter()
            .any(|a| a == "navigate https://sandbox.example/items/ethiopia-natural")
    );
    assert_eq!(actions.last().map(String::as_str), Some("close"));

    assert_eq!(harness.browser.open_count(), 1);
    assert!(!harness.gateway.is_refunded(&session_id));
    assert_eq!(harness.issuer.active_card_count(), 1);
}

#[tokio::test]
async fn test_on_page_decline_ends_refunded_with_scraped_text() {
    let browser = ScriptedPageBuilder::new()
        .text(CHECKOUT_ERROR, "Card declined by issuer")
        .build_browser();
    let harness = TestHarness::new(browser);
    let user_id = harness.seed_user().await;
    let session_id = harness.paid_session().await;

    let outcome = harness
        .saga
        .run(user_id, &session_id, &listing(), Vendor::SandboxStore)
        .await
        .unwrap();

    assert_eq!(outcome.status, OrderStatus::Refunded);
    assert!(harness.gateway.is_refunded(&session_id));
    assert_eq!(harness.issuer.active_card_count(), 0);
    assert_eq!(harness.issuer.deactivated_count(), 1);

    let order = harness.orders.get(outcome.order_id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Refunded);
    let narrative = order.error_details.unwrap();
    assert!(narrative.contains("Card declined by issuer"));
    assert!(!narrative.contains("4242"));
}

#[tokio::test]
async fn test_each_attempt_gets_a_fresh_page() {
    let browser = ScriptedPageBuilder::new()
        .visible(CONFIRMATION)
        .build_browser();
    let harness = TestHarness::new(browser);
    let user_id = harness.seed_user().await;

    let first = harness.paid_session().await;
    harness
        .saga
        .run(user_id, &first, &listing(), Vendor::SandboxStore)
        .await
        .unwrap();
    let second = harness.paid_session().await;
    harness
        .saga
        .run(user_id, &second, &listing(), Vendor::SandboxStore)
        .await
        .unwrap();

    assert_eq!(harness.browser.open_count(), 2);
    // cardholder was provisioned once, cards issued per purchase
    assert_eq!(harness.issuer.cardholder_count(), 1);
    assert_eq!(harness.issuer.active_card_count(), 2);
}

#[tokio::test]
async fn test_checkout_then_fulfillment_share_price() {
    let browser = ScriptedPageBuilder::new()
        .visible(CONFIRMATION)
        .build_browser();
    let harness = TestHarness::new(browser);
    let user_id = harness.seed_user().await;

    let checkout = CheckoutService::new(harness.gateway.clone(), harness.users.clone());
    let session = checkout.open_session(user_id, &listing()).await.unwrap();
    assert_eq!(session.amount, Money::from_cents(2404));

    let outcome = harness
        .saga
        .run(user_id, &session.session_id, &listing(), Vendor::SandboxStore)
        .await
        .unwrap();

    let order = harness.orders.get(outcome.order_id).await.unwrap().unwrap();
    // the stored price equals the amount actually held at checkout
    assert_eq!(Some(order.price), harness.gateway.held_amount(&session.session_id));
}
