//! Purchase fulfillment saga.
//!
//! Orchestrates a purchase across three external collaborators with no
//! shared commit protocol: the payment gateway holding the customer's
//! money, the card issuer minting a disposable virtual card, and a browser
//! automation completing the vendor's checkout with that card. Failures
//! after the hold trigger best-effort compensation (card deactivation,
//! refund, order status repair).

pub mod automation;
pub mod checkout;
pub mod coordinator;
pub mod error;
pub mod pipeline;
pub mod services;

pub use automation::{
    AutomationDispatcher, OrderDetails, PurchaseAutomation, PurchaseResult, ScriptedBrowser,
    ScriptedPageBuilder, StubAutomation, Vendor, WebDriverBrowser,
};
pub use checkout::{CheckoutService, CheckoutSession};
pub use coordinator::{PurchaseOutcome, PurchaseSaga};
pub use error::SagaError;
pub use services::{
    CardIssuer, InMemoryCardIssuer, InMemoryPaymentGateway, PaymentGateway, StripeClient,
};
