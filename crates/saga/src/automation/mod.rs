//! Browser automation that carries out the vendor purchase.
//!
//! Each supported vendor has a scripted routine driving its storefront
//! through a [`page::PageDriver`]. The dispatcher opens a fresh browser
//! page per attempt and reports the outcome as a [`PurchaseResult`] value;
//! no automation error escapes as a panic or `Err`.

pub mod page;
pub mod webdriver;

mod hosted_checkout;
mod sandbox_store;
mod trade_coffee;

use async_trait::async_trait;
use domain::PurchaseRequest;
use serde::{Deserialize, Serialize};

use crate::automation::page::{Browser, PageDriver, StepError};

pub use page::{ScriptedBrowser, ScriptedPage, ScriptedPageBuilder};
pub use webdriver::WebDriverBrowser;

/// A vendor storefront with a purchase routine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Vendor {
    TradeCoffee,
    HostedCheckout,
    SandboxStore,
}

impl Vendor {
    /// All supported vendors.
    pub const ALL: [Vendor; 3] = [
        Vendor::TradeCoffee,
        Vendor::HostedCheckout,
        Vendor::SandboxStore,
    ];

    /// The wire key identifying this vendor.
    pub fn as_str(&self) -> &'static str {
        match self {
            Vendor::TradeCoffee => "trade-coffee",
            Vendor::HostedCheckout => "hosted-checkout",
            Vendor::SandboxStore => "sandbox-store",
        }
    }

    /// Parses a wire key; `None` for unknown vendors.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|v| v.as_str() == s)
    }
}

impl std::fmt::Display for Vendor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the confirmation page said about the placed order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetails {
    pub order_number: String,
    pub total: String,
}

/// Outcome of one automation attempt.
///
/// Failures are data, not errors: the saga reads `success` and the error
/// fields to decide whether to compensate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseResult {
    pub success: bool,
    pub order_details: Option<OrderDetails>,
    /// Short, user-facing summary when the attempt failed.
    pub error: Option<String>,
    /// Step-level detail for the audit narrative.
    pub details: Option<String>,
}

impl PurchaseResult {
    /// A successful attempt.
    pub fn succeeded(order_details: Option<OrderDetails>) -> Self {
        Self {
            success: true,
            order_details,
            error: None,
            details: None,
        }
    }

    /// A failed attempt.
    pub fn failed(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            success: false,
            order_details: None,
            error: Some(error.into()),
            details: Some(details.into()),
        }
    }

    /// The failure narrative recorded on the order.
    pub fn failure_narrative(&self) -> String {
        match (&self.error, &self.details) {
            (Some(error), Some(details)) => format!("{error}: {details}"),
            (Some(error), None) => error.clone(),
            (None, Some(details)) => details.clone(),
            (None, None) => "unknown automation failure".to_string(),
        }
    }
}

/// A failed routine step, with enough context for the audit narrative.
#[derive(Debug)]
pub(crate) struct RoutineFailure {
    pub summary: String,
    pub detail: String,
}

impl RoutineFailure {
    pub(crate) fn at(step: &'static str) -> impl FnOnce(StepError) -> RoutineFailure {
        move |e| RoutineFailure {
            summary: "failed to complete automated purchase".to_string(),
            detail: format!("{step}: {e}"),
        }
    }

    pub(crate) fn on_page(detail: String) -> RoutineFailure {
        RoutineFailure {
            summary: "purchase rejected by vendor".to_string(),
            detail,
        }
    }
}

/// Runs the vendor purchase with an issued card.
#[async_trait]
pub trait PurchaseAutomation: Send + Sync {
    async fn execute(&self, vendor: Vendor, request: &PurchaseRequest) -> PurchaseResult;
}

#[async_trait]
impl<T: PurchaseAutomation + ?Sized> PurchaseAutomation for std::sync::Arc<T> {
    async fn execute(&self, vendor: Vendor, request: &PurchaseRequest) -> PurchaseResult {
        (**self).execute(vendor, request).await
    }
}

/// Dispatches to the per-vendor routine over a fresh browser page.
pub struct AutomationDispatcher<B: Browser> {
    browser: B,
    store_base_url: String,
}

impl<B: Browser> AutomationDispatcher<B> {
    /// Creates a dispatcher. `store_base_url` is the storefront root the
    /// routines append product handles to.
    pub fn new(browser: B, store_base_url: impl Into<String>) -> Self {
        Self {
            browser,
            store_base_url: store_base_url.into(),
        }
    }
}

#[async_trait]
impl<B: Browser> PurchaseAutomation for AutomationDispatcher<B> {
    #[tracing::instrument(skip(self, request), fields(product = %request.product_handle))]
    async fn execute(&self, vendor: Vendor, request: &PurchaseRequest) -> PurchaseResult {
        metrics::counter!("automation_attempts_total", "vendor" => vendor.as_str()).increment(1);

        let mut page = match self.browser.open().await {
            Ok(page) => page,
            Err(e) => {
                tracing::error!(%vendor, error = %e, "could not open browser session");
                return PurchaseResult::failed("browser session failed", e.to_string());
            }
        };

        let outcome = match vendor {
            Vendor::TradeCoffee => {
                trade_coffee::run(&mut page, &self.store_base_url, request).await
            }
            Vendor::HostedCheckout => {
                hosted_checkout::run(&mut page, &self.store_base_url, request).await
            }
            Vendor::SandboxStore => {
                sandbox_store::run(&mut page, &self.store_base_url, request).await
            }
        };
        page.close().await;

        match outcome {
            Ok(order_details) => {
                metrics::counter!("automation_completed_total", "vendor" => vendor.as_str())
                    .increment(1);
                tracing::info!(%vendor, "automated purchase completed");
                PurchaseResult::succeeded(order_details)
            }
            Err(failure) => {
                metrics::counter!("automation_failed_total", "vendor" => vendor.as_str())
                    .increment(1);
                tracing::warn!(%vendor, detail = %failure.detail, "automated purchase failed");
                PurchaseResult::failed(failure.summary, failure.detail)
            }
        }
    }
}

/// Stub automation for saga tests; no browser involved.
#[derive(Debug, Clone, Default)]
pub struct StubAutomation {
    state: std::sync::Arc<std::sync::Mutex<StubState>>,
}

#[derive(Debug, Default)]
struct StubState {
    fail: bool,
    attempts: u32,
    last_vendor: Option<Vendor>,
}

impl StubAutomation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent attempts fail.
    pub fn set_fail(&self, fail: bool) {
        self.state.lock().unwrap().fail = fail;
    }

    /// How many attempts have run.
    pub fn attempt_count(&self) -> u32 {
        self.state.lock().unwrap().attempts
    }

    /// The vendor of the last attempt.
    pub fn last_vendor(&self) -> Option<Vendor> {
        self.state.lock().unwrap().last_vendor
    }
}

#[async_trait]
impl PurchaseAutomation for StubAutomation {
    async fn execute(&self, vendor: Vendor, _request: &PurchaseRequest) -> PurchaseResult {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        state.last_vendor = Some(vendor);
        if state.fail {
            PurchaseResult::failed(
                "failed to complete automated purchase",
                "confirm_order: timed out waiting for h1.order-confirmed",
            )
        } else {
            PurchaseResult::succeeded(Some(OrderDetails {
                order_number: "#1001".to_string(),
                total: "$24.04".to_string(),
            }))
        }
    }
}

#[cfg(test)]
pub(crate) fn test_request() -> PurchaseRequest {
    use domain::{Address, CardCredentials};
    PurchaseRequest {
        product_handle: "ethiopia-natural".to_string(),
        credentials: CardCredentials {
            card_id: "ic_123".to_string(),
            number: "4242424242424242".to_string(),
            expiry: "11/27".to_string(),
            cvc: "123".to_string(),
        },
        email: "ada@example.com".to_string(),
        first_name: "Ada".to_string(),
        last_name: "Lovelace".to_string(),
        shipping_address: Address {
            line1: "500 Market St".to_string(),
            line2: None,
            city: "San Francisco".to_string(),
            state: "CA".to_string(),
            postal_code: "94105".to_string(),
            country: "US".to_string(),
        },
        billing_address: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vendor_keys_roundtrip() {
        for vendor in Vendor::ALL {
            assert_eq!(Vendor::parse(vendor.as_str()), Some(vendor));
        }
        assert_eq!(Vendor::parse("unknown-store"), None);
    }

    #[test]
    fn test_failure_narrative() {
        let result = PurchaseResult::failed("purchase rejected by vendor", "card declined");
        assert_eq!(
            result.failure_narrative(),
            "purchase rejected by vendor: card declined"
        );

        let bare = PurchaseResult {
            success: false,
            order_details: None,
            error: None,
            details: None,
        };
        assert_eq!(bare.failure_narrative(), "unknown automation failure");
    }

    #[tokio::test]
    async fn test_stub_automation_toggles() {
        let stub = StubAutomation::new();
        let request = test_request();

        let ok = stub.execute(Vendor::SandboxStore, &request).await;
        assert!(ok.success);
        assert!(ok.order_details.is_some());

        stub.set_fail(true);
        let failed = stub.execute(Vendor::TradeCoffee, &request).await;
        assert!(!failed.success);
        assert_eq!(stub.attempt_count(), 2);
        assert_eq!(stub.last_vendor(), Some(Vendor::TradeCoffee));
    }
}
