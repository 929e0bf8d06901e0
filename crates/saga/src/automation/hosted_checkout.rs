//! Purchase routine for the gateway-hosted checkout page.
//!
//! Single-page flow: email, manual shipping address entry, a collapsible
//! card section, and an optional billing form when the billing address
//! differs from shipping.

use std::time::Duration;

use domain::PurchaseRequest;

use crate::automation::page::{ELEMENT_TIMEOUT, POPUP_TIMEOUT, PageDriver};
use crate::automation::{OrderDetails, RoutineFailure};

const EMAIL: &str = "input#email";
const LINK_DISMISS: &str = "button[data-testid='link-dismiss']";
const SHIPPING_NAME: &str = "input#shippingName";
const ENTER_ADDRESS_MANUALLY: &str = "button.ManualEntryLink";
const SHIPPING_LINE1: &str = "input#shippingAddressLine1";
const SHIPPING_CITY: &str = "input#shippingLocality";
const SHIPPING_ZIP: &str = "input#shippingPostalCode";

const CARD_ACCORDION: &str = "button[data-testid='card-accordion-item-button']";
const CARD_NUMBER: &str = "input#cardNumber";
const CARD_EXPIRY: &str = "input#cardExpiry";
const CARD_CVC: &str = "input#cardCvc";

const SAME_AS_SHIPPING: &str = "input#cardUseShippingAsBilling";
const CARDHOLDER_NAME: &str = "input#billingName";
const BILLING_LINE1: &str = "input#billingAddressLine1";
const BILLING_CITY: &str = "input#billingLocality";
const BILLING_ZIP: &str = "input#billingPostalCode";

const SUBMIT: &str = "button[data-testid='hosted-payment-submit-button']";
const CONFIRMATION: &str = "div[data-testid='payment-success-message']";
const PAGE_ERRORS: &str = "[role='alert'], .PaymentError";

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(30);

pub(crate) async fn run<P: PageDriver>(
    page: &mut P,
    base_url: &str,
    request: &PurchaseRequest,
) -> Result<Option<OrderDetails>, RoutineFailure> {
    page.navigate(&format!("{base_url}/checkout/{}", request.product_handle))
        .await
        .map_err(RoutineFailure::at("open_checkout_page"))?;

    page.fill(EMAIL, &request.email)
        .await
        .map_err(RoutineFailure::at("fill_email"))?;

    // Entering a known email can trigger a saved-payment popup; dismiss it
    // when it shows up.
    if page.wait_for(LINK_DISMISS, POPUP_TIMEOUT).await.is_ok() {
        let _ = page.click(LINK_DISMISS).await;
    }

    fill_shipping(page, request).await?;
    fill_card(page, request).await?;

    if request.needs_billing_form() {
        fill_billing(page, request).await?;
    }

    page.click(SUBMIT)
        .await
        .map_err(RoutineFailure::at("submit_payment"))?;

    if page.wait_for(CONFIRMATION, CONFIRMATION_TIMEOUT).await.is_err() {
        let on_page = page.collect_text(PAGE_ERRORS).await.unwrap_or_default();
        let detail = if on_page.trim().is_empty() {
            "no specific error message found".to_string()
        } else {
            on_page.trim().to_string()
        };
        return Err(RoutineFailure::on_page(detail));
    }

    // The hosted page exposes no order number of its own.
    Ok(None)
}

async fn fill_shipping<P: PageDriver>(
    page: &mut P,
    request: &PurchaseRequest,
) -> Result<(), RoutineFailure> {
    let address = &request.shipping_address;
    let err = RoutineFailure::at("fill_shipping");

    let result = async {
        page.fill(SHIPPING_NAME, &request.cardholder_name()).await?;
        page.click(ENTER_ADDRESS_MANUALLY).await?;
        page.fill(SHIPPING_LINE1, &address.line1).await?;
        page.fill(SHIPPING_CITY, &address.city).await?;
        page.fill(SHIPPING_ZIP, &address.postal_code).await
    }
    .await;
    result.map_err(err)
}

async fn fill_card<P: PageDriver>(
    page: &mut P,
    request: &PurchaseRequest,
) -> Result<(), RoutineFailure> {
    let credentials = &request.credentials;
    let err = RoutineFailure::at("fill_card");

    let result = async {
        page.wait_for(CARD_ACCORDION, ELEMENT_TIMEOUT).await?;
        page.click(CARD_ACCORDION).await?;
        page.fill(CARD_NUMBER, &credentials.grouped_number()).await?;
        page.fill(CARD_EXPIRY, &credentials.spaced_expiry()).await?;
        page.fill(CARD_CVC, &credentials.cvc).await
    }
    .await;
    result.map_err(err)
}

async fn fill_billing<P: PageDriver>(
    page: &mut P,
    request: &PurchaseRequest,
) -> Result<(), RoutineFailure> {
    // needs_billing_form() guarantees a billing address is present.
    let Some(billing) = &request.billing_address else {
        return Ok(());
    };
    let err = RoutineFailure::at("fill_billing");

    let result = async {
        page.set_checked(SAME_AS_SHIPPING, false).await?;
        page.fill(CARDHOLDER_NAME, &request.cardholder_name()).await?;
        page.click(ENTER_ADDRESS_MANUALLY).await?;
        page.fill(BILLING_LINE1, &billing.line1).await?;
        page.fill(BILLING_CITY, &billing.city).await?;
        page.fill(BILLING_ZIP, &billing.postal_code).await
    }
    .await;
    result.map_err(err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::automation::page::{Browser, ScriptedPageBuilder};
    use crate::automation::test_request;
    use domain::Address;

    #[tokio::test]
    async fn test_happy_path_skips_billing_form() {
        let browser = ScriptedPageBuilder::new()
            .visible(CARD_ACCORDION)
            .visible(CONFIRMATION)
            .build_browser();
        let mut page = browser.open().await.unwrap();

        let details = run(&mut page, "https://pay.example", &test_request())
            .await
            .unwrap();
        assert!(details.is_none());

        let actions = browser.actions();
        assert!(actions.iter().any(|a| a.starts_with("fill input#cardNumber=4242 4242")));
        assert!(!actions.iter().any(|a| a.contains("billingAddressLine1")));
    }

    #[tokio::test]
    async fn test_mismatched_billing_address_fills_form() {
        let browser = ScriptedPageBuilder::new()
            .visible(CARD_ACCORDION)
            .visible(CONFIRMATION)
            .build_browser();
        let mut page = browser.open().await.unwrap();

        let mut request = test_request();
        request.billing_address = Some(Address::default_billing());
        run(&mut page, "https://pay.example", &request)
            .await
            .unwrap();

        let actions = browser.actions();
        assert!(
            actions
                .iter()
                .any(|a| a == "set_checked input#cardUseShippingAsBilling=false")
        );
        assert!(
            actions
                .iter()
                .any(|a| a == "fill input#billingAddressLine1=123 Main Street")
        );
    }

    #[tokio::test]
    async fn test_matching_billing_address_skips_form() {
        let browser = ScriptedPageBuilder::new()
            .visible(CARD_ACCORDION)
            .visible(CONFIRMATION)
            .build_browser();
        let mut page = browser.open().await.unwrap();

        let mut request = test_request();
        request.billing_address = Some(request.shipping_address.clone());
        run(&mut page, "https://pay.example", &request)
            .await
            .unwrap();

        assert!(
            !browser
                .actions()
                .iter()
                .any(|a| a.contains("cardUseShippingAsBilling"))
        );
    }

    #[tokio::test]
    async fn test_timeout_reports_alert_text() {
        let browser = ScriptedPageBuilder::new()
            .visible(CARD_ACCORDION)
            .text(PAGE_ERRORS, "Your card has insufficient funds.")
            .build_browser();
        let mut page = browser.open().await.unwrap();

        let failure = run(&mut page, "https://pay.example", &test_request())
            .await
            .unwrap_err();
        assert_eq!(failure.detail, "Your card has insufficient funds.");
        assert!(!failure.detail.contains("4242"));
    }
}
