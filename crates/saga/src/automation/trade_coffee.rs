//! Purchase routine for the coffee subscription storefront.
//!
//! Shopify-style flow: product page, one-time purchase toggle, cart,
//! multi-page checkout with the card fields living in separate iframes.

use std::time::Duration;

use domain::PurchaseRequest;

use crate::automation::page::{ELEMENT_TIMEOUT, POPUP_TIMEOUT, PageDriver};
use crate::automation::{OrderDetails, RoutineFailure};

const CLOSE_DIALOG: &str = "button[aria-label='Close dialog']";
const ONE_TIME_PURCHASE: &str = "label[for='purchase-type-onetime']";
const ADD_TO_CART: &str = "button[name='add']";
const CHECKOUT: &str = "button[name='checkout']";

const EMAIL: &str = "input[name='email']";
const FIRST_NAME: &str = "input[name='firstName']";
const LAST_NAME: &str = "input[name='lastName']";
const ADDRESS1: &str = "input[name='address1']";
const CITY: &str = "input[name='city']";
const STATE: &str = "select[name='zone']";
const ZIP: &str = "input[name='postalCode']";

const CONTINUE_TO_SHIPPING: &str = "button#continue_button";
const CONTINUE_TO_PAYMENT: &str = "button#continue_to_payment";

const CARD_NUMBER_FRAME: &str = "iframe[name*='card-fields-number']";
const CARD_EXPIRY_FRAME: &str = "iframe[name*='card-fields-expiry']";
const CARD_CVC_FRAME: &str = "iframe[name*='card-fields-verification_value']";
const CARD_NAME_FRAME: &str = "iframe[name*='card-fields-name']";
const CARD_NUMBER: &str = "input[name='number']";
const CARD_EXPIRY: &str = "input[name='expiry']";
const CARD_CVC: &str = "input[name='verification_value']";
const CARD_NAME: &str = "input[name='name']";

const PAY_NOW: &str = "button#checkout-pay-button";
const CONFIRMATION: &str = "h1.os-order-number, h1#main-header";
const ORDER_NUMBER: &str = "[data-test='order-number'], .order-number, .confirmation-number";
const ORDER_TOTAL: &str = "[data-test='order-total'], .order-total, .total-amount";
const PAGE_ERRORS: &str = "[class*='error'], [class*='Error'], .alert-danger";

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(8);

pub(crate) async fn run<P: PageDriver>(
    page: &mut P,
    base_url: &str,
    request: &PurchaseRequest,
) -> Result<Option<OrderDetails>, RoutineFailure> {
    page.navigate(&format!("{base_url}/products/{}", request.product_handle))
        .await
        .map_err(RoutineFailure::at("open_product_page"))?;

    // A newsletter dialog sometimes covers the page; closing it is optional.
    if page.wait_for(CLOSE_DIALOG, POPUP_TIMEOUT).await.is_ok() {
        let _ = page.click(CLOSE_DIALOG).await;
    }

    page.click(ONE_TIME_PURCHASE)
        .await
        .map_err(RoutineFailure::at("select_one_time_purchase"))?;
    page.click(ADD_TO_CART)
        .await
        .map_err(RoutineFailure::at("add_to_cart"))?;
    page.wait_for(CHECKOUT, ELEMENT_TIMEOUT)
        .await
        .map_err(RoutineFailure::at("open_cart"))?;
    page.click(CHECKOUT)
        .await
        .map_err(RoutineFailure::at("start_checkout"))?;

    fill_shipping(page, request).await?;

    page.click(CONTINUE_TO_SHIPPING)
        .await
        .map_err(RoutineFailure::at("continue_to_shipping"))?;
    page.click(CONTINUE_TO_PAYMENT)
        .await
        .map_err(RoutineFailure::at("continue_to_payment"))?;

    fill_card(page, request).await?;

    page.click(PAY_NOW)
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

    // Confirmation details are best effort; their absence is not a failure.
    let order_number = page.text(ORDER_NUMBER).await.ok();
    let total = page.text(ORDER_TOTAL).await.ok();
    Ok(match (order_number, total) {
        (Some(order_number), Some(total)) => Some(OrderDetails {
            order_number,
            total,
        }),
        _ => None,
    })
}

async fn fill_shipping<P: PageDriver>(
    page: &mut P,
    request: &PurchaseRequest,
) -> Result<(), RoutineFailure> {
    let address = &request.shipping_address;
    let err = RoutineFailure::at("fill_shipping");

    let result = async {
        page.fill(EMAIL, &request.email).await?;
        page.fill(FIRST_NAME, &request.first_name).await?;
        page.fill(LAST_NAME, &request.last_name).await?;
        page.fill(ADDRESS1, &address.line1).await?;
        page.fill(CITY, &address.city).await?;
        page.select(STATE, &address.state).await?;
        page.fill(ZIP, &address.postal_code).await
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
        page.fill_in_frame(CARD_NUMBER_FRAME, CARD_NUMBER, &credentials.number)
            .await?;
        page.fill_in_frame(CARD_EXPIRY_FRAME, CARD_EXPIRY, &credentials.expiry)
            .await?;
        page.fill_in_frame(CARD_CVC_FRAME, CARD_CVC, &credentials.cvc)
            .await?;
        page.fill_in_frame(CARD_NAME_FRAME, CARD_NAME, &request.cardholder_name())
            .await
    }
    .await;
    result.map_err(err)
}
