//! Purchase routine for the sandbox storefront used in end-to-end drills.
//!
//! Deliberately simple single-page checkout with no iframes, used to
//! exercise the full saga without a production vendor.

use std::time::Duration;

use domain::PurchaseRequest;

use crate::automation::page::PageDriver;
use crate::automation::{OrderDetails, RoutineFailure};

const BUY_NOW: &str = "button#buy-now";
const EMAIL: &str = "input[name='email']";
const NAME: &str = "input[name='name']";
const ADDRESS1: &str = "input[name='address1']";
const CITY: &str = "input[name='city']";
const STATE: &str = "input[name='state']";
const ZIP: &str = "input[name='zip']";
const CARD_NUMBER: &str = "input[name='card_number']";
const CARD_EXPIRY: &str = "input[name='card_expiry']";
const CARD_CVC: &str = "input[name='card_cvc']";
const PLACE_ORDER: &str = "button#place-order";
const CONFIRMATION: &str = "h1.order-confirmed";
const ORDER_NUMBER: &str = "span.order-number";
const ORDER_TOTAL: &str = "span.order-total";
const PAGE_ERRORS: &str = "div.checkout-error";

const CONFIRMATION_TIMEOUT: Duration = Duration::from_secs(10);

pub(crate) async fn run<P: PageDriver>(
    page: &mut P,
    base_url: &str,
    request: &PurchaseRequest,
) -> Result<Option<OrderDetails>, RoutineFailure> {
    page.navigate(&format!("{base_url}/items/{}", request.product_handle))
        .await
        .map_err(RoutineFailure::at("open_product_page"))?;

    page.click(BUY_NOW)
        .await
        .map_err(RoutineFailure::at("start_checkout"))?;

    let address = &request.shipping_address;
    let credentials = &request.credentials;
    let fill = async {
        page.fill(EMAIL, &request.email).await?;
        page.fill(NAME, &request.cardholder_name()).await?;
        page.fill(ADDRESS1, &address.line1).await?;
        page.fill(CITY, &address.city).await?;
        page.fill(STATE, &address.state).await?;
        page.fill(ZIP, &address.postal_code).await?;
        page.fill(CARD_NUMBER, &credentials.number).await?;
        page.fill(CARD_EXPIRY, &credentials.expiry).await?;
        page.fill(CARD_CVC, &credentials.cvc).await
    }
    .await;
    fill.map_err(RoutineFailure::at("fill_checkout_form"))?;

    page.click(PLACE_ORDER)
        .await
        .map_err(RoutineFailure::at("submit_order"))?;

    if page.wait_for(CONFIRMATION, CONFIRMATION_TIMEOUT).await.is_err() {
        let on_page = page.collect_text(PAGE_ERRORS).await.unwrap_or_default();
        let detail = if on_page.trim().is_empty() {
            "no specific error message found".to_string()
        } else {
            on_page.trim().to_string()
        };
        return Err(RoutineFailure::on_page(detail));
    }

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
