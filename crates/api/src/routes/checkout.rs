//! Checkout session endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use common::Money;
use domain::ProductListing;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::orders::{AppState, parse_user_id};

#[derive(Deserialize)]
pub struct ProductRequest {
    pub handle: String,
    pub name: String,
    pub base_price_cents: i64,
    pub image_url: Option<String>,
}

impl ProductRequest {
    pub(crate) fn into_listing(self) -> ProductListing {
        ProductListing {
            handle: self.handle,
            name: self.name,
            base_price: Money::from_cents(self.base_price_cents),
            image_url: self.image_url,
        }
    }
}

#[derive(Deserialize)]
pub struct CheckoutRequest {
    pub user_id: String,
    pub product: ProductRequest,
}

#[derive(Serialize)]
pub struct CheckoutResponse {
    pub session_id: String,
    pub client_secret: String,
    pub amount_cents: i64,
    /// The charged amount as a decimal string.
    pub amount: String,
}

/// POST /checkout/session — open a payment hold for a product listing.
#[tracing::instrument(skip(state, req))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CheckoutRequest>,
) -> Result<(StatusCode, Json<CheckoutResponse>), ApiError> {
    let user_id = parse_user_id(&req.user_id)?;
    let listing = req.product.into_listing();

    let session = state.checkout.open_session(user_id, &listing).await?;

    Ok((
        StatusCode::CREATED,
        Json(CheckoutResponse {
            session_id: session.session_id,
            client_secret: session.client_secret,
            amount_cents: session.amount.cents(),
            amount: session.amount.to_decimal_string(),
        }),
    ))
}
