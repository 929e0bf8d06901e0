//! Purchase fulfillment endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use saga::{PurchaseOutcome, Vendor};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::routes::checkout::ProductRequest;
use crate::routes::orders::{AppState, parse_user_id};

#[derive(Deserialize)]
pub struct PurchaseRequestBody {
    pub user_id: String,
    pub session_id: String,
    pub vendor: String,
    pub product: ProductRequest,
}

#[derive(Serialize)]
pub struct PurchaseResponse {
    pub success: bool,
    pub order_id: String,
    pub status: String,
    pub card_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_total: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub needs_manual_review: bool,
}

impl PurchaseResponse {
    fn from_outcome(outcome: PurchaseOutcome) -> Self {
        let (order_number, order_total) = match outcome.order_details {
            Some(details) => (Some(details.order_number), Some(details.total)),
            None => (None, None),
        };
        Self {
            success: outcome.status == domain::OrderStatus::Completed,
            order_id: outcome.order_id.to_string(),
            status: outcome.status.as_str().to_string(),
            card_id: outcome.card_id,
            order_number,
            order_total,
            error: outcome.error,
            needs_manual_review: outcome.needs_manual_review,
        }
    }
}

/// POST /purchases — fulfill a paid checkout session.
///
/// Returns 200 with the terminal order state even when the automation
/// failed and the hold was refunded; only requests rejected before any
/// side effect map to error statuses.
#[tracing::instrument(skip(state, req), fields(vendor = %req.vendor))]
pub async fn create(
    State(state): State<Arc<AppState>>,
    Json(req): Json<PurchaseRequestBody>,
) -> Result<(StatusCode, Json<PurchaseResponse>), ApiError> {
    let user_id = parse_user_id(&req.user_id)?;
    let vendor = Vendor::parse(&req.vendor)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown vendor: {}", req.vendor)))?;
    let listing = req.product.into_listing();

    let outcome = state
        .saga
        .run(user_id, &req.session_id, &listing, vendor)
        .await?;

    Ok((StatusCode::OK, Json(PurchaseResponse::from_outcome(outcome))))
}
