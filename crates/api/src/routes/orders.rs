//! Order read endpoints and the shared application state.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use common::{OrderId, UserId};
use domain::Order;
use saga::{
    CardIssuer, CheckoutService, PaymentGateway, PurchaseAutomation, PurchaseSaga,
};
use serde::{Deserialize, Serialize};
use store::{OrderStore, UserStore};

use crate::error::ApiError;

type DynOrders = Arc<dyn OrderStore>;
type DynUsers = Arc<dyn UserStore>;
type DynGateway = Arc<dyn PaymentGateway>;
type DynIssuer = Arc<dyn CardIssuer>;
type DynAutomation = Arc<dyn PurchaseAutomation>;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: DynOrders,
    pub users: DynUsers,
    pub checkout: CheckoutService<DynGateway, DynUsers>,
    pub saga: PurchaseSaga<DynOrders, DynUsers, DynGateway, DynIssuer, DynAutomation>,
}

impl AppState {
    /// Wires the state from its collaborators.
    pub fn new(
        orders: DynOrders,
        users: DynUsers,
        gateway: DynGateway,
        issuer: DynIssuer,
        automation: DynAutomation,
    ) -> Self {
        Self {
            checkout: CheckoutService::new(gateway.clone(), users.clone()),
            saga: PurchaseSaga::new(
                orders.clone(),
                users.clone(),
                gateway,
                issuer,
                automation,
            ),
            orders,
            users,
        }
    }
}

#[derive(Deserialize)]
pub struct ListParams {
    pub user_id: String,
}

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: String,
    pub user_id: String,
    pub product_handle: String,
    pub product_name: String,
    /// Final charged price as a decimal string (`"24.04"`).
    pub price: String,
    pub status: String,
    pub session_id: String,
    pub cardholder_id: Option<String>,
    pub card_id: Option<String>,
    pub error_details: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl OrderResponse {
    pub(crate) fn from_order(order: &Order) -> Self {
        Self {
            id: order.id.to_string(),
            user_id: order.user_id.to_string(),
            product_handle: order.product_handle.clone(),
            product_name: order.product_name.clone(),
            price: order.price.to_decimal_string(),
            status: order.status.as_str().to_string(),
            session_id: order.session_id.clone(),
            cardholder_id: order.cardholder_id.clone(),
            card_id: order.card_id.clone(),
            error_details: order.error_details.clone(),
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
        }
    }
}

/// GET /orders?user_id=... — list a user's orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn list(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<OrderResponse>>, ApiError> {
    let user_id = parse_user_id(&params.user_id)?;
    let orders = state.orders.list_for_user(user_id).await?;
    Ok(Json(orders.iter().map(OrderResponse::from_order).collect()))
}

/// GET /orders/:id — load a single order.
#[tracing::instrument(skip(state))]
pub async fn get(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state
        .orders
        .get(order_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("order {id} not found")))?;
    Ok(Json(OrderResponse::from_order(&order)))
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid user_id: {e}")))?;
    Ok(UserId::from_uuid(uuid))
}

pub(crate) fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid::Uuid::parse_str(id)
        .map_err(|e| ApiError::BadRequest(format!("invalid order id: {e}")))?;
    Ok(OrderId::from_uuid(uuid))
}
