//! Order CRUD endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::Utc;
use common::{CustomerId, OrderId};
use domain::{LineItem, Order, StatusTransition};
use order_store::{Cursor, FindAllPage, KeyValueBackend, OrderRepository};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<B: KeyValueBackend> {
    pub repository: OrderRepository<B>,
    pub page_size: usize,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: CustomerId,
    #[serde(default)]
    pub line_items: Vec<LineItem>,
}

#[derive(Deserialize)]
pub struct UpdateOrderRequest {
    pub status: String,
}

#[derive(Deserialize)]
pub struct ListParams {
    #[serde(default)]
    pub cursor: u64,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderListResponse {
    pub items: Vec<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next: Option<u64>,
}

// -- Handlers --

/// POST /orders: create an order with a fresh id.
#[tracing::instrument(skip(state, payload))]
pub async fn create<B: KeyValueBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    payload: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = payload?;
    let order = Order::place(req.customer_id, req.line_items);

    state.repository.insert(&order).await?;
    tracing::info!(order_id = %order.id(), "order created");

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders: list one page of orders.
#[tracing::instrument(skip(state, params))]
pub async fn list<B: KeyValueBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let Query(params) = params?;
    let page = FindAllPage::new(state.page_size, Cursor::new(params.cursor));

    let result = state.repository.find_all(page).await?;
    let next = (!result.is_last()).then(|| result.cursor.as_u64());

    Ok(Json(OrderListResponse {
        items: result.orders,
        next,
    }))
}

/// GET /orders/{id}: load one order.
#[tracing::instrument(skip(state))]
pub async fn get<B: KeyValueBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let order = state.repository.find_by_id(order_id).await?;
    Ok(Json(order))
}

/// PUT /orders/{id}: move an order to `shipped` or `completed`.
#[tracing::instrument(skip(state, payload))]
pub async fn update<B: KeyValueBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
    payload: Result<Json<UpdateOrderRequest>, JsonRejection>,
) -> Result<Json<Order>, ApiError> {
    let order_id = parse_order_id(&id)?;
    let Json(req) = payload?;
    let transition: StatusTransition = req.status.parse()?;

    let mut order = state.repository.find_by_id(order_id).await?;
    order.apply(transition, Utc::now())?;
    state.repository.update(&order).await?;
    tracing::info!(%order_id, status = %transition.target(), "order status updated");

    Ok(Json(order))
}

/// DELETE /orders/{id}: remove an order.
#[tracing::instrument(skip(state))]
pub async fn delete<B: KeyValueBackend + 'static>(
    State(state): State<Arc<AppState<B>>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let order_id = parse_order_id(&id)?;
    state.repository.delete_by_id(order_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid order id {id:?}: {e}")))
}
