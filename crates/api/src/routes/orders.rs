//! Order endpoints behind the rate-limited, authenticated gate.

use std::net::SocketAddr;
use std::sync::Arc;

use auth::AuthService;
use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{ConnectInfo, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use cache::CachedOrders;
use chrono::{DateTime, Utc};
use common::{OrderId, UserId};
use domain::{LineItem, Money, Order, OrderStatus, validate_new_order};
use limiter::{Bucket, Decision, RateKey, RateLimiter};
use metrics::counter;
use pipeline::Publisher;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orders: Arc<CachedOrders>,
    pub auth: Arc<AuthService>,
    pub limiter: Arc<dyn RateLimiter>,
    pub publisher: Arc<Publisher>,
}

// -- Request types --

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub items: Vec<LineItem>,
    pub total_price: Money,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

// -- Response types --

#[derive(Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub user_id: i64,
    pub items: Vec<LineItem>,
    pub total_price: Money,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            user_id: order.user_id.as_i64(),
            items: order.items,
            total_price: order.total_price,
            status: order.status,
            created_at: order.created_at,
        }
    }
}

/// Creation response: the order plus an optional warning when the
/// post-commit event emit failed.
#[derive(Serialize)]
pub struct CreateOrderResponse {
    #[serde(flatten)]
    pub order: OrderResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_warning: Option<String>,
}

#[derive(Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
}

// -- Gate --

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Runs the rate-limit check, then the auth check, in that order.
///
/// The limit key is the authenticated user when the token is good and
/// the client address otherwise, so unauthenticated floods burn the
/// anonymous bucket and are answered 429 before 401. A limiter backend
/// failure fails open: availability over strictness.
async fn gate(
    state: &AppState,
    headers: &HeaderMap,
    addr: SocketAddr,
    bucket: Bucket,
) -> Result<UserId, ApiError> {
    let identity = match bearer_token(headers) {
        Some(token) => state.auth.validate(token).await.map_err(ApiError::from),
        None => Err(ApiError::Unauthorized("missing bearer token".to_string())),
    };

    let key = match &identity {
        Ok(user_id) => RateKey::User(*user_id),
        Err(_) => RateKey::from_addr(&addr.to_string()),
    };
    match state.limiter.allow(&key, bucket).await {
        Ok(Decision::Allowed) => {}
        Ok(Decision::Denied) => {
            counter!("rate_limited_total").increment(1);
            return Err(ApiError::RateLimited);
        }
        Err(err) => {
            counter!("rate_limiter_failures_total").increment(1);
            warn!(%err, "rate limiter unavailable, failing open");
        }
    }

    identity
}

fn parse_order_id(id: &str) -> Result<OrderId, ApiError> {
    let uuid = uuid_from_str(id)?;
    Ok(OrderId::from_uuid(uuid))
}

fn uuid_from_str(id: &str) -> Result<uuid::Uuid, ApiError> {
    id.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid order id: {id}")))
}

// -- Handlers --

/// POST /orders — create an order and announce it to the pipeline.
#[tracing::instrument(skip_all)]
pub async fn create(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    body: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreateOrderResponse>), ApiError> {
    let user_id = gate(&state, &headers, addr, Bucket::CreateOrder).await?;
    let Json(req) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;
    validate_new_order(&req.items).map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let order = state
        .orders
        .create(user_id, req.items, req.total_price)
        .await?;

    // The order is committed; a publish failure never fails the
    // request, the client just gets a warning alongside the order.
    let published = state.publisher.publish_new_order(order.id).await;
    let publish_warning =
        (!published).then(|| "order created, but the fulfillment event was not emitted".to_string());

    Ok((
        StatusCode::CREATED,
        Json(CreateOrderResponse {
            order: order.into(),
            publish_warning,
        }),
    ))
}

/// GET /orders/{id} — fetch one of the caller's orders.
#[tracing::instrument(skip_all)]
pub async fn get(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = gate(&state, &headers, addr, Bucket::GetOrder).await?;
    let order_id = parse_order_id(&id)?;

    let order = state.orders.get(order_id).await?;
    if order.user_id != user_id {
        // Hide other users' orders entirely.
        return Err(ApiError::NotFound(format!("order {order_id} not found")));
    }

    Ok(Json(order.into()))
}

/// PATCH /orders/{id} — change an order's status.
#[tracing::instrument(skip_all)]
pub async fn update_status(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(id): Path<String>,
    body: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<OrderResponse>, ApiError> {
    let user_id = gate(&state, &headers, addr, Bucket::UpdateOrder).await?;
    let order_id = parse_order_id(&id)?;
    let Json(req) = body.map_err(|err| ApiError::BadRequest(err.body_text()))?;

    let current = state.orders.get(order_id).await?;
    if current.user_id != user_id {
        return Err(ApiError::NotFound(format!("order {order_id} not found")));
    }

    let updated = state.orders.update_status(order_id, req.status).await?;
    Ok(Json(updated.into()))
}

/// GET /orders/user/{user_id} — list the caller's orders, newest first.
///
/// The path segment is kept for URL compatibility but the token is the
/// authority on whose orders are returned.
#[tracing::instrument(skip_all)]
pub async fn list_for_user(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Path(path_user_id): Path<i64>,
) -> Result<Json<OrderListResponse>, ApiError> {
    let user_id = gate(&state, &headers, addr, Bucket::ListOrders).await?;
    if path_user_id != user_id.as_i64() {
        debug!(
            path_user_id,
            token_user_id = user_id.as_i64(),
            "path user id differs from token subject, using the token"
        );
    }

    let orders = state.orders.list_by_user(user_id).await?;
    Ok(Json(OrderListResponse {
        orders: orders.into_iter().map(OrderResponse::from).collect(),
    }))
}
