//! Order routes.

use super::{
    AppState,
    dto::{
        ApiJson, ApiPath, ApiQuery, CreateOrderRequest, OrderListQuery, StatisticsQuery,
        StatusRequest, UpdateOrderRequest,
    },
    error::ApiResult,
};
use crate::{
    core::{
        lifecycle::StatusChange,
        orders::{self, NewOrder, OrderStatistics, OrderView},
    },
    errors::Error,
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, patch},
};
use chrono::Utc;

/// Order routes, mounted at the root.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/orders", get(list_orders).post(create_order))
        .route("/orders/statistics", get(order_statistics))
        .route(
            "/orders/{id}",
            get(get_order).put(update_order).delete(delete_order),
        )
        .route("/orders/{id}/status", patch(set_order_status))
}

/// GET /orders?formId=
async fn list_orders(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<OrderListQuery>,
) -> ApiResult<Json<Vec<OrderView>>> {
    let orders = orders::list_orders(&state.db, query.form_id.as_deref()).await?;
    Ok(Json(orders))
}

/// GET /orders/statistics?formId=&merchantId=
async fn order_statistics(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<StatisticsQuery>,
) -> ApiResult<Json<OrderStatistics>> {
    let today = Utc::now().date_naive();
    let stats = orders::order_statistics(&state.db, &query.into(), today).await?;
    Ok(Json(stats))
}

/// GET /orders/{id}
async fn get_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<Json<OrderView>> {
    orders::get_order(&state.db, &id)
        .await?
        .map(Json)
        .ok_or_else(|| Error::OrderNotFound { id }.into())
}

/// POST /orders
async fn create_order(
    State(state): State<AppState>,
    ApiJson(body): ApiJson<CreateOrderRequest>,
) -> ApiResult<(StatusCode, Json<OrderView>)> {
    let new_order = NewOrder::try_from(body)?;
    let order = orders::create_order(&state.db, new_order).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// PUT /orders/{id}
async fn update_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<UpdateOrderRequest>,
) -> ApiResult<StatusCode> {
    let replacement = body.into_replacement(&id)?;
    orders::update_order(&state.db, &id, replacement).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /orders/{id}
async fn delete_order(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
) -> ApiResult<StatusCode> {
    orders::delete_order(&state.db, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PATCH /orders/{id}/status
async fn set_order_status(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<String>,
    ApiJson(body): ApiJson<StatusRequest>,
) -> ApiResult<Json<StatusChange<String>>> {
    let change = orders::set_order_status(&state.db, &id, body.status).await?;
    Ok(Json(change))
}
