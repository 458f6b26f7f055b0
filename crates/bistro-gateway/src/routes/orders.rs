use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::response::{Body, failure, respond, respond_with, success};
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateOrderRequest {
    user_id: Option<String>,
    notes: Option<String>,
}

pub(crate) async fn create(
    State(state): State<SharedState>,
    Body(req): Body<CreateOrderRequest>,
) -> Response {
    let Some(user_id) = req.user_id.filter(|id| !id.is_empty()) else {
        return failure(StatusCode::BAD_REQUEST, "User ID is required");
    };
    let outcome = state
        .shop
        .orders
        .create_from_cart(&user_id, req.notes.as_deref())
        .await;
    respond_with(
        outcome,
        StatusCode::BAD_REQUEST,
        "Failed to create order. Cart may be empty or user not found.",
        |order| {
            success(
                StatusCode::CREATED,
                json!({ "order": order, "message": "Order created successfully" }),
            )
        },
    )
}

pub(crate) async fn for_user(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    let outcome = state.shop.orders.for_user(&user_id).await;
    respond(outcome, "Orders not found", |orders| {
        success(StatusCode::OK, json!({ "orders": orders }))
    })
}
