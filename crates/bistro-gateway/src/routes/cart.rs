use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;

use crate::response::{Body, failure, respond, respond_with, success};
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct AddToCartRequest {
    user_id: Option<String>,
    product_id: Option<String>,
    quantity: Option<i64>,
}

#[derive(Deserialize)]
pub(crate) struct CartLinePath {
    user_id: String,
    product_id: String,
}

pub(crate) async fn add(
    State(state): State<SharedState>,
    Body(req): Body<AddToCartRequest>,
) -> Response {
    let (Some(user_id), Some(product_id), Some(quantity)) = (
        req.user_id.filter(|id| !id.is_empty()),
        req.product_id.filter(|id| !id.is_empty()),
        req.quantity.and_then(|q| u32::try_from(q).ok()).filter(|q| *q > 0),
    ) else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Valid userId, productId, and quantity are required",
        );
    };

    let outcome = state.shop.carts.add(&user_id, &product_id, quantity).await;
    respond_with(
        outcome,
        StatusCode::BAD_REQUEST,
        "Failed to add product to cart. Product may not exist or be unavailable.",
        |cart| {
            success(
                StatusCode::OK,
                json!({ "cart": cart, "message": "Product added to cart successfully" }),
            )
        },
    )
}

pub(crate) async fn remove(
    State(state): State<SharedState>,
    Path(path): Path<CartLinePath>,
) -> Response {
    let outcome = state.shop.carts.remove(&path.user_id, &path.product_id).await;
    respond_with(
        outcome,
        StatusCode::BAD_REQUEST,
        "Failed to remove product from cart",
        |cart| {
            success(
                StatusCode::OK,
                json!({ "cart": cart, "message": "Product removed from cart successfully" }),
            )
        },
    )
}

pub(crate) async fn get(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    let outcome = state.shop.carts.get(&user_id).await;
    respond(outcome, "Cart not found", |cart| {
        success(StatusCode::OK, json!({ "cart": cart }))
    })
}

pub(crate) async fn clear(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    let outcome = state.shop.carts.clear(&user_id).await;
    respond_with(outcome, StatusCode::BAD_REQUEST, "Failed to clear cart", |()| {
        success(StatusCode::OK, json!({ "message": "Cart cleared successfully" }))
    })
}
