//! Handlers behind the admin gate in [`crate::admin`].

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use bistro_shop::{NewProduct, OrderStatus, ProductUpdate};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::response::{Body, failure, respond, success};
use crate::state::SharedState;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateProductRequest {
    name: Option<String>,
    description: Option<String>,
    price: Option<f64>,
    category: Option<String>,
    image_url: Option<String>,
    available: Option<bool>,
}

impl CreateProductRequest {
    fn into_new_product(self) -> Option<NewProduct> {
        let non_empty = |s: Option<String>| s.filter(|s| !s.trim().is_empty());
        Some(NewProduct {
            name: non_empty(self.name)?,
            description: non_empty(self.description)?,
            price: self.price?,
            category: non_empty(self.category)?,
            image_url: self.image_url,
            available: self.available.unwrap_or(true),
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct ProductPath {
    product_id: String,
}

#[derive(Deserialize)]
pub(crate) struct OrderPath {
    order_id: String,
}

#[derive(Deserialize)]
pub(crate) struct StatusQuery {
    status: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct StatusRequest {
    status: Option<String>,
}

pub(crate) async fn create_product(
    State(state): State<SharedState>,
    Body(req): Body<CreateProductRequest>,
) -> Response {
    let Some(product) = req.into_new_product() else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Name, description, price, and category are required",
        );
    };
    let outcome = state.shop.products.create(product).await;
    respond(outcome, "Product not found", |product| {
        info!("product {} created", product.id);
        success(
            StatusCode::CREATED,
            json!({ "product": product, "message": "Product created successfully" }),
        )
    })
}

pub(crate) async fn update_product(
    State(state): State<SharedState>,
    Path(path): Path<ProductPath>,
    Body(update): Body<ProductUpdate>,
) -> Response {
    if update.is_empty() {
        return failure(
            StatusCode::BAD_REQUEST,
            "At least one field must be provided for update",
        );
    }
    let outcome = state.shop.products.update(&path.product_id, &update).await;
    respond(outcome, "Product not found or update failed", |product| {
        success(
            StatusCode::OK,
            json!({ "product": product, "message": "Product updated successfully" }),
        )
    })
}

pub(crate) async fn delete_product(
    State(state): State<SharedState>,
    Path(path): Path<ProductPath>,
) -> Response {
    let outcome = state.shop.products.delete(&path.product_id).await;
    respond(outcome, "Product not found or delete failed", |()| {
        info!("product {} deleted", path.product_id);
        success(
            StatusCode::OK,
            json!({ "message": "Product deleted successfully" }),
        )
    })
}

/// All orders, or only those with `?status=` when it names a known status.
pub(crate) async fn list_orders(
    State(state): State<SharedState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    let status = query.status.and_then(|s| s.parse::<OrderStatus>().ok());
    let outcome = match status {
        Some(status) => state.shop.orders.by_status(status).await,
        None => state.shop.orders.all().await,
    };
    respond(outcome, "Orders not found", |orders| {
        success(StatusCode::OK, json!({ "orders": orders }))
    })
}

pub(crate) async fn get_order(
    State(state): State<SharedState>,
    Path(path): Path<OrderPath>,
) -> Response {
    let outcome = state.shop.orders.get(&path.order_id).await;
    respond(outcome, "Order not found", |order| {
        success(StatusCode::OK, json!({ "order": order }))
    })
}

pub(crate) async fn update_order_status(
    State(state): State<SharedState>,
    Path(path): Path<OrderPath>,
    Body(req): Body<StatusRequest>,
) -> Response {
    let status = req
        .status
        .and_then(|s| s.parse::<OrderStatus>().ok())
        .filter(|s| *s != OrderStatus::Pending);
    let Some(status) = status else {
        return failure(
            StatusCode::BAD_REQUEST,
            "Valid status is required (accepted, declined, completed)",
        );
    };
    let outcome = state
        .shop
        .orders
        .update_status(&path.order_id, status)
        .await;
    respond(outcome, "Order not found or update failed", |order| {
        success(
            StatusCode::OK,
            json!({ "order": order, "message": format!("Order {status} successfully") }),
        )
    })
}

pub(crate) async fn dashboard(State(state): State<SharedState>) -> Response {
    let outcome = state.shop.dashboard().await;
    respond(outcome, "Dashboard not available", |dash| {
        success(
            StatusCode::OK,
            json!({ "stats": dash.stats, "recentOrders": dash.recent_orders }),
        )
    })
}
