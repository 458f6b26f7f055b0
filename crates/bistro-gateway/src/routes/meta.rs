//! Health, endpoint catalogue and the catch-all 404.

use axum::Json;
use axum::extract::State;
use axum::http::{Method, StatusCode, Uri};
use axum::response::Response;
use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use tracing::warn;

use crate::response::failure;
use crate::state::SharedState;

pub(crate) async fn health(State(state): State<SharedState>) -> Json<Value> {
    let database = match state.store.ping().await {
        Ok(()) => "connected",
        Err(e) => {
            warn!("health check ping failed: {e}");
            "disconnected"
        }
    };
    Json(json!({
        "status": "OK",
        "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        "database": database,
    }))
}

pub(crate) async fn catalogue() -> Json<Value> {
    Json(json!({
        "name": "Bistro API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Ordering API for a small restaurant",
        "endpoints": {
            "auth": {
                "login": "POST /api/auth/login",
                "profile": "GET /api/auth/profile/{userId}",
                "createAdmin": "POST /api/auth/create-admin"
            },
            "user": {
                "products": "GET /api/products",
                "productById": "GET /api/products/{productId}",
                "addToCart": "POST /api/cart/add",
                "removeFromCart": "DELETE /api/cart/remove/{userId}/{productId}",
                "getCart": "GET /api/cart/{userId}",
                "clearCart": "DELETE /api/cart/clear/{userId}",
                "createOrder": "POST /api/orders/create",
                "getUserOrders": "GET /api/orders/user/{userId}"
            },
            "admin": {
                "createProduct": "POST /api/admin/{adminUserId}/products",
                "updateProduct": "PUT /api/admin/{adminUserId}/products/{productId}",
                "deleteProduct": "DELETE /api/admin/{adminUserId}/products/{productId}",
                "getAllOrders": "GET /api/admin/{adminUserId}/orders",
                "getOrderById": "GET /api/admin/{adminUserId}/orders/{orderId}",
                "updateOrderStatus": "PATCH /api/admin/{adminUserId}/orders/{orderId}/status",
                "dashboard": "GET /api/admin/{adminUserId}/dashboard"
            }
        }
    }))
}

pub(crate) async fn not_found(method: Method, uri: Uri) -> Response {
    failure(
        StatusCode::NOT_FOUND,
        format!("Route {method} {} not found", uri.path()),
    )
}
