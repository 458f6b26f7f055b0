use axum::Router;
use axum::http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderValue, Method};
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

use crate::admin::require_admin;
use crate::routes::{admin, auth, cart, meta, orders, products};
use crate::state::SharedState;

/// Assemble the HTTP API over `state`.
pub fn build_router(state: SharedState) -> Router {
    let admin_routes = Router::new()
        .route("/products", post(admin::create_product))
        .route(
            "/products/{product_id}",
            put(admin::update_product).delete(admin::delete_product),
        )
        .route("/orders", get(admin::list_orders))
        .route("/orders/{order_id}", get(admin::get_order))
        .route(
            "/orders/{order_id}/status",
            patch(admin::update_order_status),
        )
        .route("/dashboard", get(admin::dashboard))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .route("/health", get(meta::health))
        .route("/api", get(meta::catalogue))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/profile/{user_id}", get(auth::profile))
        .route("/api/auth/create-admin", post(auth::create_admin))
        .route("/api/products", get(products::list))
        .route("/api/products/{product_id}", get(products::get))
        .route("/api/cart/add", post(cart::add))
        .route(
            "/api/cart/remove/{user_id}/{product_id}",
            delete(cart::remove),
        )
        .route("/api/cart/clear/{user_id}", delete(cart::clear))
        .route("/api/cart/{user_id}", get(cart::get))
        .route("/api/orders/create", post(orders::create))
        .route("/api/orders/user/{user_id}", get(orders::for_user))
        .nest("/api/admin/{admin_id}", admin_routes)
        .fallback(meta::not_found)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// CORS for the configured origins. A `*` entry opens the API to any
/// origin, which rules out credentialed requests.
fn cors_layer(origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION, ACCEPT])
        .expose_headers([CONTENT_TYPE]);

    if origins.iter().any(|origin| origin.trim() == "*") {
        warn!("CORS wildcard origin configured, credentials are disabled");
        return cors.allow_origin(AllowOrigin::any());
    }

    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("ignoring invalid CORS origin: {origin}");
                None
            }
        })
        .collect();

    cors.allow_origin(AllowOrigin::list(allowed))
        .allow_credentials(true)
}
