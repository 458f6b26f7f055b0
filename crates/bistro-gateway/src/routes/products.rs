use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Response;
use bistro_shop::ProductFilters;
use serde_json::json;

use crate::response::{failure, respond, success};
use crate::state::SharedState;

pub(crate) async fn list(
    State(state): State<SharedState>,
    filters: Result<Query<ProductFilters>, QueryRejection>,
) -> Response {
    let Query(filters) = match filters {
        Ok(filters) => filters,
        Err(rejection) => {
            return failure(
                StatusCode::BAD_REQUEST,
                format!("Validation error: {}", rejection.body_text()),
            );
        }
    };
    let outcome = state.shop.products.list(&filters).await;
    respond(outcome, "Products not found", |products| {
        success(StatusCode::OK, json!({ "products": products }))
    })
}

pub(crate) async fn get(
    State(state): State<SharedState>,
    Path(product_id): Path<String>,
) -> Response {
    let outcome = state.shop.products.get(&product_id).await;
    respond(outcome, "Product not found", |product| {
        success(StatusCode::OK, json!({ "product": product }))
    })
}
