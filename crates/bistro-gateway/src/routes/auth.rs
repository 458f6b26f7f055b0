use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Response;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::response::{Body, failure, respond, success};
use crate::state::SharedState;

#[derive(Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cellphone: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CreateAdminRequest {
    #[serde(default)]
    name: String,
    #[serde(default)]
    cellphone: String,
    admin_secret: Option<String>,
}

pub(crate) async fn login(
    State(state): State<SharedState>,
    Body(req): Body<LoginRequest>,
) -> Response {
    let outcome = state.shop.users.login(&req.name, &req.cellphone).await;
    respond(outcome, "User not found", |login| {
        let message = if login.created {
            "User created and logged in"
        } else {
            "Login successful"
        };
        success(
            StatusCode::OK,
            json!({ "user": login.user, "created": login.created, "message": message }),
        )
    })
}

pub(crate) async fn profile(
    State(state): State<SharedState>,
    Path(user_id): Path<String>,
) -> Response {
    let outcome = state.shop.users.get(&user_id).await;
    respond(outcome, "User not found", |user| {
        success(StatusCode::OK, json!({ "user": user }))
    })
}

pub(crate) async fn create_admin(
    State(state): State<SharedState>,
    Body(req): Body<CreateAdminRequest>,
) -> Response {
    if req.admin_secret.as_deref() != Some(state.config.auth.admin_secret.as_str()) {
        warn!("create-admin attempted with an invalid secret");
        return failure(StatusCode::FORBIDDEN, "Invalid admin secret");
    }
    let outcome = state.shop.users.create_admin(&req.name, &req.cellphone).await;
    respond(outcome, "User not found", |user| {
        success(
            StatusCode::CREATED,
            json!({ "user": user, "message": "Admin user created successfully" }),
        )
    })
}
