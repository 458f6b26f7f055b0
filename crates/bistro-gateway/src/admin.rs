//! Admin gate for `/api/admin/{admin_id}/...`.

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use bistro_common::Lookup;
use serde::Deserialize;
use tracing::warn;

use crate::response::{INTERNAL_ERROR, failure};
use crate::state::SharedState;

#[derive(Deserialize)]
pub(crate) struct AdminPath {
    admin_id: String,
}

/// Reject the request unless `admin_id` names an admin user. The handler is
/// never invoked for a rejected request.
pub(crate) async fn require_admin(
    State(state): State<SharedState>,
    Path(path): Path<AdminPath>,
    request: Request,
    next: Next,
) -> Response {
    if path.admin_id.trim().is_empty() {
        return failure(StatusCode::UNAUTHORIZED, "Admin user ID is required");
    }
    match state.shop.users.is_admin(&path.admin_id).await {
        Lookup::Found(true) => next.run(request).await,
        Lookup::Failed(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR),
        _ => {
            warn!("admin access denied for {}", path.admin_id);
            failure(
                StatusCode::FORBIDDEN,
                "Access denied. Admin privileges required.",
            )
        }
    }
}
