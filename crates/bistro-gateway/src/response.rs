//! JSON envelopes shared by every handler: `{"success": bool, ...}`.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use bistro_common::Lookup;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

pub(crate) const INTERNAL_ERROR: &str = "Internal server error";

/// `{"success": true}` merged with the keys of `fields`.
pub(crate) fn success(status: StatusCode, fields: Value) -> Response {
    let mut body = Map::new();
    body.insert("success".to_string(), Value::Bool(true));
    if let Value::Object(extra) = fields {
        body.extend(extra);
    }
    (status, Json(Value::Object(body))).into_response()
}

pub(crate) fn failure(status: StatusCode, message: impl Into<String>) -> Response {
    let body = json!({ "success": false, "message": message.into() });
    (status, Json(body)).into_response()
}

/// Render a service outcome. `NotFound` becomes `miss_status` with
/// `miss_message`; `Invalid` is a 400 carrying its reason.
pub(crate) fn respond_with<T>(
    outcome: Lookup<T>,
    miss_status: StatusCode,
    miss_message: &str,
    found: impl FnOnce(T) -> Response,
) -> Response {
    match outcome {
        Lookup::Found(value) => found(value),
        Lookup::NotFound => failure(miss_status, miss_message),
        Lookup::Invalid(reason) => failure(StatusCode::BAD_REQUEST, reason),
        Lookup::Failed(_) => failure(StatusCode::INTERNAL_SERVER_ERROR, INTERNAL_ERROR),
    }
}

/// [`respond_with`] with a 404 for `NotFound`.
pub(crate) fn respond<T>(
    outcome: Lookup<T>,
    not_found: &str,
    found: impl FnOnce(T) -> Response,
) -> Response {
    respond_with(outcome, StatusCode::NOT_FOUND, not_found, found)
}

/// JSON request body whose rejection uses the failure envelope.
pub(crate) struct Body<T>(pub T);

impl<S, T> FromRequest<S> for Body<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Body(value)),
            Err(rejection) => Err(invalid_body(rejection)),
        }
    }
}

fn invalid_body(rejection: JsonRejection) -> Response {
    failure(
        StatusCode::BAD_REQUEST,
        format!("Validation error: {}", rejection.body_text()),
    )
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;

    use super::*;

    async fn body_of(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn success_merges_fields() {
        let response = success(StatusCode::CREATED, json!({"order": {"id": "x"}}));
        assert_eq!(response.status(), StatusCode::CREATED);
        let body = body_of(response).await;
        assert_eq!(body, json!({"success": true, "order": {"id": "x"}}));
    }

    #[tokio::test]
    async fn outcomes_map_to_statuses() {
        let found = respond(Lookup::Found(1), "gone", |n| {
            success(StatusCode::OK, json!({ "n": n }))
        });
        assert_eq!(found.status(), StatusCode::OK);

        let missing = respond(Lookup::<i32>::NotFound, "Cart not found", |_| unreachable!());
        assert_eq!(missing.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_of(missing).await["message"], "Cart not found");

        let invalid = respond(Lookup::<i32>::invalid("bad id"), "x", |_| unreachable!());
        assert_eq!(invalid.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_of(invalid).await["message"], "bad id");

        let failed = respond_with(
            Lookup::<i32>::Failed("disk".into()),
            StatusCode::BAD_REQUEST,
            "x",
            |_| unreachable!(),
        );
        assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_of(failed).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["message"], INTERNAL_ERROR);
    }
}
