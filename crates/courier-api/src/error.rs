use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::error;

use courier_db::StoreError;
use courier_types::api::ErrorResponse;

/// Boundary-layer error: every failure leaving a handler becomes an HTTP
/// status plus the `{ success: false, error_code }` envelope. No storage
/// error detail crosses the boundary.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
}

impl ApiError {
    pub fn bad_request() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            code: "bad_request",
        }
    }

    pub fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        let (status, code) = match &err {
            StoreError::NotFound(_) => (StatusCode::NOT_FOUND, "not_found"),
            StoreError::Conflict(_) => (StatusCode::CONFLICT, "conflict"),
            StoreError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
            StoreError::InvalidInput(_) => (StatusCode::BAD_REQUEST, "invalid_input"),
            StoreError::AlreadyConfirmed => (StatusCode::CONFLICT, "already_confirmed"),
            StoreError::Poisoned | StoreError::Sqlite(_) => {
                error!("Storage error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        };
        Self { status, code }
    }
}

impl From<tokio::task::JoinError> for ApiError {
    fn from(err: tokio::task::JoinError) -> Self {
        error!("spawn_blocking join error: {}", err);
        Self::internal()
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error_code: self.code.to_string(),
        };
        (self.status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use axum::response::IntoResponse;
    use courier_db::StoreError;

    use super::ApiError;

    #[test]
    fn store_errors_map_to_envelope_codes() {
        let cases = [
            (StoreError::NotFound("chat"), StatusCode::NOT_FOUND),
            (StoreError::Conflict("username"), StatusCode::CONFLICT),
            (StoreError::Forbidden("not a member"), StatusCode::FORBIDDEN),
            (StoreError::InvalidInput("empty"), StatusCode::BAD_REQUEST),
            (StoreError::AlreadyConfirmed, StatusCode::CONFLICT),
        ];
        for (err, expected) in cases {
            let resp = ApiError::from(err).into_response();
            assert_eq!(resp.status(), expected);
        }
    }
}
