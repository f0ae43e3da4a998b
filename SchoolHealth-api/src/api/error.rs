use axum::{
    extract::multipart::MultipartError,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;
use tracing::{error, warn};

use school_health_domain::errors::ServiceError;

use crate::entities::common::ErrorResponse;

/// Error returned by every handler
#[derive(Debug, Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),

    /// Malformed request that never reached a service
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Caller may not touch this resource
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err))
    }
}

impl ApiError {
    fn parts(self) -> (StatusCode, ErrorResponse) {
        let response = |error: &str, message: String| ErrorResponse { error: error.to_string(), message, details: None };

        match self {
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, response("bad_request", message)),
            ApiError::Forbidden(message) => (StatusCode::FORBIDDEN, response("forbidden", message)),
            ApiError::Service(err) => match err {
                ServiceError::Validation(message) => (StatusCode::BAD_REQUEST, response("validation_error", message)),
                ServiceError::InvalidImport { message, invalid_rows } => {
                    let mut body = response("invalid_import", message);
                    body.details = Some(json!({ "invalid_rows": invalid_rows }));
                    (StatusCode::BAD_REQUEST, body)
                }
                ServiceError::Unauthorized(message) => (StatusCode::UNAUTHORIZED, response("unauthorized", message)),
                ServiceError::Forbidden(message) => (StatusCode::FORBIDDEN, response("forbidden", message)),
                ServiceError::Locked(message) => (StatusCode::FORBIDDEN, response("locked", message)),
                ServiceError::NotFound(message) => (StatusCode::NOT_FOUND, response("not_found", message)),
                ServiceError::Conflict(message) => (StatusCode::CONFLICT, response("conflict", message)),
                other => {
                    error!("Request failed: {}", other);
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        response("internal_error", "An unexpected error occurred".to_string()),
                    )
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = self.parts();
        if status.is_client_error() {
            warn!("{} {}: {}", status.as_u16(), body.error, body.message);
        }
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::to_bytes;
    use school_health_domain::entities::InvalidRow;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_locked_maps_to_forbidden() {
        let response = ApiError::from(ServiceError::Locked("Session s1 is locked".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        assert_eq!(body_json(response).await["error"], "locked");
    }

    #[tokio::test]
    async fn test_invalid_import_carries_rows() {
        let err = ServiceError::InvalidImport {
            message: "1 rows have missing or invalid values".to_string(),
            invalid_rows: vec![InvalidRow { row: 3, missing_fields: vec!["height".to_string()], student_id: None }],
        };
        let response = ApiError::from(err).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let body = body_json(response).await;
        assert_eq!(body["error"], "invalid_import");
        assert_eq!(body["details"]["invalid_rows"][0]["row"], 3);
    }

    #[tokio::test]
    async fn test_internal_errors_are_not_leaked() {
        let response = ApiError::from(ServiceError::Internal("disk on fire".to_string())).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = body_json(response).await;
        assert_eq!(body["message"], "An unexpected error occurred");
        assert!(body.get("details").is_none());
    }

    #[test]
    fn test_status_codes() {
        let cases = [
            (ServiceError::Validation("v".into()), StatusCode::BAD_REQUEST),
            (ServiceError::Unauthorized("u".into()), StatusCode::UNAUTHORIZED),
            (ServiceError::Forbidden("f".into()), StatusCode::FORBIDDEN),
            (ServiceError::NotFound("n".into()), StatusCode::NOT_FOUND),
            (ServiceError::Conflict("c".into()), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).parts().0, status);
        }
    }
}
