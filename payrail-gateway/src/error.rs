//! HTTP error mapping for the gateway.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use payrail::error::PaymentError;

/// Wrapper turning a [`PaymentError`] into an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub PaymentError);

impl From<PaymentError> for ApiError {
    fn from(err: PaymentError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            PaymentError::Validation(_) => (StatusCode::BAD_REQUEST, self.0.to_string()),
            PaymentError::NotFound(_) => (StatusCode::NOT_FOUND, self.0.to_string()),
            PaymentError::Conflict(_) => (StatusCode::CONFLICT, self.0.to_string()),
            // Infrastructure detail is logged, not leaked.
            PaymentError::Storage(err) => {
                tracing::error!(error = %err, "Gateway storage failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_owned(),
                )
            }
        };
        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use payrail::error::{ConflictError, NotFoundError, StorageError, ValidationError};
    use payrail::intent::PaymentIntentStatus;

    fn status_of(err: PaymentError) -> StatusCode {
        ApiError(err).into_response().status()
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_of(ValidationError::new("bad").into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_of(NotFoundError::new("vendor", "v_1").into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_of(
                ConflictError::new(
                    "pi_1",
                    PaymentIntentStatus::Settled,
                    &[PaymentIntentStatus::Submitted]
                )
                .into()
            ),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_of(StorageError::new("connection reset").into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
