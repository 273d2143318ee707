//! Error classification shared by services and HTTP routes.
//!
//! DESIGN
//! ======
//! Every service error enum implements [`ErrorCode`], giving it a stable
//! machine-readable code and a retry hint. Route handlers turn any such
//! error into an [`ApiError`], which renders as
//! `{"error": {"code", "message", "retryable"}}` with an HTTP status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// JSON error payload returned by API routes.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub body: ErrorBody,
}

impl ApiError {
    pub fn new(status: StatusCode, err: &(impl ErrorCode + ?Sized)) -> Self {
        Self {
            status,
            body: ErrorBody { code: err.error_code(), message: err.to_string(), retryable: err.retryable() },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        #[derive(Serialize)]
        struct Envelope {
            error: ErrorBody,
        }

        (self.status, Json(Envelope { error: self.body })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, thiserror::Error)]
    #[error("slot busy")]
    struct Busy;

    impl ErrorCode for Busy {
        fn error_code(&self) -> &'static str {
            "E_BUSY"
        }

        fn retryable(&self) -> bool {
            true
        }
    }

    #[test]
    fn api_error_copies_code_message_and_retry_hint() {
        let err = ApiError::new(StatusCode::CONFLICT, &Busy);
        assert_eq!(err.status, StatusCode::CONFLICT);
        assert_eq!(err.body.code, "E_BUSY");
        assert_eq!(err.body.message, "slot busy");
        assert!(err.body.retryable);
    }

    #[test]
    fn retryable_defaults_to_false() {
        #[derive(Debug, thiserror::Error)]
        #[error("nope")]
        struct Plain;
        impl ErrorCode for Plain {
            fn error_code(&self) -> &'static str {
                "E_PLAIN"
            }
        }
        assert!(!Plain.retryable());
    }

    #[test]
    fn into_response_uses_status() {
        let resp = ApiError::new(StatusCode::BAD_GATEWAY, &Busy).into_response();
        assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
    }
}
