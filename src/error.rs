use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The crate's error type.
///
/// Every validation failure collapses into `InvalidToken`, so the response
/// never tells a caller which check failed; the distinction only exists in
/// the logs.
#[derive(Error, Debug)]
pub enum CsrfError {
    /// The presented token did not validate against the client secret.
    #[error("Invalid CSRF token")]
    InvalidToken,

    /// Token generation was requested while cookie storage is disabled.
    #[error("CSRF cookie storage is disabled, no place to persist a secret")]
    CookieDisabled,
}

/// A `Result` type that uses `CsrfError` as the error type.
pub type Result<T> = std::result::Result<T, CsrfError>;

impl IntoResponse for CsrfError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            CsrfError::InvalidToken => {
                tracing::warn!("❌ CSRF validation failed");
                (StatusCode::FORBIDDEN, "Invalid CSRF token".to_string())
            }

            CsrfError::CookieDisabled => {
                tracing::error!("❌ CSRF misconfiguration: cookie storage disabled");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string())
            }
        };

        let body = sonic_rs::to_string(&sonic_rs::json!({
            "error": message
        }))
        .unwrap_or_else(|_| r#"{"error":"Invalid CSRF token"}"#.to_string());

        (status, body).into_response()
    }
}
