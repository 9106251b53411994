//! Stateless CSRF protection for axum.
//!
//! A long-lived random secret lives in a client cookie; short-lived,
//! salted SHA-256 tokens are derived from it and must accompany every
//! state-changing request. Nothing is stored server-side: a token is
//! valid exactly when it can be re-derived from the secret the client
//! presents, so any number of tokens can coexist and none is single-use.
//!
//! Validation is skipped for methods in the ignored set (`GET`, `HEAD`,
//! `OPTIONS` by default). Token generation is always available: the
//! middleware injects a [`CsrfToken`] handle into every request's
//! extensions.
//!
//! ```rust,no_run
//! use axum::{Extension, Router, middleware::from_fn_with_state, routing::{get, post}};
//! use csrf_shield::{CsrfConfig, CsrfProtect, CsrfToken, verify_csrf};
//! use tower_cookies::CookieManagerLayer;
//!
//! #[tokio::main]
//! async fn main() {
//!     let protect = CsrfProtect::new(CsrfConfig::new());
//!
//!     let app: Router = Router::new()
//!         .route("/form", get(form))
//!         .route("/transfer", post(|| async { "done" }))
//!         .route_layer(from_fn_with_state(protect, verify_csrf))
//!         .layer(CookieManagerLayer::new());
//!
//!     let listener = tokio::net::TcpListener::bind("127.0.0.1:3000").await.unwrap();
//!     axum::serve(listener, app).await.unwrap();
//! }
//!
//! async fn form(Extension(token): Extension<CsrfToken>) -> String {
//!     token.generate().unwrap()
//! }
//! ```

pub mod config;
pub mod error;
mod secret;

pub mod crypto {
    pub mod token;
}

pub mod middleware_layer {
    pub mod csrf;
}

pub use config::{CookieOptions, CsrfConfig};
pub use error::{CsrfError, Result};
pub use middleware_layer::csrf::{CsrfProtect, RequestContext, TokenExtractor, verify_csrf};
pub use secret::CsrfToken;
pub use tower_cookies::cookie::SameSite;
