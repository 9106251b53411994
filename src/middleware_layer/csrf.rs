use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http::{HeaderMap, header, request::Parts};
use tower_cookies::Cookies;

use crate::{
    config::CsrfConfig,
    crypto::token,
    error::{CsrfError, Result},
    secret::CsrfToken,
};

/// How much of a form or JSON body is buffered while looking for the
/// token field. Anything larger is rejected during extraction.
const BODY_READ_LIMIT: usize = 2 * 1024 * 1024;

/// The shared middleware state: the configuration, resolved once.
#[derive(Clone)]
pub struct CsrfProtect {
    pub(crate) config: Arc<CsrfConfig>,
}

impl CsrfProtect {
    /// Wraps a finished configuration for use with
    /// `axum::middleware::from_fn_with_state`.
    pub fn new(config: CsrfConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// A custom token extractor. Receives the request view and returns the
/// candidate token, fully replacing the default lookup order.
pub type TokenExtractor = Arc<dyn for<'a> Fn(&RequestContext<'a>) -> Option<String> + Send + Sync>;

/// The request view handed to token extractors.
pub struct RequestContext<'a> {
    headers: &'a HeaderMap,
    query: Vec<(String, String)>,
    body: BodyFields,
}

enum BodyFields {
    None,
    Form(Vec<(String, String)>),
    Json(sonic_rs::Value),
}

impl<'a> RequestContext<'a> {
    fn new(parts: &'a Parts, body: &[u8]) -> Self {
        let query = parts
            .uri
            .query()
            .and_then(|q| serde_urlencoded::from_str::<Vec<(String, String)>>(q).ok())
            .unwrap_or_default();

        let body = if body.is_empty() {
            BodyFields::None
        } else if is_form(&parts.headers) {
            serde_urlencoded::from_bytes(body)
                .map(BodyFields::Form)
                .unwrap_or(BodyFields::None)
        } else if is_json(&parts.headers) {
            sonic_rs::from_slice(body)
                .map(BodyFields::Json)
                .unwrap_or(BodyFields::None)
        } else {
            BodyFields::None
        };

        Self {
            headers: &parts.headers,
            query,
            body,
        }
    }

    /// Looks up a header value by name, case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|value| value.to_str().ok())
    }

    /// Looks up a query parameter by name.
    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// Looks up a field in a form-urlencoded or JSON request body.
    pub fn body_field(&self, name: &str) -> Option<&str> {
        match &self.body {
            BodyFields::None => None,
            BodyFields::Form(fields) => fields
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            BodyFields::Json(value) => {
                use sonic_rs::JsonValueTrait;
                value.get(name).and_then(|field| field.as_str())
            }
        }
    }
}

/// A middleware that validates CSRF tokens on state-changing requests.
///
/// Every request gets a [`CsrfToken`] generator in its extensions, exempt
/// or not; only validation is gated on the HTTP method. Requests whose
/// method is outside the ignored set must present a token derived from
/// the secret cookie, or they are rejected with 403 before the handler
/// runs.
///
/// # Arguments
///
/// * `protect` - The shared middleware state.
/// * `cookies` - The request cookies.
/// * `req` - The incoming request.
/// * `next` - The next middleware in the chain.
///
/// # Returns
///
/// The inner handler's response, or a 403 rejection.
pub async fn verify_csrf(
    State(protect): State<CsrfProtect>,
    cookies: Cookies,
    mut req: Request<Body>,
    next: Next,
) -> Response {
    let token_handle = CsrfToken::new(protect.config.clone(), cookies);
    req.extensions_mut().insert(token_handle.clone());

    let method = req.method().as_str().to_ascii_uppercase();
    if protect.config.ignore_methods.contains(&method) {
        tracing::debug!("✅ CSRF exemption: {} request", method);
        return next.run(req).await;
    }

    let Some(secret) = token_handle.read_secret() else {
        tracing::warn!("❌ CSRF: secret cookie missing");
        return CsrfError::InvalidToken.into_response();
    };

    let (req, candidate) = match extract_candidate(req, &protect.config).await {
        Ok(pair) => pair,
        Err(err) => return err.into_response(),
    };

    let Some(candidate) = candidate.filter(|c| !c.is_empty()) else {
        tracing::warn!("❌ CSRF: no token presented");
        return CsrfError::InvalidToken.into_response();
    };

    if !token::verify_token(&secret, &candidate) {
        tracing::warn!("❌ CSRF: token mismatch");
        return CsrfError::InvalidToken.into_response();
    }

    tracing::debug!("✅ CSRF token valid");
    next.run(req).await
}

/// Runs the configured extractor over the request, buffering the body
/// only when its content type can carry the token field. The request is
/// reassembled and handed back for the inner handler.
async fn extract_candidate(
    req: Request<Body>,
    config: &CsrfConfig,
) -> Result<(Request<Body>, Option<String>)> {
    let (parts, body) = req.into_parts();

    if is_form(&parts.headers) || is_json(&parts.headers) {
        let bytes = axum::body::to_bytes(body, BODY_READ_LIMIT)
            .await
            .map_err(|e| {
                tracing::warn!("❌ CSRF: failed to buffer request body: {}", e);
                CsrfError::InvalidToken
            })?;

        let candidate = {
            let context = RequestContext::new(&parts, bytes.as_ref());
            run_extractor(config, &context)
        };

        Ok((Request::from_parts(parts, Body::from(bytes)), candidate))
    } else {
        let candidate = {
            let context = RequestContext::new(&parts, &[]);
            run_extractor(config, &context)
        };

        Ok((Request::from_parts(parts, body), candidate))
    }
}

fn run_extractor(config: &CsrfConfig, context: &RequestContext<'_>) -> Option<String> {
    match &config.extractor {
        Some(extractor) => extractor(context),
        None => default_extractor(context),
    }
}

/// The default extraction order: body field `_csrf`, query parameter
/// `_csrf`, then the token headers. First non-empty candidate wins.
fn default_extractor(context: &RequestContext<'_>) -> Option<String> {
    [
        context.body_field("_csrf"),
        context.query_param("_csrf"),
        context.header("csrf-token"),
        context.header("xsrf-token"),
        context.header("x-csrf-token"),
        context.header("x-xsrf-token"),
    ]
    .into_iter()
    .flatten()
    .find(|candidate| !candidate.is_empty())
    .map(str::to_owned)
}

fn is_form(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"))
}

fn is_json(headers: &HeaderMap) -> bool {
    content_type(headers).is_some_and(|ct| ct.starts_with("application/json"))
}

fn content_type(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = http::Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn body_field_wins_over_query_and_headers() {
        let parts = parts(
            "/transfer?_csrf=from-query",
            &[
                ("content-type", "application/x-www-form-urlencoded"),
                ("x-csrf-token", "from-header"),
            ],
        );
        let context = RequestContext::new(&parts, b"amount=5&_csrf=from-body");
        assert_eq!(default_extractor(&context).as_deref(), Some("from-body"));
    }

    #[test]
    fn query_wins_over_headers() {
        let parts = parts("/transfer?_csrf=from-query", &[("csrf-token", "from-header")]);
        let context = RequestContext::new(&parts, &[]);
        assert_eq!(default_extractor(&context).as_deref(), Some("from-query"));
    }

    #[test]
    fn header_lookup_follows_documented_order() {
        let parts = parts(
            "/transfer",
            &[
                ("x-xsrf-token", "fourth"),
                ("x-csrf-token", "third"),
                ("xsrf-token", "second"),
            ],
        );
        let context = RequestContext::new(&parts, &[]);
        assert_eq!(default_extractor(&context).as_deref(), Some("second"));
    }

    #[test]
    fn empty_candidates_are_skipped() {
        let parts = parts(
            "/transfer?_csrf=",
            &[("csrf-token", ""), ("x-csrf-token", "present")],
        );
        let context = RequestContext::new(&parts, &[]);
        assert_eq!(default_extractor(&context).as_deref(), Some("present"));
    }

    #[test]
    fn json_body_field_is_extracted() {
        let parts = parts("/transfer", &[("content-type", "application/json")]);
        let context = RequestContext::new(&parts, br#"{"amount":5,"_csrf":"from-json"}"#);
        assert_eq!(default_extractor(&context).as_deref(), Some("from-json"));
    }

    #[test]
    fn malformed_body_extracts_nothing() {
        let parts = parts("/transfer", &[("content-type", "application/json")]);
        let context = RequestContext::new(&parts, b"{not json");
        assert_eq!(default_extractor(&context), None);
    }

    #[test]
    fn header_lookup_is_case_insensitive() {
        let parts = parts("/transfer", &[("X-CSRF-Token", "upper")]);
        let context = RequestContext::new(&parts, &[]);
        assert_eq!(context.header("x-csrf-token"), Some("upper"));
    }
}
