use std::collections::HashSet;
use std::sync::Arc;

use tower_cookies::Cookie;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::Duration;

use crate::middleware_layer::csrf::{RequestContext, TokenExtractor};

/// The default HTTP methods exempt from CSRF validation.
const DEFAULT_IGNORE_METHODS: [&str; 3] = ["GET", "HEAD", "OPTIONS"];

/// Attributes of the secret cookie.
#[derive(Clone, Debug)]
pub struct CookieOptions {
    /// The cookie key under which the secret is stored.
    pub name: String,
    /// The cookie path.
    pub path: String,
    /// The cookie domain, if any.
    pub domain: Option<String>,
    /// Whether the cookie is hidden from client-side scripts.
    pub http_only: bool,
    /// The SameSite policy.
    pub same_site: SameSite,
    /// Whether the cookie is restricted to HTTPS.
    pub secure: bool,
    /// The cookie lifetime in seconds. `None` means a session cookie.
    pub max_age: Option<i64>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            name: "_csrf".to_string(),
            path: "/".to_string(),
            domain: None,
            http_only: true,
            same_site: SameSite::Lax,
            secure: false,
            max_age: None,
        }
    }
}

impl CookieOptions {
    /// Builds the secret cookie with every configured attribute applied.
    pub(crate) fn build(&self, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(self.name.clone(), value);

        cookie.set_path(self.path.clone());
        cookie.set_http_only(self.http_only);
        cookie.set_same_site(self.same_site);
        cookie.set_secure(self.secure);

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }

        if let Some(max_age) = self.max_age {
            cookie.set_max_age(Duration::seconds(max_age));
        }

        cookie
    }
}

/// The protection mechanism's configuration.
///
/// Resolved once at construction and read-only afterwards; the middleware
/// never mutates it, so no synchronization is needed around it.
#[derive(Clone)]
pub struct CsrfConfig {
    /// Whether a secret may be persisted in a cookie at all. Disabling
    /// this makes token generation fail loudly.
    pub(crate) cookie_disabled: bool,
    /// Attributes of the secret cookie.
    pub(crate) cookie: CookieOptions,
    /// Uppercased HTTP methods exempt from validation.
    pub(crate) ignore_methods: HashSet<String>,
    /// The salt length in characters.
    pub(crate) salt_length: usize,
    /// The secret length in raw bytes, before base64 encoding.
    pub(crate) secret_length: usize,
    /// An optional custom token extractor replacing the default lookup
    /// order entirely.
    pub(crate) extractor: Option<TokenExtractor>,
}

impl Default for CsrfConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CsrfConfig {
    /// Creates a configuration with the default cookie attributes,
    /// ignored methods (`GET`, `HEAD`, `OPTIONS`), salt length (8) and
    /// secret length (18).
    pub fn new() -> Self {
        Self {
            cookie_disabled: false,
            cookie: CookieOptions::default(),
            ignore_methods: DEFAULT_IGNORE_METHODS
                .iter()
                .map(|m| m.to_string())
                .collect(),
            salt_length: 8,
            secret_length: 18,
            extractor: None,
        }
    }

    /// Enables or disables cookie-backed secret storage.
    pub fn cookie(mut self, enabled: bool) -> Self {
        self.cookie_disabled = !enabled;
        self
    }

    /// Replaces the cookie attributes wholesale.
    pub fn cookie_options(mut self, options: CookieOptions) -> Self {
        self.cookie = options;
        self
    }

    /// Sets the cookie key under which the secret is stored.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie.name = name.into();
        self
    }

    /// Sets the cookie path.
    pub fn cookie_path(mut self, path: impl Into<String>) -> Self {
        self.cookie.path = path.into();
        self
    }

    /// Sets the cookie domain.
    pub fn cookie_domain(mut self, domain: impl Into<String>) -> Self {
        self.cookie.domain = Some(domain.into());
        self
    }

    /// Sets whether the cookie is hidden from client-side scripts.
    pub fn http_only(mut self, http_only: bool) -> Self {
        self.cookie.http_only = http_only;
        self
    }

    /// Sets the cookie's SameSite policy.
    pub fn same_site(mut self, same_site: SameSite) -> Self {
        self.cookie.same_site = same_site;
        self
    }

    /// Sets whether the cookie is restricted to HTTPS.
    pub fn secure(mut self, secure: bool) -> Self {
        self.cookie.secure = secure;
        self
    }

    /// Sets the cookie lifetime in seconds.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.cookie.max_age = Some(seconds);
        self
    }

    /// Replaces the set of HTTP methods exempt from validation. Methods
    /// are uppercased once here, never per request.
    pub fn ignore_methods<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.ignore_methods = methods
            .into_iter()
            .map(|m| m.as_ref().to_ascii_uppercase())
            .collect();
        self
    }

    /// Sets the salt length in characters.
    pub fn salt_length(mut self, length: usize) -> Self {
        self.salt_length = length;
        self
    }

    /// Sets the secret length in raw bytes.
    pub fn secret_length(mut self, length: usize) -> Self {
        self.secret_length = length;
        self
    }

    /// Installs a custom token extractor. The default lookup order is
    /// fully replaced: only what this function returns is considered.
    pub fn extractor<F>(mut self, extractor: F) -> Self
    where
        F: for<'a> Fn(&RequestContext<'a>) -> Option<String> + Send + Sync + 'static,
    {
        self.extractor = Some(Arc::new(extractor));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = CsrfConfig::new();
        assert!(!config.cookie_disabled);
        assert_eq!(config.cookie.name, "_csrf");
        assert_eq!(config.cookie.path, "/");
        assert_eq!(config.salt_length, 8);
        assert_eq!(config.secret_length, 18);
        for method in ["GET", "HEAD", "OPTIONS"] {
            assert!(config.ignore_methods.contains(method));
        }
        assert!(!config.ignore_methods.contains("POST"));
    }

    #[test]
    fn ignore_methods_are_uppercased_once() {
        let config = CsrfConfig::new().ignore_methods(["get", "Trace"]);
        assert!(config.ignore_methods.contains("GET"));
        assert!(config.ignore_methods.contains("TRACE"));
        assert!(!config.ignore_methods.contains("HEAD"));
    }
}
