use std::sync::{Arc, OnceLock};

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;
use tower_cookies::Cookies;
use zeroize::Zeroize;

use crate::config::CsrfConfig;
use crate::crypto::token;
use crate::error::{CsrfError, Result};

/// A request-scoped handle for generating CSRF tokens.
///
/// The middleware inserts one into the extensions of every request it
/// sees, exempt or not, so any handler can mint tokens via
/// `Extension<CsrfToken>`. Each `generate` call draws a fresh salt and
/// yields a new token; all of them stay valid against the same secret.
///
/// The secret is resolved at most once per request: the first read or
/// creation is memoized for the rest of the request, so a token handed to
/// the handler can never disagree with the secret validation just checked
/// against, and the cookie is written at most once.
#[derive(Clone)]
pub struct CsrfToken {
    config: Arc<CsrfConfig>,
    cookies: Cookies,
    secret: Arc<OnceLock<String>>,
}

impl CsrfToken {
    pub(crate) fn new(config: Arc<CsrfConfig>, cookies: Cookies) -> Self {
        Self {
            config,
            cookies,
            secret: Arc::new(OnceLock::new()),
        }
    }

    /// Generates a fresh token bound to this client's secret.
    ///
    /// # Returns
    ///
    /// A `Result` containing the token, or `CsrfError::CookieDisabled`
    /// when the configuration left the secret nowhere to live.
    pub fn generate(&self) -> Result<String> {
        let secret = self.obtain_or_create_secret()?;
        let salt = token::random_string(self.config.salt_length);
        Ok(token::tokenize(&secret, &salt))
    }

    /// Returns the client secret, creating and persisting one if the
    /// cookie is absent or empty.
    ///
    /// Creation and the cookie write run inside the memo initializer, so
    /// even concurrent calls on clones of this handle resolve to one
    /// secret and at most one cookie write.
    fn obtain_or_create_secret(&self) -> Result<String> {
        if self.config.cookie_disabled {
            return Err(CsrfError::CookieDisabled);
        }

        let secret = self.secret.get_or_init(|| {
            if let Some(value) = self.stored_secret() {
                return value;
            }

            let mut raw = vec![0u8; self.config.secret_length];
            OsRng.fill_bytes(&mut raw);
            let secret = general_purpose::URL_SAFE_NO_PAD.encode(&raw);
            raw.zeroize();

            self.cookies.add(self.config.cookie.build(secret.clone()));
            tracing::debug!("🔐 Issued new CSRF secret cookie");
            secret
        });

        Ok(secret.clone())
    }

    /// Read-only secret lookup used during validation; never creates.
    ///
    /// A hit seeds the request-local memo so later `generate` calls reuse
    /// the identical secret.
    pub(crate) fn read_secret(&self) -> Option<String> {
        if let Some(secret) = self.secret.get() {
            return Some(secret.clone());
        }

        let value = self.stored_secret()?;
        Some(self.secret.get_or_init(|| value).clone())
    }

    fn stored_secret(&self) -> Option<String> {
        self.cookies
            .get(&self.config.cookie.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}
