use axum_extra::extract::cookie::Key;
use time::Duration;

use crate::error::Error;

/// Transport settings shared by the routes, the session middleware and cookies.
#[derive(Clone)]
pub(crate) struct AuthSettings {
    pub(crate) cookie_key: Key,
    pub(crate) access_cookie_name: String,
    pub(crate) refresh_cookie_name: String,
    pub(crate) cookie_ttl: Duration,
    pub(crate) secure_cookies: bool,
    pub(crate) api_path: String,
    pub(crate) auth_path: String,
}

impl AuthSettings {
    fn defaults() -> Self {
        Self {
            cookie_key: Key::generate(),
            access_cookie_name: "at".into(),
            refresh_cookie_name: "rt".into(),
            cookie_ttl: Duration::days(30),
            secure_cookies: true,
            api_path: "/api".into(),
            auth_path: "/api/auth".into(),
        }
    }
}

/// Cookie transport configuration.
///
/// Use [`from_env()`](AuthConfig::from_env) for convention-based setup,
/// or [`default()`](AuthConfig::default) with `with_*` methods for full control.
#[derive(Clone)]
pub struct AuthConfig {
    pub(super) settings: AuthSettings,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            settings: AuthSettings::defaults(),
        }
    }
}

impl AuthConfig {
    /// Create config from environment variables.
    ///
    /// # Optional env vars
    /// - `COOKIE_KEY`: Cookie encryption key bytes (at least 64)
    /// - `COOKIE_TTL_SECS`: Cookie `Max-Age` (default 30 days)
    /// - `INSECURE_COOKIES`: Set to `"1"` or `"true"` to drop the `Secure` attribute
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a variable is set but invalid.
    pub fn from_env() -> Result<Self, Error> {
        let mut config = Self::default();

        if let Ok(k) = std::env::var("COOKIE_KEY") {
            let key = Key::try_from(k.as_bytes()).map_err(|_| {
                Error::Config(
                    "COOKIE_KEY is set but invalid (must be at least 64 bytes). \
                     Remove the env var to use an ephemeral key, or provide a valid key."
                        .into(),
                )
            })?;
            config = config.with_cookie_key(key);
        }

        if let Ok(ttl) = std::env::var("COOKIE_TTL_SECS") {
            let secs: i64 = ttl
                .parse()
                .map_err(|e| Error::Config(format!("COOKIE_TTL_SECS: {e}")))?;
            config = config.with_cookie_ttl(Duration::seconds(secs));
        }

        let insecure = matches!(
            std::env::var("INSECURE_COOKIES").as_deref(),
            Ok("1") | Ok("true"),
        );

        Ok(config.with_secure_cookies(!insecure))
    }

    #[must_use]
    pub fn with_cookie_key(mut self, key: Key) -> Self {
        self.settings.cookie_key = key;
        self
    }

    #[must_use]
    pub fn with_access_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.access_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_refresh_cookie_name(mut self, name: impl Into<String>) -> Self {
        self.settings.refresh_cookie_name = name.into();
        self
    }

    #[must_use]
    pub fn with_cookie_ttl(mut self, ttl: Duration) -> Self {
        self.settings.cookie_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_secure_cookies(mut self, secure: bool) -> Self {
        self.settings.secure_cookies = secure;
        self
    }

    /// Prefix of the public `login` and `refresh` routes (default `/api`).
    #[must_use]
    pub fn with_api_path(mut self, path: impl Into<String>) -> Self {
        self.settings.api_path = path.into();
        self
    }

    /// Prefix of the session-protected `logout` and `guid` routes (default `/api/auth`).
    #[must_use]
    pub fn with_auth_path(mut self, path: impl Into<String>) -> Self {
        self.settings.auth_path = path.into();
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = AuthConfig::default().settings;
        assert_eq!(settings.access_cookie_name, "at");
        assert_eq!(settings.refresh_cookie_name, "rt");
        assert_eq!(settings.cookie_ttl, Duration::days(30));
        assert!(settings.secure_cookies);
        assert_eq!(settings.api_path, "/api");
        assert_eq!(settings.auth_path, "/api/auth");
    }

    #[test]
    fn builder_overrides() {
        let settings = AuthConfig::default()
            .with_access_cookie_name("access")
            .with_refresh_cookie_name("refresh")
            .with_cookie_ttl(Duration::hours(1))
            .with_secure_cookies(false)
            .with_api_path("/v1")
            .with_auth_path("/v1/session")
            .settings;
        assert_eq!(settings.access_cookie_name, "access");
        assert_eq!(settings.refresh_cookie_name, "refresh");
        assert_eq!(settings.cookie_ttl, Duration::hours(1));
        assert!(!settings.secure_cookies);
        assert_eq!(settings.api_path, "/v1");
        assert_eq!(settings.auth_path, "/v1/session");
    }
}
