//! Authentication configuration.
//!
//! Built once at start-up from environment variables and shared behind an
//! `Arc`. Nothing reads the environment after that.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::error::{AuthError, Result};

/// Lifetime settings of standalone login tokens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StandaloneConfig {
    /// Lifetime of an issued token.
    pub ttl: Duration,
    /// Tokens expiring within this window are reissued.
    pub refresh_window: Duration,
}

impl StandaloneConfig {
    const fn default_ttl() -> Duration {
        Duration::from_secs(3600)
    }

    const fn default_refresh_window() -> Duration {
        Duration::from_secs(300)
    }
}

impl Default for StandaloneConfig {
    fn default() -> Self {
        Self {
            ttl: Self::default_ttl(),
            refresh_window: Self::default_refresh_window(),
        }
    }
}

/// OpenID Connect provider settings.
#[derive(Debug)]
pub struct OidcConfig {
    /// Client id registered at the provider.
    pub client_id: String,
    /// Client secret. Never logged.
    pub client_secret: SecretString,
    /// Authorization endpoint, published to the UI.
    pub authorization_endpoint: Option<String>,
    /// Token endpoint used for refresh.
    pub token_endpoint: String,
    /// Userinfo endpoint.
    pub userinfo_endpoint: Option<String>,
    /// End-session endpoint used on logout.
    pub end_session_endpoint: Option<String>,
    /// URL of the provider's JWKS document.
    pub jwks_url: String,
    /// Connect timeout for provider calls.
    pub connect_timeout: Duration,
    /// Read timeout for provider calls.
    pub read_timeout: Duration,
}

impl OidcConfig {
    const fn default_timeout() -> Duration {
        Duration::from_millis(10_000)
    }

    /// A configuration with default timeouts and no optional endpoints.
    #[must_use]
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        token_endpoint: impl Into<String>,
        jwks_url: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret,
            authorization_endpoint: None,
            token_endpoint: token_endpoint.into(),
            userinfo_endpoint: None,
            end_session_endpoint: None,
            jwks_url: jwks_url.into(),
            connect_timeout: Self::default_timeout(),
            read_timeout: Self::default_timeout(),
        }
    }
}

/// Process-wide authentication settings.
#[derive(Debug)]
pub struct AuthConfig {
    /// Whether Basic authentication is accepted.
    pub basic_auth_enabled: bool,
    /// Whether access-key tokens are trusted.
    pub api_access_keys_enabled: bool,
    /// Name of the access-token cookie.
    pub access_cookie_name: String,
    /// Name of the OIDC id-token cookie.
    pub id_cookie_name: String,
    /// Standalone login token lifetimes.
    pub standalone: StandaloneConfig,
    /// OIDC settings. `None` disables OIDC.
    pub oidc: Option<Arc<OidcConfig>>,
    /// Login view published to clients.
    pub login_view: String,
}

impl AuthConfig {
    /// Default access-token cookie name.
    pub const DEFAULT_ACCESS_COOKIE: &'static str = "LEITSTAND_ACCESS";
    /// Default id-token cookie name.
    pub const DEFAULT_ID_COOKIE: &'static str = "LEITSTAND_ID";
    /// Default login view.
    pub const DEFAULT_LOGIN_VIEW: &'static str = "/ui/login/login.html";

    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a value is malformed or OIDC is only
    /// partially configured.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `Configuration` if a value is malformed or OIDC is only
    /// partially configured.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let standalone = StandaloneConfig {
            ttl: seconds(&var, "LEITSTAND_JWS_TTL")?.unwrap_or(StandaloneConfig::default_ttl()),
            refresh_window: seconds(&var, "LEITSTAND_JWS_REFRESH")?
                .unwrap_or(StandaloneConfig::default_refresh_window()),
        };

        let oidc = match (var("OIDC_CLIENT_ID"), var("OIDC_CLIENT_SECRET")) {
            (Some(client_id), Some(secret)) => {
                let required = |name: &str| {
                    var(name).ok_or_else(|| {
                        AuthError::Configuration(format!("{name} is required when OIDC is enabled"))
                    })
                };
                let mut config = OidcConfig::new(
                    client_id,
                    SecretString::new(secret),
                    required("OIDC_TOKEN_ENDPOINT")?,
                    required("OIDC_JWKS_URL")?,
                );
                config.authorization_endpoint = var("OIDC_AUTHORIZATION_ENDPOINT");
                config.userinfo_endpoint = var("OIDC_USERINFO_ENDPOINT");
                config.end_session_endpoint = var("OIDC_END_SESSION_ENDPOINT");
                if let Some(ms) = millis(&var, "OIDC_CONNECT_TIMEOUT")? {
                    config.connect_timeout = ms;
                }
                if let Some(ms) = millis(&var, "OIDC_READ_TIMEOUT")? {
                    config.read_timeout = ms;
                }
                Some(Arc::new(config))
            }
            (None, None) => None,
            _ => {
                return Err(AuthError::Configuration(
                    "OIDC_CLIENT_ID and OIDC_CLIENT_SECRET must be set together".to_string(),
                ))
            }
        };

        Ok(Self {
            basic_auth_enabled: flag(&var, "BASIC_AUTH_ENABLED", false)?,
            api_access_keys_enabled: flag(&var, "API_ACCESS_KEYS_ENABLED", true)?,
            access_cookie_name: var("LEITSTAND_ACCESS_TOKEN_COOKIE_NAME")
                .unwrap_or_else(|| Self::DEFAULT_ACCESS_COOKIE.to_string()),
            id_cookie_name: var("LEITSTAND_ID_TOKEN_COOKIE_NAME")
                .unwrap_or_else(|| Self::DEFAULT_ID_COOKIE.to_string()),
            standalone,
            oidc,
            login_view: var("LOGIN_VIEW").unwrap_or_else(|| Self::DEFAULT_LOGIN_VIEW.to_string()),
        })
    }

    /// Whether OIDC is configured.
    #[must_use]
    pub const fn oidc_enabled(&self) -> bool {
        self.oidc.is_some()
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            basic_auth_enabled: false,
            api_access_keys_enabled: true,
            access_cookie_name: Self::DEFAULT_ACCESS_COOKIE.to_string(),
            id_cookie_name: Self::DEFAULT_ID_COOKIE.to_string(),
            standalone: StandaloneConfig::default(),
            oidc: None,
            login_view: Self::DEFAULT_LOGIN_VIEW.to_string(),
        }
    }
}

fn flag(var: impl Fn(&str) -> Option<String>, name: &str, default: bool) -> Result<bool> {
    match var(name).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(other) => Err(AuthError::Configuration(format!(
            "{name} must be a boolean, got {other}"
        ))),
    }
}

fn number(var: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<u64>> {
    var(name)
        .map(|v| {
            v.parse::<u64>().map_err(|_| {
                AuthError::Configuration(format!("{name} must be a non-negative integer, got {v}"))
            })
        })
        .transpose()
}

fn seconds(var: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    Ok(number(var, name)?.map(Duration::from_secs))
}

fn millis(var: impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<Duration>> {
    Ok(number(var, name)?.map(Duration::from_millis))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<AuthConfig> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        AuthConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[]).unwrap();
        assert!(!config.basic_auth_enabled);
        assert!(config.api_access_keys_enabled);
        assert_eq!(config.access_cookie_name, "LEITSTAND_ACCESS");
        assert_eq!(config.id_cookie_name, "LEITSTAND_ID");
        assert_eq!(config.standalone.ttl, Duration::from_secs(3600));
        assert_eq!(config.standalone.refresh_window, Duration::from_secs(300));
        assert!(!config.oidc_enabled());
        assert_eq!(config.login_view, "/ui/login/login.html");
    }

    #[test]
    fn overrides() {
        let config = config(&[
            ("BASIC_AUTH_ENABLED", "TRUE"),
            ("API_ACCESS_KEYS_ENABLED", "false"),
            ("LEITSTAND_ACCESS_TOKEN_COOKIE_NAME", "ACCESS"),
            ("LEITSTAND_JWS_TTL", "600"),
            ("LEITSTAND_JWS_REFRESH", "60"),
        ])
        .unwrap();
        assert!(config.basic_auth_enabled);
        assert!(!config.api_access_keys_enabled);
        assert_eq!(config.access_cookie_name, "ACCESS");
        assert_eq!(config.standalone.ttl, Duration::from_secs(600));
        assert_eq!(config.standalone.refresh_window, Duration::from_secs(60));
    }

    #[test]
    fn oidc_configuration() {
        let config = config(&[
            ("OIDC_CLIENT_ID", "leitstand"),
            ("OIDC_CLIENT_SECRET", "s3cr3t"),
            ("OIDC_TOKEN_ENDPOINT", "https://idp/token"),
            ("OIDC_JWKS_URL", "https://idp/certs"),
            ("OIDC_READ_TIMEOUT", "2500"),
        ])
        .unwrap();
        let oidc = config.oidc.unwrap();
        assert_eq!(oidc.client_id, "leitstand");
        assert_eq!(oidc.client_secret.expose_secret(), "s3cr3t");
        assert_eq!(oidc.read_timeout, Duration::from_millis(2500));
        assert_eq!(oidc.connect_timeout, Duration::from_millis(10_000));
        assert!(!format!("{oidc:?}").contains("s3cr3t"));
    }

    #[test]
    fn partial_oidc_is_rejected() {
        assert!(config(&[("OIDC_CLIENT_ID", "leitstand")]).is_err());
        assert!(config(&[
            ("OIDC_CLIENT_ID", "leitstand"),
            ("OIDC_CLIENT_SECRET", "s3cr3t"),
        ])
        .is_err());
    }

    #[test]
    fn malformed_values_are_rejected() {
        assert!(config(&[("BASIC_AUTH_ENABLED", "maybe")]).is_err());
        assert!(config(&[("LEITSTAND_JWS_TTL", "-1")]).is_err());
    }
}
