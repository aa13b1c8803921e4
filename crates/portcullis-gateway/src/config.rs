//! Gateway configuration types.
//!
//! Read once at start-up from `PORTCULLIS_*` environment variables.

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;

/// Configuration for the gateway service.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Listen address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Directory holding the database and signing keys.
    pub data_dir: PathBuf,

    /// Base URL under which clients reach the gateway.
    pub public_url: String,

    /// Allowed CORS origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,

    /// Administrator created at start-up when the user does not exist yet.
    pub bootstrap_admin: Option<BootstrapAdmin>,
}

/// Credentials of the initial administrator.
#[derive(Debug, Clone)]
pub struct BootstrapAdmin {
    /// Login name.
    pub user_name: String,
    /// Login password.
    pub password: SecretString,
}

/// Invalid gateway configuration.
#[derive(Debug, thiserror::Error)]
#[error("invalid configuration: {0}")]
pub struct ConfigError(String);

impl GatewayConfig {
    const DEFAULT_BIND_ADDRESS: &'static str = "0.0.0.0:8080";
    const DEFAULT_DATA_DIR: &'static str = "./data";
    const DEFAULT_PUBLIC_URL: &'static str = "http://localhost:8080";
    const DEFAULT_MAX_BODY: usize = 1024 * 1024;
    const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

    /// Read the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value cannot be parsed or only one of
    /// the administrator variables is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a numeric value cannot be parsed or only one of
    /// the administrator variables is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bootstrap_admin = match (var("PORTCULLIS_ADMIN_USER"), lookup("PORTCULLIS_ADMIN_PASSWORD")) {
            (Some(user_name), Some(password)) if !password.is_empty() => Some(BootstrapAdmin {
                user_name,
                password: SecretString::new(password),
            }),
            (None, None) => None,
            _ => {
                return Err(ConfigError(
                    "PORTCULLIS_ADMIN_USER and PORTCULLIS_ADMIN_PASSWORD must be set together"
                        .to_string(),
                ))
            }
        };

        Ok(Self {
            bind_address: var("PORTCULLIS_BIND_ADDRESS")
                .unwrap_or_else(|| Self::DEFAULT_BIND_ADDRESS.to_string()),
            data_dir: var("PORTCULLIS_DATA_DIR")
                .map_or_else(|| PathBuf::from(Self::DEFAULT_DATA_DIR), PathBuf::from),
            public_url: var("PORTCULLIS_PUBLIC_URL")
                .map_or_else(|| Self::DEFAULT_PUBLIC_URL.to_string(), |url| {
                    url.trim_end_matches('/').to_string()
                }),
            cors_origins: var("PORTCULLIS_CORS_ORIGINS").map_or_else(
                || vec!["*".to_string()],
                |origins| origins.split(',').map(|o| o.trim().to_string()).collect(),
            ),
            max_body_bytes: number(&var, "PORTCULLIS_MAX_BODY_BYTES")?
                .unwrap_or(Self::DEFAULT_MAX_BODY),
            request_timeout_seconds: number(&var, "PORTCULLIS_REQUEST_TIMEOUT")?
                .unwrap_or(Self::DEFAULT_REQUEST_TIMEOUT),
            bootstrap_admin,
        })
    }

    /// Get the request timeout as a `Duration`.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: Self::DEFAULT_BIND_ADDRESS.to_string(),
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            public_url: Self::DEFAULT_PUBLIC_URL.to_string(),
            cors_origins: vec!["*".to_string()],
            max_body_bytes: Self::DEFAULT_MAX_BODY,
            request_timeout_seconds: Self::DEFAULT_REQUEST_TIMEOUT,
            bootstrap_admin: None,
        }
    }
}

fn number<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>, ConfigError> {
    var(name)
        .map(|v| {
            v.parse()
                .map_err(|_| ConfigError(format!("{name} must be a number, got {v:?}")))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn defaults() {
        let config = GatewayConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.bind_address, "0.0.0.0:8080");
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.cors_origins, ["*"]);
        assert_eq!(config.max_body_bytes, 1024 * 1024);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn overrides() {
        let config = GatewayConfig::from_lookup(lookup(&[
            ("PORTCULLIS_BIND_ADDRESS", "127.0.0.1:9000"),
            ("PORTCULLIS_DATA_DIR", "/var/lib/portcullis"),
            ("PORTCULLIS_PUBLIC_URL", "https://auth.example.com/"),
            ("PORTCULLIS_CORS_ORIGINS", "https://a.example.com, https://b.example.com"),
            ("PORTCULLIS_REQUEST_TIMEOUT", "5"),
            ("PORTCULLIS_ADMIN_USER", "admin"),
            ("PORTCULLIS_ADMIN_PASSWORD", "changeit"),
        ]))
        .unwrap();

        assert_eq!(config.bind_address, "127.0.0.1:9000");
        assert_eq!(config.public_url, "https://auth.example.com");
        assert_eq!(config.cors_origins.len(), 2);
        assert_eq!(config.request_timeout_seconds, 5);
        assert_eq!(config.bootstrap_admin.unwrap().user_name, "admin");
    }

    #[test]
    fn admin_needs_both_variables() {
        let result = GatewayConfig::from_lookup(lookup(&[("PORTCULLIS_ADMIN_USER", "admin")]));
        assert!(result.is_err());
    }

    #[test]
    fn malformed_number_is_rejected() {
        let result =
            GatewayConfig::from_lookup(lookup(&[("PORTCULLIS_MAX_BODY_BYTES", "lots")]));
        assert!(result.is_err());
    }
}
