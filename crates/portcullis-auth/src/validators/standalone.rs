//! Standalone login cookie authentication.
//!
//! Used when no OIDC provider is configured. Tokens are signed with the
//! locally held login key and reissued shortly before they expire, picking
//! up scope changes from the user registry.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use portcullis_core::UserName;

use crate::claims::Claims;
use crate::config::StandaloneConfig;
use crate::error::Result;
use crate::identity::{UserInfo, UserRegistry};
use crate::jwt::{JwtDecoder, JwtEncoder, RsaJwtService};
use crate::request::{AuthRequest, ResponseCookies, SetCookie};
use crate::validator::{AccessTokenValidator, Verdict};

/// Key id of the standalone login signing key.
pub const STANDALONE_KEY_ID: &str = "standalone-login";

/// Issuer of standalone login tokens.
pub const STANDALONE_ISSUER: &str = "portcullis";

/// Issues and validates the standalone login cookie.
pub struct StandaloneCookieValidator {
    signer: Arc<RsaJwtService>,
    users: Arc<dyn UserRegistry>,
    cookie_name: String,
    config: StandaloneConfig,
}

impl StandaloneCookieValidator {
    /// Create a validator.
    #[must_use]
    pub fn new(
        signer: Arc<RsaJwtService>,
        users: Arc<dyn UserRegistry>,
        cookie_name: impl Into<String>,
        config: StandaloneConfig,
    ) -> Self {
        Self {
            signer,
            users,
            cookie_name: cookie_name.into(),
            config,
        }
    }

    fn ttl(&self) -> Duration {
        Duration::from_std(self.config.ttl).unwrap_or_else(|_| Duration::hours(1))
    }

    fn refresh_window(&self) -> Duration {
        Duration::from_std(self.config.refresh_window).unwrap_or_else(|_| Duration::zero())
    }

    /// Sign a login token for `user`, issued at `now`.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the token cannot be signed.
    pub fn issue_token(&self, user: &UserInfo, now: DateTime<Utc>) -> Result<String> {
        let claims = Claims::builder()
            .jwt_id(uuid::Uuid::new_v4().to_string())
            .subject(user.user_name.as_str())
            .issuer(STANDALONE_ISSUER)
            .issued_at(now)
            .expires_at(now + self.ttl())
            .scopes(user.scopes.clone())
            .build();
        self.signer.encode(&claims)
    }

    /// Issue the login cookie for `user`.
    ///
    /// # Errors
    ///
    /// Returns `Signing` if the token cannot be signed.
    pub fn issue_cookie(&self, user: &UserInfo, secure: bool, cookies: &mut ResponseCookies) -> Result<()> {
        let token = self.issue_token(user, Utc::now())?;
        cookies.set(SetCookie::new(
            &self.cookie_name,
            token,
            self.ttl().num_seconds(),
            secure,
        ));
        Ok(())
    }

    /// Queue removal of the login cookie.
    pub fn clear_cookie(&self, secure: bool, cookies: &mut ResponseCookies) {
        cookies.set(SetCookie::removal(&self.cookie_name, secure));
    }
}

#[async_trait]
impl AccessTokenValidator for StandaloneCookieValidator {
    fn name(&self) -> &'static str {
        "standalone-cookie"
    }

    async fn validate(&self, request: &AuthRequest, cookies: &mut ResponseCookies) -> Result<Verdict> {
        let Some(token) = request.cookie(&self.cookie_name) else {
            return Ok(Verdict::NotApplicable);
        };

        let claims = match self.signer.decode(token) {
            Ok(claims) => claims,
            Err(e) => {
                tracing::debug!(error = %e, "Login cookie rejected");
                return Ok(Verdict::Invalid);
            }
        };

        let now = Utc::now();
        if claims.is_expired_at(now) {
            tracing::debug!(sub = ?claims.subject(), "Login cookie expired");
            return Ok(Verdict::Invalid);
        }

        let Some(user_name) = claims.subject().and_then(|s| UserName::new(s).ok()) else {
            return Ok(Verdict::Invalid);
        };

        if !claims.expires_within(self.refresh_window(), now) {
            return Ok(Verdict::valid(user_name, claims.scopes().clone()));
        }

        let Some(user) = self.users.find_user(&user_name).await? else {
            tracing::info!(user = %user_name, "Login cookie owner no longer exists");
            return Ok(Verdict::Invalid);
        };

        self.issue_cookie(&user, request.is_secure(), cookies)?;
        tracing::debug!(user = %user.user_name, "Login cookie reissued");
        Ok(Verdict::valid(user.user_name, user.scopes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{self, InMemoryUserRegistry};
    use http::Method;
    use portcullis_core::ScopeSet;

    struct Fixture {
        users: Arc<InMemoryUserRegistry>,
        validator: StandaloneCookieValidator,
    }

    fn fixture() -> Fixture {
        let signer = RsaJwtService::new(STANDALONE_KEY_ID, testing::rsa_key(1)).unwrap();
        let users = Arc::new(InMemoryUserRegistry::default());
        users.add_user("jane", &["adm"]);
        let validator = StandaloneCookieValidator::new(
            Arc::new(signer),
            users.clone(),
            "LEITSTAND_ACCESS",
            StandaloneConfig::default(),
        );
        Fixture { users, validator }
    }

    fn jane(scopes: &str) -> UserInfo {
        UserInfo::new("jane".parse().unwrap(), ScopeSet::from_claim(scopes))
    }

    fn cookie_request(token: &str) -> AuthRequest {
        let cookie = format!("LEITSTAND_ACCESS={token}");
        testing::request(Method::GET, "/", &[("cookie", cookie.as_str())])
    }

    #[tokio::test]
    async fn fresh_cookie_is_valid_without_reissue() {
        let f = fixture();
        let token = f.validator.issue_token(&jane("adm"), Utc::now()).unwrap();
        let mut cookies = ResponseCookies::new();

        let verdict = f.validator.validate(&cookie_request(&token), &mut cookies).await.unwrap();

        assert_eq!(
            verdict,
            Verdict::valid("jane".parse().unwrap(), ScopeSet::from_claim("adm"))
        );
        assert!(cookies.is_empty());
    }

    #[tokio::test]
    async fn cookie_near_expiry_is_reissued_with_current_scopes() {
        let f = fixture();
        // Issued 58 minutes ago, expires in 2 minutes.
        let token = f
            .validator
            .issue_token(&jane("adm"), Utc::now() - Duration::minutes(58))
            .unwrap();
        f.users.add_user("jane", &["adm", "ipam"]);

        let mut cookies = ResponseCookies::new();
        let verdict = f.validator.validate(&cookie_request(&token), &mut cookies).await.unwrap();

        assert_eq!(
            verdict,
            Verdict::valid("jane".parse().unwrap(), ScopeSet::from_claim("adm ipam"))
        );
        let cookie = cookies.get("LEITSTAND_ACCESS").unwrap();
        assert_eq!(cookie.max_age(), 3600);
        assert_ne!(cookie.value(), token);
    }

    #[tokio::test]
    async fn expired_cookie_is_invalid() {
        let f = fixture();
        let token = f
            .validator
            .issue_token(&jane("adm"), Utc::now() - Duration::hours(2))
            .unwrap();
        let verdict = f
            .validator
            .validate(&cookie_request(&token), &mut ResponseCookies::new())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Invalid);
    }

    #[tokio::test]
    async fn removed_user_is_invalid_on_refresh() {
        let f = fixture();
        let token = f
            .validator
            .issue_token(&jane("adm"), Utc::now() - Duration::minutes(58))
            .unwrap();
        f.users.remove_user("jane");

        let verdict = f
            .validator
            .validate(&cookie_request(&token), &mut ResponseCookies::new())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Invalid);
    }

    #[tokio::test]
    async fn foreign_signature_is_invalid() {
        let f = fixture();
        let other = RsaJwtService::new(STANDALONE_KEY_ID, testing::rsa_key(0)).unwrap();
        let token = other
            .encode(&Claims::builder().subject("jane").build())
            .unwrap();
        let verdict = f
            .validator
            .validate(&cookie_request(&token), &mut ResponseCookies::new())
            .await
            .unwrap();
        assert_eq!(verdict, Verdict::Invalid);
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let f = fixture();
        let mut cookies = ResponseCookies::new();
        f.validator.clear_cookie(true, &mut cookies);
        let cookie = cookies.get("LEITSTAND_ACCESS").unwrap();
        assert_eq!(cookie.max_age(), 0);
        assert_eq!(cookie.value(), "");
    }
}
