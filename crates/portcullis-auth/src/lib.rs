//! Access-token validation and issuance for portcullis.
//!
//! This crate provides the authentication and authorization engine:
//!
//! - Claims and a JWT codec (single RSA key or multi-key JWKS)
//! - The trusted key registry published as one JWKS document
//! - Credential validators (Basic, Bearer, OIDC cookie, standalone cookie)
//!   composed into an ordered [`ValidatorChain`]
//! - A sealed per-request [`UserContext`] and the [`ScopeAuthorizer`]
//! - API access keys: encoding, revocation and inspection
//!
//! # Architecture
//!
//! ```text
//!                 ┌──────────────────┐
//!   request ─────▶│  ValidatorChain  │  first non-"not applicable" wins
//!                 └────────┬─────────┘
//!        ┌─────────────┬───┴─────────┬─────────────────┐
//!        ▼             ▼             ▼                 ▼
//!  ┌──────────┐ ┌────────────┐ ┌────────────┐ ┌──────────────┐
//!  │  Bearer  │ │ OidcCookie │ │ Standalone │ │    Basic     │
//!  └────┬─────┘ └─────┬──────┘ └─────┬──────┘ └──────┬───────┘
//!       │ JWKS        │ refresh      │ reissue       │ identity
//!       ▼             ▼              ▼               ▼
//!  TrustedKeyRegistry  OidcProvider   UserRegistry   IdentityStore
//!  AccessKeyRegistry   RefreshTokenStore
//!                 │
//!                 ▼ sealed UserContext
//!          ┌──────────────────┐
//!          │ ScopeAuthorizer  │  per-operation AccessRule
//!          └──────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use http::{HeaderMap, Method};
//! use jsonwebtoken::Algorithm;
//! use portcullis_auth::{
//!     AccessKeyRegistry, AccessRule, AuthRequest, BearerTokenValidator, KeySource,
//!     ResponseCookies, RsaJwtService, ScopeAuthorizer, ScopePolicy, TrustedKeyRegistry,
//!     ValidatorChain,
//! };
//!
//! # async fn example(
//! #     signer: RsaJwtService,
//! #     registry: Arc<dyn AccessKeyRegistry>,
//! # ) -> Result<(), Box<dyn std::error::Error>> {
//! let trusted = TrustedKeyRegistry::builder(Algorithm::RS256)
//!     .add_key(KeySource::AccessKeys, signer.jwk().clone())
//!     .build()?;
//! let chain = ValidatorChain::new()
//!     .with(Arc::new(BearerTokenValidator::new(Arc::new(trusted), registry)));
//!
//! let request = AuthRequest::new(Method::GET, "/api/v1/elements", HeaderMap::new());
//! let context = chain.authenticate(&request, &mut ResponseCookies::new()).await?;
//!
//! let rule = AccessRule::new(ScopePolicy::scopes(["adm"]), ScopePolicy::none());
//! ScopeAuthorizer::new().authorize(&rule, &context)?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod access_key;
pub mod authorizer;
pub mod claims;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod jwks;
pub mod jwt;
pub mod keys;
pub mod request;
pub mod secret;
pub mod validator;
pub mod validators;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use access_key::{
    AccessKeyCodec, AccessKeyValidation, AccessKeyValidator, ApiAccessKey, ApiAccessKeyBuilder,
    API_KEY_ID,
};
pub use authorizer::{AccessRule, ScopeAuthorizer, ScopePolicy};
pub use claims::{Claims, ClaimsBuilder};
pub use client::{OAuth2Tokens, OidcClient};
pub use config::{AuthConfig, OidcConfig, StandaloneConfig};
pub use context::UserContext;
pub use error::{AuthError, Result};
pub use identity::{
    AccessKeyRegistry, IdentityStore, OidcProvider, RefreshTokenStore, StoredRefreshToken,
    UserInfo, UserRegistry,
};
pub use jwks::{JwkKey, JwkSet};
pub use jwt::{JwksDecoder, JwtDecoder, JwtEncoder, RsaJwtService};
pub use keys::{load_or_generate_key, KeySource, TrustedKey, TrustedKeyRegistry};
pub use request::{AuthRequest, Authorization, ResponseCookies, SetCookie};
pub use secret::MasterSecret;
pub use validator::{AccessTokenValidator, Principal, ValidatorChain, Verdict};
pub use validators::standalone::STANDALONE_KEY_ID;
pub use validators::{
    BasicAuthValidator, BearerTokenValidator, OidcCookieValidator, StandaloneCookieValidator,
};
