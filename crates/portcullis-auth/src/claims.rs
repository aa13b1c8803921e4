//! JWT claim sets.
//!
//! [`Claims`] is an immutable value built through [`ClaimsBuilder`]. Times are
//! truncated to whole seconds when set, so a claim set survives an
//! encode/decode round trip unchanged.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use portcullis_core::ScopeSet;

use crate::error::{AuthError, Result};

/// Name of the space-separated scope claim.
pub const SCOPE_CLAIM: &str = "scope";

/// An immutable set of JWT claims.
///
/// The key id is header metadata: it is filled in when a token is decoded
/// and ignored when comparing claim sets.
#[derive(Debug, Clone, Default)]
pub struct Claims {
    jwt_id: Option<String>,
    subject: Option<String>,
    issuer: Option<String>,
    audience: Vec<String>,
    issued_at: Option<DateTime<Utc>>,
    expires_at: Option<DateTime<Utc>>,
    key_id: Option<String>,
    scopes: ScopeSet,
    custom: BTreeMap<String, Value>,
}

impl Claims {
    /// Start building a claim set.
    #[must_use]
    pub fn builder() -> ClaimsBuilder {
        ClaimsBuilder::default()
    }

    /// The `jti` claim.
    #[must_use]
    pub fn jwt_id(&self) -> Option<&str> {
        self.jwt_id.as_deref()
    }

    /// The `sub` claim.
    #[must_use]
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// The `iss` claim.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref()
    }

    /// The `aud` claim, in token order.
    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.audience
    }

    /// Whether `audience` is one of the token's audiences.
    #[must_use]
    pub fn has_audience(&self, audience: &str) -> bool {
        self.audience.iter().any(|a| a == audience)
    }

    /// The `iat` claim.
    #[must_use]
    pub const fn issued_at(&self) -> Option<DateTime<Utc>> {
        self.issued_at
    }

    /// The `exp` claim.
    #[must_use]
    pub const fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    /// The `kid` header of the token these claims were decoded from.
    #[must_use]
    pub fn key_id(&self) -> Option<&str> {
        self.key_id.as_deref()
    }

    /// Scopes granted by the token.
    #[must_use]
    pub const fn scopes(&self) -> &ScopeSet {
        &self.scopes
    }

    /// Look up a custom claim.
    #[must_use]
    pub fn claim(&self, name: &str) -> Option<&Value> {
        self.custom.get(name)
    }

    /// Look up a custom claim holding a string.
    #[must_use]
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        self.custom.get(name).and_then(Value::as_str)
    }

    /// Whether the token has expired.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Whether the token had expired at `now`. Tokens without `exp` never expire.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now)
    }

    /// Whether the token expires before `now + window`.
    #[must_use]
    pub fn expires_within(&self, window: Duration, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|exp| exp < now + window)
    }

    pub(crate) fn with_key_id(mut self, key_id: Option<String>) -> Self {
        self.key_id = key_id;
        self
    }

    pub(crate) fn to_raw(&self) -> RawClaims {
        RawClaims {
            jti: self.jwt_id.clone(),
            sub: self.subject.clone(),
            iss: self.issuer.clone(),
            aud: Audience::from_list(&self.audience),
            iat: self.issued_at.map(|t| t.timestamp()),
            exp: self.expires_at.map(|t| t.timestamp()),
            scope: (!self.scopes.is_empty()).then(|| self.scopes.to_claim()),
            custom: self.custom.clone(),
        }
    }

    pub(crate) fn from_raw(raw: RawClaims) -> Result<Self> {
        Ok(Self {
            jwt_id: raw.jti,
            subject: raw.sub,
            issuer: raw.iss,
            audience: raw.aud.into_list(),
            issued_at: raw.iat.map(timestamp).transpose()?,
            expires_at: raw.exp.map(timestamp).transpose()?,
            key_id: None,
            scopes: raw
                .scope
                .as_deref()
                .map(ScopeSet::from_claim)
                .unwrap_or_default(),
            custom: raw.custom,
        })
    }
}

impl PartialEq for Claims {
    fn eq(&self, other: &Self) -> bool {
        self.jwt_id == other.jwt_id
            && self.subject == other.subject
            && self.issuer == other.issuer
            && self.audience == other.audience
            && self.issued_at == other.issued_at
            && self.expires_at == other.expires_at
            && self.scopes == other.scopes
            && self.custom == other.custom
    }
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(secs, 0)
        .ok_or_else(|| AuthError::InvalidToken("timestamp out of range".to_string()))
}

fn truncate(t: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp(t.timestamp(), 0).unwrap_or(t)
}

/// Builder for [`Claims`]. Consumed by [`ClaimsBuilder::build`].
#[derive(Debug, Default)]
#[must_use]
pub struct ClaimsBuilder {
    claims: Claims,
}

impl ClaimsBuilder {
    /// Set the `jti` claim.
    pub fn jwt_id(mut self, id: impl Into<String>) -> Self {
        self.claims.jwt_id = Some(id.into());
        self
    }

    /// Set the `sub` claim.
    pub fn subject(mut self, subject: impl Into<String>) -> Self {
        self.claims.subject = Some(subject.into());
        self
    }

    /// Set the `iss` claim.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.claims.issuer = Some(issuer.into());
        self
    }

    /// Append an audience.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.claims.audience.push(audience.into());
        self
    }

    /// Set the `iat` claim.
    pub fn issued_at(mut self, at: DateTime<Utc>) -> Self {
        self.claims.issued_at = Some(truncate(at));
        self
    }

    /// Set the `exp` claim.
    pub fn expires_at(mut self, at: DateTime<Utc>) -> Self {
        self.claims.expires_at = Some(truncate(at));
        self
    }

    /// Set the `exp` claim if `at` is present.
    pub fn expires_at_opt(self, at: Option<DateTime<Utc>>) -> Self {
        match at {
            Some(at) => self.expires_at(at),
            None => self,
        }
    }

    /// Replace the granted scopes.
    pub fn scopes(mut self, scopes: ScopeSet) -> Self {
        self.claims.scopes = scopes;
        self
    }

    /// Add a custom claim. Registered claim names are ignored here.
    pub fn claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if !RESERVED.contains(&name.as_str()) {
            self.claims.custom.insert(name, value.into());
        }
        self
    }

    /// Finish the claim set.
    #[must_use]
    pub fn build(self) -> Claims {
        self.claims
    }
}

const RESERVED: [&str; 7] = ["jti", "sub", "iss", "aud", "iat", "exp", SCOPE_CLAIM];

/// Wire form of a claim set.
#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct RawClaims {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sub: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iss: Option<String>,
    #[serde(default, skip_serializing_if = "Audience::is_none")]
    aud: Audience,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    exp: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    scope: Option<String>,
    #[serde(flatten)]
    custom: BTreeMap<String, Value>,
}

/// Audience claim that can be either a string or array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(untagged)]
enum Audience {
    Single(String),
    Multiple(Vec<String>),
    #[default]
    None,
}

impl Audience {
    const fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    fn from_list(list: &[String]) -> Self {
        match list {
            [] => Self::None,
            [single] => Self::Single(single.clone()),
            many => Self::Multiple(many.to_vec()),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            Self::Single(s) => vec![s],
            Self::Multiple(v) => v,
            Self::None => Vec::new(),
        }
    }
}
