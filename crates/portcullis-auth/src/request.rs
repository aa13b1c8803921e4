//! HTTP credential carriers.
//!
//! [`AuthRequest`] is the view of an incoming request the validators work
//! on. [`ResponseCookies`] collects the cookies a validator wants to set on
//! the response.

use std::fmt;

use http::header::{AUTHORIZATION, COOKIE};
use http::{HeaderMap, Method};

/// A credential found in the `Authorization` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization<'a> {
    /// `Basic <base64(user:pass)>`.
    Basic(&'a str),
    /// `Bearer <jwt>`.
    Bearer(&'a str),
}

impl<'a> Authorization<'a> {
    /// Parse an `Authorization` header value. The scheme is case-insensitive.
    #[must_use]
    pub fn parse(value: &'a str) -> Option<Self> {
        let (scheme, credentials) = value.trim().split_once(' ')?;
        let credentials = credentials.trim();
        if credentials.is_empty() {
            return None;
        }
        if scheme.eq_ignore_ascii_case("basic") {
            Some(Self::Basic(credentials))
        } else if scheme.eq_ignore_ascii_case("bearer") {
            Some(Self::Bearer(credentials))
        } else {
            None
        }
    }
}

/// The parts of a request relevant to authentication.
#[derive(Debug, Clone)]
pub struct AuthRequest {
    method: Method,
    path: String,
    headers: HeaderMap,
    secure: bool,
}

impl AuthRequest {
    /// Create a request view over plain HTTP.
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            path: path.into(),
            headers,
            secure: false,
        }
    }

    /// Mark whether the request arrived over HTTPS.
    #[must_use]
    pub const fn with_secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    /// The request method.
    #[must_use]
    pub const fn method(&self) -> &Method {
        &self.method
    }

    /// The request path without query string.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The request headers.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Whether the request arrived over HTTPS.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// The recognized credential in the `Authorization` header, if any.
    #[must_use]
    pub fn authorization(&self) -> Option<Authorization<'_>> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(Authorization::parse)
    }

    /// The value of the first cookie called `name`. Empty values count as absent.
    #[must_use]
    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.headers
            .get_all(COOKIE)
            .iter()
            .filter_map(|v| v.to_str().ok())
            .flat_map(|v| v.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(n, _)| *n == name)
            .map(|(_, value)| value.trim_matches('"'))
            .filter(|value| !value.is_empty())
    }
}

/// A cookie to be set on the response.
///
/// `HttpOnly` is always set and the path is always `/`.
#[derive(Clone, PartialEq, Eq)]
pub struct SetCookie {
    name: String,
    value: String,
    max_age: i64,
    secure: bool,
}

impl SetCookie {
    /// Create a cookie. Negative max-ages are clamped to zero.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<String>, max_age: i64, secure: bool) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            max_age: max_age.max(0),
            secure,
        }
    }

    /// A cookie that deletes `name` on the client.
    #[must_use]
    pub fn removal(name: impl Into<String>, secure: bool) -> Self {
        Self::new(name, "", 0, secure)
    }

    /// The cookie name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The cookie value.
    #[must_use]
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Lifetime in seconds.
    #[must_use]
    pub const fn max_age(&self) -> i64 {
        self.max_age
    }

    /// Whether the `Secure` attribute is set.
    #[must_use]
    pub const fn is_secure(&self) -> bool {
        self.secure
    }

    /// Render as a `Set-Cookie` header value.
    #[must_use]
    pub fn to_header_value(&self) -> String {
        let mut header = format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly",
            self.name, self.value, self.max_age
        );
        if self.secure {
            header.push_str("; Secure");
        }
        header
    }
}

impl fmt::Debug for SetCookie {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Cookie values are tokens.
        f.debug_struct("SetCookie")
            .field("name", &self.name)
            .field("max_age", &self.max_age)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

/// Cookies collected while authenticating a request.
#[derive(Debug, Default)]
pub struct ResponseCookies {
    cookies: Vec<SetCookie>,
}

impl ResponseCookies {
    /// Create an empty collection.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cookies: Vec::new(),
        }
    }

    /// Queue a cookie. A later cookie with the same name replaces an earlier one.
    pub fn set(&mut self, cookie: SetCookie) {
        self.cookies.retain(|c| c.name != cookie.name);
        self.cookies.push(cookie);
    }

    /// Find a queued cookie by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&SetCookie> {
        self.cookies.iter().find(|c| c.name == name)
    }

    /// Whether no cookie is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty()
    }

    /// Iterate over queued cookies in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &SetCookie> {
        self.cookies.iter()
    }
}

impl IntoIterator for ResponseCookies {
    type Item = SetCookie;
    type IntoIter = std::vec::IntoIter<SetCookie>;

    fn into_iter(self) -> Self::IntoIter {
        self.cookies.into_iter()
    }
}
