//! Request validators, one per credential form.

pub mod basic;
pub mod bearer;
pub mod oidc;
pub mod standalone;

pub use basic::BasicAuthValidator;
pub use bearer::BearerTokenValidator;
pub use oidc::OidcCookieValidator;
pub use standalone::StandaloneCookieValidator;
