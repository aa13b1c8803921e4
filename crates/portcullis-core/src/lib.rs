//! Core value types for portcullis.
//!
//! This crate provides the foundational types shared by every other portcullis crate:
//!
//! - **Identifiers**: validated user names, access-key ids and access-key names
//! - **Scopes**: the ordered set of permission strings granted to a caller
//!
//! # Example
//!
//! ```
//! use portcullis_core::{AccessKeyId, ScopeSet, UserName};
//!
//! let user: UserName = "jane.doe".parse().unwrap();
//! let key_id = AccessKeyId::generate();
//! let scopes = ScopeSet::from_claim("adm adm.read");
//!
//! assert!(scopes.contains("adm.read"));
//! assert_ne!(key_id, AccessKeyId::generate());
//! assert_eq!(user.as_str(), "jane.doe");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod ids;
pub mod scopes;

pub use ids::{AccessKeyId, AccessKeyName, IdError, UserName};
pub use scopes::ScopeSet;
