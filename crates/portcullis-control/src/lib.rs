//! Access-key management for portcullis.
//!
//! This crate provides the business logic behind the access-key routes and
//! the store-backed collaborators the credential validators consult.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Gateway (HTTP)                          │
//! └─────────────────────────────────────────────────────────────┘
//!                │                               │
//!                ▼                               ▼
//! ┌──────────────────────────────┐ ┌──────────────────────────────┐
//! │       AccessKeyService       │ │          Adapters            │
//! │  create / list / get         │ │  StoreAccessKeyRegistry      │
//! │  describe / remove / renew   │ │  EncryptedRefreshTokenStore  │
//! │  validate / restore          │ │  StoreUserDirectory          │
//! └──────────────────────────────┘ └──────────────────────────────┘
//!                │                               │
//!               ┌┴───────────────┬───────────────┘
//!               ▼                ▼
//!        ┌──────────┐     ┌──────────┐
//!        │  Store   │     │  Auth    │
//!        │ (RocksDB)│     │  (JWT)   │
//!        └──────────┘     └──────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use portcullis_auth::{AccessKeyCodec, RsaJwtService};
//! use portcullis_control::{AccessKeyControl, AccessKeyService, CreateAccessKeyRequest};
//! use portcullis_core::{AccessKeyName, ScopeSet};
//! use portcullis_store::RocksStore;
//!
//! # async fn example(signer: RsaJwtService) -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/portcullis")?);
//! let codec = AccessKeyCodec::new(Arc::new(signer))?;
//! let service = AccessKeyService::new(store, Arc::new(codec));
//!
//! let request = CreateAccessKeyRequest::new(AccessKeyName::new("ci-pipeline")?)
//!     .with_scopes(ScopeSet::from_claim("ipam"));
//! let issued = service.create_access_key(request).await?;
//! println!("Created access key {}", issued.key.key_id);
//! # Ok(())
//! # }
//! ```
//!
//! # Revocation
//!
//! A key is revoked by deleting its id. Renewal replaces the old id by a new
//! one in a single write batch, so no reader sees both ids registered or
//! neither.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod adapters;
pub mod error;
pub mod password;
pub mod service;
pub mod types;

pub use adapters::{EncryptedRefreshTokenStore, StoreAccessKeyRegistry, StoreUserDirectory};
pub use error::{ControlError, Result};
pub use service::{AccessKeyControl, AccessKeyService};
pub use types::{AccessKeyStatus, CreateAccessKeyRequest, IssuedAccessKey};

// Re-export commonly used types from dependencies for convenience
pub use portcullis_core::{AccessKeyId, AccessKeyName};
pub use portcullis_store::AccessKeyRecord;
