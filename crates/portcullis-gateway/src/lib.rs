//! HTTP gateway for portcullis.
//!
//! This crate exposes the authentication engine over HTTP. It handles:
//!
//! - Authentication of every API request through the validator chain
//! - Per-route scope authorization
//! - Access-key management endpoints
//! - Standalone login and logout, published login and SSO settings
//! - The aggregated JWKS document for peer services
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Clients and peer services                   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    portcullis-gateway                       │
//! │  ┌──────────────┐ ┌─────────────┐ ┌─────────────────────┐   │
//! │  │ authenticate │ │   Router    │ │  Caller extractor   │   │
//! │  │  middleware  │ │ + Handlers  │ │  + AccessRule       │   │
//! │  └──────────────┘ └─────────────┘ └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌──────────┐
//!        │ Access   │   │ Validator│   │ RocksDB  │
//!        │ keys     │   │ chain    │   │ store    │
//!        └──────────┘   └──────────┘   └──────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use portcullis_auth::AuthConfig;
//! use portcullis_control::AccessKeyService;
//! use portcullis_gateway::bootstrap::{self, LoginMode, SigningKeys};
//! use portcullis_gateway::{create_router, GatewayConfig, GatewayState};
//! use portcullis_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = GatewayConfig::default();
//! let store = Arc::new(RocksStore::open("/tmp/portcullis/db")?);
//! let keys = SigningKeys::load(&config.data_dir)?;
//!
//! let auth = bootstrap::assemble(
//!     Arc::new(AuthConfig::default()),
//!     Arc::clone(&store),
//!     &keys,
//!     LoginMode::Standalone,
//! )?;
//! let access_keys = Arc::new(AccessKeyService::new(store, Arc::new(keys.access_key_codec()?)));
//!
//! let app = create_router(GatewayState::new(access_keys, Arc::new(auth), config));
//!
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod auth;
pub mod bootstrap;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use auth::Caller;
pub use config::GatewayConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::{AuthComponents, GatewayState};
