//! HTTP request handlers.
//!
//! This module contains all the endpoint handlers for the gateway API.

pub mod access_keys;
pub mod health;
pub mod login;
pub mod sso;
