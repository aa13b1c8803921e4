//! Access-key management endpoints.
//!
//! Reads need one of `adm`, `adm.accesskey`, `adm.read` or
//! `adm.accesskey.read`; everything else needs `adm` or `adm.accesskey`.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use portcullis_control::{AccessKeyControl, AccessKeyId, CreateAccessKeyRequest};

use crate::auth::{access_key_read, access_key_write, Caller};
use crate::error::ApiError;
use crate::state::GatewayState;

// =============================================================================
// Request Types
// =============================================================================

/// Query parameters for listing access keys.
#[derive(Debug, Default, Deserialize)]
pub struct ListQuery {
    /// Substring the key name must contain.
    #[serde(default)]
    pub filter: Option<String>,
}

fn parse_key_id(raw: &str) -> Result<AccessKeyId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid access key id: {raw}")))
}

// =============================================================================
// Handlers
// =============================================================================

/// List access keys, optionally filtered by name.
///
/// # Errors
///
/// Returns an error if the caller may not read access keys or the store fails.
pub async fn list_access_keys<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_read())?;
    let keys = state
        .access_keys
        .list_access_keys(query.filter.as_deref().unwrap_or_default())
        .await?;
    Ok(Json(keys))
}

/// Create an access key. The signed token is only returned here.
///
/// # Errors
///
/// Returns an error if the name is taken, a temporary key has no expiry,
/// or the caller may not manage access keys.
pub async fn create_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Json(body): Json<CreateAccessKeyRequest>,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_write())?;
    let issued = state.access_keys.create_access_key(body).await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

/// Get the settings of an access key.
///
/// # Errors
///
/// Returns an error if the key does not exist or the caller may not read it.
pub async fn get_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Path(key_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_read())?;
    let key_id = parse_key_id(&key_id)?;
    Ok(Json(state.access_keys.get_access_key(&key_id).await?))
}

/// Replace the description of an access key with the plain-text body.
///
/// An empty body removes the description.
///
/// # Errors
///
/// Returns an error if the key does not exist or the caller may not manage it.
pub async fn update_description<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Path(key_id): Path<String>,
    description: String,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_write())?;
    let key_id = parse_key_id(&key_id)?;
    let description = Some(description.trim().to_string()).filter(|d| !d.is_empty());
    let key = state
        .access_keys
        .update_description(&key_id, description)
        .await?;
    Ok(Json(key))
}

/// Remove an access key, revoking every token carrying its id.
///
/// # Errors
///
/// Returns an error if the caller may not manage access keys.
pub async fn remove_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Path(key_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_write())?;
    let key_id = parse_key_id(&key_id)?;
    state.access_keys.remove_access_key(&key_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Replace an access key by a new one with the same settings.
///
/// # Errors
///
/// Returns an error if the key does not exist or the caller may not manage it.
pub async fn renew_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    Path(key_id): Path<String>,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_write())?;
    let key_id = parse_key_id(&key_id)?;
    Ok(Json(state.access_keys.renew_access_key(&key_id).await?))
}

/// Inspect an access-key token sent as plain-text body.
///
/// # Errors
///
/// Returns 422 if the body is not an access key signed by this service.
pub async fn validate_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    token: String,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_read())?;
    Ok(Json(state.access_keys.validate_access_key(token.trim()).await?))
}

/// Re-register the access key carried by the plain-text body.
///
/// # Errors
///
/// Returns 422 if the body is not an access key signed by this service and
/// 409 if another key uses its name.
pub async fn restore_access_key<C>(
    State(state): State<Arc<GatewayState<C>>>,
    caller: Caller,
    token: String,
) -> Result<impl IntoResponse, ApiError>
where
    C: AccessKeyControl + 'static,
{
    caller.require(&state.auth.authorizer, &access_key_write())?;
    let key = state.access_keys.restore_access_key(token.trim()).await?;
    Ok((StatusCode::CREATED, Json(key)))
}
