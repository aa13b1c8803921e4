//! Start-up wiring of the authentication engine.
//!
//! The trusted key set and validator chain are built once from the
//! [`AuthConfig`] and never change while the process runs.

use std::path::Path;
use std::sync::Arc;

use jsonwebtoken::Algorithm;

use portcullis_auth::{
    load_or_generate_key, AccessKeyCodec, AccessKeyRegistry, AccessTokenValidator, AuthConfig,
    BasicAuthValidator, BearerTokenValidator, JwkSet, JwksDecoder, KeySource, MasterSecret,
    OidcClient, OidcCookieValidator, OidcProvider, RefreshTokenStore, RsaJwtService,
    ScopeAuthorizer, StandaloneCookieValidator, TrustedKeyRegistry, ValidatorChain, API_KEY_ID,
    STANDALONE_KEY_ID,
};
use portcullis_control::{
    ControlError, EncryptedRefreshTokenStore, StoreAccessKeyRegistry, StoreUserDirectory,
};
use portcullis_core::{ScopeSet, UserName};
use portcullis_store::Store;

use crate::config::BootstrapAdmin;
use crate::state::AuthComponents;

/// File name of the access-key signing key in the data directory.
pub const ACCESS_KEY_PEM: &str = "api-key.pem";
/// File name of the standalone login signing key in the data directory.
pub const STANDALONE_KEY_PEM: &str = "standalone-login.pem";

/// Scopes granted to the bootstrap administrator.
const ADMIN_SCOPES: &str = "adm";

/// The locally held signing keys.
#[derive(Debug, Clone)]
pub struct SigningKeys {
    /// Signs API access keys.
    pub access_keys: Arc<RsaJwtService>,
    /// Signs standalone login cookies.
    pub standalone_login: Arc<RsaJwtService>,
}

impl SigningKeys {
    /// Load both keys from `data_dir`, generating missing ones.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if a key file cannot be read or written.
    pub fn load(data_dir: &Path) -> portcullis_auth::Result<Self> {
        let access = load_or_generate_key(&data_dir.join(ACCESS_KEY_PEM))?;
        let login = load_or_generate_key(&data_dir.join(STANDALONE_KEY_PEM))?;
        Ok(Self {
            access_keys: Arc::new(RsaJwtService::new(API_KEY_ID, &access)?),
            standalone_login: Arc::new(RsaJwtService::new(STANDALONE_KEY_ID, &login)?),
        })
    }

    /// The codec minting access keys.
    ///
    /// # Errors
    ///
    /// Returns `SigningConfiguration` if the access-key signer has the wrong key id.
    pub fn access_key_codec(&self) -> portcullis_auth::Result<AccessKeyCodec> {
        AccessKeyCodec::new(Arc::clone(&self.access_keys))
    }
}

/// How interactive users log in.
pub enum LoginMode {
    /// Username and password against the local user store.
    Standalone,
    /// Cookies issued by an OpenID Connect provider.
    Oidc(OidcLogin),
}

/// Collaborators of the OIDC cookie validator.
pub struct OidcLogin {
    /// Token refresh against the provider.
    pub provider: Arc<dyn OidcProvider>,
    /// The provider's published keys.
    pub key_set: JwkSet,
    /// Refresh tokens by subject.
    pub refresh_tokens: Arc<dyn RefreshTokenStore>,
}

/// Resolve the login mode, fetching the provider's keys when OIDC is configured.
///
/// # Errors
///
/// Returns `IdentityProvider` if the provider's JWKS cannot be loaded.
pub async fn login_mode<S: Store + 'static>(
    config: &AuthConfig,
    store: Arc<S>,
    secret: Arc<MasterSecret>,
) -> portcullis_auth::Result<LoginMode> {
    let Some(oidc) = &config.oidc else {
        return Ok(LoginMode::Standalone);
    };

    let client = OidcClient::new(Arc::clone(oidc))?;
    let key_set = client.fetch_jwks().await?;
    Ok(LoginMode::Oidc(OidcLogin {
        provider: Arc::new(client),
        key_set,
        refresh_tokens: Arc::new(EncryptedRefreshTokenStore::new(store, secret)),
    }))
}

/// Build the trusted key set and the validator chain.
///
/// The chain runs Bearer first, then the login cookie of `mode`, then Basic.
///
/// # Errors
///
/// Returns `SigningConfiguration` if a trusted key is unusable.
pub fn assemble<S: Store + 'static>(
    config: Arc<AuthConfig>,
    store: Arc<S>,
    keys: &SigningKeys,
    mode: LoginMode,
) -> portcullis_auth::Result<AuthComponents> {
    let users = Arc::new(StoreUserDirectory::new(Arc::clone(&store)));
    let access_keys: Arc<dyn AccessKeyRegistry> = Arc::new(StoreAccessKeyRegistry::new(store));

    let mut trusted = TrustedKeyRegistry::builder(Algorithm::RS256);
    if config.api_access_keys_enabled {
        trusted = trusted.add_key(KeySource::AccessKeys, keys.access_keys.jwk().clone());
    }

    let (cookie_validator, standalone) = match mode {
        LoginMode::Oidc(oidc) => {
            trusted = trusted.add_key_set(KeySource::Oidc, &oidc.key_set);
            let validator = OidcCookieValidator::new(
                JwksDecoder::new(Algorithm::RS256, &oidc.key_set)?,
                oidc.provider,
                oidc.refresh_tokens,
                config.access_cookie_name.as_str(),
                config.id_cookie_name.as_str(),
            );
            (Arc::new(validator) as Arc<dyn AccessTokenValidator>, None)
        }
        LoginMode::Standalone => {
            trusted = trusted.add_key(
                KeySource::StandaloneLogin,
                keys.standalone_login.jwk().clone(),
            );
            let validator = Arc::new(StandaloneCookieValidator::new(
                Arc::clone(&keys.standalone_login),
                users.clone(),
                config.access_cookie_name.as_str(),
                config.standalone,
            ));
            (validator.clone() as Arc<dyn AccessTokenValidator>, Some(validator))
        }
    };

    let trusted_keys = Arc::new(trusted.build()?);
    let chain = ValidatorChain::new()
        .with(Arc::new(BearerTokenValidator::new(
            Arc::clone(&trusted_keys),
            access_keys,
        )))
        .with(cookie_validator)
        .with(Arc::new(BasicAuthValidator::new(
            config.basic_auth_enabled,
            users.clone(),
            users.clone(),
        )));

    tracing::info!(
        validators = ?chain.names(),
        oidc = config.oidc_enabled(),
        "Validator chain assembled"
    );

    Ok(AuthComponents {
        config,
        chain,
        authorizer: ScopeAuthorizer::new(),
        trusted_keys,
        standalone,
        identities: users.clone(),
        users,
    })
}

/// Create the bootstrap administrator unless a user of that name exists.
///
/// # Errors
///
/// Returns an error if the user name is invalid or the user cannot be stored.
pub fn ensure_admin<S: Store>(
    users: &StoreUserDirectory<S>,
    store: &S,
    admin: &BootstrapAdmin,
) -> Result<(), ControlError> {
    let user_name = UserName::new(admin.user_name.as_str())
        .map_err(|e| ControlError::InvalidRequest(e.to_string()))?;
    if store.get_user(&user_name)?.is_some() {
        tracing::debug!(user = %user_name, "Bootstrap administrator exists");
        return Ok(());
    }
    users.put_user(
        user_name,
        Some(&admin.password),
        ScopeSet::from_claim(ADMIN_SCOPES),
    )?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use portcullis_auth::testing;
    use portcullis_store::RocksStore;
    use secrecy::SecretString;
    use tempfile::TempDir;

    fn keys() -> SigningKeys {
        SigningKeys {
            access_keys: Arc::new(RsaJwtService::new(API_KEY_ID, testing::rsa_key(0)).unwrap()),
            standalone_login: Arc::new(
                RsaJwtService::new(STANDALONE_KEY_ID, testing::rsa_key(1)).unwrap(),
            ),
        }
    }

    fn store() -> (Arc<RocksStore>, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        (store, dir)
    }

    #[test]
    fn standalone_chain_trusts_both_local_keys() {
        let (store, _dir) = store();
        let auth = assemble(
            Arc::new(AuthConfig::default()),
            store,
            &keys(),
            LoginMode::Standalone,
        )
        .unwrap();

        assert_eq!(auth.chain.names(), ["bearer", "standalone-cookie", "basic"]);
        assert_eq!(auth.trusted_keys.key_ids(), [API_KEY_ID, STANDALONE_KEY_ID]);
        assert!(auth.standalone.is_some());
    }

    #[test]
    fn disabled_access_keys_are_not_trusted() {
        let (store, _dir) = store();
        let config = AuthConfig {
            api_access_keys_enabled: false,
            ..AuthConfig::default()
        };
        let auth = assemble(Arc::new(config), store, &keys(), LoginMode::Standalone).unwrap();
        assert_eq!(auth.trusted_keys.key_ids(), [STANDALONE_KEY_ID]);
    }

    #[test]
    fn generated_keys_are_reloaded() {
        let dir = TempDir::new().unwrap();
        let first = SigningKeys::load(dir.path()).unwrap();
        let second = SigningKeys::load(dir.path()).unwrap();

        assert!(dir.path().join(ACCESS_KEY_PEM).exists());
        assert_eq!(first.access_keys.jwk(), second.access_keys.jwk());
        assert_ne!(first.access_keys.jwk(), first.standalone_login.jwk());
        assert!(first.access_key_codec().is_ok());
    }

    #[test]
    fn admin_is_created_once() {
        let (store, _dir) = store();
        let users = StoreUserDirectory::new(Arc::clone(&store));
        let admin = BootstrapAdmin {
            user_name: "admin".to_string(),
            password: SecretString::new("changeit".to_string()),
        };

        ensure_admin(&users, &store, &admin).unwrap();
        let created = store.get_user(&"admin".parse().unwrap()).unwrap().unwrap();
        assert!(created.scopes.contains("adm"));

        let changed = BootstrapAdmin {
            password: SecretString::new("other".to_string()),
            ..admin
        };
        ensure_admin(&users, &store, &changed).unwrap();
        let kept = store.get_user(&"admin".parse().unwrap()).unwrap().unwrap();
        assert_eq!(kept.password_hash, created.password_hash);
    }
}
