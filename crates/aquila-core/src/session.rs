// ── Session controller ──
//
// Login, logout, and the hub maintenance triggers the main view exposes.

use std::future::Future;
use std::sync::Arc;

use secrecy::{ExposeSecret, SecretString};
use tracing::{info, warn};

use aquila_api::HubClient;

use crate::credentials::{CredentialStore, Credentials};
use crate::error::CoreError;
use crate::navigation::{NavState, Navigator, Route};

/// Exchanges a user name and password for a bearer token.
pub trait Authenticator: Send + Sync + 'static {
    fn authenticate(
        &self,
        user: &str,
        password: &SecretString,
    ) -> impl Future<Output = Result<SecretString, CoreError>> + Send;
}

/// Hub-side configuration triggers.
pub trait HubMaintenance: Send + Sync + 'static {
    /// Ask the hub to reload its configuration.
    fn reload(&self) -> impl Future<Output = Result<(), CoreError>> + Send;

    /// Ask the hub to rescan for devices.
    fn discover(&self) -> impl Future<Output = Result<(), CoreError>> + Send;
}

impl Authenticator for HubClient {
    async fn authenticate(
        &self,
        user: &str,
        password: &SecretString,
    ) -> Result<SecretString, CoreError> {
        Ok(self.request_token(user, password).await?)
    }
}

impl HubMaintenance for HubClient {
    async fn reload(&self) -> Result<(), CoreError> {
        Ok(HubClient::reload(self).await?)
    }

    async fn discover(&self) -> Result<(), CoreError> {
        Ok(HubClient::discover(self).await?)
    }
}

/// Owns the user-facing session lifecycle.
#[derive(Debug)]
pub struct SessionController<H> {
    store: CredentialStore,
    navigator: Navigator,
    hub: Arc<H>,
}

impl<H> Clone for SessionController<H> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            navigator: self.navigator.clone(),
            hub: Arc::clone(&self.hub),
        }
    }
}

impl<H: Authenticator + HubMaintenance> SessionController<H> {
    pub fn new(store: CredentialStore, navigator: Navigator, hub: Arc<H>) -> Self {
        Self {
            store,
            navigator,
            hub,
        }
    }

    /// Authenticate against the hub, store the session, and enter the
    /// home view. On failure the stored session is left untouched.
    pub async fn login(&self, user: &str, password: &SecretString) -> Result<NavState, CoreError> {
        if user.trim().is_empty() {
            return Err(CoreError::ValidationFailed {
                message: "user name must not be empty".into(),
            });
        }
        let token = self.hub.authenticate(user, password).await?;
        self.adopt(Credentials::new(token.expose_secret(), user))
    }

    /// Store externally obtained credentials and enter the home view.
    pub fn adopt(&self, credentials: Credentials) -> Result<NavState, CoreError> {
        let user = credentials.user_name().unwrap_or_default().to_owned();
        self.store.set(credentials)?;
        info!(user = %user, "session started");
        Ok(self.navigator.navigate_to(Route::Home))
    }

    /// Drop the session and return to the login view. Never fails: a
    /// persistence error is logged and the in-memory session is still
    /// cleared.
    pub fn logout(&self) -> NavState {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "failed to clear persisted session");
        }
        info!("session ended");
        self.navigator.navigate_to(Route::Login)
    }

    pub async fn reload(&self) -> Result<(), CoreError> {
        self.hub.reload().await
    }

    pub async fn discover(&self) -> Result<(), CoreError> {
        self.hub.discover().await
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.store
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }
}
