// ── Hub facade ──
//
// Wires the credential store, navigator, auth gate, and hub client
// together so callers get one handle with the whole session stack behind
// it. Sync loops and push channels are vended from here.

use std::sync::Arc;

use secrecy::SecretString;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use aquila_api::{
    Device, DeviceQuery, HubClient, PushChannel, PushHandle, ReconnectConfig, ServicePatch,
    ServiceState, TlsMode, TransportConfig,
};

use crate::channel::ServiceChannel;
use crate::config::{HubConfig, SyncConfig, TlsVerification};
use crate::credentials::{CredentialStore, CredentialView};
use crate::directory::DeviceDirectory;
use crate::error::CoreError;
use crate::gate::AuthGate;
use crate::navigation::Navigator;
use crate::session::SessionController;
use crate::sync::SyncLoop;

/// Sync loop bound to the live hub client.
pub type HubSyncLoop = SyncLoop<HubClient, HubClient>;

/// One configured hub with its session stack.
///
/// Cheap to clone; clones share the store, navigator and push lifetime.
#[derive(Clone)]
pub struct Hub {
    inner: Arc<HubInner>,
}

struct HubInner {
    config: HubConfig,
    store: CredentialStore,
    navigator: Navigator,
    client: Arc<HubClient>,
    session: SessionController<HubClient>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field("url", &self.inner.config.url.as_str())
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Build the session stack for `config`. No network traffic happens
    /// until an operation is called.
    pub fn new(config: HubConfig, store: CredentialStore) -> Result<Self, CoreError> {
        let navigator = Navigator::new(store.view());
        let gate = AuthGate::new(store.clone(), navigator.clone());

        let client = HubClient::new(config.url.clone(), &build_transport(&config))?
            .with_interceptor(Arc::new(gate));
        debug!(url = %client.base_url(), "hub client ready");

        let client = Arc::new(client);
        let session =
            SessionController::new(store.clone(), navigator.clone(), Arc::clone(&client));

        Ok(Self {
            inner: Arc::new(HubInner {
                config,
                store,
                navigator,
                client,
                session,
                cancel: CancellationToken::new(),
            }),
        })
    }

    // ── Accessors ────────────────────────────────────────────────────

    pub fn config(&self) -> &HubConfig {
        &self.inner.config
    }

    pub fn credentials(&self) -> CredentialView {
        self.inner.store.view()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.inner.navigator
    }

    pub fn session(&self) -> &SessionController<HubClient> {
        &self.inner.session
    }

    pub fn client(&self) -> &HubClient {
        &self.inner.client
    }

    // ── One-shot operations ──────────────────────────────────────────

    /// Devices of `class`, in hub order.
    pub async fn devices(&self, class: &str) -> Result<Vec<Device>, CoreError> {
        self.inner.client.all(&DeviceQuery::class(class)).await
    }

    /// Resolve a device by id among the devices of `class`.
    pub async fn device(&self, class: &str, id: &str) -> Result<Device, CoreError> {
        self.devices(class)
            .await?
            .into_iter()
            .find(|d| d.id == id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: id.to_owned(),
            })
    }

    pub async fn read_service(
        &self,
        device_id: &str,
        service: &str,
    ) -> Result<ServiceState, CoreError> {
        ServiceChannel::read(&*self.inner.client, device_id, service).await
    }

    pub async fn write_service(
        &self,
        device_id: &str,
        service: &str,
        patch: &ServicePatch,
    ) -> Result<ServiceState, CoreError> {
        ServiceChannel::write(&*self.inner.client, device_id, service, patch).await
    }

    // ── Long-lived bindings ──────────────────────────────────────────

    /// A new sync loop using the configured binding settings.
    pub fn sync_loop(&self) -> HubSyncLoop {
        self.sync_loop_with(self.inner.config.sync.clone())
    }

    /// A new sync loop with explicit binding settings.
    pub fn sync_loop_with(&self, config: SyncConfig) -> HubSyncLoop {
        let client = Arc::clone(&self.inner.client);
        SyncLoop::new(Arc::clone(&client), client, config)
    }

    /// Open a push channel if the hub config names an endpoint for it.
    ///
    /// The bearer token is re-read from the credential store on every
    /// connection attempt. The channel stays up until the handle is dropped or every clone of this
    /// hub is.
    pub fn open_push(&self, channel: PushChannel) -> Option<PushHandle> {
        let url = match channel {
            PushChannel::Device => self.inner.config.device_channel.clone(),
            PushChannel::Serial => self.inner.config.serial_channel.clone(),
        };
        let Some(url) = url else {
            debug!(channel = %channel, "no push endpoint configured");
            return None;
        };

        info!(channel = %channel, url = %url, "opening push channel");
        Some(PushHandle::connect(
            channel,
            url,
            ReconnectConfig::default(),
            self.inner.cancel.child_token(),
            push_token(self.inner.store.view()),
        ))
    }
}

fn push_token(view: CredentialView) -> impl Fn() -> Option<SecretString> + Send + Sync + 'static {
    move || view.get().token().cloned()
}

impl Drop for HubInner {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

fn build_transport(config: &HubConfig) -> TransportConfig {
    TransportConfig {
        tls: tls_to_transport(&config.tls),
        timeout: config.timeout,
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
