//! Session and device-state layer between `aquila-api` and front ends.
//!
//! - **[`CredentialStore`]**: the persisted `{token, user}` session, with a
//!   read-only [`CredentialView`] for everything that only needs to look.
//! - **[`AuthGate`]**: bearer decoration for outbound hub calls, logout on
//!   rejection, and the route [`guard`].
//! - **[`Navigator`]**: guarded, atomic route commits observable via `watch`.
//! - **[`SyncLoop`]**: binds the first device of a class and keeps one of
//!   its services fresh, with toggling and a configurable [`MergePolicy`].
//! - **[`SessionController`]**: login, logout, and hub maintenance triggers.
//! - **[`Hub`]**: facade wiring all of the above to a live [`HubClient`].
//!
//! [`HubClient`]: aquila_api::HubClient

pub mod channel;
pub mod config;
pub mod credentials;
pub mod directory;
pub mod error;
pub mod gate;
pub mod hub;
pub mod navigation;
pub mod session;
pub mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use channel::ServiceChannel;
pub use config::{
    DEFAULT_DEVICE_CLASS, DEFAULT_SERVICE, HubConfig, MergePolicy, SyncConfig, TlsVerification,
};
pub use credentials::{
    CredentialBackend, CredentialStore, CredentialView, Credentials, FileBackend, MemoryBackend,
};
pub use directory::DeviceDirectory;
pub use error::CoreError;
pub use gate::{AuthGate, GuardDecision, GuardOutcome, SessionStatus, display_name, guard};
pub use hub::{Hub, HubSyncLoop};
pub use navigation::{NavState, Navigator, Route};
pub use session::{Authenticator, HubMaintenance, SessionController};
pub use sync::{SyncLoop, SyncPhase, SyncSnapshot};

// Wire types callers need alongside the core API.
pub use aquila_api::{Device, PushChannel, PushNotification, ServicePatch, ServiceState};
