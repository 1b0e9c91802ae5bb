// ── Runtime hub configuration ──
//
// These types describe *how* to talk to a hub and which device to bind.
// They never touch disk: the CLI (via aquila-config) builds a `HubConfig`
// and hands it in.

use std::time::Duration;

use url::Url;

/// Device class bound by default: the MakerLab remote light switch.
pub const DEFAULT_DEVICE_CLASS: &str = "mx.makerlab.ledservice";

/// Service read and toggled on the bound device.
pub const DEFAULT_SERVICE: &str = "led";

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification (self-signed hubs on a LAN).
    DangerAcceptInvalid,
}

/// How concurrent responses within one sync binding are merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum::Display, strum::EnumString)]
#[strum(serialize_all = "kebab-case")]
pub enum MergePolicy {
    /// Every response is applied when it arrives; the last to complete wins,
    /// even if it was issued earlier than a response already applied.
    #[default]
    CompletionOrder,
    /// A response is dropped if a response issued after it was already
    /// applied.
    IssuanceOrder,
}

/// Settings for a single sync binding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Device class to discover.
    pub device_class: String,
    /// Service to read and write on the bound device.
    pub service: String,
    /// Refresh period once bound.
    pub poll_interval: Duration,
    /// Merge rule for overlapping reads and writes.
    pub merge_policy: MergePolicy,
    /// Trigger an immediate refresh on every push notification.
    pub push_refresh: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            device_class: DEFAULT_DEVICE_CLASS.into(),
            service: DEFAULT_SERVICE.into(),
            poll_interval: Duration::from_secs(1),
            merge_policy: MergePolicy::default(),
            push_refresh: false,
        }
    }
}

/// Configuration for connecting to a single hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Hub API root (e.g., `https://hub.local/api/`).
    pub url: Url,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Request timeout.
    pub timeout: Duration,
    /// Binding settings for the sync loop.
    pub sync: SyncConfig,
    /// Device push channel endpoint, if the hub exposes one.
    pub device_channel: Option<Url>,
    /// Serial push channel endpoint, if the hub exposes one.
    pub serial_channel: Option<Url>,
}

impl HubConfig {
    /// Config for `url` with every other setting at its default.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(30),
            sync: SyncConfig::default(),
            device_channel: None,
            serial_channel: None,
        }
    }
}
