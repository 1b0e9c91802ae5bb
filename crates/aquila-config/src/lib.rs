//! Shared configuration for Aquila hub tools.
//!
//! TOML profiles layered with `AQUILA_` environment overrides, and
//! translation to `aquila_core::HubConfig`. The CLI adds flag-aware
//! wrappers on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use aquila_core::{
    DEFAULT_DEVICE_CLASS, DEFAULT_SERVICE, HubConfig, MergePolicy, SyncConfig,
    TlsVerification,
};

/// Environment prefix for config overrides. Nested keys use `__`
/// (`AQUILA_DEFAULTS__TIMEOUT=10`).
pub const ENV_PREFIX: &str = "AQUILA_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found")]
    UnknownProfile { name: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named hub profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

impl Config {
    /// Look up a profile, falling back to `default_profile` when `name`
    /// is `None`.
    pub fn profile(&self, name: Option<&str>) -> Result<(String, &Profile), ConfigError> {
        let name = name
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into());
        self.profiles
            .get(&name)
            .map(|p| (name.clone(), p))
            .ok_or(ConfigError::UnknownProfile { name })
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            insecure: false,
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}

/// A named hub profile.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hub API root (e.g., "http://aquila.local:8080/api/").
    pub hub: String,

    /// Device class the sync loop binds to.
    pub device_class: Option<String>,

    /// Service read and toggled on the bound device.
    pub service: Option<String>,

    /// Refresh period in milliseconds.
    pub poll_interval_ms: Option<u64>,

    /// "completion-order" or "issuance-order".
    pub merge_policy: Option<String>,

    /// Refresh on every push notification from the device channel.
    pub push_refresh: Option<bool>,

    /// WebSocket URL of the device push channel.
    pub device_channel: Option<String>,

    /// WebSocket URL of the serial push channel.
    pub serial_channel: Option<String>,

    /// Where this profile's session is persisted.
    pub session_file: Option<PathBuf>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Override insecure TLS setting.
    pub insecure: Option<bool>,

    /// Override timeout (seconds).
    pub timeout: Option<u64>,
}

impl Profile {
    /// A profile pointing at `hub` with everything else defaulted.
    pub fn for_hub(hub: impl Into<String>) -> Self {
        Self {
            hub: hub.into(),
            ..Self::default()
        }
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("mx", "makerlab", "aquila")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("aquila");
    p
}

/// Session file for a profile: the profile's `session_file`, or a
/// per-profile file under the platform data directory.
pub fn session_path(profile_name: &str, profile: Option<&Profile>) -> PathBuf {
    if let Some(path) = profile.and_then(|p| p.session_file.clone()) {
        return path;
    }
    let file = format!("{profile_name}.json");
    project_dirs().map_or_else(
        || dirs_fallback().join("sessions").join(&file),
        |dirs| dirs.data_dir().join("sessions").join(&file),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from `path` + environment. A missing file is not
/// an error.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Translation ─────────────────────────────────────────────────────

fn parse_url(field: &str, raw: &str) -> Result<Url, ConfigError> {
    raw.parse().map_err(|e| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{raw}': {e}"),
    })
}

fn parse_optional_url(field: &str, raw: Option<&String>) -> Result<Option<Url>, ConfigError> {
    raw.map(|r| parse_url(field, r)).transpose()
}

/// Build the sync binding settings for a profile.
pub fn profile_to_sync_config(profile: &Profile) -> Result<SyncConfig, ConfigError> {
    let poll_interval = match profile.poll_interval_ms {
        Some(0) => {
            return Err(ConfigError::Validation {
                field: "poll_interval_ms".into(),
                reason: "must be greater than zero".into(),
            });
        }
        Some(ms) => Duration::from_millis(ms),
        None => SyncConfig::default().poll_interval,
    };

    let merge_policy = match profile.merge_policy.as_deref() {
        Some(raw) => raw
            .parse::<MergePolicy>()
            .map_err(|_| ConfigError::Validation {
                field: "merge_policy".into(),
                reason: format!("expected 'completion-order' or 'issuance-order', got '{raw}'"),
            })?,
        None => MergePolicy::default(),
    };

    Ok(SyncConfig {
        device_class: profile
            .device_class
            .clone()
            .unwrap_or_else(|| DEFAULT_DEVICE_CLASS.into()),
        service: profile
            .service
            .clone()
            .unwrap_or_else(|| DEFAULT_SERVICE.into()),
        poll_interval,
        merge_policy,
        push_refresh: profile.push_refresh.unwrap_or(false),
    })
}

/// Build a `HubConfig` from a profile and the global defaults. No CLI
/// flag overrides.
pub fn profile_to_hub_config(profile: &Profile, defaults: &Defaults) -> Result<HubConfig, ConfigError> {
    let url = parse_url("hub", &profile.hub)?;

    let tls = if profile.insecure.unwrap_or(defaults.insecure) {
        TlsVerification::DangerAcceptInvalid
    } else if let Some(ref ca_path) = profile.ca_cert {
        TlsVerification::CustomCa(ca_path.clone())
    } else {
        TlsVerification::SystemDefaults
    };

    let mut config = HubConfig::new(url);
    config.tls = tls;
    config.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    config.sync = profile_to_sync_config(profile)?;
    config.device_channel = parse_optional_url("device_channel", profile.device_channel.as_ref())?;
    config.serial_channel = parse_optional_url("serial_channel", profile.serial_channel.as_ref())?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "lab"

[defaults]
timeout = 12

[profiles.lab]
hub = "http://aquila.local:8080/api/"
service = "relay"
poll_interval_ms = 250
merge_policy = "issuance-order"
push_refresh = true
device_channel = "ws://aquila.local:8080/devices"

[profiles.home]
hub = "https://hub.home/api"
insecure = true
"#;

    fn write_sample(dir: &tempfile::TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();
        path
    }

    #[test]
    fn loads_profiles_from_toml() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&write_sample(&dir)).unwrap();

        assert_eq!(cfg.default_profile.as_deref(), Some("lab"));
        assert_eq!(cfg.defaults.timeout, 12);
        assert_eq!(cfg.defaults.output, "table");
        assert_eq!(cfg.profiles.len(), 2);

        let (name, lab) = cfg.profile(None).unwrap();
        assert_eq!(name, "lab");
        assert_eq!(lab.service.as_deref(), Some("relay"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.default_profile.as_deref(), Some("default"));
        assert!(cfg.profiles.is_empty());
    }

    #[test]
    fn unknown_profile_is_reported() {
        let cfg = Config::default();
        assert!(matches!(
            cfg.profile(Some("nope")),
            Err(ConfigError::UnknownProfile { .. })
        ));
    }

    #[test]
    fn profile_translates_to_hub_config() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&write_sample(&dir)).unwrap();
        let (_, lab) = cfg.profile(Some("lab")).unwrap();

        let hub = profile_to_hub_config(lab, &cfg.defaults).unwrap();
        assert_eq!(hub.url.as_str(), "http://aquila.local:8080/api/");
        assert_eq!(hub.timeout, Duration::from_secs(12));
        assert_eq!(hub.tls, TlsVerification::SystemDefaults);
        assert_eq!(hub.sync.service, "relay");
        assert_eq!(hub.sync.device_class, DEFAULT_DEVICE_CLASS);
        assert_eq!(hub.sync.poll_interval, Duration::from_millis(250));
        assert_eq!(hub.sync.merge_policy, MergePolicy::IssuanceOrder);
        assert!(hub.sync.push_refresh);
        assert!(hub.device_channel.is_some());
        assert!(hub.serial_channel.is_none());

        let (_, home) = cfg.profile(Some("home")).unwrap();
        let hub = profile_to_hub_config(home, &cfg.defaults).unwrap();
        assert_eq!(hub.tls, TlsVerification::DangerAcceptInvalid);
        assert_eq!(hub.sync.merge_policy, MergePolicy::CompletionOrder);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let defaults = Defaults::default();

        let bad_url = Profile::for_hub("not a url");
        assert!(matches!(
            profile_to_hub_config(&bad_url, &defaults),
            Err(ConfigError::Validation { ref field, .. }) if field == "hub"
        ));

        let bad_policy = Profile {
            merge_policy: Some("random".into()),
            ..Profile::for_hub("http://hub/api/")
        };
        assert!(profile_to_hub_config(&bad_policy, &defaults).is_err());

        let zero_interval = Profile {
            poll_interval_ms: Some(0),
            ..Profile::for_hub("http://hub/api/")
        };
        assert!(profile_to_hub_config(&zero_interval, &defaults).is_err());
    }

    #[test]
    fn save_then_load_keeps_profiles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = Config::default();
        cfg.profiles
            .insert("default".into(), Profile::for_hub("http://hub/api/"));
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.profiles, cfg.profiles);
    }

    #[test]
    fn session_path_prefers_profile_override() {
        let profile = Profile {
            session_file: Some(PathBuf::from("/tmp/aquila-session.json")),
            ..Profile::for_hub("http://hub/api/")
        };
        assert_eq!(
            session_path("lab", Some(&profile)),
            PathBuf::from("/tmp/aquila-session.json")
        );
        assert!(session_path("lab", None).ends_with("sessions/lab.json"));
    }
}
