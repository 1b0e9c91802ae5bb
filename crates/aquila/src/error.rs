//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use aquila_config::ConfigError;
use aquila_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to hub at {url}")]
    #[diagnostic(
        code(aquila::connection_failed),
        help(
            "Check that the hub is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("Request timed out")]
    #[diagnostic(
        code(aquila::timeout),
        help("Increase timeout with --timeout or check hub responsiveness.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(aquila::auth_failed),
        help("Check the user name and password, then run: aquila login")
    )]
    AuthFailed { message: String },

    #[error("Not logged in to profile '{profile}'")]
    #[diagnostic(code(aquila::not_logged_in), help("Run: aquila login"))]
    NotLoggedIn { profile: String },

    #[error("The hub rejected the session")]
    #[diagnostic(
        code(aquila::session_expired),
        help("The stored session was cleared. Run: aquila login")
    )]
    SessionExpired,

    #[error("Could not access the session file: {message}")]
    #[diagnostic(
        code(aquila::storage),
        help("Check permissions, or choose another location with --session-file.")
    )]
    Storage { message: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("No device of class '{class}' found")]
    #[diagnostic(
        code(aquila::no_device),
        help("Run: aquila discover, then aquila devices --class {class}")
    )]
    NoDevice { class: String },

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(aquila::not_found),
        help("Run: aquila {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Hub error ({code}): {message}")]
    #[diagnostic(code(aquila::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(aquila::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(aquila::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: aquila config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No hub configured")]
    #[diagnostic(
        code(aquila::no_config),
        help(
            "Create a profile with: aquila config init\n\
             or pass --hub / set AQUILA_HUB.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(aquila::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render JSON: {0}")]
    #[diagnostic(code(aquila::json))]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NotLoggedIn { .. } | Self::SessionExpired => {
                exit_code::AUTH
            }
            Self::NoDevice { .. } | Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Unauthenticated => CliError::SessionExpired,

            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::ConnectionFailed { url, reason } => {
                CliError::ConnectionFailed { url, reason }
            }

            CoreError::Timeout => CliError::Timeout,

            CoreError::NoDevice { class } => CliError::NoDevice { class },

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::NotBound => CliError::ApiError {
                code: "not_bound".into(),
                message: "no device is bound".into(),
            },

            CoreError::TornDown => CliError::ApiError {
                code: "stopped".into(),
                message: "the sync loop was stopped".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "unknown".into(), |s| s.to_string()),
                message,
            },

            CoreError::Storage { message } => CliError::Storage { message },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see aquila config show)".into(),
            },
            other => CliError::Config(Box::new(other)),
        }
    }
}
