// ── Core error types ──
//
// User-facing errors from aquila-core. Consumers never see HTTP status
// codes or JSON parse failures directly: the `From<aquila_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    /// The hub rejected the session; credentials have been cleared.
    #[error("Not authenticated -- please log in again")]
    Unauthenticated,

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach hub at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Hub request timed out")]
    Timeout,

    // ── Discovery / binding errors ───────────────────────────────────
    #[error("No device of class '{class}' found")]
    NoDevice { class: String },

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("No device is bound yet")]
    NotBound,

    #[error("Sync loop has been shut down")]
    TornDown,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Hub error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Persistence / configuration ──────────────────────────────────
    #[error("Credential storage error: {message}")]
    Storage { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the session was rejected by the hub.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthenticated)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<aquila_api::Error> for CoreError {
    fn from(err: aquila_api::Error) -> Self {
        match err {
            aquila_api::Error::Unauthorized => CoreError::Unauthenticated,
            aquila_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            aquila_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            aquila_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            aquila_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            aquila_api::Error::Status { status, body } => {
                if status == 404 {
                    CoreError::DeviceNotFound { identifier: body }
                } else {
                    CoreError::Api {
                        message: if body.is_empty() {
                            format!("HTTP {status}")
                        } else {
                            body
                        },
                        status: Some(status),
                    }
                }
            }
            aquila_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("push channel: {reason}"),
            },
            aquila_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_maps_to_unauthenticated() {
        let err = CoreError::from(aquila_api::Error::Unauthorized);
        assert!(err.is_unauthenticated());
    }

    #[test]
    fn status_keeps_code() {
        let err = CoreError::from(aquila_api::Error::Status {
            status: 502,
            body: String::new(),
        });
        match err {
            CoreError::Api { message, status } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "HTTP 502");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
