use thiserror::Error;

/// Top-level error type for the `aquila-api` crate.
///
/// Covers every failure mode of the hub surfaces: authentication,
/// transport, REST status codes, payload decoding, and push channels.
/// `aquila-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// The hub rejected the call as unauthenticated (HTTP 401).
    #[error("Unauthenticated -- the hub rejected the bearer token")]
    Unauthorized,

    /// Login failed (wrong credentials, malformed token response, etc.)
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── REST ────────────────────────────────────────────────────────
    /// Non-success HTTP status other than 401.
    #[error("Hub returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    // ── Push channels ───────────────────────────────────────────────
    /// WebSocket connection failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the hub rejected the session.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized)
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Status { status, .. } => *status >= 500,
            Self::WebSocketConnect(_) => true,
            _ => false,
        }
    }

    /// Returns `true` if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Transport(e) => e.status() == Some(reqwest::StatusCode::NOT_FOUND),
            Self::Status { status: 404, .. } => true,
            _ => false,
        }
    }

    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_not_transient() {
        let err = Error::Unauthorized;
        assert!(err.is_unauthorized());
        assert!(!err.is_transient());
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn server_errors_are_transient() {
        let err = Error::Status {
            status: 503,
            body: "busy".into(),
        };
        assert!(err.is_transient());
        assert!(!err.is_not_found());
    }

    #[test]
    fn not_found_status() {
        let err = Error::Status {
            status: 404,
            body: String::new(),
        };
        assert!(err.is_not_found());
        assert!(!err.is_transient());
    }
}
