// ── Auth gate ──
//
// Attaches the bearer token to outbound hub calls, logs the session out
// when the hub rejects it, and decides which route a navigation may
// commit. The guard itself is a pure function; the navigator applies its
// decision.

use serde::Serialize;
use tracing::{debug, warn};

use aquila_api::Interceptor;

use crate::credentials::{CredentialStore, Credentials};
use crate::navigation::{NavState, Navigator, Route};

// ── Route guard ──────────────────────────────────────────────────────

/// Session status exposed to views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SessionStatus {
    LoggedOut,
    LoggedIn { display_name: String },
}

/// Whether a navigation may proceed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectTo(Route),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardOutcome {
    pub decision: GuardDecision,
    pub session: SessionStatus,
}

/// Decide a navigation to `target` given the current credentials.
///
/// Without a token every target except the login view redirects to login.
/// With a token everything is allowed and the session carries the display
/// name.
pub fn guard(credentials: &Credentials, target: Route) -> GuardOutcome {
    if !credentials.is_authenticated() {
        let decision = if target == Route::Login {
            GuardDecision::Allow
        } else {
            GuardDecision::RedirectTo(Route::Login)
        };
        return GuardOutcome {
            decision,
            session: SessionStatus::LoggedOut,
        };
    }

    GuardOutcome {
        decision: GuardDecision::Allow,
        session: SessionStatus::LoggedIn {
            display_name: display_name(credentials.user_name()),
        },
    }
}

/// First character uppercased, remainder unchanged. Absent or empty
/// names yield an empty string.
pub fn display_name(user_name: Option<&str>) -> String {
    let mut chars = user_name.unwrap_or_default().chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── Interceptor ──────────────────────────────────────────────────────

/// Session-aware [`Interceptor`] for the hub client.
#[derive(Debug, Clone)]
pub struct AuthGate {
    store: CredentialStore,
    navigator: Navigator,
}

impl AuthGate {
    pub fn new(store: CredentialStore, navigator: Navigator) -> Self {
        Self { store, navigator }
    }

    /// Drop the session and send the user to the login view.
    fn reject(&self) -> NavState {
        if let Err(e) = self.store.clear() {
            warn!(error = %e, "could not clear persisted credentials after rejection");
        }
        self.navigator.navigate_to(Route::Login)
    }
}

impl Interceptor for AuthGate {
    fn request(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.store.view().bearer() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn response_error(&self, error: &aquila_api::Error) {
        if error.is_unauthorized() {
            warn!("hub rejected the session, logging out");
            let state = self.reject();
            debug!(route = %state.route, "redirected after rejection");
        }
    }
}
