// ── Navigation surface ──
//
// Routes the front end can show, and the navigator that commits them.
// Every commit runs the route guard first, atomically with the commit,
// so two concurrent navigations can never interleave guard and update.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::debug;

use crate::credentials::CredentialView;
use crate::gate::{GuardDecision, SessionStatus, guard};

/// A view the front end can navigate to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum Route {
    /// Default view; requires authentication.
    Home,
    /// Login view; open to everyone.
    Login,
    /// Fallback for unmatched paths.
    NotFound,
}

impl Route {
    pub const HOME_PATH: &'static str = "/";
    pub const LOGIN_PATH: &'static str = "/login";
    pub const NOT_FOUND_PATH: &'static str = "/404error";

    /// Map a path to its route. Unmatched paths resolve to [`Route::NotFound`].
    pub fn resolve(path: &str) -> Self {
        let trimmed = path.trim_end_matches('/');
        match trimmed {
            "" => Self::Home,
            "/login" => Self::Login,
            _ => Self::NotFound,
        }
    }

    pub fn path(self) -> &'static str {
        match self {
            Self::Home => Self::HOME_PATH,
            Self::Login => Self::LOGIN_PATH,
            Self::NotFound => Self::NOT_FOUND_PATH,
        }
    }

    pub fn requires_auth(self) -> bool {
        matches!(self, Self::Home)
    }
}

/// Committed navigation state, observable by views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavState {
    pub route: Route,
    pub session: SessionStatus,
}

/// Applies guarded navigation and publishes the result.
#[derive(Clone)]
pub struct Navigator {
    credentials: CredentialView,
    state: Arc<watch::Sender<NavState>>,
}

impl std::fmt::Debug for Navigator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Navigator")
            .field("state", &*self.state.borrow())
            .finish_non_exhaustive()
    }
}

impl Navigator {
    /// A navigator that has not shown any view yet. Its initial state is
    /// the login view with no session; call [`navigate`](Self::navigate)
    /// to enter the application.
    pub fn new(credentials: CredentialView) -> Self {
        let (state, _) = watch::channel(NavState {
            route: Route::Login,
            session: SessionStatus::LoggedOut,
        });
        Self {
            credentials,
            state: Arc::new(state),
        }
    }

    /// Navigate to a path. Unmatched paths land on [`Route::NotFound`]
    /// (subject to the guard).
    pub fn navigate(&self, path: &str) -> NavState {
        self.navigate_to(Route::resolve(path))
    }

    /// Navigate to a route, running the guard before committing.
    pub fn navigate_to(&self, target: Route) -> NavState {
        let mut committed = None;
        self.state.send_modify(|state| {
            let outcome = guard(&self.credentials.get(), target);
            state.route = match outcome.decision {
                GuardDecision::Allow => target,
                GuardDecision::RedirectTo(route) => route,
            };
            state.session = outcome.session;
            committed = Some(state.clone());
        });
        let committed = committed.unwrap_or_else(|| self.current());
        debug!(target = %target, route = %committed.route, "navigation committed");
        committed
    }

    /// Snapshot of the committed state.
    pub fn current(&self) -> NavState {
        self.state.borrow().clone()
    }

    /// Watch committed navigation changes.
    pub fn subscribe(&self) -> watch::Receiver<NavState> {
        self.state.subscribe()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::credentials::{CredentialStore, Credentials};

    #[test]
    fn resolve_known_and_unknown_paths() {
        assert_eq!(Route::resolve("/"), Route::Home);
        assert_eq!(Route::resolve(""), Route::Home);
        assert_eq!(Route::resolve("/login"), Route::Login);
        assert_eq!(Route::resolve("/login/"), Route::Login);
        assert_eq!(Route::resolve("/devices"), Route::NotFound);
        assert_eq!(Route::NotFound.path(), "/404error");
        assert!(Route::Home.requires_auth());
        assert!(!Route::Login.requires_auth());
    }

    #[test]
    fn anonymous_navigation_lands_on_login() {
        let store = CredentialStore::in_memory();
        let nav = Navigator::new(store.view());

        let state = nav.navigate("/");
        assert_eq!(state.route, Route::Login);
        assert_eq!(state.session, SessionStatus::LoggedOut);

        let state = nav.navigate("/nowhere");
        assert_eq!(state.route, Route::Login);
    }

    #[test]
    fn authenticated_navigation_is_allowed() {
        let store = CredentialStore::in_memory();
        store.set(Credentials::new("abc", "ana")).unwrap();
        let nav = Navigator::new(store.view());

        let state = nav.navigate("/");
        assert_eq!(state.route, Route::Home);
        assert_eq!(
            state.session,
            SessionStatus::LoggedIn {
                display_name: "Ana".into()
            }
        );

        let state = nav.navigate("/missing");
        assert_eq!(state.route, Route::NotFound);
    }

    #[test]
    fn subscribers_see_commits() {
        let store = CredentialStore::in_memory();
        store.set(Credentials::new("abc", "ana")).unwrap();
        let nav = Navigator::new(store.view());
        let mut rx = nav.subscribe();

        nav.navigate("/");
        assert!(rx.has_changed().unwrap());
        assert_eq!(rx.borrow_and_update().route, Route::Home);
    }
}
