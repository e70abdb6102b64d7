use crate::application::session::SessionManager;
use crate::infrastructure::auth_client::AuthHttpClient;
use crate::infrastructure::credential_store::CredentialStore;
use serde::Serialize;
use url::form_urlencoded;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteAccess {
    Public,
    GuestOnly,
    AuthRequired,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub access: RouteAccess,
}

pub const HOME_PATH: &str = "/";
pub const LOGIN_PATH: &str = "/login";
pub const REGISTER_PATH: &str = "/register";
pub const TODOS_PATH: &str = "/todos";
pub const CREATE_CATEGORY_PATH: &str = "/categories/create";
pub const CREATE_PRIORITY_PATH: &str = "/priorities/create";

pub const ROUTES: [Route; 6] = [
    Route {
        name: "home",
        path: HOME_PATH,
        access: RouteAccess::Public,
    },
    Route {
        name: "login",
        path: LOGIN_PATH,
        access: RouteAccess::GuestOnly,
    },
    Route {
        name: "register",
        path: REGISTER_PATH,
        access: RouteAccess::GuestOnly,
    },
    Route {
        name: "todos",
        path: TODOS_PATH,
        access: RouteAccess::AuthRequired,
    },
    Route {
        name: "createCategory",
        path: CREATE_CATEGORY_PATH,
        access: RouteAccess::AuthRequired,
    },
    Route {
        name: "createPriority",
        path: CREATE_PRIORITY_PATH,
        access: RouteAccess::AuthRequired,
    },
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum NavigationDecision {
    Proceed,
    /// `redirect` is the full path requested.
    RedirectToLogin { redirect: String },
    RedirectHome,
}

impl NavigationDecision {
    /// Path to navigate to, or `None` to stay on the requested one.
    pub fn location(&self) -> Option<String> {
        match self {
            Self::Proceed => None,
            Self::RedirectToLogin { redirect } => {
                let encoded: String =
                    form_urlencoded::byte_serialize(redirect.as_bytes()).collect();
                Some(format!("{LOGIN_PATH}?redirect={encoded}"))
            }
            Self::RedirectHome => Some(HOME_PATH.to_string()),
        }
    }
}

/// Matches on the path component only; query and fragment are ignored.
pub fn find_route(full_path: &str) -> Option<&'static Route> {
    let path = full_path
        .split(['?', '#'])
        .next()
        .unwrap_or_default();
    let path = match path.trim_end_matches('/') {
        "" => HOME_PATH,
        trimmed => trimmed,
    };
    ROUTES.iter().find(|route| route.path == path)
}

/// Runs before every navigation. A stored token is restored first so a
/// fresh process does not bounce a logged-in user to the login page.
pub async fn guard_navigation<S, C>(
    session: &SessionManager<S, C>,
    full_path: &str,
) -> NavigationDecision
where
    S: CredentialStore + ?Sized,
    C: AuthHttpClient,
{
    if !session.is_authenticated() && session.has_persisted_token() {
        let outcome = session.restore_from_persisted_state().await;
        tracing::debug!(?outcome, "session restored before navigation");
    }

    let authenticated = session.is_authenticated();
    let access = find_route(full_path)
        .map(|route| route.access)
        .unwrap_or(RouteAccess::Public);
    match access {
        RouteAccess::AuthRequired if !authenticated => NavigationDecision::RedirectToLogin {
            redirect: full_path.to_string(),
        },
        RouteAccess::GuestOnly if authenticated => NavigationDecision::RedirectHome,
        _ => NavigationDecision::Proceed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::test_support::{token_for, FakeAuthClient};
    use crate::infrastructure::credential_store::{
        InMemoryCredentialStore, PersistedSession,
    };
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn session() -> (
        Arc<InMemoryCredentialStore>,
        Arc<FakeAuthClient>,
        SessionManager<InMemoryCredentialStore, FakeAuthClient>,
    ) {
        let store = Arc::new(InMemoryCredentialStore::default());
        let auth = Arc::new(FakeAuthClient::default());
        let manager = SessionManager::new(Arc::clone(&store), Arc::clone(&auth));
        (store, auth, manager)
    }

    #[test]
    fn routes_match_on_path_component() {
        assert_eq!(find_route("/todos?page=2").map(|route| route.name), Some("todos"));
        assert_eq!(find_route("/todos/").map(|route| route.name), Some("todos"));
        assert_eq!(find_route("").map(|route| route.name), Some("home"));
        assert_eq!(find_route("/unknown"), None);
    }

    #[tokio::test]
    async fn anonymous_user_is_sent_to_login_with_redirect() {
        let (_, _, manager) = session();

        let decision = guard_navigation(&manager, "/categories/create").await;

        assert_eq!(
            decision,
            NavigationDecision::RedirectToLogin {
                redirect: "/categories/create".to_string()
            }
        );
        assert_eq!(
            decision.location().as_deref(),
            Some("/login?redirect=%2Fcategories%2Fcreate")
        );
        assert_eq!(guard_navigation(&manager, "/").await, NavigationDecision::Proceed);
        assert_eq!(guard_navigation(&manager, "/login").await, NavigationDecision::Proceed);
    }

    #[tokio::test]
    async fn stored_token_is_restored_before_guarding() {
        let (store, auth, manager) = session();
        store
            .save_session(&PersistedSession {
                access_token: token_for(Some("u1"), 3600),
                refresh_token: Some("R".to_string()),
                user: None,
            })
            .expect("save");

        assert_eq!(guard_navigation(&manager, "/todos").await, NavigationDecision::Proceed);
        assert!(manager.is_authenticated());
        assert_eq!(auth.refresh_calls.load(Ordering::SeqCst), 0);

        let decision = guard_navigation(&manager, "/register").await;
        assert_eq!(decision, NavigationDecision::RedirectHome);
        assert_eq!(decision.location().as_deref(), Some("/"));
    }
}
