use crate::domain::claims::IdentityFallback;
use crate::domain::models::{LoginCredentials, RegisterInfo, UserIdentity};
use crate::infrastructure::auth_client::{AuthHttpClient, JwtResponse, RefreshTokenRequest};
use crate::infrastructure::credential_store::{CredentialStore, PersistedSession};
use crate::infrastructure::error::ClientError;
use crate::infrastructure::todo_api_client::BearerTokenSource;
use crate::infrastructure::token_decoder::decode_access_token;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const GUEST_DISPLAY_NAME: &str = "Guest";
pub const SESSION_EXPIRED_MESSAGE: &str = "Current session has expired. Please log in again.";
const LOGIN_RETRY_MESSAGE: &str = "Login failed. Please try again.";
const REGISTER_RETRY_MESSAGE: &str = "Registration failed. Please try again.";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Anonymous,
    Authenticating,
    Authenticated,
    Expired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored(UserIdentity),
    Refreshed(UserIdentity),
    ReauthenticationRequired,
}

/// Notified whenever the session is cleared, e.g. so cached server data can
/// be dropped together with the credentials.
pub trait SessionListener: Send + Sync {
    fn on_session_cleared(&self);
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub authenticated: bool,
    pub display_name: String,
    pub user: Option<UserIdentity>,
    pub is_admin: bool,
    pub login_error: Option<String>,
    pub register_error: Option<String>,
    pub is_loading: bool,
}

#[derive(Debug, Default)]
struct SessionState {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserIdentity>,
    is_admin: bool,
    status: SessionStatus,
    login_error: Option<String>,
    register_error: Option<String>,
    is_loading: bool,
}

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

#[derive(Clone, Copy)]
enum ErrorSlot {
    Login,
    Register,
}

pub struct SessionManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: AuthHttpClient,
{
    credential_store: Arc<S>,
    auth_client: Arc<C>,
    state: Mutex<SessionState>,
    listeners: Mutex<Vec<Arc<dyn SessionListener>>>,
    now_provider: NowProvider,
}

impl<S, C> SessionManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: AuthHttpClient,
{
    pub fn new(credential_store: Arc<S>, auth_client: Arc<C>) -> Self {
        Self {
            credential_store,
            auth_client,
            state: Mutex::new(SessionState::default()),
            listeners: Mutex::new(Vec::new()),
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn subscribe(&self, listener: Arc<dyn SessionListener>) {
        self.listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listener);
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<UserIdentity, ClientError> {
        self.begin_authentication(ErrorSlot::Login);
        let fallback = IdentityFallback {
            email: Some(credentials.email.clone()),
            ..IdentityFallback::default()
        };
        let result = match self.auth_client.login(credentials).await {
            Ok(response) => self.establish(response, fallback),
            Err(error) => Err(error),
        };
        self.finish_authentication(result, ErrorSlot::Login)
    }

    pub async fn register(&self, info: &RegisterInfo) -> Result<UserIdentity, ClientError> {
        self.begin_authentication(ErrorSlot::Register);
        let fallback = IdentityFallback {
            email: Some(info.email.clone()),
            first_name: Some(info.first_name.clone()),
            last_name: Some(info.last_name.clone()),
        };
        let result = match self.auth_client.register(info).await {
            Ok(response) => self.establish(response, fallback),
            Err(error) => Err(error),
        };
        self.finish_authentication(result, ErrorSlot::Register)
    }

    /// Exchanges the current token pair for a new one. Any failure ends the
    /// session.
    pub async fn refresh(&self) -> Result<UserIdentity, ClientError> {
        let (access_token, refresh_token, email) = {
            let state = self.lock_state();
            (
                state.access_token.clone(),
                state.refresh_token.clone(),
                state.user.as_ref().map(|user| user.email.clone()),
            )
        };
        let (Some(access_token), Some(refresh_token)) = (access_token, refresh_token) else {
            self.clear_session("refresh requested without a token pair");
            return Err(ClientError::Auth(SESSION_EXPIRED_MESSAGE.to_string()));
        };
        self.exchange_refresh_token(access_token, refresh_token, email)
            .await
    }

    /// Rebuilds the session from persisted credentials. Expired tokens are
    /// refreshed at most once; anything unusable leaves the session anonymous.
    pub async fn restore_from_persisted_state(&self) -> RestoreOutcome {
        let persisted = match self.credential_store.load_session() {
            Ok(Some(persisted)) => persisted,
            Ok(None) => {
                self.clear_session("no persisted token");
                return RestoreOutcome::ReauthenticationRequired;
            }
            Err(error) => {
                tracing::warn!(%error, "persisted session unreadable");
                self.clear_session("persisted session unreadable");
                return RestoreOutcome::ReauthenticationRequired;
            }
        };

        let claims = match decode_access_token(&persisted.access_token) {
            Ok(claims) => claims,
            Err(error) => {
                tracing::warn!(%error, "persisted token could not be decoded");
                self.clear_session("persisted token undecodable");
                return RestoreOutcome::ReauthenticationRequired;
            }
        };

        if claims.is_expired_at((self.now_provider)()) {
            let Some(refresh_token) = persisted.refresh_token else {
                self.clear_session("expired token without refresh token");
                return RestoreOutcome::ReauthenticationRequired;
            };
            self.lock_state().status = SessionStatus::Expired;
            let email = persisted.user.map(|user| user.email);
            return match self
                .exchange_refresh_token(persisted.access_token, refresh_token, email)
                .await
            {
                Ok(user) => RestoreOutcome::Refreshed(user),
                Err(_) => RestoreOutcome::ReauthenticationRequired,
            };
        }

        let fallback = persisted
            .user
            .as_ref()
            .map(|user| IdentityFallback {
                email: Some(user.email.clone()),
                first_name: Some(user.first_name.clone()),
                last_name: Some(user.last_name.clone()),
            })
            .unwrap_or_default();
        let Some(user) = claims.identity(&fallback) else {
            self.clear_session("persisted token has no subject claim");
            return RestoreOutcome::ReauthenticationRequired;
        };

        {
            let mut state = self.lock_state();
            state.access_token = Some(persisted.access_token.clone());
            state.refresh_token = persisted.refresh_token.clone();
            state.user = Some(user.clone());
            state.is_admin = claims.is_admin();
            state.status = SessionStatus::Authenticated;
        }
        self.persist(&PersistedSession {
            access_token: persisted.access_token,
            refresh_token: persisted.refresh_token,
            user: Some(user.clone()),
        });
        tracing::info!(user_id = %user.id, "session restored");
        RestoreOutcome::Restored(user)
    }

    /// Checks the in-memory token before an authenticated call and refreshes
    /// it when it has expired.
    pub async fn ensure_fresh_session(&self) -> RestoreOutcome {
        let (access_token, refresh_token, user) = {
            let state = self.lock_state();
            (
                state.access_token.clone(),
                state.refresh_token.clone(),
                state.user.clone(),
            )
        };
        let (Some(access_token), Some(user)) = (access_token, user) else {
            return RestoreOutcome::ReauthenticationRequired;
        };

        let expired = match decode_access_token(&access_token) {
            Ok(claims) => claims.is_expired_at((self.now_provider)()),
            Err(error) => {
                tracing::warn!(%error, "in-memory token could not be decoded");
                self.clear_session("in-memory token undecodable");
                return RestoreOutcome::ReauthenticationRequired;
            }
        };
        if !expired {
            return RestoreOutcome::Restored(user);
        }

        let Some(refresh_token) = refresh_token else {
            self.clear_session("expired token without refresh token");
            return RestoreOutcome::ReauthenticationRequired;
        };
        self.lock_state().status = SessionStatus::Expired;
        match self
            .exchange_refresh_token(access_token, refresh_token, Some(user.email))
            .await
        {
            Ok(user) => RestoreOutcome::Refreshed(user),
            Err(_) => RestoreOutcome::ReauthenticationRequired,
        }
    }

    pub fn logout(&self) {
        self.clear_session("logout");
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_state().access_token.is_some()
    }

    pub fn display_name(&self) -> String {
        display_name_of(self.lock_state().user.as_ref())
    }

    pub fn user(&self) -> Option<UserIdentity> {
        self.lock_state().user.clone()
    }

    pub fn status(&self) -> SessionStatus {
        self.lock_state().status
    }

    pub fn is_admin(&self) -> bool {
        self.lock_state().is_admin
    }

    pub fn has_persisted_token(&self) -> bool {
        matches!(self.credential_store.load_session(), Ok(Some(_)))
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.lock_state();
        SessionSnapshot {
            status: state.status,
            authenticated: state.access_token.is_some(),
            display_name: display_name_of(state.user.as_ref()),
            user: state.user.clone(),
            is_admin: state.is_admin,
            login_error: state.login_error.clone(),
            register_error: state.register_error.clone(),
            is_loading: state.is_loading,
        }
    }

    fn begin_authentication(&self, slot: ErrorSlot) {
        let mut state = self.lock_state();
        state.status = SessionStatus::Authenticating;
        state.is_loading = true;
        match slot {
            ErrorSlot::Login => state.login_error = None,
            ErrorSlot::Register => state.register_error = None,
        }
    }

    fn finish_authentication(
        &self,
        result: Result<UserIdentity, ClientError>,
        slot: ErrorSlot,
    ) -> Result<UserIdentity, ClientError> {
        match result {
            Ok(user) => {
                self.lock_state().is_loading = false;
                tracing::info!(user_id = %user.id, "session established");
                Ok(user)
            }
            Err(error) => {
                tracing::warn!(%error, "authentication failed");
                self.clear_session("authentication failed");
                let message = match error.to_string() {
                    message if message.trim().is_empty() => match slot {
                        ErrorSlot::Login => LOGIN_RETRY_MESSAGE.to_string(),
                        ErrorSlot::Register => REGISTER_RETRY_MESSAGE.to_string(),
                    },
                    message => message,
                };
                let mut state = self.lock_state();
                match slot {
                    ErrorSlot::Login => state.login_error = Some(message.clone()),
                    ErrorSlot::Register => state.register_error = Some(message.clone()),
                }
                Err(ClientError::Auth(message))
            }
        }
    }

    async fn exchange_refresh_token(
        &self,
        jwt: String,
        refresh_token: String,
        email: Option<String>,
    ) -> Result<UserIdentity, ClientError> {
        self.lock_state().is_loading = true;
        let request = RefreshTokenRequest { jwt, refresh_token };
        let fallback = IdentityFallback {
            email,
            ..IdentityFallback::default()
        };
        let result = match self.auth_client.refresh_token(&request).await {
            Ok(response) => self.establish(response, fallback),
            Err(error) => Err(error),
        };
        match result {
            Ok(user) => {
                self.lock_state().is_loading = false;
                tracing::info!(user_id = %user.id, "session refreshed");
                Ok(user)
            }
            Err(error) => {
                tracing::warn!(%error, "session refresh failed");
                self.clear_session("refresh failed");
                self.lock_state().login_error = Some(SESSION_EXPIRED_MESSAGE.to_string());
                Err(ClientError::Auth(SESSION_EXPIRED_MESSAGE.to_string()))
            }
        }
    }

    /// Decodes the issued token and installs the session. Fails when the
    /// token is missing, undecodable or has no subject claim.
    fn establish(
        &self,
        response: JwtResponse,
        mut fallback: IdentityFallback,
    ) -> Result<UserIdentity, ClientError> {
        let token = response
            .token
            .filter(|token| !token.trim().is_empty())
            .ok_or_else(|| ClientError::Auth("no token in authentication response".to_string()))?;
        let claims = decode_access_token(&token)?;

        if response.first_name.is_some() {
            fallback.first_name = response.first_name;
        }
        if response.last_name.is_some() {
            fallback.last_name = response.last_name;
        }
        let user = claims
            .identity(&fallback)
            .ok_or_else(|| ClientError::Auth("ID not found in token".to_string()))?;
        let refresh_token = response
            .refresh_token
            .filter(|refresh_token| !refresh_token.trim().is_empty());

        {
            let mut state = self.lock_state();
            state.access_token = Some(token.clone());
            state.refresh_token = refresh_token.clone();
            state.user = Some(user.clone());
            state.is_admin = claims.is_admin();
            state.status = SessionStatus::Authenticated;
        }
        self.persist(&PersistedSession {
            access_token: token,
            refresh_token,
            user: Some(user.clone()),
        });
        Ok(user)
    }

    fn persist(&self, session: &PersistedSession) {
        if let Err(error) = self.credential_store.save_session(session) {
            tracing::warn!(%error, "failed to persist session");
        }
    }

    fn clear_session(&self, reason: &str) {
        *self.lock_state() = SessionState::default();
        if let Err(error) = self.credential_store.delete_session() {
            tracing::warn!(%error, "failed to delete persisted session");
        }
        tracing::info!(reason, "session cleared");

        let listeners = self
            .listeners
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for listener in listeners {
            listener.on_session_cleared();
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S, C> BearerTokenSource for SessionManager<S, C>
where
    S: CredentialStore + ?Sized,
    C: AuthHttpClient,
{
    fn authorization_header_value(&self) -> Option<String> {
        self.lock_state()
            .access_token
            .as_ref()
            .map(|token| format!("Bearer {token}"))
    }
}

fn display_name_of(user: Option<&UserIdentity>) -> String {
    match user {
        Some(user) => user.display_name(),
        None => GUEST_DISPLAY_NAME.to_string(),
    }
}
