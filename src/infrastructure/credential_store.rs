use crate::domain::models::UserIdentity;
use crate::infrastructure::error::ClientError;
use crate::infrastructure::storage::LocalStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

pub const ACCESS_TOKEN_KEY: &str = "todoAppToken";
pub const REFRESH_TOKEN_KEY: &str = "todoAppRefreshToken";
pub const USER_KEY: &str = "todoAppUser";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<UserIdentity>,
}

pub trait CredentialStore: Send + Sync {
    fn save_session(&self, session: &PersistedSession) -> Result<(), ClientError>;
    /// `None` when no access token is stored; that is the only signal of
    /// "not authenticated" at startup.
    fn load_session(&self) -> Result<Option<PersistedSession>, ClientError>;
    fn delete_session(&self) -> Result<(), ClientError>;
}

/// Keeps the session under three separate keys of a [`LocalStore`].
pub struct LocalStoreCredentialStore<L: LocalStore + ?Sized> {
    store: Arc<L>,
}

impl<L: LocalStore + ?Sized> LocalStoreCredentialStore<L> {
    pub fn new(store: Arc<L>) -> Self {
        Self { store }
    }
}

impl<L: LocalStore + ?Sized> CredentialStore for LocalStoreCredentialStore<L> {
    fn save_session(&self, session: &PersistedSession) -> Result<(), ClientError> {
        self.store.set_item(ACCESS_TOKEN_KEY, &session.access_token)?;
        match session.refresh_token.as_deref() {
            Some(refresh_token) => self.store.set_item(REFRESH_TOKEN_KEY, refresh_token)?,
            None => self.store.remove_item(REFRESH_TOKEN_KEY)?,
        }
        match &session.user {
            Some(user) => self.store.set_item(USER_KEY, &serde_json::to_string(user)?)?,
            None => self.store.remove_item(USER_KEY)?,
        }
        Ok(())
    }

    fn load_session(&self) -> Result<Option<PersistedSession>, ClientError> {
        let Some(access_token) = self
            .store
            .get_item(ACCESS_TOKEN_KEY)?
            .filter(|value| !value.trim().is_empty())
        else {
            return Ok(None);
        };

        let refresh_token = self
            .store
            .get_item(REFRESH_TOKEN_KEY)?
            .filter(|value| !value.trim().is_empty());
        let user = match self.store.get_item(USER_KEY)? {
            Some(raw) => match serde_json::from_str::<Option<UserIdentity>>(&raw) {
                Ok(user) => user,
                Err(error) => {
                    tracing::warn!(%error, "ignoring unreadable persisted user");
                    None
                }
            },
            None => None,
        };

        Ok(Some(PersistedSession {
            access_token,
            refresh_token,
            user,
        }))
    }

    fn delete_session(&self) -> Result<(), ClientError> {
        self.store.remove_item(ACCESS_TOKEN_KEY)?;
        self.store.remove_item(REFRESH_TOKEN_KEY)?;
        self.store.remove_item(USER_KEY)?;
        Ok(())
    }
}

/// Keeps the whole session as one JSON entry in the OS keyring.
#[derive(Debug, Clone)]
pub struct KeyringCredentialStore {
    service_name: String,
    account_name: String,
}

impl KeyringCredentialStore {
    pub fn new(service_name: impl Into<String>, account_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            account_name: account_name.into(),
        }
    }

    fn entry(&self) -> Result<keyring::Entry, ClientError> {
        keyring::Entry::new(&self.service_name, &self.account_name)
            .map_err(|error| ClientError::Credential(error.to_string()))
    }
}

impl Default for KeyringCredentialStore {
    fn default() -> Self {
        Self::new("todo-client.session", "default")
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_session(&self, session: &PersistedSession) -> Result<(), ClientError> {
        let payload = serde_json::to_string(session)?;
        self.entry()?
            .set_password(&payload)
            .map_err(|error| ClientError::Credential(error.to_string()))
    }

    fn load_session(&self) -> Result<Option<PersistedSession>, ClientError> {
        let payload = match self.entry()?.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(ClientError::Credential(error.to_string())),
        };

        let session = serde_json::from_str::<PersistedSession>(&payload)
            .map_err(|error| ClientError::Credential(error.to_string()))?;
        if session.access_token.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(session))
    }

    fn delete_session(&self) -> Result<(), ClientError> {
        match self.entry()?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(ClientError::Credential(error.to_string())),
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    session: Mutex<Option<PersistedSession>>,
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_session(&self, session: &PersistedSession) -> Result<(), ClientError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| ClientError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = Some(session.clone());
        Ok(())
    }

    fn load_session(&self) -> Result<Option<PersistedSession>, ClientError> {
        let guard = self
            .session
            .lock()
            .map_err(|error| ClientError::Credential(format!("in-memory lock poisoned: {error}")))?;
        Ok(guard.clone())
    }

    fn delete_session(&self) -> Result<(), ClientError> {
        let mut guard = self
            .session
            .lock()
            .map_err(|error| ClientError::Credential(format!("in-memory lock poisoned: {error}")))?;
        *guard = None;
        Ok(())
    }
}
