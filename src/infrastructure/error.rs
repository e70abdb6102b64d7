use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Auth(String),
    #[error("{0}")]
    Fetch(String),
    #[error("{0}")]
    NotFoundLocal(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Credential store error: {0}")]
    Credential(String),
    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Auth,
    Fetch,
    NotFoundLocal,
    Storage,
    Config,
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Fetch(_) => ErrorKind::Fetch,
            Self::NotFoundLocal(_) => ErrorKind::NotFoundLocal,
            Self::Io(_) | Self::Json(_) | Self::Sqlite(_) | Self::Credential(_) => {
                ErrorKind::Storage
            }
            Self::InvalidConfig(_) => ErrorKind::Config,
        }
    }
}
