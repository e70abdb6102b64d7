use crate::infrastructure::error::ClientError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use url::Url;

const CLIENT_JSON: &str = "client.json";
const SUPPORTED_SCHEMA: u64 = 1;

pub const DEFAULT_AUTH_BASE_URL: &str = "https://taltech.akaver.com/api/v1/Account";
pub const DEFAULT_API_BASE_URL: &str = "https://taltech.akaver.com/api/v1";
pub const AUTH_BASE_URL_ENV: &str = "TODO_CLIENT_AUTH_BASE_URL";
pub const API_BASE_URL_ENV: &str = "TODO_CLIENT_API_BASE_URL";

pub const DEFAULT_PROHIBITED_WORDS: [&str; 3] = ["badword1", "badword2", "badword3"];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CredentialBackend {
    /// The `local_storage` table of the workspace database.
    Local,
    Keyring,
    /// Nothing survives the process.
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub schema: u64,
    pub auth_base_url: String,
    pub api_base_url: String,
    pub credential_backend: CredentialBackend,
    pub keyring_service: String,
    pub keyring_account: String,
    pub default_prohibited_words: Vec<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            schema: SUPPORTED_SCHEMA,
            auth_base_url: DEFAULT_AUTH_BASE_URL.to_string(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            credential_backend: CredentialBackend::Local,
            keyring_service: "todo-client.session".to_string(),
            keyring_account: "default".to_string(),
            default_prohibited_words: DEFAULT_PROHIBITED_WORDS
                .iter()
                .map(|word| word.to_string())
                .collect(),
        }
    }
}

impl ClientConfig {
    pub fn auth_base_url(&self) -> Result<Url, ClientError> {
        parse_base_url(&self.auth_base_url, "authBaseUrl")
    }

    pub fn api_base_url(&self) -> Result<Url, ClientError> {
        parse_base_url(&self.api_base_url, "apiBaseUrl")
    }

    fn validate(&self, path: &Path) -> Result<(), ClientError> {
        if self.schema != SUPPORTED_SCHEMA {
            return Err(ClientError::InvalidConfig(format!(
                "unsupported schema {} in {}",
                self.schema,
                path.display()
            )));
        }
        self.auth_base_url()?;
        self.api_base_url()?;
        Ok(())
    }

    /// Environment variables take precedence over the file.
    fn apply_env_overrides(mut self) -> Self {
        if let Some(value) = env_override(AUTH_BASE_URL_ENV) {
            self.auth_base_url = value;
        }
        if let Some(value) = env_override(API_BASE_URL_ENV) {
            self.api_base_url = value;
        }
        self
    }
}

fn env_override(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_base_url(raw: &str, field: &str) -> Result<Url, ClientError> {
    let url = Url::parse(raw.trim())
        .map_err(|error| ClientError::InvalidConfig(format!("invalid {field} '{raw}': {error}")))?;
    if url.cannot_be_a_base() {
        return Err(ClientError::InvalidConfig(format!("{field} '{raw}' cannot be a base URL")));
    }
    Ok(url)
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), ClientError> {
    let path = config_dir.join(CLIENT_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&ClientConfig::default())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<ClientConfig, ClientError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| {
            ClientError::InvalidConfig(format!("missing schema in {}", path.display()))
        })?;
    if schema != SUPPORTED_SCHEMA {
        return Err(ClientError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    serde_json::from_value(parsed)
        .map_err(|error| ClientError::InvalidConfig(format!("{}: {error}", path.display())))
}

pub fn load_config(config_dir: &Path) -> Result<ClientConfig, ClientError> {
    let path = config_dir.join(CLIENT_JSON);
    let config = read_config(&path)?.apply_env_overrides();
    config.validate(&path)?;
    Ok(config)
}
