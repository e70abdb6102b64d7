use crate::domain::models::{LoginCredentials, RegisterInfo};
use crate::infrastructure::api_error::api_error_message;
use crate::infrastructure::error::ClientError;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use url::Url;

pub const LOGIN_FAILED_MESSAGE: &str = "Login failed";
pub const REGISTRATION_FAILED_MESSAGE: &str = "Registration failed";
pub const REFRESH_FAILED_MESSAGE: &str = "Session refresh failed. Please log in again.";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct JwtResponse {
    pub token: Option<String>,
    pub refresh_token: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RefreshTokenRequest {
    pub jwt: String,
    pub refresh_token: String,
}

#[async_trait]
pub trait AuthHttpClient: Send + Sync {
    async fn login(&self, credentials: &LoginCredentials) -> Result<JwtResponse, ClientError>;

    async fn register(&self, info: &RegisterInfo) -> Result<JwtResponse, ClientError>;

    async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<JwtResponse, ClientError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestAuthClient {
    client: Client,
    base_url: Url,
}

impl ReqwestAuthClient {
    pub fn new(base_url: Url) -> Self {
        Self {
            client: Client::new(),
            base_url,
        }
    }

    fn endpoint(&self, action: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::InvalidConfig("auth base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty().push(action);
        }
        Ok(url)
    }

    async fn post_json<B: Serialize + Sync>(
        &self,
        action: &str,
        body: &B,
        default_message: &str,
    ) -> Result<JwtResponse, ClientError> {
        let endpoint = self.endpoint(action)?;
        let response = self
            .client
            .post(endpoint)
            .json(body)
            .send()
            .await
            .map_err(|error| {
                ClientError::Auth(api_error_message("", &error.to_string(), default_message))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            ClientError::Auth(api_error_message("", &error.to_string(), default_message))
        })?;

        if !status.is_success() {
            let transport = format!("request failed with status code {}", status.as_u16());
            return Err(ClientError::Auth(api_error_message(&body, &transport, default_message)));
        }

        serde_json::from_str::<JwtResponse>(&body).map_err(|error| {
            ClientError::Auth(format!("invalid {action} response payload: {error}"))
        })
    }
}

#[async_trait]
impl AuthHttpClient for ReqwestAuthClient {
    async fn login(&self, credentials: &LoginCredentials) -> Result<JwtResponse, ClientError> {
        self.post_json("Login", credentials, LOGIN_FAILED_MESSAGE).await
    }

    async fn register(&self, info: &RegisterInfo) -> Result<JwtResponse, ClientError> {
        self.post_json("Register", info, REGISTRATION_FAILED_MESSAGE).await
    }

    async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<JwtResponse, ClientError> {
        self.post_json("RefreshToken", request, REFRESH_FAILED_MESSAGE).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_append_action_to_base_path() {
        let client = ReqwestAuthClient::new(
            Url::parse("https://taltech.akaver.com/api/v1/Account").expect("url"),
        );
        assert_eq!(
            client.endpoint("Login").expect("endpoint").as_str(),
            "https://taltech.akaver.com/api/v1/Account/Login"
        );

        let trailing = ReqwestAuthClient::new(
            Url::parse("https://example.test/api/v1/Account/").expect("url"),
        );
        assert_eq!(
            trailing.endpoint("RefreshToken").expect("endpoint").as_str(),
            "https://example.test/api/v1/Account/RefreshToken"
        );
    }

    #[test]
    fn refresh_request_uses_backend_field_names() {
        let value = serde_json::to_value(RefreshTokenRequest {
            jwt: "T".to_string(),
            refresh_token: "R".to_string(),
        })
        .expect("serialize");
        assert_eq!(value, serde_json::json!({ "jwt": "T", "refreshToken": "R" }));
    }

    #[test]
    fn jwt_response_tolerates_missing_fields() {
        let response: JwtResponse =
            serde_json::from_str(r#"{"token":"T","refreshToken":"R"}"#).expect("deserialize");
        assert_eq!(response.token.as_deref(), Some("T"));
        assert_eq!(response.first_name, None);
    }
}
