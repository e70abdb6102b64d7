use crate::domain::models::{
    Category, CategoryCreate, CategoryEdit, Priority, PriorityCreate, PriorityEdit, Task,
    TaskCreate, TaskUpdate,
};
use crate::infrastructure::api_error::api_error_message;
use crate::infrastructure::error::ClientError;
use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use url::Url;

/// A server collection reachable under `{api base}/{PATH}`.
pub trait RemoteResource: DeserializeOwned + Send + Sync + 'static {
    const PATH: &'static str;
    /// Singular noun used in default error messages.
    const NOUN: &'static str;
    /// Plural noun used in default error messages.
    const NOUN_PLURAL: &'static str;

    type Create: Serialize + Send + Sync + 'static;
    type Update: Serialize + Send + Sync + 'static;
}

impl RemoteResource for Task {
    const PATH: &'static str = "TodoTasks";
    const NOUN: &'static str = "task";
    const NOUN_PLURAL: &'static str = "tasks";
    type Create = TaskCreate;
    type Update = TaskUpdate;
}

impl RemoteResource for Category {
    const PATH: &'static str = "TodoCategories";
    const NOUN: &'static str = "category";
    const NOUN_PLURAL: &'static str = "categories";
    type Create = CategoryCreate;
    type Update = CategoryEdit;
}

impl RemoteResource for Priority {
    const PATH: &'static str = "TodoPriorities";
    const NOUN: &'static str = "priority";
    const NOUN_PLURAL: &'static str = "priorities";
    type Create = PriorityCreate;
    type Update = PriorityEdit;
}

/// Request interception hook: supplies the `Authorization` header value for
/// every resource request.
pub trait BearerTokenSource: Send + Sync {
    fn authorization_header_value(&self) -> Option<String>;
}

#[async_trait]
pub trait TodoApiClient: Send + Sync {
    async fn list<R: RemoteResource>(&self) -> Result<Vec<R>, ClientError>;

    async fn get<R: RemoteResource>(&self, id: &str) -> Result<R, ClientError>;

    async fn create<R: RemoteResource>(&self, input: &R::Create) -> Result<R, ClientError>;

    /// `Ok(None)` when the server acknowledged the update without a body.
    async fn update<R: RemoteResource>(
        &self,
        id: &str,
        input: &R::Update,
    ) -> Result<Option<R>, ClientError>;

    async fn delete<R: RemoteResource>(&self, id: &str) -> Result<(), ClientError>;
}

pub fn fetch_all_failed_message<R: RemoteResource>() -> String {
    format!("Failed to fetch todo {}.", R::NOUN_PLURAL)
}

pub fn fetch_one_failed_message<R: RemoteResource>(id: &str) -> String {
    format!("Failed to fetch todo {} with ID {id}.", R::NOUN)
}

pub fn create_failed_message<R: RemoteResource>() -> String {
    format!("Failed to create todo {}.", R::NOUN)
}

pub fn update_failed_message<R: RemoteResource>(id: &str) -> String {
    format!("Failed to update todo {} with ID {id}.", R::NOUN)
}

pub fn delete_failed_message<R: RemoteResource>(id: &str) -> String {
    format!("Failed to delete todo {} with ID {id}.", R::NOUN)
}

#[derive(Clone)]
pub struct ReqwestTodoApiClient {
    client: Client,
    base_url: Url,
    token_source: Arc<dyn BearerTokenSource>,
}

impl ReqwestTodoApiClient {
    pub fn new(base_url: Url, token_source: Arc<dyn BearerTokenSource>) -> Self {
        Self {
            client: Client::new(),
            base_url,
            token_source,
        }
    }

    fn ensure_non_empty(value: &str, field: &str) -> Result<(), ClientError> {
        if value.trim().is_empty() {
            return Err(ClientError::Validation(format!("{field} must not be empty")));
        }
        Ok(())
    }

    fn collection_endpoint(&self, path: &str) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::InvalidConfig("api base URL cannot be a base".to_string())
            })?;
            segments.pop_if_empty().push(path);
        }
        Ok(url)
    }

    fn item_endpoint(&self, path: &str, id: &str) -> Result<Url, ClientError> {
        let mut url = self.collection_endpoint(path)?;
        {
            let mut segments = url.path_segments_mut().map_err(|_| {
                ClientError::InvalidConfig("api collection URL cannot be a base".to_string())
            })?;
            segments.push(id);
        }
        Ok(url)
    }

    fn request(&self, method: Method, url: Url) -> RequestBuilder {
        let request = self.client.request(method, url);
        match self.token_source.authorization_header_value() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }

    /// Sends the request and returns the raw body of a 2xx response.
    async fn send(
        &self,
        request: RequestBuilder,
        default_message: &str,
    ) -> Result<String, ClientError> {
        let response = request
            .send()
            .await
            .map_err(|error| {
                ClientError::Fetch(api_error_message("", &error.to_string(), default_message))
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|error| {
            ClientError::Fetch(api_error_message("", &error.to_string(), default_message))
        })?;

        if !status.is_success() {
            tracing::debug!(status = status.as_u16(), "resource request rejected");
            let transport = format!("request failed with status code {}", status.as_u16());
            return Err(ClientError::Fetch(api_error_message(&body, &transport, default_message)));
        }
        Ok(body)
    }

    fn parse<T: DeserializeOwned>(body: &str, default_message: &str) -> Result<T, ClientError> {
        serde_json::from_str::<T>(body).map_err(|error| {
            tracing::warn!(%error, "unreadable resource payload");
            ClientError::Fetch(default_message.to_string())
        })
    }
}

#[async_trait]
impl TodoApiClient for ReqwestTodoApiClient {
    async fn list<R: RemoteResource>(&self) -> Result<Vec<R>, ClientError> {
        let message = fetch_all_failed_message::<R>();
        let request = self.request(Method::GET, self.collection_endpoint(R::PATH)?);
        let body = self.send(request, &message).await?;
        Self::parse(&body, &message)
    }

    async fn get<R: RemoteResource>(&self, id: &str) -> Result<R, ClientError> {
        Self::ensure_non_empty(id, "id")?;
        let message = fetch_one_failed_message::<R>(id);
        let request = self.request(Method::GET, self.item_endpoint(R::PATH, id)?);
        let body = self.send(request, &message).await?;
        Self::parse(&body, &message)
    }

    async fn create<R: RemoteResource>(&self, input: &R::Create) -> Result<R, ClientError> {
        let message = create_failed_message::<R>();
        let request = self
            .request(Method::POST, self.collection_endpoint(R::PATH)?)
            .json(input);
        let body = self.send(request, &message).await?;
        Self::parse(&body, &message)
    }

    async fn update<R: RemoteResource>(
        &self,
        id: &str,
        input: &R::Update,
    ) -> Result<Option<R>, ClientError> {
        Self::ensure_non_empty(id, "id")?;
        let message = update_failed_message::<R>(id);
        let request = self
            .request(Method::PUT, self.item_endpoint(R::PATH, id)?)
            .json(input);
        let body = self.send(request, &message).await?;
        if body.trim().is_empty() {
            return Ok(None);
        }
        Self::parse(&body, &message).map(Some)
    }

    async fn delete<R: RemoteResource>(&self, id: &str) -> Result<(), ClientError> {
        Self::ensure_non_empty(id, "id")?;
        let message = delete_failed_message::<R>(id);
        let request = self.request(Method::DELETE, self.item_endpoint(R::PATH, id)?);
        self.send(request, &message).await?;
        Ok(())
    }
}
