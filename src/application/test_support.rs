//! Fakes shared by the application-layer tests.

use crate::application::session::SessionListener;
use crate::domain::claims::{EMAIL_CLAIM, GIVEN_NAME_CLAIM, SUBJECT_CLAIM, SURNAME_CLAIM};
use crate::domain::models::{LoginCredentials, RegisterInfo};
use crate::infrastructure::auth_client::{AuthHttpClient, JwtResponse, RefreshTokenRequest};
use crate::infrastructure::error::ClientError;
use crate::infrastructure::todo_api_client::{RemoteResource, TodoApiClient};
use crate::infrastructure::token_decoder::encode_test_token;
use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub fn token_for(subject: Option<&str>, expires_in_seconds: i64) -> String {
    let mut claims = json!({
        EMAIL_CLAIM: "a@b.com",
        GIVEN_NAME_CLAIM: "Ada",
        SURNAME_CLAIM: "Lovelace",
        "exp": Utc::now().timestamp() + expires_in_seconds
    });
    if let Some(subject) = subject {
        claims[SUBJECT_CLAIM] = json!(subject);
    }
    encode_test_token(&claims)
}

pub fn jwt_response(token: &str, refresh_token: &str) -> JwtResponse {
    JwtResponse {
        token: Some(token.to_string()),
        refresh_token: Some(refresh_token.to_string()),
        first_name: None,
        last_name: None,
    }
}

#[derive(Debug, Clone)]
pub enum FakeAuthReply {
    Success(JwtResponse),
    Failure(String),
}

#[derive(Debug, Default)]
pub struct FakeAuthClient {
    login_reply: Mutex<Option<FakeAuthReply>>,
    register_reply: Mutex<Option<FakeAuthReply>>,
    refresh_reply: Mutex<Option<FakeAuthReply>>,
    pub login_calls: AtomicUsize,
    pub register_calls: AtomicUsize,
    pub refresh_calls: AtomicUsize,
    pub last_refresh_request: Mutex<Option<RefreshTokenRequest>>,
}

impl FakeAuthClient {
    pub fn set_login_reply(&self, reply: FakeAuthReply) {
        *self.login_reply.lock().expect("login mutex poisoned") = Some(reply);
    }

    pub fn set_register_reply(&self, reply: FakeAuthReply) {
        *self.register_reply.lock().expect("register mutex poisoned") = Some(reply);
    }

    pub fn set_refresh_reply(&self, reply: FakeAuthReply) {
        *self.refresh_reply.lock().expect("refresh mutex poisoned") = Some(reply);
    }

    fn answer(slot: &Mutex<Option<FakeAuthReply>>) -> Result<JwtResponse, ClientError> {
        match slot.lock().expect("reply mutex poisoned").clone() {
            Some(FakeAuthReply::Success(response)) => Ok(response),
            Some(FakeAuthReply::Failure(message)) => Err(ClientError::Auth(message)),
            None => Err(ClientError::Auth("no scripted reply".to_string())),
        }
    }
}

#[async_trait]
impl AuthHttpClient for FakeAuthClient {
    async fn login(&self, _credentials: &LoginCredentials) -> Result<JwtResponse, ClientError> {
        self.login_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.login_reply)
    }

    async fn register(&self, _info: &RegisterInfo) -> Result<JwtResponse, ClientError> {
        self.register_calls.fetch_add(1, Ordering::SeqCst);
        Self::answer(&self.register_reply)
    }

    async fn refresh_token(
        &self,
        request: &RefreshTokenRequest,
    ) -> Result<JwtResponse, ClientError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_refresh_request.lock().expect("request mutex poisoned") = Some(request.clone());
        Self::answer(&self.refresh_reply)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiCall {
    List,
    Get,
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone)]
pub enum FakeReply {
    Json(Value),
    Empty,
    Fail(String),
}

/// Scripted resource gateway. Unscripted calls answer with an empty body.
#[derive(Debug, Default)]
pub struct FakeTodoApi {
    replies: Mutex<HashMap<(ApiCall, &'static str), FakeReply>>,
    calls: Mutex<Vec<(ApiCall, &'static str)>>,
    bodies: Mutex<Vec<Value>>,
}

impl FakeTodoApi {
    pub fn reply(&self, call: ApiCall, path: &'static str, reply: FakeReply) {
        self.replies
            .lock()
            .expect("replies mutex poisoned")
            .insert((call, path), reply);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("calls mutex poisoned").len()
    }

    pub fn calls_to(&self, call: ApiCall, path: &str) -> usize {
        self.calls
            .lock()
            .expect("calls mutex poisoned")
            .iter()
            .filter(|(candidate, candidate_path)| *candidate == call && *candidate_path == path)
            .count()
    }

    pub fn last_body(&self) -> Option<Value> {
        self.bodies.lock().expect("bodies mutex poisoned").last().cloned()
    }

    fn respond<T: DeserializeOwned>(
        &self,
        call: ApiCall,
        path: &'static str,
        body: Option<Value>,
    ) -> Result<Option<T>, ClientError> {
        self.calls.lock().expect("calls mutex poisoned").push((call, path));
        if let Some(body) = body {
            self.bodies.lock().expect("bodies mutex poisoned").push(body);
        }
        let reply = self
            .replies
            .lock()
            .expect("replies mutex poisoned")
            .get(&(call, path))
            .cloned()
            .unwrap_or(FakeReply::Empty);
        match reply {
            FakeReply::Json(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|error| ClientError::Fetch(error.to_string())),
            FakeReply::Empty => Ok(None),
            FakeReply::Fail(message) => Err(ClientError::Fetch(message)),
        }
    }
}

#[async_trait]
impl TodoApiClient for FakeTodoApi {
    async fn list<R: RemoteResource>(&self) -> Result<Vec<R>, ClientError> {
        Ok(self.respond(ApiCall::List, R::PATH, None)?.unwrap_or_default())
    }

    async fn get<R: RemoteResource>(&self, _id: &str) -> Result<R, ClientError> {
        self.respond(ApiCall::Get, R::PATH, None)?
            .ok_or_else(|| ClientError::Fetch("empty reply".to_string()))
    }

    async fn create<R: RemoteResource>(&self, input: &R::Create) -> Result<R, ClientError> {
        let body = serde_json::to_value(input).ok();
        self.respond(ApiCall::Create, R::PATH, body)?
            .ok_or_else(|| ClientError::Fetch("empty reply".to_string()))
    }

    async fn update<R: RemoteResource>(
        &self,
        _id: &str,
        input: &R::Update,
    ) -> Result<Option<R>, ClientError> {
        let body = serde_json::to_value(input).ok();
        self.respond(ApiCall::Update, R::PATH, body)
    }

    async fn delete<R: RemoteResource>(&self, _id: &str) -> Result<(), ClientError> {
        self.respond::<Value>(ApiCall::Delete, R::PATH, None).map(|_| ())
    }
}

#[derive(Debug, Default)]
pub struct CountingListener {
    pub cleared: AtomicUsize,
}

impl SessionListener for CountingListener {
    fn on_session_cleared(&self) {
        self.cleared.fetch_add(1, Ordering::SeqCst);
    }
}

pub fn task_json(
    id: &str,
    sort_order: i32,
    created_at: &str,
    completed: bool,
    archived: bool,
) -> Value {
    json!({
        "id": id,
        "taskName": format!("task {id}"),
        "taskSort": sort_order,
        "createdDt": created_at,
        "dueDt": null,
        "isCompleted": completed,
        "isArchived": archived,
        "todoCategoryId": "cat-1",
        "todoPriorityId": "pri-1",
        "syncDt": "2026-02-16T08:00:00Z"
    })
}

pub fn category_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "categoryName": name,
        "categorySort": 0,
        "syncDt": "2026-02-16T08:00:00Z",
        "tag": null
    })
}

pub fn priority_json(id: &str, name: &str) -> Value {
    json!({
        "id": id,
        "appUserId": "u1",
        "priorityName": name,
        "prioritySort": 0,
        "syncDt": "2026-02-16T08:00:00Z",
        "tag": null
    })
}
