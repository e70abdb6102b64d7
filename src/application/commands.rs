use crate::application::bootstrap::bootstrap_workspace;
use crate::application::content_policy::ContentPolicy;
use crate::application::navigation::{
    find_route, guard_navigation, NavigationDecision, RouteAccess, CREATE_CATEGORY_PATH,
    CREATE_PRIORITY_PATH, HOME_PATH, LOGIN_PATH, REGISTER_PATH, TODOS_PATH,
};
use crate::application::resource_cache::{
    CacheSnapshot, ResourceCache, ToggleOutcome, TASK_NOT_FOUND_MESSAGE,
};
use crate::application::session::{
    RestoreOutcome, SessionManager, SessionSnapshot, SESSION_EXPIRED_MESSAGE,
};
use crate::domain::models::{
    Category, CategoryCreate, CategoryEdit, LoginCredentials, Priority, PriorityCreate,
    PriorityEdit, RegisterInfo, Task, TaskCreate, TaskFilter, TaskUpdate,
};
use crate::infrastructure::auth_client::ReqwestAuthClient;
use crate::infrastructure::config::CredentialBackend;
use crate::infrastructure::credential_store::{
    CredentialStore, InMemoryCredentialStore, KeyringCredentialStore, LocalStoreCredentialStore,
};
use crate::infrastructure::error::ClientError;
use crate::infrastructure::storage::{LocalStore, SqliteLocalStore};
use crate::infrastructure::todo_api_client::{BearerTokenSource, ReqwestTodoApiClient};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

type Session = SessionManager<dyn CredentialStore, ReqwestAuthClient>;
type Cache = ResourceCache<ReqwestTodoApiClient, dyn LocalStore>;
type Policy = ContentPolicy<dyn LocalStore>;

pub struct AppState {
    config_dir: PathBuf,
    logs_dir: PathBuf,
    database_path: PathBuf,
    session: Arc<Session>,
    policy: Arc<Policy>,
    cache: Arc<Cache>,
}

impl AppState {
    pub fn new(workspace_root: PathBuf) -> Result<Self, ClientError> {
        let bootstrap = bootstrap_workspace(&workspace_root)?;
        let config = bootstrap.config;

        let local: Arc<dyn LocalStore> =
            Arc::new(SqliteLocalStore::new(&bootstrap.database_path));
        let credential_store: Arc<dyn CredentialStore> = match config.credential_backend {
            CredentialBackend::Local => {
                Arc::new(LocalStoreCredentialStore::new(Arc::clone(&local)))
            }
            CredentialBackend::Keyring => Arc::new(KeyringCredentialStore::new(
                config.keyring_service.clone(),
                config.keyring_account.clone(),
            )),
            CredentialBackend::Memory => Arc::new(InMemoryCredentialStore::default()),
        };

        let auth_client = Arc::new(ReqwestAuthClient::new(config.auth_base_url()?));
        let session = Arc::new(SessionManager::new(credential_store, auth_client));
        let policy = Arc::new(ContentPolicy::with_default_words(
            Arc::clone(&local),
            config.default_prohibited_words.clone(),
        )?);

        let token_source: Arc<dyn BearerTokenSource> = session.clone();
        let api = Arc::new(ReqwestTodoApiClient::new(config.api_base_url()?, token_source));
        let cache = Arc::new(ResourceCache::new(api, Arc::clone(&policy)));
        session.subscribe(cache.clone());

        Ok(Self {
            config_dir: bootstrap.config_dir,
            logs_dir: bootstrap.logs_dir,
            database_path: bootstrap.database_path,
            session,
            policy,
            cache,
        })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn logs_dir(&self) -> &Path {
        &self.logs_dir
    }

    pub fn database_path(&self) -> &Path {
        &self.database_path
    }

    pub fn command_error(&self, command: &str, error: &ClientError) -> String {
        tracing::error!(command, kind = ?error.kind(), %error, "command failed");
        error.to_string()
    }

    pub fn log_info(&self, command: &str, message: &str) {
        tracing::info!(command, message);
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    pub id: String,
    pub deleted: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleField {
    Completed,
    Archived,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleResponse {
    pub id: String,
    pub outcome: ToggleOutcome,
    pub task: Option<Task>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverviewResponse {
    pub session: SessionSnapshot,
    pub data: CacheSnapshot,
    /// Messages of the collections that failed to load.
    pub failures: Vec<String>,
}

/// Partial edit of a category or priority; `None` keeps the cached value.
#[derive(Debug, Clone, Default)]
pub struct LabelChanges {
    pub name: Option<String>,
    pub sort_order: Option<i32>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct WordsResponse {
    pub words: Vec<String>,
}

/// Applies the navigation guard for `route` and, for protected routes,
/// makes sure the token is still fresh.
async fn enter_route(state: &AppState, route: &str) -> Result<(), ClientError> {
    let decision = guard_navigation(&*state.session, route).await;
    if let Some(location) = decision.location() {
        tracing::info!(route, %location, "navigation redirected");
    }
    match decision {
        NavigationDecision::Proceed => {}
        NavigationDecision::RedirectToLogin { redirect } => {
            return Err(ClientError::Auth(format!(
                "Please log in to open {redirect}."
            )));
        }
        NavigationDecision::RedirectHome => {
            return Err(ClientError::Validation(
                "Already logged in. Log out first.".to_string(),
            ));
        }
    }

    let requires_auth = find_route(route)
        .is_some_and(|route| route.access == RouteAccess::AuthRequired);
    if requires_auth
        && state.session.ensure_fresh_session().await == RestoreOutcome::ReauthenticationRequired
    {
        return Err(ClientError::Auth(SESSION_EXPIRED_MESSAGE.to_string()));
    }
    Ok(())
}

pub async fn login_impl(
    state: &AppState,
    email: String,
    password: String,
) -> Result<SessionSnapshot, ClientError> {
    enter_route(state, LOGIN_PATH).await?;
    let user = state
        .session
        .login(&LoginCredentials { email, password })
        .await?;
    state.log_info("login", &format!("logged in as {}", user.id));
    Ok(state.session.snapshot())
}

pub async fn register_impl(
    state: &AppState,
    info: RegisterInfo,
) -> Result<SessionSnapshot, ClientError> {
    enter_route(state, REGISTER_PATH).await?;
    let user = state.session.register(&info).await?;
    state.log_info("register", &format!("registered {}", user.id));
    Ok(state.session.snapshot())
}

pub async fn logout_impl(state: &AppState) -> Result<SessionSnapshot, ClientError> {
    enter_route(state, HOME_PATH).await?;
    state.session.logout();
    Ok(state.session.snapshot())
}

pub async fn whoami_impl(state: &AppState) -> Result<SessionSnapshot, ClientError> {
    enter_route(state, HOME_PATH).await?;
    Ok(state.session.snapshot())
}

pub async fn overview_impl(state: &AppState) -> Result<OverviewResponse, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    let fetched = state.cache.fetch_initial().await;
    let failures = [fetched.tasks, fetched.categories, fetched.priorities]
        .into_iter()
        .filter_map(Result::err)
        .map(|error| error.to_string())
        .collect();
    Ok(OverviewResponse {
        session: state.session.snapshot(),
        data: state.cache.snapshot(),
        failures,
    })
}

pub async fn list_tasks_impl(
    state: &AppState,
    filter: TaskFilter,
) -> Result<Vec<Task>, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.fetch_tasks().await?;
    state.cache.set_filter(filter);
    Ok(state.cache.filtered_tasks())
}

pub async fn show_task_impl(state: &AppState, id: String) -> Result<Task, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.get_task_for_edit(&id).await
}

pub async fn create_task_impl(state: &AppState, input: TaskCreate) -> Result<Task, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    let task = state.cache.create_task(&input).await?;
    state.log_info("create_task", &format!("created task {}", task.id));
    Ok(task)
}

/// Sends the cached task with `changes` laid over it, so fields the caller
/// leaves unset keep their current server value.
pub async fn update_task_impl(
    state: &AppState,
    changes: TaskUpdate,
) -> Result<Option<Task>, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.fetch_tasks().await?;
    let current = state
        .cache
        .tasks()
        .into_iter()
        .find(|task| task.id == changes.id)
        .ok_or_else(|| ClientError::NotFoundLocal(TASK_NOT_FOUND_MESSAGE.to_string()))?;
    state.cache.update_task(&changes.overlaid_on(&current)).await
}

pub async fn delete_task_impl(
    state: &AppState,
    id: String,
) -> Result<DeleteResponse, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.delete_task(&id).await?;
    Ok(DeleteResponse { id, deleted: true })
}

pub async fn toggle_task_impl(
    state: &AppState,
    id: String,
    field: ToggleField,
) -> Result<ToggleResponse, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.fetch_tasks().await?;
    let outcome = match field {
        ToggleField::Completed => state.cache.toggle_completed(&id).await?,
        ToggleField::Archived => state.cache.toggle_archived(&id).await?,
    };
    if outcome == ToggleOutcome::RolledBack {
        tracing::warn!(task_id = %id, ?field, "toggle rolled back");
    }
    let task = state.cache.tasks().into_iter().find(|task| task.id == id);
    Ok(ToggleResponse { id, outcome, task })
}

pub async fn list_categories_impl(state: &AppState) -> Result<Vec<Category>, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.fetch_categories().await?;
    Ok(state.cache.categories())
}

pub async fn create_category_impl(
    state: &AppState,
    input: CategoryCreate,
) -> Result<Category, ClientError> {
    enter_route(state, CREATE_CATEGORY_PATH).await?;
    state.cache.create_category(&input).await
}

pub async fn update_category_impl(
    state: &AppState,
    id: String,
    changes: LabelChanges,
) -> Result<Option<Category>, ClientError> {
    enter_route(state, CREATE_CATEGORY_PATH).await?;
    state.cache.fetch_categories().await?;
    let current = state
        .cache
        .category_by_id(&id)
        .ok_or_else(|| ClientError::NotFoundLocal("Category not found.".to_string()))?;
    let edit = CategoryEdit {
        id,
        name: changes.name.unwrap_or(current.name),
        sort_order: changes.sort_order.unwrap_or(current.sort_order),
        tag: changes.tag.or(current.tag),
        synced_at: Some(current.synced_at),
    };
    state.cache.update_category(&edit).await
}

pub async fn delete_category_impl(
    state: &AppState,
    id: String,
) -> Result<DeleteResponse, ClientError> {
    enter_route(state, CREATE_CATEGORY_PATH).await?;
    state.cache.delete_category(&id).await?;
    Ok(DeleteResponse { id, deleted: true })
}

pub async fn list_priorities_impl(state: &AppState) -> Result<Vec<Priority>, ClientError> {
    enter_route(state, TODOS_PATH).await?;
    state.cache.fetch_priorities().await?;
    Ok(state.cache.priorities())
}

pub async fn create_priority_impl(
    state: &AppState,
    input: PriorityCreate,
) -> Result<Priority, ClientError> {
    enter_route(state, CREATE_PRIORITY_PATH).await?;
    state.cache.create_priority(&input).await
}

pub async fn update_priority_impl(
    state: &AppState,
    id: String,
    changes: LabelChanges,
) -> Result<Option<Priority>, ClientError> {
    enter_route(state, CREATE_PRIORITY_PATH).await?;
    state.cache.fetch_priorities().await?;
    let current = state
        .cache
        .priority_by_id(&id)
        .ok_or_else(|| ClientError::NotFoundLocal("Priority not found.".to_string()))?;
    let edit = PriorityEdit {
        id,
        name: changes.name.unwrap_or(current.name),
        sort_order: changes.sort_order.unwrap_or(current.sort_order),
        tag: changes.tag.or(current.tag),
        synced_at: Some(current.synced_at),
    };
    state.cache.update_priority(&edit).await
}

pub async fn delete_priority_impl(
    state: &AppState,
    id: String,
) -> Result<DeleteResponse, ClientError> {
    enter_route(state, CREATE_PRIORITY_PATH).await?;
    state.cache.delete_priority(&id).await?;
    Ok(DeleteResponse { id, deleted: true })
}

pub fn list_words_impl(state: &AppState) -> Result<WordsResponse, ClientError> {
    Ok(WordsResponse {
        words: state.policy.words(),
    })
}

pub fn add_word_impl(state: &AppState, word: String) -> Result<WordsResponse, ClientError> {
    state.policy.add(&word)?;
    list_words_impl(state)
}

pub fn remove_word_impl(state: &AppState, word: String) -> Result<WordsResponse, ClientError> {
    state.policy.remove(&word)?;
    list_words_impl(state)
}

pub fn reset_words_impl(state: &AppState) -> Result<WordsResponse, ClientError> {
    state.policy.reset_to_default()?;
    list_words_impl(state)
}
