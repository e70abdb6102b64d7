use crate::application::content_policy::ContentPolicy;
use crate::application::session::SessionListener;
use crate::domain::models::{
    filter_tasks, Category, CategoryCreate, CategoryEdit, Priority, PriorityCreate, PriorityEdit,
    Task, TaskCreate, TaskFilter, TaskUpdate,
};
use crate::infrastructure::error::ClientError;
use crate::infrastructure::storage::LocalStore;
use crate::infrastructure::todo_api_client::{RemoteResource, TodoApiClient};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub const TASK_NOT_FOUND_MESSAGE: &str = "Task not found.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "value")]
pub enum ToggleOutcome {
    /// The server accepted the flip; carries the new flag value.
    Applied(bool),
    RolledBack,
}

/// Per-collection results of [`ResourceCache::fetch_initial`].
#[derive(Debug)]
pub struct InitialFetch {
    pub tasks: Result<(), ClientError>,
    pub categories: Result<(), ClientError>,
    pub priorities: Result<(), ClientError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheSnapshot {
    pub tasks: Vec<Task>,
    pub filtered_tasks: Vec<Task>,
    pub categories: Vec<Category>,
    pub priorities: Vec<Priority>,
    pub selected_task: Option<Task>,
    pub filter: TaskFilter,
    pub tasks_loading: bool,
    pub categories_loading: bool,
    pub priorities_loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct CacheState {
    tasks: Vec<Task>,
    categories: Vec<Category>,
    priorities: Vec<Priority>,
    selected_task: Option<Task>,
    filter: TaskFilter,
    tasks_loading: bool,
    categories_loading: bool,
    priorities_loading: bool,
    error: Option<String>,
}

/// A remote resource mirrored in [`CacheState`].
trait CachedResource: RemoteResource + Clone {
    /// Capitalized noun used in content policy messages.
    const LABEL: &'static str;

    fn id(&self) -> &str;
    fn merge(&mut self, updated: Self);
    fn apply_update(&mut self, update: &Self::Update);
    fn collection(state: &mut CacheState) -> &mut Vec<Self>;
    fn loading(state: &mut CacheState) -> &mut bool;
}

impl CachedResource for Task {
    const LABEL: &'static str = "Task";

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, updated: Self) {
        self.merge_from(updated);
    }

    fn apply_update(&mut self, update: &TaskUpdate) {
        update.apply_to(self);
    }

    fn collection(state: &mut CacheState) -> &mut Vec<Self> {
        &mut state.tasks
    }

    fn loading(state: &mut CacheState) -> &mut bool {
        &mut state.tasks_loading
    }
}

impl CachedResource for Category {
    const LABEL: &'static str = "Category";

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, updated: Self) {
        *self = updated;
    }

    fn apply_update(&mut self, update: &CategoryEdit) {
        update.apply_to(self);
    }

    fn collection(state: &mut CacheState) -> &mut Vec<Self> {
        &mut state.categories
    }

    fn loading(state: &mut CacheState) -> &mut bool {
        &mut state.categories_loading
    }
}

impl CachedResource for Priority {
    const LABEL: &'static str = "Priority";

    fn id(&self) -> &str {
        &self.id
    }

    fn merge(&mut self, updated: Self) {
        *self = updated;
    }

    fn apply_update(&mut self, update: &PriorityEdit) {
        update.apply_to(self);
    }

    fn collection(state: &mut CacheState) -> &mut Vec<Self> {
        &mut state.priorities
    }

    fn loading(state: &mut CacheState) -> &mut bool {
        &mut state.priorities_loading
    }
}

/// Client-side mirror of the user's tasks, categories and priorities.
///
/// State is only locked between gateway calls, so concurrent operations
/// interleave at their awaits and the last write wins.
pub struct ResourceCache<A, L>
where
    A: TodoApiClient,
    L: LocalStore + ?Sized,
{
    api: Arc<A>,
    policy: Arc<ContentPolicy<L>>,
    state: Mutex<CacheState>,
}

impl<A, L> ResourceCache<A, L>
where
    A: TodoApiClient,
    L: LocalStore + ?Sized,
{
    pub fn new(api: Arc<A>, policy: Arc<ContentPolicy<L>>) -> Self {
        Self {
            api,
            policy,
            state: Mutex::new(CacheState::default()),
        }
    }

    pub async fn fetch_tasks(&self) -> Result<(), ClientError> {
        self.fetch::<Task>().await
    }

    pub async fn fetch_categories(&self) -> Result<(), ClientError> {
        self.fetch::<Category>().await
    }

    pub async fn fetch_priorities(&self) -> Result<(), ClientError> {
        self.fetch::<Priority>().await
    }

    /// Loads all three collections concurrently. One failing collection
    /// does not stop the others.
    pub async fn fetch_initial(&self) -> InitialFetch {
        {
            let mut state = self.lock_state();
            state.tasks_loading = true;
            state.categories_loading = true;
            state.priorities_loading = true;
            state.error = None;
        }
        let (tasks, categories, priorities) = tokio::join!(
            self.fetch_inner::<Task>(false),
            self.fetch_inner::<Category>(false),
            self.fetch_inner::<Priority>(false)
        );
        InitialFetch {
            tasks,
            categories,
            priorities,
        }
    }

    pub async fn create_task(&self, input: &TaskCreate) -> Result<Task, ClientError> {
        self.create::<Task>(&input.name, input).await
    }

    pub async fn create_category(&self, input: &CategoryCreate) -> Result<Category, ClientError> {
        self.create::<Category>(&input.name, input).await
    }

    pub async fn create_priority(&self, input: &PriorityCreate) -> Result<Priority, ClientError> {
        self.create::<Priority>(&input.name, input).await
    }

    /// Sends the update and merges the result into the list and the
    /// selected-for-edit slot. Returns `None` when the task is not cached
    /// and the server answered without a body.
    pub async fn update_task(&self, update: &TaskUpdate) -> Result<Option<Task>, ClientError> {
        let updated = self
            .update::<Task>(&update.id, update.name.as_deref(), update)
            .await?;

        let mut state = self.lock_state();
        if let Some(selected) = state
            .selected_task
            .as_mut()
            .filter(|selected| selected.id == update.id)
        {
            match &updated {
                Some(task) => selected.merge_from(task.clone()),
                None => update.apply_to(selected),
            }
        }
        Ok(updated)
    }

    pub async fn delete_task(&self, id: &str) -> Result<(), ClientError> {
        self.delete::<Task>(id).await?;
        let mut state = self.lock_state();
        if state
            .selected_task
            .as_ref()
            .is_some_and(|selected| selected.id == id)
        {
            state.selected_task = None;
        }
        Ok(())
    }

    pub async fn get_task_for_edit(&self, id: &str) -> Result<Task, ClientError> {
        {
            let mut state = self.lock_state();
            state.tasks_loading = true;
            state.error = None;
            state.selected_task = None;
        }
        let result = self.api.get::<Task>(id).await;

        let mut state = self.lock_state();
        state.tasks_loading = false;
        match result {
            Ok(task) => {
                state.selected_task = Some(task.clone());
                Ok(task)
            }
            Err(error) => {
                tracing::warn!(task_id = id, %error, "task for edit unavailable");
                state.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    /// Optimistically flips `completed`. A failed update restores the
    /// previous value without touching the error slot.
    pub async fn toggle_completed(&self, id: &str) -> Result<ToggleOutcome, ClientError> {
        let update = self.flip_task(id, |task| task.completed = !task.completed)?;
        let flipped = update.completed.unwrap_or_default();

        match self.api.update::<Task>(id, &update).await {
            Ok(_) => Ok(ToggleOutcome::Applied(flipped)),
            Err(error) => {
                tracing::warn!(task_id = id, %error, "completion toggle rolled back");
                self.restore_task(id, |task| task.completed = !flipped);
                Ok(ToggleOutcome::RolledBack)
            }
        }
    }

    /// Optimistically flips `archived` through [`Self::update_task`], so a
    /// failure is also reported in the error slot.
    pub async fn toggle_archived(&self, id: &str) -> Result<ToggleOutcome, ClientError> {
        let update = self.flip_task(id, |task| task.archived = !task.archived)?;
        let flipped = update.archived.unwrap_or_default();

        match self.update_task(&update).await {
            Ok(_) => Ok(ToggleOutcome::Applied(flipped)),
            Err(error) => {
                tracing::warn!(task_id = id, %error, "archive toggle rolled back");
                self.restore_task(id, |task| task.archived = !flipped);
                Ok(ToggleOutcome::RolledBack)
            }
        }
    }

    pub async fn update_category(
        &self,
        edit: &CategoryEdit,
    ) -> Result<Option<Category>, ClientError> {
        self.update::<Category>(&edit.id, Some(&edit.name), edit).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), ClientError> {
        self.delete::<Category>(id).await
    }

    pub async fn update_priority(
        &self,
        edit: &PriorityEdit,
    ) -> Result<Option<Priority>, ClientError> {
        self.update::<Priority>(&edit.id, Some(&edit.name), edit).await
    }

    pub async fn delete_priority(&self, id: &str) -> Result<(), ClientError> {
        self.delete::<Priority>(id).await
    }

    pub fn filtered_tasks(&self) -> Vec<Task> {
        let state = self.lock_state();
        filter_tasks(&state.tasks, &state.filter)
    }

    /// Merges `filter` into the current one; `None` fields keep their value.
    pub fn set_filter(&self, filter: TaskFilter) {
        let mut state = self.lock_state();
        if filter.completed.is_some() {
            state.filter.completed = filter.completed;
        }
        if filter.archived.is_some() {
            state.filter.archived = filter.archived;
        }
    }

    pub fn reset_filter(&self) {
        self.lock_state().filter = TaskFilter::default();
    }

    pub fn clear_error(&self) {
        self.lock_state().error = None;
    }

    pub fn error(&self) -> Option<String> {
        self.lock_state().error.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.lock_state().tasks.clone()
    }

    pub fn categories(&self) -> Vec<Category> {
        self.lock_state().categories.clone()
    }

    pub fn priorities(&self) -> Vec<Priority> {
        self.lock_state().priorities.clone()
    }

    pub fn selected_task(&self) -> Option<Task> {
        self.lock_state().selected_task.clone()
    }

    pub fn category_by_id(&self, id: &str) -> Option<Category> {
        self.lock_state()
            .categories
            .iter()
            .find(|category| category.id == id)
            .cloned()
    }

    pub fn priority_by_id(&self, id: &str) -> Option<Priority> {
        self.lock_state()
            .priorities
            .iter()
            .find(|priority| priority.id == id)
            .cloned()
    }

    /// Drops every cached collection together with the selected task and
    /// the error slot. The filter survives.
    pub fn clear_all(&self) {
        let mut state = self.lock_state();
        state.tasks.clear();
        state.categories.clear();
        state.priorities.clear();
        state.selected_task = None;
        state.error = None;
    }

    pub fn snapshot(&self) -> CacheSnapshot {
        let state = self.lock_state();
        CacheSnapshot {
            tasks: state.tasks.clone(),
            filtered_tasks: filter_tasks(&state.tasks, &state.filter),
            categories: state.categories.clone(),
            priorities: state.priorities.clone(),
            selected_task: state.selected_task.clone(),
            filter: state.filter,
            tasks_loading: state.tasks_loading,
            categories_loading: state.categories_loading,
            priorities_loading: state.priorities_loading,
            error: state.error.clone(),
        }
    }

    async fn fetch<R: CachedResource>(&self) -> Result<(), ClientError> {
        self.fetch_inner::<R>(true).await
    }

    /// `reset_error` is false when several fetches share one error slot and
    /// the caller has already cleared it.
    async fn fetch_inner<R: CachedResource>(&self, reset_error: bool) -> Result<(), ClientError> {
        if reset_error {
            self.begin::<R>();
        } else {
            *R::loading(&mut self.lock_state()) = true;
        }
        let result = self.api.list::<R>().await;

        let mut state = self.lock_state();
        *R::loading(&mut state) = false;
        match result {
            Ok(items) => {
                tracing::debug!(resource = R::PATH, count = items.len(), "collection fetched");
                *R::collection(&mut state) = items;
                Ok(())
            }
            Err(error) => {
                tracing::warn!(resource = R::PATH, %error, "collection fetch failed");
                R::collection(&mut state).clear();
                state.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn create<R: CachedResource>(
        &self,
        name: &str,
        input: &R::Create,
    ) -> Result<R, ClientError> {
        self.check_content::<R>(name)?;
        self.begin::<R>();
        let result = self.api.create::<R>(input).await;

        let mut state = self.lock_state();
        *R::loading(&mut state) = false;
        match result {
            Ok(item) => {
                tracing::info!(resource = R::PATH, id = item.id(), "created");
                R::collection(&mut state).push(item.clone());
                Ok(item)
            }
            Err(error) => {
                tracing::warn!(resource = R::PATH, %error, "create failed");
                state.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn update<R: CachedResource>(
        &self,
        id: &str,
        name: Option<&str>,
        input: &R::Update,
    ) -> Result<Option<R>, ClientError> {
        if let Some(name) = name {
            self.check_content::<R>(name)?;
        }
        self.begin::<R>();
        let result = self.api.update::<R>(id, input).await;

        let mut state = self.lock_state();
        *R::loading(&mut state) = false;
        match result {
            Ok(reply) => {
                let cached = R::collection(&mut state)
                    .iter_mut()
                    .find(|item| item.id() == id);
                let updated = match (cached, reply) {
                    (Some(cached), Some(reply)) => {
                        cached.merge(reply);
                        Some(cached.clone())
                    }
                    (Some(cached), None) => {
                        cached.apply_update(input);
                        Some(cached.clone())
                    }
                    (None, reply) => reply,
                };
                tracing::info!(resource = R::PATH, id, "updated");
                Ok(updated)
            }
            Err(error) => {
                tracing::warn!(resource = R::PATH, id, %error, "update failed");
                state.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    async fn delete<R: CachedResource>(&self, id: &str) -> Result<(), ClientError> {
        self.begin::<R>();
        let result = self.api.delete::<R>(id).await;

        let mut state = self.lock_state();
        *R::loading(&mut state) = false;
        match result {
            Ok(()) => {
                tracing::info!(resource = R::PATH, id, "deleted");
                R::collection(&mut state).retain(|item| item.id() != id);
                Ok(())
            }
            Err(error) => {
                tracing::warn!(resource = R::PATH, id, %error, "delete failed");
                state.error = Some(error.to_string());
                Err(error)
            }
        }
    }

    fn begin<R: CachedResource>(&self) {
        let mut state = self.lock_state();
        *R::loading(&mut state) = true;
        state.error = None;
    }

    fn check_content<R: CachedResource>(&self, name: &str) -> Result<(), ClientError> {
        if !self.policy.is_prohibited(name) {
            return Ok(());
        }
        let message = format!("{} name contains prohibited words.", R::LABEL);
        tracing::info!(resource = R::PATH, "rejected by content policy");
        self.lock_state().error = Some(message.clone());
        Err(ClientError::Validation(message))
    }

    /// Applies `flip` to the cached task and returns the full update to send.
    fn flip_task<F>(&self, id: &str, flip: F) -> Result<TaskUpdate, ClientError>
    where
        F: FnOnce(&mut Task),
    {
        let mut state = self.lock_state();
        match state.tasks.iter_mut().find(|task| task.id == id) {
            Some(task) => {
                flip(task);
                Ok(TaskUpdate::from_task(task))
            }
            None => {
                state.error = Some(TASK_NOT_FOUND_MESSAGE.to_string());
                Err(ClientError::NotFoundLocal(TASK_NOT_FOUND_MESSAGE.to_string()))
            }
        }
    }

    /// Reverts a flip if the task is still cached after the await.
    fn restore_task<F>(&self, id: &str, restore: F)
    where
        F: FnOnce(&mut Task),
    {
        if let Some(task) = self.lock_state().tasks.iter_mut().find(|task| task.id == id) {
            restore(task);
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, CacheState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<A, L> SessionListener for ResourceCache<A, L>
where
    A: TodoApiClient,
    L: LocalStore + ?Sized,
{
    fn on_session_cleared(&self) {
        self.clear_all();
    }
}
