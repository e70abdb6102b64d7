use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
}

impl UserIdentity {
    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegisterInfo {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: String,
    #[serde(rename = "categoryName", default, deserialize_with = "wire::null_as_empty")]
    pub name: String,
    #[serde(rename = "categorySort")]
    pub sort_order: i32,
    #[serde(rename = "syncDt", with = "wire::timestamp")]
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Priority {
    pub id: String,
    #[serde(rename = "appUserId", default, deserialize_with = "wire::null_as_empty")]
    pub owner_user_id: String,
    #[serde(rename = "priorityName", default, deserialize_with = "wire::null_as_empty")]
    pub name: String,
    #[serde(rename = "prioritySort")]
    pub sort_order: i32,
    #[serde(rename = "syncDt", with = "wire::timestamp")]
    pub synced_at: DateTime<Utc>,
    #[serde(default)]
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: String,
    #[serde(rename = "taskName", default, deserialize_with = "wire::null_as_empty")]
    pub name: String,
    #[serde(rename = "taskSort")]
    pub sort_order: i32,
    #[serde(rename = "createdDt", with = "wire::timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(rename = "dueDt", default, with = "wire::optional_timestamp")]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(rename = "isCompleted")]
    pub completed: bool,
    #[serde(rename = "isArchived")]
    pub archived: bool,
    #[serde(rename = "todoCategoryId")]
    pub category_id: String,
    #[serde(rename = "todoPriorityId")]
    pub priority_id: String,
    #[serde(rename = "syncDt", with = "wire::timestamp")]
    pub synced_at: DateTime<Utc>,
    #[serde(rename = "todoCategory", default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(rename = "todoPriority", default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
}

impl Task {
    /// Merges a server reply into the cached copy. Navigation properties the
    /// reply leaves out are kept from the cached copy.
    pub fn merge_from(&mut self, updated: Task) {
        let category = updated.category.or_else(|| self.category.take());
        let priority = updated.priority.or_else(|| self.priority.take());
        *self = Task {
            category,
            priority,
            ..updated
        };
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskCreate {
    #[serde(rename = "taskName")]
    pub name: String,
    #[serde(rename = "todoCategoryId")]
    pub category_id: String,
    #[serde(rename = "todoPriorityId")]
    pub priority_id: String,
    #[serde(rename = "dueDt", default, with = "wire::optional_timestamp")]
    pub due_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskUpdate {
    pub id: String,
    #[serde(rename = "taskName", default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "todoCategoryId", default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
    #[serde(rename = "todoPriorityId", default, skip_serializing_if = "Option::is_none")]
    pub priority_id: Option<String>,
    #[serde(
        rename = "dueDt",
        default,
        skip_serializing_if = "Option::is_none",
        with = "wire::optional_timestamp"
    )]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(rename = "isCompleted", skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(rename = "isArchived", skip_serializing_if = "Option::is_none")]
    pub archived: Option<bool>,
    #[serde(rename = "taskSort", skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

impl TaskUpdate {
    /// Full update carrying every editable field of `task`.
    pub fn from_task(task: &Task) -> Self {
        Self {
            id: task.id.clone(),
            name: Some(task.name.clone()),
            category_id: Some(task.category_id.clone()),
            priority_id: Some(task.priority_id.clone()),
            due_at: task.due_at,
            completed: Some(task.completed),
            archived: Some(task.archived),
            sort_order: Some(task.sort_order),
        }
    }

    /// Full update for `task` with the fields set on `self` taking precedence.
    pub fn overlaid_on(&self, task: &Task) -> Self {
        let base = Self::from_task(task);
        Self {
            id: self.id.clone(),
            name: self.name.clone().or(base.name),
            category_id: self.category_id.clone().or(base.category_id),
            priority_id: self.priority_id.clone().or(base.priority_id),
            due_at: self.due_at.or(base.due_at),
            completed: self.completed.or(base.completed),
            archived: self.archived.or(base.archived),
            sort_order: self.sort_order.or(base.sort_order),
        }
    }

    pub fn apply_to(&self, task: &mut Task) {
        if let Some(name) = &self.name {
            task.name = name.clone();
        }
        if let Some(category_id) = &self.category_id {
            task.category_id = category_id.clone();
        }
        if let Some(priority_id) = &self.priority_id {
            task.priority_id = priority_id.clone();
        }
        if self.due_at.is_some() {
            task.due_at = self.due_at;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
        if let Some(archived) = self.archived {
            task.archived = archived;
        }
        if let Some(sort_order) = self.sort_order {
            task.sort_order = sort_order;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryCreate {
    #[serde(rename = "categoryName")]
    pub name: String,
    #[serde(rename = "categorySort")]
    pub sort_order: i32,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryEdit {
    pub id: String,
    #[serde(rename = "categoryName")]
    pub name: String,
    #[serde(rename = "categorySort")]
    pub sort_order: i32,
    pub tag: Option<String>,
    #[serde(rename = "syncDt", default, with = "wire::optional_timestamp")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl CategoryEdit {
    pub fn apply_to(&self, category: &mut Category) {
        category.name = self.name.clone();
        category.sort_order = self.sort_order;
        category.tag = self.tag.clone();
        if let Some(synced_at) = self.synced_at {
            category.synced_at = synced_at;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityCreate {
    #[serde(rename = "priorityName")]
    pub name: String,
    #[serde(rename = "prioritySort")]
    pub sort_order: i32,
    pub tag: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriorityEdit {
    pub id: String,
    #[serde(rename = "priorityName")]
    pub name: String,
    #[serde(rename = "prioritySort")]
    pub sort_order: i32,
    pub tag: Option<String>,
    #[serde(rename = "syncDt", default, with = "wire::optional_timestamp")]
    pub synced_at: Option<DateTime<Utc>>,
}

impl PriorityEdit {
    pub fn apply_to(&self, priority: &mut Priority) {
        priority.name = self.name.clone();
        priority.sort_order = self.sort_order;
        priority.tag = self.tag.clone();
        if let Some(synced_at) = self.synced_at {
            priority.synced_at = synced_at;
        }
    }
}

/// Display-time predicate over tasks. `None` matches any value.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TaskFilter {
    pub completed: Option<bool>,
    pub archived: Option<bool>,
}

impl TaskFilter {
    pub fn matches(&self, task: &Task) -> bool {
        let completed_match = self.completed.is_none_or(|value| value == task.completed);
        let archived_match = self.archived.is_none_or(|value| value == task.archived);
        completed_match && archived_match
    }
}

pub fn filter_tasks(tasks: &[Task], filter: &TaskFilter) -> Vec<Task> {
    let mut filtered = tasks
        .iter()
        .filter(|task| filter.matches(task))
        .cloned()
        .collect::<Vec<_>>();
    filtered.sort_by(|left, right| {
        left.sort_order
            .cmp(&right.sort_order)
            .then_with(|| left.created_at.cmp(&right.created_at))
    });
    filtered
}

/// The backend emits either RFC 3339 timestamps or offset-less ISO-8601
/// timestamps; the latter are read as UTC.
pub(crate) mod wire {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer};

    pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
            return Some(parsed.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }

    pub fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
    }

    pub mod timestamp {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &DateTime<Utc>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            serializer.serialize_str(&value.to_rfc3339())
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<DateTime<Utc>, D::Error> {
            let raw = String::deserialize(deserializer)?;
            super::parse_timestamp(&raw)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
        }
    }

    pub mod optional_timestamp {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            value: &Option<DateTime<Utc>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match value {
                Some(value) => serializer.serialize_str(&value.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<DateTime<Utc>>, D::Error> {
            let Some(raw) = Option::<String>::deserialize(deserializer)? else {
                return Ok(None);
            };
            if raw.trim().is_empty() {
                return Ok(None);
            }
            super::parse_timestamp(&raw)
                .map(Some)
                .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{raw}'")))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_task(id: &str, sort_order: i32, created_at: &str) -> Task {
        Task {
            id: id.to_string(),
            name: format!("task {id}"),
            sort_order,
            created_at: fixed_time(created_at),
            due_at: None,
            completed: false,
            archived: false,
            category_id: "cat-1".to_string(),
            priority_id: "pri-1".to_string(),
            synced_at: fixed_time("2026-02-16T08:00:00Z"),
            category: None,
            priority: None,
        }
    }

    #[test]
    fn filter_tasks_breaks_sort_ties_by_creation_time() {
        let mut done = sample_task("c", 1, "2026-02-16T07:00:00Z");
        done.completed = true;
        let tasks = vec![
            sample_task("a", 2, "2026-02-16T09:00:00Z"),
            sample_task("b", 1, "2026-02-16T10:00:00Z"),
            done,
            sample_task("d", 1, "2026-02-16T08:00:00Z"),
        ];

        let all = filter_tasks(&tasks, &TaskFilter::default());
        let ids = all.iter().map(|task| task.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["c", "d", "b", "a"]);

        let open = filter_tasks(
            &tasks,
            &TaskFilter {
                completed: Some(false),
                archived: None,
            },
        );
        let ids = open.iter().map(|task| task.id.as_str()).collect::<Vec<_>>();
        assert_eq!(ids, vec!["d", "b", "a"]);
    }

    fn arb_task() -> impl Strategy<Value = Task> {
        (
            "[a-z0-9]{1,8}",
            -3i32..3i32,
            0i64..10_000i64,
            any::<bool>(),
            any::<bool>(),
        )
            .prop_map(|(id, sort_order, created_offset, completed, archived)| {
                let mut task = sample_task(&id, sort_order, "2026-02-16T00:00:00Z");
                task.created_at += chrono::Duration::seconds(created_offset);
                task.completed = completed;
                task.archived = archived;
                task
            })
    }

    fn arb_filter() -> impl Strategy<Value = TaskFilter> {
        (prop::option::of(any::<bool>()), prop::option::of(any::<bool>()))
            .prop_map(|(completed, archived)| TaskFilter { completed, archived })
    }

    proptest! {
        #[test]
        fn filtered_tasks_match_predicates_and_are_sorted(
            tasks in prop::collection::vec(arb_task(), 0..24),
            filter in arb_filter()
        ) {
            let filtered = filter_tasks(&tasks, &filter);

            let expected_count = tasks.iter().filter(|task| filter.matches(task)).count();
            prop_assert_eq!(filtered.len(), expected_count);
            for task in &filtered {
                prop_assert!(filter.completed.is_none_or(|value| value == task.completed));
                prop_assert!(filter.archived.is_none_or(|value| value == task.archived));
            }
            for pair in filtered.windows(2) {
                let key_left = (pair[0].sort_order, pair[0].created_at);
                let key_right = (pair[1].sort_order, pair[1].created_at);
                prop_assert!(key_left <= key_right);
            }
        }
    }

    #[test]
    fn task_deserializes_backend_payload() {
        let payload = serde_json::json!({
            "id": "t-1",
            "taskName": null,
            "taskSort": 3,
            "createdDt": "2026-02-16T08:30:00.123",
            "dueDt": null,
            "isCompleted": true,
            "isArchived": false,
            "todoCategoryId": "c-1",
            "todoPriorityId": "p-1",
            "syncDt": "2026-02-16T08:30:00Z",
            "todoCategory": {
                "id": "c-1",
                "categoryName": "Home",
                "categorySort": 1,
                "syncDt": "2026-02-16T08:00:00Z",
                "tag": null
            }
        });

        let task: Task = serde_json::from_value(payload).expect("deserialize task");
        assert_eq!(task.name, "");
        assert_eq!(task.sort_order, 3);
        assert!(task.completed);
        assert_eq!(task.due_at, None);
        assert_eq!(task.created_at, fixed_time("2026-02-16T08:30:00.123Z"));
        assert_eq!(task.category.as_ref().map(|category| category.name.as_str()), Some("Home"));
        assert!(task.priority.is_none());
    }

    #[test]
    fn task_update_from_task_serializes_wire_names() {
        let mut task = sample_task("t-9", 4, "2026-02-16T08:00:00Z");
        task.archived = true;
        let update = TaskUpdate::from_task(&task);
        let value = serde_json::to_value(&update).expect("serialize update");

        assert_eq!(value["id"], "t-9");
        assert_eq!(value["taskName"], "task t-9");
        assert_eq!(value["isArchived"], true);
        assert_eq!(value["isCompleted"], false);
        assert_eq!(value["taskSort"], 4);
        assert!(value["dueDt"].is_null());
    }

    #[test]
    fn merge_from_keeps_cached_navigation_properties() {
        let mut cached = sample_task("t-1", 1, "2026-02-16T08:00:00Z");
        cached.category = Some(Category {
            id: "cat-1".to_string(),
            name: "Work".to_string(),
            sort_order: 0,
            synced_at: fixed_time("2026-02-16T08:00:00Z"),
            tag: None,
        });
        let mut reply = cached.clone();
        reply.category = None;
        reply.name = "renamed".to_string();

        cached.merge_from(reply);
        assert_eq!(cached.name, "renamed");
        assert!(cached.category.is_some());
    }

    #[test]
    fn task_update_apply_leaves_unset_fields() {
        let mut task = sample_task("t-1", 1, "2026-02-16T08:00:00Z");
        TaskUpdate {
            id: "t-1".to_string(),
            completed: Some(true),
            ..TaskUpdate::default()
        }
        .apply_to(&mut task);
        assert!(task.completed);
        assert_eq!(task.name, "task t-1");
        assert_eq!(task.sort_order, 1);
    }

    #[test]
    fn partial_task_update_omits_unset_fields_on_the_wire() {
        let update = TaskUpdate {
            id: "t1".to_string(),
            name: Some("renamed".to_string()),
            ..TaskUpdate::default()
        };
        let value = serde_json::to_value(&update).expect("serialize update");

        assert_eq!(
            value,
            serde_json::json!({ "id": "t1", "taskName": "renamed" })
        );
    }

    #[test]
    fn overlaid_update_keeps_cached_fields_the_edit_leaves_out() {
        let mut task = sample_task("t-1", 3, "2026-02-16T08:00:00Z");
        task.due_at = Some(fixed_time("2026-03-01T09:00:00Z"));
        let edit = TaskUpdate {
            id: "t-1".to_string(),
            name: Some("renamed".to_string()),
            ..TaskUpdate::default()
        };

        let full = edit.overlaid_on(&task);

        assert_eq!(full.name.as_deref(), Some("renamed"));
        assert_eq!(full.category_id.as_deref(), Some("cat-1"));
        assert_eq!(full.priority_id.as_deref(), Some("pri-1"));
        assert_eq!(full.due_at, task.due_at);
        assert_eq!(full.sort_order, Some(3));
        assert_eq!(full.completed, Some(false));
    }

    #[test]
    fn display_name_joins_first_and_last_name() {
        let user = UserIdentity {
            id: "u-1".to_string(),
            email: "a@b.com".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
        };
        assert_eq!(user.display_name(), "Ada Lovelace");
    }
}
