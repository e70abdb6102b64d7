pub mod application;
pub mod domain;
pub mod infrastructure;

use application::commands::{
    add_word_impl, create_category_impl, create_priority_impl, create_task_impl,
    delete_category_impl, delete_priority_impl, delete_task_impl, list_categories_impl,
    list_priorities_impl, list_tasks_impl, list_words_impl, login_impl, logout_impl,
    overview_impl, register_impl, remove_word_impl, reset_words_impl, show_task_impl,
    toggle_task_impl, update_category_impl, update_priority_impl, update_task_impl,
    whoami_impl, AppState, LabelChanges, ToggleField,
};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use domain::models::{
    wire, CategoryCreate, PriorityCreate, RegisterInfo, TaskCreate, TaskFilter, TaskUpdate,
};
use infrastructure::error::ClientError;
use serde::Serialize;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

const LOG_FILTER_ENV: &str = "TODO_CLIENT_LOG";
const COMMAND_LOG: &str = "commands.log";

#[derive(Debug, Parser)]
#[command(name = "todo-client", version, about = "Command-line client for the TodoTasks REST API")]
pub struct Cli {
    /// Directory holding config/, state/ and logs/. Defaults to the current directory.
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },
    Logout,
    /// Shows the current session, restoring it from storage if needed.
    Whoami,
    /// Loads tasks, categories and priorities in one go.
    Overview,
    #[command(subcommand)]
    Tasks(TaskCommand),
    #[command(subcommand)]
    Categories(LabelCommand),
    #[command(subcommand)]
    Priorities(LabelCommand),
    /// Manages the local prohibited word list.
    #[command(subcommand)]
    Words(WordCommand),
}

#[derive(Debug, Subcommand)]
pub enum TaskCommand {
    List {
        #[arg(long)]
        completed: Option<bool>,
        #[arg(long)]
        archived: Option<bool>,
    },
    Show {
        id: String,
    },
    Create {
        name: String,
        #[arg(long)]
        category: String,
        #[arg(long)]
        priority: String,
        /// RFC 3339 or `YYYY-MM-DDTHH:MM:SS` (UTC).
        #[arg(long)]
        due: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        priority: Option<String>,
        #[arg(long)]
        due: Option<String>,
    },
    Delete {
        id: String,
    },
    ToggleCompleted {
        id: String,
    },
    ToggleArchived {
        id: String,
    },
}

/// Shared by categories and priorities.
#[derive(Debug, Subcommand)]
pub enum LabelCommand {
    List,
    Create {
        name: String,
        #[arg(long, default_value_t = 0)]
        sort: i32,
        #[arg(long)]
        tag: Option<String>,
    },
    Update {
        id: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        sort: Option<i32>,
        #[arg(long)]
        tag: Option<String>,
    },
    Delete {
        id: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum WordCommand {
    List,
    Add { word: String },
    Remove { word: String },
    Reset,
}

impl Command {
    fn name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::Register { .. } => "register",
            Self::Logout => "logout",
            Self::Whoami => "whoami",
            Self::Overview => "overview",
            Self::Tasks(command) => match command {
                TaskCommand::List { .. } => "list_tasks",
                TaskCommand::Show { .. } => "show_task",
                TaskCommand::Create { .. } => "create_task",
                TaskCommand::Update { .. } => "update_task",
                TaskCommand::Delete { .. } => "delete_task",
                TaskCommand::ToggleCompleted { .. } => "toggle_task_completed",
                TaskCommand::ToggleArchived { .. } => "toggle_task_archived",
            },
            Self::Categories(command) => match command {
                LabelCommand::List => "list_categories",
                LabelCommand::Create { .. } => "create_category",
                LabelCommand::Update { .. } => "update_category",
                LabelCommand::Delete { .. } => "delete_category",
            },
            Self::Priorities(command) => match command {
                LabelCommand::List => "list_priorities",
                LabelCommand::Create { .. } => "create_priority",
                LabelCommand::Update { .. } => "update_priority",
                LabelCommand::Delete { .. } => "delete_priority",
            },
            Self::Words(command) => match command {
                WordCommand::List => "list_words",
                WordCommand::Add { .. } => "add_word",
                WordCommand::Remove { .. } => "remove_word",
                WordCommand::Reset => "reset_words",
            },
        }
    }
}

/// Runs one command and returns its JSON output, or the message to report.
pub async fn run(cli: Cli) -> Result<String, String> {
    let workspace_root = match cli.workspace {
        Some(path) => path,
        None => std::env::current_dir().map_err(|error| error.to_string())?,
    };
    let state = AppState::new(workspace_root).map_err(|error| error.to_string())?;
    init_logging(state.logs_dir());

    let name = cli.command.name();
    execute(&state, cli.command)
        .await
        .map_err(|error| state.command_error(name, &error))
}

/// Appends JSON lines to `logs/commands.log`. The filter is read from
/// `TODO_CLIENT_LOG` and defaults to `info`.
fn init_logging(logs_dir: &Path) {
    let filter = EnvFilter::try_from_env(LOG_FILTER_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let Ok(file) = OpenOptions::new()
        .create(true)
        .append(true)
        .open(logs_dir.join(COMMAND_LOG))
    else {
        return;
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .with_writer(Mutex::new(file))
        .try_init();
}

async fn execute(state: &AppState, command: Command) -> Result<String, ClientError> {
    match command {
        Command::Login { email, password } => render(login_impl(state, email, password).await?),
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => render(
            register_impl(
                state,
                RegisterInfo {
                    email,
                    password,
                    first_name,
                    last_name,
                },
            )
            .await?,
        ),
        Command::Logout => render(logout_impl(state).await?),
        Command::Whoami => render(whoami_impl(state).await?),
        Command::Overview => render(overview_impl(state).await?),
        Command::Tasks(command) => execute_task(state, command).await,
        Command::Categories(command) => match command {
            LabelCommand::List => render(list_categories_impl(state).await?),
            LabelCommand::Create { name, sort, tag } => render(
                create_category_impl(
                    state,
                    CategoryCreate {
                        name,
                        sort_order: sort,
                        tag,
                    },
                )
                .await?,
            ),
            LabelCommand::Update { id, name, sort, tag } => render(
                update_category_impl(
                    state,
                    id,
                    LabelChanges {
                        name,
                        sort_order: sort,
                        tag,
                    },
                )
                .await?,
            ),
            LabelCommand::Delete { id } => render(delete_category_impl(state, id).await?),
        },
        Command::Priorities(command) => match command {
            LabelCommand::List => render(list_priorities_impl(state).await?),
            LabelCommand::Create { name, sort, tag } => render(
                create_priority_impl(
                    state,
                    PriorityCreate {
                        name,
                        sort_order: sort,
                        tag,
                    },
                )
                .await?,
            ),
            LabelCommand::Update { id, name, sort, tag } => render(
                update_priority_impl(
                    state,
                    id,
                    LabelChanges {
                        name,
                        sort_order: sort,
                        tag,
                    },
                )
                .await?,
            ),
            LabelCommand::Delete { id } => render(delete_priority_impl(state, id).await?),
        },
        Command::Words(command) => match command {
            WordCommand::List => render(list_words_impl(state)?),
            WordCommand::Add { word } => render(add_word_impl(state, word)?),
            WordCommand::Remove { word } => render(remove_word_impl(state, word)?),
            WordCommand::Reset => render(reset_words_impl(state)?),
        },
    }
}

async fn execute_task(state: &AppState, command: TaskCommand) -> Result<String, ClientError> {
    match command {
        TaskCommand::List {
            completed,
            archived,
        } => render(list_tasks_impl(state, TaskFilter { completed, archived }).await?),
        TaskCommand::Show { id } => render(show_task_impl(state, id).await?),
        TaskCommand::Create {
            name,
            category,
            priority,
            due,
        } => {
            let input = TaskCreate {
                name,
                category_id: category,
                priority_id: priority,
                due_at: parse_due(due.as_deref())?,
            };
            render(create_task_impl(state, input).await?)
        }
        TaskCommand::Update {
            id,
            name,
            category,
            priority,
            due,
        } => {
            let update = TaskUpdate {
                id,
                name,
                category_id: category,
                priority_id: priority,
                due_at: parse_due(due.as_deref())?,
                ..TaskUpdate::default()
            };
            render(update_task_impl(state, update).await?)
        }
        TaskCommand::Delete { id } => render(delete_task_impl(state, id).await?),
        TaskCommand::ToggleCompleted { id } => {
            render(toggle_task_impl(state, id, ToggleField::Completed).await?)
        }
        TaskCommand::ToggleArchived { id } => {
            render(toggle_task_impl(state, id, ToggleField::Archived).await?)
        }
    }
}

fn parse_due(raw: Option<&str>) -> Result<Option<DateTime<Utc>>, ClientError> {
    raw.map(|raw| {
        wire::parse_timestamp(raw)
            .ok_or_else(|| ClientError::Validation(format!("invalid due date '{raw}'")))
    })
    .transpose()
}

fn render<T: Serialize>(value: T) -> Result<String, ClientError> {
    Ok(serde_json::to_string_pretty(&value)?)
}
