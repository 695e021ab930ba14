//! taskray CLI - command-line shell over the taskray core
//!
//! Authenticates, runs poll cycles, watches update events, and reads the
//! cached task/project/user lists that the menu-bar shell renders.

mod keyring_store;

use std::env;
use std::io::{self, BufRead, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::aot::Generator;
use clap_complete::{generate, shells};
use serde::Serialize;
use taskray_core::api::{ApiClient, ApiError};
use taskray_core::credentials::{CredentialError, CredentialStore};
use taskray_core::models::{clamp_poll_minutes, Task};
use taskray_core::sync::{Filterable, PollScheduler, SyncEngine, SyncEvent};
use taskray_core::Store;
use thiserror::Error;

use keyring_store::KeyringCredentialStore;

#[derive(Parser)]
#[command(name = "taskray")]
#[command(about = "Menu-bar companion for Asana, from the terminal")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Optional path to the local database file
    #[arg(long, value_name = "PATH")]
    db_path: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the API token
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },
    /// Run one poll cycle now
    Sync,
    /// Poll on the configured interval and print updates until Ctrl-C
    Watch,
    /// List cached tasks (pinned first)
    Tasks {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached projects (pinned first)
    Projects {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List cached workspace members
    Users {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a task's activity feed (fetched on demand)
    Comments {
        /// Task GID from the cached task list
        task_gid: String,
    },
    /// Mark a task's activity as seen at its current modified-timestamp
    Seen {
        /// Task GID from the cached task list
        task_gid: String,
    },
    /// Inspect or change settings
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
    /// Generate shell completion scripts
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
        /// Optional output path (stdout when omitted)
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum AuthCommands {
    /// Store a personal access token in the OS keyring and verify it
    Login {
        /// Token value; read from stdin when omitted
        token: Option<String>,
    },
    /// Check whether the stored token is valid
    Status,
    /// Remove the stored token
    Logout,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Print the current settings
    Show,
    /// Update one setting (list values are comma-separated)
    Set { key: String, value: String },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Core(#[from] taskray_core::Error),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Credential(#[from] CredentialError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("No token provided")]
    EmptyToken,
    #[error("Sync failed: {0}")]
    SyncFailed(String),
    #[error("Unrecognized setting key: {0}")]
    UnknownSettingKey(String),
    #[error("Invalid value for {key}: {reason}")]
    InvalidSettingValue { key: String, reason: String },
    #[error("Task not found in the local cache: {0}")]
    TaskNotFound(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
}

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        eprintln!("Error: {error}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("taskray=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let db_path = resolve_db_path(cli.db_path);

    match cli.command {
        Commands::Auth { command } => match command {
            AuthCommands::Login { token } => run_auth_login(token).await?,
            AuthCommands::Status => run_auth_status().await?,
            AuthCommands::Logout => run_auth_logout()?,
        },
        Commands::Sync => run_sync(&db_path).await?,
        Commands::Watch => run_watch(&db_path).await?,
        Commands::Tasks { json } => run_tasks(json, &db_path).await?,
        Commands::Projects { json } => run_projects(json, &db_path).await?,
        Commands::Users { json } => run_users(json, &db_path).await?,
        Commands::Comments { task_gid } => run_comments(&task_gid).await?,
        Commands::Seen { task_gid } => run_seen(&task_gid, &db_path).await?,
        Commands::Config { command } => match command {
            ConfigCommands::Show => run_config_show(&db_path).await?,
            ConfigCommands::Set { key, value } => run_config_set(&key, &value, &db_path).await?,
        },
        Commands::Completions { shell, output } => run_completions(shell, output.as_deref())?,
    }

    Ok(())
}

async fn run_auth_login(token_arg: Option<String>) -> Result<(), CliError> {
    let token = resolve_token_input(token_arg)?;

    let credentials = KeyringCredentialStore::default();
    credentials.store_token(&token)?;

    let api = ApiClient::new(credentials)?;
    let check = api.verify_credential().await?;
    if check.valid {
        println!("Token saved; {}", check.detail);
    } else {
        println!("Token saved, but verification failed: {}", check.detail);
    }
    Ok(())
}

async fn run_auth_status() -> Result<(), CliError> {
    let api = ApiClient::new(KeyringCredentialStore::default())?;
    let check = api.verify_credential().await?;
    if check.valid {
        println!("{}", check.detail);
    } else {
        println!("Not authenticated: {}", check.detail);
    }
    Ok(())
}

fn run_auth_logout() -> Result<(), CliError> {
    KeyringCredentialStore::default().clear_token()?;
    println!("Token removed from the keyring");
    Ok(())
}

async fn run_sync(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let api = ApiClient::new(KeyringCredentialStore::default())?;
    let (engine, mut events) = SyncEngine::new(api, store.clone());

    engine.poll_once().await;
    let outcome = events.try_recv().ok();
    store.flush().await?;

    match outcome {
        Some(SyncEvent::Updated { tasks, projects }) => {
            println!("Synced {} tasks and {} projects", tasks.len(), projects.len());
            Ok(())
        }
        Some(SyncEvent::Error { message }) => Err(CliError::SyncFailed(message)),
        None => {
            println!("Sync skipped: another cycle is in flight");
            Ok(())
        }
    }
}

async fn run_watch(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let settings = store.settings().await?;
    let api = ApiClient::new(KeyringCredentialStore::default())?;
    let (engine, mut events) = SyncEngine::new(api, store.clone());

    let mut scheduler = PollScheduler::new(engine);
    scheduler.start(settings.poll_interval_minutes);
    println!(
        "Polling every {} minute(s); press Ctrl-C to stop.",
        clamp_poll_minutes(settings.poll_interval_minutes)
    );

    loop {
        tokio::select! {
            maybe_event = events.recv() => match maybe_event {
                Some(SyncEvent::Updated { tasks, projects }) => {
                    println!(
                        "{}  updated: {} tasks, {} projects",
                        Utc::now().format("%H:%M:%S"),
                        tasks.len(),
                        projects.len()
                    );
                }
                Some(SyncEvent::Error { message }) => {
                    println!(
                        "{}  sync error: {message} (keeping the last snapshot)",
                        Utc::now().format("%H:%M:%S")
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    scheduler.stop();
    store.flush().await?;
    Ok(())
}

#[derive(Debug, Serialize)]
struct TaskListItem {
    gid: String,
    name: String,
    assignee: Option<String>,
    due: Option<String>,
    modified_at: DateTime<Utc>,
    new_activity: bool,
    pinned: bool,
}

async fn run_tasks(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let settings = store.settings().await?;
    let seen = store.seen_timestamps().await?;

    let tasks = order_pinned_first(store.cached_tasks().await?, &settings.pinned_task_gids);
    let items: Vec<TaskListItem> = tasks
        .iter()
        .map(|task| TaskListItem {
            gid: task.gid.clone(),
            name: task.name.clone(),
            assignee: task.assignee.as_ref().map(|user| user.name.clone()),
            due: due_label(task),
            modified_at: task.modified_at,
            new_activity: task.has_new_activity(seen.get(&task.gid)),
            pinned: settings.pinned_task_gids.contains(&task.gid),
        })
        .collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for line in format_task_lines(&items) {
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct ProjectListItem {
    gid: String,
    name: String,
    color: Option<String>,
    status: Option<String>,
    pinned: bool,
}

async fn run_projects(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let settings = store.settings().await?;

    let projects =
        order_pinned_first(store.cached_projects().await?, &settings.pinned_project_gids);
    let items: Vec<ProjectListItem> = projects
        .iter()
        .map(|project| ProjectListItem {
            gid: project.gid.clone(),
            name: project.name.clone(),
            color: project.color.as_ref().map(enum_label),
            status: project
                .current_status
                .as_ref()
                .map(|status| status.title.clone()),
            pinned: settings.pinned_project_gids.contains(&project.gid),
        })
        .collect();

    if as_json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let status = item.status.as_deref().unwrap_or("-");
            println!("{:<18}  {:<40}  {status}", item.gid, truncate(&item.name, 40));
        }
    }
    Ok(())
}

async fn run_users(as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let users = store.cached_users().await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&users)?);
    } else {
        for user in &users {
            let email = user.email.as_deref().unwrap_or("-");
            println!("{:<18}  {:<30}  {email}", user.gid, truncate(&user.name, 30));
        }
    }
    Ok(())
}

async fn run_comments(task_gid: &str) -> Result<(), CliError> {
    let api = ApiClient::new(KeyringCredentialStore::default())?;

    // A failed lazy fetch degrades to an empty view; it never becomes a
    // hard failure the way a poll-cycle error does.
    let stories = match api.task_stories(task_gid).await {
        Ok(stories) => stories,
        Err(error @ (ApiError::MissingCredential | ApiError::Credential(_))) => {
            return Err(error.into());
        }
        Err(error) => {
            tracing::warn!("activity fetch for {task_gid} failed: {error}");
            println!("(no activity available)");
            return Ok(());
        }
    };

    if stories.is_empty() {
        println!("(no activity)");
    }
    for story in &stories {
        let author = story
            .created_by
            .as_ref()
            .map_or("system", |user| user.name.as_str());
        let marker = if story.is_comment() { "*" } else { "-" };
        println!(
            "{}  {marker} {author}: {}",
            story.created_at.format("%Y-%m-%d %H:%M"),
            story.text
        );
    }
    Ok(())
}

async fn run_seen(task_gid: &str, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let tasks = store.cached_tasks().await?;

    let task = tasks
        .iter()
        .find(|task| task.gid == task_gid)
        .ok_or_else(|| CliError::TaskNotFound(task_gid.to_string()))?;

    store.set_seen_timestamp(task_gid, task.modified_at).await?;
    store.flush().await?;
    println!("Marked {task_gid} as seen at {}", task.modified_at.to_rfc3339());
    Ok(())
}

async fn run_config_show(db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path).await?;
    let settings = store.settings().await?;
    println!("{}", serde_json::to_string_pretty(&settings)?);
    Ok(())
}

async fn run_config_set(key: &str, value: &str, db_path: &Path) -> Result<(), CliError> {
    let pair = encode_setting(key, value)?;

    let store = open_store(db_path).await?;
    store.apply_settings(&[pair]).await?;
    store.flush().await?;
    println!("{key} updated; the change applies on the next poll");
    Ok(())
}

fn run_completions(shell: CompletionShell, output_path: Option<&Path>) -> Result<(), CliError> {
    let mut command = Cli::command();
    let mut buffer = Vec::new();

    match shell {
        CompletionShell::Bash => generate_for_shell(shells::Bash, &mut command, &mut buffer),
        CompletionShell::Zsh => generate_for_shell(shells::Zsh, &mut command, &mut buffer),
        CompletionShell::Fish => generate_for_shell(shells::Fish, &mut command, &mut buffer),
    }

    if let Some(path) = output_path {
        std::fs::write(path, &buffer)?;
        println!("{}", path.display());
    } else {
        io::stdout().write_all(&buffer)?;
    }

    Ok(())
}

fn generate_for_shell<G: Generator>(
    generator: G,
    command: &mut clap::Command,
    buffer: &mut Vec<u8>,
) {
    generate(generator, command, "taskray", buffer);
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keys the settings surface may write, and how to encode their values.
fn encode_setting(key: &str, value: &str) -> Result<(String, String), CliError> {
    let encoded = match key {
        "poll_interval_minutes" => {
            let minutes: u32 = value.trim().parse().map_err(|_| CliError::InvalidSettingValue {
                key: key.to_string(),
                reason: "expected a number of minutes".to_string(),
            })?;
            clamp_poll_minutes(minutes).to_string()
        }
        "current_user_gid" => value.trim().to_string(),
        "assignee_scope" => {
            let scope = value.trim().to_ascii_lowercase();
            if !matches!(scope.as_str(), "mine" | "selected" | "everyone") {
                return Err(CliError::InvalidSettingValue {
                    key: key.to_string(),
                    reason: "expected mine, selected, or everyone".to_string(),
                });
            }
            scope
        }
        "show_completed" => {
            let flag = value.trim().to_ascii_lowercase();
            if !matches!(flag.as_str(), "true" | "false") {
                return Err(CliError::InvalidSettingValue {
                    key: key.to_string(),
                    reason: "expected true or false".to_string(),
                });
            }
            flag
        }
        "selected_user_gids"
        | "task_include_names"
        | "task_exclude_gids"
        | "task_exclude_names"
        | "project_include_names"
        | "project_exclude_gids"
        | "project_exclude_names"
        | "pinned_task_gids"
        | "pinned_project_gids" => serde_json::to_string(&split_csv(value))?,
        _ => return Err(CliError::UnknownSettingKey(key.to_string())),
    };

    Ok((key.to_string(), encoded))
}

/// Split a comma-separated list, trimming entries and dropping empties.
fn split_csv(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// Stable partition: pinned items first, cache order otherwise.
fn order_pinned_first<T: Filterable>(items: Vec<T>, pinned_gids: &[String]) -> Vec<T> {
    let (mut pinned, rest): (Vec<T>, Vec<T>) = items
        .into_iter()
        .partition(|item| pinned_gids.iter().any(|gid| gid == item.gid()));
    pinned.extend(rest);
    pinned
}

fn due_label(task: &Task) -> Option<String> {
    if let Some(due_at) = task.due_at {
        return Some(due_at.format("%Y-%m-%d %H:%M").to_string());
    }
    task.due_on.map(|due_on| due_on.format("%Y-%m-%d").to_string())
}

fn format_task_lines(items: &[TaskListItem]) -> Vec<String> {
    items
        .iter()
        .map(|item| {
            let marker = if item.new_activity { '*' } else { ' ' };
            let due = item.due.as_deref().unwrap_or("");
            let assignee = item.assignee.as_deref().unwrap_or("-");
            format!(
                "{marker} {:<18}  {:<40}  {:<16}  {due}",
                item.gid,
                truncate(&item.name, 40),
                truncate(assignee, 16)
            )
        })
        .collect()
}

fn truncate(text: &str, max_chars: usize) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= max_chars {
        collapsed
    } else {
        let take_len = max_chars.saturating_sub(3);
        let mut truncated = collapsed.chars().take(take_len).collect::<String>();
        truncated.push_str("...");
        truncated
    }
}

fn enum_label<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value)
        .unwrap_or_default()
        .trim_matches('"')
        .to_string()
}

fn resolve_token_input(token_arg: Option<String>) -> Result<String, CliError> {
    if let Some(token) = normalize(&token_arg.unwrap_or_default()) {
        return Ok(token);
    }

    let stdin = io::stdin();
    if stdin.is_terminal() {
        eprint!("Paste your personal access token: ");
        io::stderr().flush()?;
        let mut line = String::new();
        stdin.lock().read_line(&mut line)?;
        return normalize(&line).ok_or(CliError::EmptyToken);
    }

    let mut buffer = String::new();
    stdin.lock().read_to_string(&mut buffer)?;
    normalize(&buffer).ok_or(CliError::EmptyToken)
}

fn normalize(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

async fn open_store(path: &Path) -> Result<Store, CliError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(Store::open(path).await?)
}

fn resolve_db_path(cli_db_path: Option<PathBuf>) -> PathBuf {
    cli_db_path
        .or_else(|| env::var_os("TASKRAY_DB_PATH").map(PathBuf::from))
        .unwrap_or_else(default_db_path)
}

fn default_db_path() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("taskray")
        .join("taskray.db")
}
