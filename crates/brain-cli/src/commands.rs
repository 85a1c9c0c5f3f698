//! CLI command implementations

use anyhow::{Result, bail};
use brain_core::config::{ConfigLocation, user_config_path};
use brain_core::sync::summarize_history;
use brain_core::{
    BrainClient, Config, PollerHandle, SessionStore, Status, SyncPoller, SyncSource, SyncState,
    SyncStatusRecord, TaskEditor, TaskFilter, TaskOrigin, TaskRecord, TaskStore,
};
use chrono::Utc;
use colored::{ColoredString, Colorize};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tabled::settings::Style;
use tabled::{Table, Tabled};

fn load_config() -> Result<Config> {
    let (config, _) = Config::resolve()?;
    if !config.display.colors {
        colored::control::set_override(false);
    }
    Ok(config)
}

async fn load_tasks(config: &Config) -> Result<(BrainClient, TaskStore)> {
    let client = BrainClient::from_config(config)?;
    let store = TaskStore::load(&client).await;
    tracing::debug!(origin = %store.origin(), count = store.len(), "tasks loaded");
    Ok((client, store))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let cut: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

fn status_colored(status: Status) -> ColoredString {
    let label = status.to_string();
    match status {
        Status::Pending => label.white(),
        Status::InProgress => label.yellow(),
        Status::Completed => label.green(),
        Status::Blocked => label.red(),
        Status::Cancelled => label.dimmed(),
    }
}

fn sync_state_colored(state: SyncState) -> ColoredString {
    match state {
        SyncState::Success => "✓ success".green(),
        SyncState::Error => "✗ error".red(),
        SyncState::Pending => "… pending".yellow(),
    }
}

fn origin_note(store: &TaskStore) -> String {
    match store.origin() {
        TaskOrigin::Remote => String::new(),
        TaskOrigin::Sample => format!(" {}", "(sample data)".yellow()),
    }
}

pub fn init() -> Result<()> {
    let root = std::env::current_dir()?;
    let path = Config::init_project(&root)?;
    println!("{} Initialized brainview in {}", "✓".green(), path.display());
    println!("  Edit [endpoints] to point at your backend.");
    Ok(())
}

#[derive(Tabled)]
struct TaskRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Priority")]
    priority: String,
    #[tabled(rename = "Progress")]
    progress: String,
    #[tabled(rename = "Phase")]
    phase: String,
    #[tabled(rename = "Assignee")]
    assignee: String,
    #[tabled(rename = "Title")]
    title: String,
}

impl TaskRow {
    fn new(task: &TaskRecord, max_title: usize) -> Self {
        Self {
            id: task.id.clone(),
            status: task.status.label().to_string(),
            priority: task.priority.label().to_string(),
            progress: format!("{}%", task.display_progress()),
            phase: task.phase_name.clone().unwrap_or_default(),
            assignee: task.assignee.clone().unwrap_or_default(),
            title: truncate(&task.title, max_title),
        }
    }
}

pub async fn tasks_list(
    status: Option<String>,
    priority: Option<String>,
    search: Option<String>,
    json: bool,
) -> Result<()> {
    let filter = TaskFilter::new()
        .with_status(TaskFilter::parse_status(status.as_deref().unwrap_or_default())?)
        .with_priority(TaskFilter::parse_priority(
            priority.as_deref().unwrap_or_default(),
        )?)
        .with_text(search.unwrap_or_default());

    let config = load_config()?;
    let (_, store) = load_tasks(&config).await?;
    let visible = store.view(&filter);

    if json {
        println!("{}", serde_json::to_string(&visible)?);
        return Ok(());
    }

    let project = store
        .project()
        .and_then(|p| p.name.clone())
        .unwrap_or_else(|| config.project_name.clone());
    println!(
        "{} {}/{} tasks{}",
        project.bold(),
        visible.len(),
        store.len(),
        origin_note(&store)
    );
    if !filter.is_identity() {
        println!("  {}", filter.to_string().dimmed());
    }

    if visible.is_empty() {
        println!("No tasks match");
    } else {
        let rows: Vec<_> = visible
            .iter()
            .map(|t| TaskRow::new(t, config.display.max_title_length))
            .collect();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
    }

    Ok(())
}

pub async fn tasks_show(id: &str, json: bool) -> Result<()> {
    let config = load_config()?;
    let (_, store) = load_tasks(&config).await?;
    let task = store
        .get(id)
        .ok_or_else(|| anyhow::anyhow!("Task not found: {}", id))?;

    if json {
        println!("{}", serde_json::to_string_pretty(task)?);
        return Ok(());
    }

    println!(
        "{} {}{}",
        task.id.cyan().bold(),
        task.title.bold(),
        origin_note(&store)
    );
    println!();
    println!("Status:   {}", status_colored(task.status));
    println!("Priority: {}", task.priority.label());
    println!("Progress: {}%", task.display_progress());
    if let Some(ref phase) = task.phase_name {
        println!("Phase:    {}", phase);
    }
    if let Some(ref assignee) = task.assignee {
        println!("Assignee: {}", assignee);
    }
    if let Some(ref due) = task.due_date {
        println!("Due:      {}", due);
    }
    if let Some(updated) = task.updated_at {
        println!(
            "Updated:  {}",
            config.display.format_time(updated)
        );
    }

    if !task.description.is_empty() {
        println!();
        println!("{}", "Description:".bold());
        println!("{}", task.description);
    }

    if !task.comments.is_empty() {
        println!();
        println!("{}", "Comments:".bold());
        for comment in &task.comments {
            println!(
                "  {} [{}] {}",
                config.display.format_time(comment.timestamp).dimmed(),
                comment.status_change,
                comment.comment
            );
        }
    }

    Ok(())
}

pub async fn tasks_stats(json: bool) -> Result<()> {
    let config = load_config()?;
    let (_, store) = load_tasks(&config).await?;
    let stats = store.stats();

    if json {
        println!("{}", serde_json::to_string(&stats)?);
        return Ok(());
    }

    println!("{}{}", "Task statistics".bold(), origin_note(&store));
    println!("  Total:       {}", stats.total);
    println!("  Completed:   {}", stats.completed.to_string().green());
    println!("  In progress: {}", stats.in_progress.to_string().yellow());
    println!("  Pending:     {}", stats.pending);
    println!("  Blocked:     {}", stats.blocked.to_string().red());
    println!("  Done:        {}%", stats.completion_percent);
    Ok(())
}

pub async fn tasks_set_status(
    id: &str,
    status: &str,
    comment: Option<String>,
    json: bool,
) -> Result<()> {
    let status: Status = status.parse()?;
    let config = load_config()?;
    let (client, mut store) = load_tasks(&config).await?;

    let mut editor = TaskEditor::new();
    let task = editor
        .commit_status(&mut store, &client, id, status, comment.as_deref())
        .await?;

    if json {
        println!("{}", serde_json::to_string(&task)?);
    } else {
        println!(
            "{} {} → {} ({}%)",
            "✓".green(),
            task.id,
            status_colored(task.status),
            task.display_progress()
        );
        if !client.updates_remotely() {
            println!(
                "  {}",
                "Kept locally; set endpoints.task_update_url to persist changes.".dimmed()
            );
        }
    }

    Ok(())
}

fn print_record(record: &SyncStatusRecord, config: &Config) {
    let fresh = record.is_fresh_success(Utc::now(), config.sync.poller_config().fresh_window);
    println!(
        "{}  {}{}",
        sync_state_colored(record.status),
        config.display.format_time(record.timestamp),
        if fresh {
            format!("  {}", "(just now)".green())
        } else {
            String::new()
        }
    );
    println!(
        "  Commit: {} {}",
        record.short_sha().cyan(),
        truncate(&record.commit_message, config.display.max_title_length)
    );
    if !record.author.is_empty() {
        println!("  Author: {}", record.author);
    }
    if !record.files_changed.is_empty() {
        println!("  Files:  {}", record.files_changed.join(", "));
    }
    if let Some(ref error) = record.error {
        println!("  Error:  {}", error.red());
    }
}

pub async fn sync_status(json: bool) -> Result<()> {
    let config = load_config()?;
    let client = BrainClient::from_config(&config)?;
    let latest = client.latest_status().await?;

    if json {
        println!("{}", serde_json::to_string(&latest)?);
        return Ok(());
    }

    match latest {
        Some(record) => print_record(&record, &config),
        None => println!("No sync history found"),
    }
    Ok(())
}

#[derive(Tabled)]
struct HistoryRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Commit")]
    commit: String,
    #[tabled(rename = "Message")]
    message: String,
    #[tabled(rename = "Files")]
    files: usize,
}

pub async fn sync_history(limit: Option<usize>, json: bool) -> Result<()> {
    let config = load_config()?;
    let client = BrainClient::from_config(&config)?;
    let history = client.history().await?;
    let summaries = summarize_history(
        &history,
        limit.unwrap_or(config.sync.history_limit),
        config.display.message_preview_chars,
    );

    if json {
        println!("{}", serde_json::to_string(&summaries)?);
        return Ok(());
    }

    if summaries.is_empty() {
        println!("No sync history found");
        return Ok(());
    }

    let rows: Vec<_> = summaries
        .into_iter()
        .map(|s| HistoryRow {
            status: s.status.to_string(),
            time: config.display.format_time(s.timestamp),
            commit: s.short_sha,
            message: s.message,
            files: s.files_count,
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");
    Ok(())
}

pub async fn sync_trigger(wait: bool, json: bool) -> Result<()> {
    let config = load_config()?;
    let client = BrainClient::from_config(&config)?;
    client.trigger_manual().await?;

    if !wait {
        if json {
            println!("{}", serde_json::json!({"triggered": true}));
        } else {
            println!("{} Manual sync requested", "✓".green());
        }
        return Ok(());
    }

    if !json {
        println!("{} Manual sync requested, waiting...", "✓".green());
    }
    tokio::time::sleep(config.sync.poller_config().manual_settle).await;
    let latest = client.latest_status().await?;
    if json {
        println!("{}", serde_json::to_string(&latest)?);
    } else {
        match latest {
            Some(record) => print_record(&record, &config),
            None => println!("No sync history found"),
        }
    }
    Ok(())
}

pub async fn sync_watch(json: bool) -> Result<()> {
    let config = load_config()?;
    let client = BrainClient::from_config(&config)?;
    let handle: PollerHandle = SyncPoller::spawn(Arc::new(client), config.sync.poller_config());
    let mut rx = handle.subscribe();

    if !json {
        println!(
            "Watching {} every {}s (Ctrl-C to stop)",
            config.endpoints.sync_base_url.cyan(),
            config.sync.poll_interval_secs
        );
    }

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut last_latest: Option<SyncStatusRecord> = None;
    let mut notified = false;
    loop {
        tokio::select! {
            _ = &mut ctrl_c => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = rx.borrow_and_update().clone();

                let latest_changed = snapshot.latest != last_latest;
                let new_notification = snapshot.notification.is_some() && !notified;
                notified = snapshot.notification.is_some();

                if latest_changed || new_notification {
                    if json {
                        println!("{}", serde_json::to_string(&snapshot)?);
                    } else {
                        if let Some(ref notification) = snapshot.notification
                            && new_notification
                        {
                            println!(
                                "{} Content synced: {} {}",
                                "✓".green().bold(),
                                notification.record.short_sha().cyan(),
                                notification.record.commit_message
                            );
                        }
                        if latest_changed && let Some(ref record) = snapshot.latest {
                            print_record(record, &config);
                        }
                    }
                }
                last_latest = snapshot.latest;
            }
        }
    }

    handle.shutdown().await;
    Ok(())
}

fn session_store(config: &Config) -> Result<SessionStore> {
    Ok(SessionStore::open_default(config.auth.session_hours)?)
}

pub fn login(username: &str, password: Option<String>, json: bool) -> Result<()> {
    let config = load_config()?;
    if config.auth.users.is_empty() {
        bail!("No users configured. Add [[auth.users]] entries to the config file.");
    }

    let password = match password {
        Some(p) => p,
        None => {
            eprint!("Password: ");
            std::io::stderr().flush()?;
            let mut line = String::new();
            std::io::stdin().read_line(&mut line)?;
            line.trim_end_matches(['\r', '\n']).to_string()
        }
    };

    let store = session_store(&config)?;
    let session = store.login(&config.auth.users, username, &password, Utc::now())?;

    if json {
        println!("{}", serde_json::to_string(&session.user)?);
    } else {
        println!(
            "{} Logged in as {} ({})",
            "✓".green(),
            session.user.display_name.bold(),
            session.user.role
        );
        println!(
            "  Session expires {}",
            config.display.format_time(session.expires_at)
        );
    }
    Ok(())
}

pub fn logout() -> Result<()> {
    let config = load_config()?;
    session_store(&config)?.logout()?;
    println!("{} Logged out", "✓".green());
    Ok(())
}

pub fn whoami(json: bool) -> Result<()> {
    let config = load_config()?;
    let session = session_store(&config)?.current(Utc::now())?;

    if json {
        println!("{}", serde_json::to_string(&session.map(|s| s.user))?);
        return Ok(());
    }

    match session {
        Some(session) => {
            println!(
                "{} ({}, {})",
                session.user.display_name.bold(),
                session.user.username,
                session.user.role
            );
            println!(
                "  Logged in {}, expires {}",
                config.display.format_time(session.user.logged_in_at),
                config.display.format_time(session.expires_at)
            );
        }
        None => println!("Not logged in"),
    }
    Ok(())
}

/// Output JSON schema for config file
pub fn schema() -> Result<()> {
    let schema = serde_json::json!({
        "$schema": "http://json-schema.org/draft-07/schema#",
        "title": "brainview Configuration",
        "description": "Configuration file for the brainview task and sync viewer",
        "type": "object",
        "properties": {
            "project_name": {
                "type": "string",
                "description": "Name shown when the task document carries no project info",
                "default": "brain"
            },
            "endpoints": {
                "type": "object",
                "properties": {
                    "tasks_url": {
                        "type": "string",
                        "format": "uri",
                        "description": "URL serving the task document (overridden by BRAIN_TASKS_URL)",
                        "default": "http://localhost:3000/brain/ACTIVE_TASKS.json"
                    },
                    "sync_base_url": {
                        "type": "string",
                        "format": "uri",
                        "description": "Base URL of the sync service (overridden by BRAIN_SYNC_URL)",
                        "default": "http://localhost:8002"
                    },
                    "task_update_url": {
                        "type": ["string", "null"],
                        "description": "Base URL for task updates; changes stay local when unset"
                    }
                }
            },
            "sync": {
                "type": "object",
                "properties": {
                    "poll_interval_secs": {
                        "type": "integer",
                        "description": "Seconds between status checks",
                        "minimum": 1,
                        "default": 30
                    },
                    "fresh_window_secs": {
                        "type": "integer",
                        "description": "A success newer than this raises a notification",
                        "minimum": 0,
                        "default": 60
                    },
                    "notification_secs": {
                        "type": "integer",
                        "description": "Seconds a notification stays visible",
                        "minimum": 0,
                        "default": 5
                    },
                    "manual_settle_secs": {
                        "type": "integer",
                        "description": "Seconds to wait after a manual trigger before re-checking",
                        "minimum": 0,
                        "default": 2
                    },
                    "history_limit": {
                        "type": "integer",
                        "description": "Entries shown in the sync history",
                        "minimum": 1,
                        "default": 5
                    },
                    "request_timeout_secs": {
                        "type": "integer",
                        "description": "Per-request HTTP timeout",
                        "minimum": 1,
                        "default": 10
                    }
                }
            },
            "display": {
                "type": "object",
                "properties": {
                    "colors": {
                        "type": "boolean",
                        "description": "Use colors in output",
                        "default": true
                    },
                    "date_format": {
                        "type": "string",
                        "description": "Date format for display (strftime format)",
                        "default": "%Y-%m-%d %H:%M"
                    },
                    "max_title_length": {
                        "type": "integer",
                        "description": "Maximum title length before truncation",
                        "minimum": 20,
                        "default": 80
                    },
                    "message_preview_chars": {
                        "type": "integer",
                        "description": "Commit message characters shown in sync history",
                        "minimum": 1,
                        "default": 50
                    }
                }
            },
            "auth": {
                "type": "object",
                "properties": {
                    "session_hours": {
                        "type": "integer",
                        "description": "Session lifetime for the terminal viewer",
                        "minimum": 1,
                        "default": 24
                    },
                    "users": {
                        "type": "array",
                        "description": "Accounts for the terminal viewer's login gate (not access control)",
                        "items": {
                            "type": "object",
                            "required": ["username", "password"],
                            "properties": {
                                "username": {"type": "string"},
                                "password": {"type": "string"},
                                "display_name": {"type": ["string", "null"]},
                                "role": {"type": ["string", "null"]}
                            }
                        }
                    }
                }
            }
        }
    });
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

/// Config file that `config set` and `config reset` write to
fn writable_config_path() -> Result<PathBuf> {
    match Config::locate()? {
        ConfigLocation::Project(path) | ConfigLocation::User(path) => Ok(path),
        ConfigLocation::Defaults => user_config_path()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory")),
    }
}

/// Show current configuration
pub fn config_show(json: bool) -> Result<()> {
    let (config, location) = Config::resolve()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config.redacted())?);
        return Ok(());
    }

    let source = match location.path() {
        Some(path) => path.display().to_string(),
        None => "built-in defaults".to_string(),
    };
    println!("{} {}", "Current configuration:".bold(), source.dimmed());
    println!();
    println!("project_name = \"{}\"", config.project_name);
    println!();
    println!("[endpoints]");
    println!("tasks_url = \"{}\"", config.endpoints.tasks_url);
    println!("sync_base_url = \"{}\"", config.endpoints.sync_base_url);
    if let Some(ref url) = config.endpoints.task_update_url {
        println!("task_update_url = \"{}\"", url);
    }
    println!();
    println!("[sync]");
    println!("poll_interval_secs = {}", config.sync.poll_interval_secs);
    println!("fresh_window_secs = {}", config.sync.fresh_window_secs);
    println!("notification_secs = {}", config.sync.notification_secs);
    println!("manual_settle_secs = {}", config.sync.manual_settle_secs);
    println!("history_limit = {}", config.sync.history_limit);
    println!("request_timeout_secs = {}", config.sync.request_timeout_secs);
    println!();
    println!("[display]");
    println!("colors = {}", config.display.colors);
    println!("date_format = \"{}\"", config.display.date_format);
    println!("max_title_length = {}", config.display.max_title_length);
    println!(
        "message_preview_chars = {}",
        config.display.message_preview_chars
    );
    println!();
    println!("[auth]");
    println!("session_hours = {}", config.auth.session_hours);
    println!("users = {} configured", config.auth.users.len());

    Ok(())
}

/// Reset configuration to defaults
pub fn config_reset() -> Result<()> {
    let path = writable_config_path()?;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, Config::default_with_comments())?;
    println!("{} Reset {} to defaults", "✓".green(), path.display());
    Ok(())
}

/// Get a specific config value
pub fn config_get(key: &str, json: bool) -> Result<()> {
    let (config, _) = Config::resolve()?;

    // Convert config to JSON for key lookup
    let config_json = serde_json::to_value(config.redacted())?;

    // Parse key path (e.g., "sync.poll_interval_secs" -> ["sync", "poll_interval_secs"])
    let mut value = &config_json;
    for part in key.split('.') {
        value = value
            .get(part)
            .ok_or_else(|| anyhow::anyhow!("Config key not found: {}", key))?;
    }

    if json {
        println!("{}", serde_json::to_string(value)?);
    } else {
        match value {
            serde_json::Value::String(s) => println!("{}", s),
            serde_json::Value::Bool(b) => println!("{}", b),
            serde_json::Value::Number(n) => println!("{}", n),
            serde_json::Value::Null => println!("null"),
            _ => println!("{}", serde_json::to_string_pretty(value)?),
        }
    }

    Ok(())
}

/// Set a config value
pub fn config_set(key: &str, value: &str) -> Result<()> {
    let path = writable_config_path()?;
    let mut config = Config::load(&path)?;
    config.set_key(key, value)?;
    config.save(&path)?;
    println!("{} Set {} = {}", "✓".green(), key, value);
    Ok(())
}
