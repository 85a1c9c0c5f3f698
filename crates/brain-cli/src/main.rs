//! brain - Task and sync-status viewer for project brain backends
//!
//! Reads the task document over HTTP (falling back to built-in sample data)
//! and follows the content-sync service.

use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "brain")]
#[command(about = "Task and sync-status viewer for project brain backends")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log at info level (RUST_LOG takes precedence)
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .brain/config.toml in the current directory
    Init,

    /// Browse and update tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Content sync status
    Sync {
        #[command(subcommand)]
        command: SyncCommands,
    },

    /// Start a session for the terminal viewer
    Login {
        username: String,

        /// Password (prompted when omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// End the current session
    Logout,

    /// Show the logged-in user
    Whoami,

    /// Output JSON schema for config file
    Schema,

    /// Show or edit configuration
    Config {
        #[command(subcommand)]
        command: Option<ConfigCommands>,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    /// List tasks
    List {
        /// Filter by status ("all" for no filter)
        #[arg(short, long)]
        status: Option<String>,

        /// Filter by priority ("all" for no filter)
        #[arg(short, long)]
        priority: Option<String>,

        /// Case-insensitive match on title, description or ID
        #[arg(long)]
        search: Option<String>,
    },

    /// Show task details
    Show {
        /// Task ID
        id: String,
    },

    /// Show completion statistics
    Stats,

    /// Change a task's status
    SetStatus {
        /// Task ID
        id: String,

        /// New status (pending, in_progress, completed, blocked, cancelled)
        status: String,

        /// Comment recorded with the change
        #[arg(short, long)]
        comment: Option<String>,
    },
}

#[derive(Subcommand)]
enum SyncCommands {
    /// Show the latest sync
    Status,

    /// Show recent syncs, newest first
    History {
        /// Number of entries (defaults to sync.history_limit)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Request a manual sync
    Trigger {
        /// Wait and print the resulting status
        #[arg(short, long)]
        wait: bool,
    },

    /// Follow sync status until interrupted
    Watch,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,
    /// Reset to default configuration
    Reset,
    /// Get a specific config value
    Get {
        /// Config key (e.g., "endpoints.tasks_url", "display.colors")
        key: String,
    },
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// New value
        value: String,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "info" } else { "warn" };
    let filter = std::env::var("RUST_LOG").unwrap_or_else(|_| default.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Init => commands::init(),
        Commands::Tasks { command } => match command {
            TaskCommands::List {
                status,
                priority,
                search,
            } => commands::tasks_list(status, priority, search, cli.json).await,
            TaskCommands::Show { id } => commands::tasks_show(&id, cli.json).await,
            TaskCommands::Stats => commands::tasks_stats(cli.json).await,
            TaskCommands::SetStatus {
                id,
                status,
                comment,
            } => commands::tasks_set_status(&id, &status, comment, cli.json).await,
        },
        Commands::Sync { command } => match command {
            SyncCommands::Status => commands::sync_status(cli.json).await,
            SyncCommands::History { limit } => commands::sync_history(limit, cli.json).await,
            SyncCommands::Trigger { wait } => commands::sync_trigger(wait, cli.json).await,
            SyncCommands::Watch => commands::sync_watch(cli.json).await,
        },
        Commands::Login { username, password } => commands::login(&username, password, cli.json),
        Commands::Logout => commands::logout(),
        Commands::Whoami => commands::whoami(cli.json),
        Commands::Schema => commands::schema(),
        Commands::Config { command } => match command {
            Some(ConfigCommands::Show) | None => commands::config_show(cli.json),
            Some(ConfigCommands::Reset) => commands::config_reset(),
            Some(ConfigCommands::Get { key }) => commands::config_get(&key, cli.json),
            Some(ConfigCommands::Set { key, value }) => commands::config_set(&key, &value),
        },
    }
}
