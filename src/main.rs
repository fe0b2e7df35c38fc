//! # taskdesk CLI (`td`)
//!
//! The `td` binary is the terminal interface to taskdesk. It provides
//! commands for store initialization, task CRUD, search, reminder listing,
//! statistics, free-text task detection, and starting the HTTP API server.
//!
//! ## Usage
//!
//! ```bash
//! td --config ./config/taskdesk.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `td init` | Create the backing store (SQLite schema or JSON data dir) |
//! | `td create "<title>" [description]` | Create a task |
//! | `td list` | List tasks, with optional status/priority/assignee filters |
//! | `td search "<query>"` | Substring search over tasks |
//! | `td remind` | List tasks due today or tomorrow |
//! | `td stats` | Print aggregate counts |
//! | `td detect "<text>"` | Run the task extractor on a piece of text |
//! | `td serve` | Start the authenticated HTTP API |
//!
//! ## Examples
//!
//! ```bash
//! # Initialize the store
//! td init --config ./config/taskdesk.toml
//!
//! # Create and inspect tasks
//! td create "Buy milk" "2 liters, lactose free"
//! td list --status todo --priority high
//! td search "milk"
//!
//! # What needs attention today
//! td remind
//!
//! # Try the extractor
//! td detect "תזכיר לי להתקשר לרופא עד מחר"
//!
//! # Start the API server
//! td serve --config ./config/taskdesk.toml
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use taskdesk::config::{self, StoreBackend};
use taskdesk::detect;
use taskdesk::migrate;
use taskdesk::models::{self, NewTask, TaskFilter};
use taskdesk::server;
use taskdesk::store::{self, json::JsonStore};

/// taskdesk CLI — a personal task, note, and people tracker.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/taskdesk.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "td",
    about = "taskdesk — personal tasks, notes, and people with a CLI and an HTTP API",
    version,
    long_about = "taskdesk tracks tasks, notes, and people behind a pluggable storage port \
    (SQLite or flat JSON files), detects actionable tasks in free text (Hebrew and English), \
    and exposes the same operations over an authenticated JSON HTTP API."
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/taskdesk.toml`. Store backend, server bind
    /// address, and credentials are read from this file.
    #[arg(long, global = true, default_value = "./config/taskdesk.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

/// Top-level CLI commands.
#[derive(Subcommand)]
enum Commands {
    /// Initialize the backing store.
    ///
    /// For the SQLite backend this creates the database file and all tables
    /// and indexes. For the JSON backend it creates the data directory and
    /// empty collection files. Idempotent — running it twice is safe.
    Init,

    /// Create a task with the default status and priority.
    Create {
        /// Task title.
        title: String,

        /// Optional free-text description.
        description: Option<String>,
    },

    /// List tasks in the configured order.
    List {
        /// Filter by status: `todo`, `in-progress`, or `done`.
        #[arg(long)]
        status: Option<String>,

        /// Filter by priority: `urgent`, `high`, `medium`, or `low`.
        #[arg(long)]
        priority: Option<String>,

        /// Filter by assignee: a person id, or `unset` for unassigned tasks.
        #[arg(long)]
        assigned_to: Option<String>,
    },

    /// Case-insensitive substring search over task titles and descriptions.
    Search {
        /// The search query string.
        query: String,
    },

    /// List tasks needing a reminder (deadline today/tomorrow or scheduled
    /// for today, and not yet done).
    Remind,

    /// Print aggregate counts: totals per status, overdue, and note count.
    Stats,

    /// Run the task extractor on a piece of free text and print the result.
    ///
    /// Known people are loaded from the store so assignee detection works.
    Detect {
        /// Text to analyze (Hebrew or English).
        text: String,
    },

    /// Start the authenticated HTTP API server.
    ///
    /// Binds to the address configured in `[server].bind`. Refuses to start
    /// when no credentials are configured.
    Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            match cfg.store.backend {
                StoreBackend::Sqlite => {
                    migrate::run_migrations(&cfg).await?;
                    println!("Database initialized at {}", cfg.store.path.display());
                }
                StoreBackend::Json => {
                    JsonStore::open(&cfg)?;
                    println!("Data directory initialized at {}", cfg.store.data_dir.display());
                }
            }
        }
        Commands::Create { title, description } => {
            let store = store::open_store(&cfg).await?;
            let new = NewTask {
                title,
                description: description.unwrap_or_default(),
                source: Some("cli".to_string()),
                ..NewTask::default()
            };
            new.validate()?;
            let task = store.create_task(new).await?;
            println!("Created task #{}: {}", task.id, task.title);
        }
        Commands::List {
            status,
            priority,
            assigned_to,
        } => {
            let store = store::open_store(&cfg).await?;
            let filter = TaskFilter::from_args(
                status.as_deref(),
                priority.as_deref(),
                assigned_to.as_deref(),
            )?;
            let tasks = store.list_tasks(&filter).await?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Commands::Search { query } => {
            let store = store::open_store(&cfg).await?;
            let tasks = store.search_tasks(&query).await?;
            println!("{}", serde_json::to_string_pretty(&tasks)?);
        }
        Commands::Remind => {
            let store = store::open_store(&cfg).await?;
            let now = chrono::Utc::now();
            let due: Vec<_> = store
                .list_tasks(&TaskFilter::default())
                .await?
                .into_iter()
                .filter(|t| models::needs_reminder(t, now))
                .collect();
            if due.is_empty() {
                println!("No tasks need a reminder.");
            } else {
                println!("Tasks needing reminder:");
                for task in &due {
                    let when = match (&task.deadline, &task.scheduled_date) {
                        (Some(d), _) => format!("due {}", d.format("%Y-%m-%d %H:%M")),
                        (None, Some(d)) => format!("scheduled {}", d),
                        (None, None) => String::new(),
                    };
                    println!("  #{} [{}] {} {}", task.id, task.priority, task.title, when);
                }
            }
        }
        Commands::Stats => {
            let store = store::open_store(&cfg).await?;
            let stats = store.stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Commands::Detect { text } => {
            let store = store::open_store(&cfg).await?;
            let people = store.list_people().await?;
            let detection = detect::detect_task(&text, &people);
            println!("{}", serde_json::to_string_pretty(&detection)?);
        }
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
    }

    Ok(())
}
