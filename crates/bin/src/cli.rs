//! CLI argument definitions for the credstore binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Storage backend type
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Backend {
    /// SQLite database (default)
    Sqlite,
    /// PostgreSQL database
    Postgres,
    /// In-memory with JSON persistence (for development)
    Inmemory,
}

/// Operator tool for the credstore users table
#[derive(Parser, Debug)]
#[command(name = "credstore")]
#[command(about = "Inspect and administer a credstore users table")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub connect: ConnectArgs,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info", env = "CREDSTORE_LOG_LEVEL", global = true)]
    pub log_level: String,

    /// Print machine-readable JSON instead of tables
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Where the users table lives and how to open it
#[derive(clap::Args, Debug)]
pub struct ConnectArgs {
    /// Storage backend to use
    #[arg(short, long, default_value = "sqlite", env = "CREDSTORE_BACKEND", global = true)]
    pub backend: Backend,

    /// Connection URL. Required for postgres; for sqlite it overrides --data-dir
    #[arg(long, env = "CREDSTORE_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Data directory for storage files.
    /// For SQLite: stores credstore.db
    /// For InMemory: stores credstore.json
    #[arg(short = 'D', long, env = "CREDSTORE_DATA_DIR", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Create the users table on startup if it does not exist
    #[arg(long, env = "CREDSTORE_CREATE_DB", global = true)]
    pub provision: bool,

    /// Refuse to start if the initial scan of the users table fails
    #[arg(long, env = "CREDSTORE_STRICT_BOOTSTRAP", global = true)]
    pub strict_bootstrap: bool,

    /// Deadline in seconds for each durable store operation
    #[arg(long, default_value_t = 30, env = "CREDSTORE_TIMEOUT_SECS", global = true)]
    pub timeout_secs: u64,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the users table if it does not exist
    Provision,
    /// Inspect and administer users.
    ///
    /// Commands that change users write the table directly. Run them only
    /// while no process is serving the table: a running server keeps its own
    /// copy of every record and overwrites these changes on its next save.
    Users {
        #[command(subcommand)]
        command: UsersCommand,
    },
}

#[derive(Subcommand, Debug)]
pub enum UsersCommand {
    /// List every user
    List,
    /// Show a single user
    Show {
        /// Email of the user
        email: String,
    },
    /// Register a user
    Create(CreateArgs),
    /// Change a user's role
    SetRole {
        /// Email of the user
        email: String,
        /// New role, e.g. User or Administrator
        role: String,
    },
    /// Mark a user's email as confirmed
    Confirm {
        /// Email of the user
        email: String,
    },
    /// Clear a user's failed attempts and lock
    Unlock {
        /// Email of the user
        email: String,
    },
}

impl UsersCommand {
    /// Whether the command writes to the users table
    pub fn writes(&self) -> bool {
        !matches!(self, UsersCommand::List | UsersCommand::Show { .. })
    }
}

/// Arguments for `users create`
#[derive(clap::Args, Debug)]
pub struct CreateArgs {
    /// Email, the login key
    #[arg(long)]
    pub email: String,

    /// Display name
    #[arg(long, default_value = "")]
    pub name: String,

    /// Authorization role
    #[arg(long, default_value = "User")]
    pub role: String,

    /// Already-hashed password credential
    #[arg(long)]
    pub password_hash: String,

    /// Mark the email as confirmed instead of starting a confirmation
    #[arg(long)]
    pub confirmed: bool,
}
