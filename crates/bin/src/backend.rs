//! Backend creation and utility functions.

use std::path::PathBuf;
use std::time::Duration;

use credstore::{
    CredentialStore, OpContext, StoreOptions,
    backend::{
        UserBackend,
        database::{InMemory, SqlxBackend},
    },
};

use crate::cli::{Backend, ConnectArgs};

const SQLITE_FILE: &str = "credstore.db";
const JSON_FILE: &str = "credstore.json";

/// Redact credentials from a PostgreSQL connection URL for safe logging
pub fn redact_postgres_url(url: &str) -> String {
    if let Ok(parsed) = url::Url::parse(url) {
        let mut redacted = parsed.clone();
        if !parsed.username().is_empty() {
            let _ = redacted.set_username("***");
        }
        if parsed.password().is_some() {
            let _ = redacted.set_password(Some("***"));
        }
        redacted.to_string()
    } else {
        "postgres://***@<unparsable-url>".to_string()
    }
}

/// Human-readable description of the configured backend
pub fn backend_label(args: &ConnectArgs) -> String {
    match args.backend {
        Backend::Sqlite => match &args.database_url {
            Some(url) => format!("sqlite ({url})"),
            None => format!("sqlite ({})", data_dir(args).join(SQLITE_FILE).display()),
        },
        Backend::Postgres => match &args.database_url {
            Some(url) => format!("postgres ({})", redact_postgres_url(url)),
            None => "postgres".to_string(),
        },
        Backend::Inmemory => format!("inmemory ({})", json_path(args).display()),
    }
}

fn data_dir(args: &ConnectArgs) -> PathBuf {
    args.data_dir.clone().unwrap_or_else(|| PathBuf::from("."))
}

fn json_path(args: &ConnectArgs) -> PathBuf {
    data_dir(args).join(JSON_FILE)
}

/// Deadline for each durable store operation
pub fn op_context(args: &ConnectArgs) -> OpContext {
    OpContext::with_timeout(Duration::from_secs(args.timeout_secs))
}

/// Create the appropriate backend based on configuration
pub async fn create_backend(
    args: &ConnectArgs,
) -> Result<Box<dyn UserBackend>, Box<dyn std::error::Error>> {
    match args.backend {
        Backend::Sqlite => match &args.database_url {
            Some(url) => {
                tracing::info!("Using SQLite backend at {url}");
                Ok(Box::new(SqlxBackend::connect_sqlite(url).await?))
            }
            None => {
                let data_dir = data_dir(args);
                tokio::fs::create_dir_all(&data_dir).await?;
                let db_path = data_dir.join(SQLITE_FILE);
                tracing::info!("Using SQLite backend at {}", db_path.display());
                Ok(Box::new(SqlxBackend::open_sqlite(&db_path).await?))
            }
        },
        Backend::Postgres => {
            let url = args
                .database_url
                .as_ref()
                .ok_or("PostgreSQL backend requires --database-url or CREDSTORE_DATABASE_URL")?;

            let display_url = redact_postgres_url(url);
            tracing::info!("Connecting to PostgreSQL backend at {}", display_url);

            match SqlxBackend::connect_postgres(url).await {
                Ok(backend) => {
                    tracing::info!("Connected to PostgreSQL successfully");
                    Ok(Box::new(backend))
                }
                Err(e) => {
                    Err(format!("Failed to connect to PostgreSQL at {}: {}", display_url, e).into())
                }
            }
        }
        Backend::Inmemory => {
            let json_path = json_path(args);
            tracing::info!(
                "Using in-memory backend with persistence at {}",
                json_path.display()
            );
            Ok(Box::new(InMemory::load_from_file(&json_path).await?))
        }
    }
}

/// Connect to the configured backend and open a store over it.
pub async fn open_store(args: &ConnectArgs) -> Result<CredentialStore, Box<dyn std::error::Error>> {
    let backend = create_backend(args).await?;
    let options = StoreOptions::default()
        .provision_schema(args.provision)
        .strict_bootstrap(args.strict_bootstrap);
    Ok(CredentialStore::open(backend, options, &op_context(args)).await?)
}

/// Write the in-memory backend back to its JSON file. Other backends are
/// already durable.
pub async fn flush(
    store: &CredentialStore,
    args: &ConnectArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(in_memory) = store.backend().as_any().downcast_ref::<InMemory>() {
        let path = json_path(args);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        in_memory.save_to_file(&path).await?;
        tracing::debug!("Saved users to {}", path.display());
    }
    Ok(())
}
