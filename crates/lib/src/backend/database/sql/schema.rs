//! SQL schema definitions.
//!
//! The schema is portable between SQLite and PostgreSQL. The `users` table has
//! exactly one column per user record attribute:
//!
//! | column                 | type   | notes                                  |
//! |------------------------|--------|----------------------------------------|
//! | `id`                   | BIGINT | primary key, assigned by the store     |
//! | `name`                 | TEXT   |                                        |
//! | `role`                 | TEXT   |                                        |
//! | `email`                | TEXT   | unique                                 |
//! | `password`             | TEXT   | opaque hash                            |
//! | `confirm_selector`     | TEXT   | NULL when no confirmation is pending   |
//! | `confirm_verifier`     | TEXT   |                                        |
//! | `confirmed`            | BIGINT | 0/1                                    |
//! | `attempt_count`        | BIGINT |                                        |
//! | `last_attempt`         | BIGINT | microseconds since epoch, NULL if none |
//! | `locked`               | BIGINT | microseconds since epoch, NULL if none |
//! | `recover_selector`     | TEXT   | NULL when no recovery is pending       |
//! | `recover_verifier`     | TEXT   |                                        |
//! | `recover_token_expiry` | BIGINT | microseconds since epoch, NULL if none |
//!
//! The `schema_version` table records the layout a database was provisioned
//! with. Provisioning refuses a database stamped with any other version.

use crate::backend::{BackendError, BackendResult};

use super::SqlxBackend;

/// Current schema version.
pub const SCHEMA_VERSION: i64 = 1;

/// SQL statements to create the schema tables.
pub const CREATE_TABLES: &[&str] = &[
    // Schema version tracking
    "CREATE TABLE IF NOT EXISTS schema_version (
        version BIGINT PRIMARY KEY
    )",
    "CREATE TABLE IF NOT EXISTS users (
        id BIGINT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        role TEXT NOT NULL,
        email TEXT NOT NULL UNIQUE,
        password TEXT NOT NULL,
        confirm_selector TEXT,
        confirm_verifier TEXT,
        confirmed BIGINT NOT NULL DEFAULT 0,
        attempt_count BIGINT NOT NULL DEFAULT 0,
        last_attempt BIGINT,
        locked BIGINT,
        recover_selector TEXT,
        recover_verifier TEXT,
        recover_token_expiry BIGINT
    )",
];

/// SQL statements to create indexes.
pub const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_users_confirm_selector ON users(confirm_selector)",
    "CREATE INDEX IF NOT EXISTS idx_users_recover_selector ON users(recover_selector)",
];

fn schema_error(reason: String, source: sqlx::Error) -> BackendError {
    BackendError::SqlxError {
        reason,
        source: Some(source),
    }
}

/// Initialize the database schema.
///
/// Creates tables and indexes if they don't exist. Fails if the database
/// was provisioned with a different schema version.
pub async fn initialize(backend: &SqlxBackend) -> BackendResult<()> {
    let pool = backend.pool();

    for statement in CREATE_TABLES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| schema_error(format!("Schema creation failed: {e} - SQL: {statement}"), e))?;
    }

    let row: Option<(i64,)> = sqlx::query_as("SELECT version FROM schema_version")
        .fetch_optional(pool)
        .await
        .map_err(|e| schema_error(format!("Failed to check schema version: {e}"), e))?;

    if row.is_none() {
        // First initialization
        sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
            .bind(SCHEMA_VERSION)
            .execute(pool)
            .await
            .map_err(|e| schema_error(format!("Failed to initialize schema version: {e}"), e))?;
        tracing::info!(version = SCHEMA_VERSION, "Provisioned users schema");
    } else if let Some((stored,)) = row
        && stored != SCHEMA_VERSION
    {
        return Err(BackendError::SqlxError {
            reason: format!(
                "Unsupported schema version {stored}, this build expects {SCHEMA_VERSION}"
            ),
            source: None,
        });
    }

    for statement in CREATE_INDEXES {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(|e| schema_error(format!("Index creation failed: {e} - SQL: {statement}"), e))?;
    }

    Ok(())
}
