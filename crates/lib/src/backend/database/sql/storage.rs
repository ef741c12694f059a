//! Row storage operations for SQL backends.
//!
//! This module implements the CRUD operations on the `users` table using sqlx.

use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::any::AnyRow;
use tracing::warn;

use crate::backend::{BackendError, BackendResult};
use crate::user::{LockoutState, NewUser, User, UserId};

use super::{SqlxBackend, SqlxResultExt};

const COLUMNS: &str = "id, name, role, email, password, confirm_selector, confirm_verifier, \
     confirmed, attempt_count, last_attempt, locked, recover_selector, recover_verifier, \
     recover_token_expiry";

const INSERT: &str = "INSERT INTO users (id, name, role, email, password, confirm_selector, \
     confirm_verifier, confirmed, attempt_count, last_attempt, locked, recover_selector, \
     recover_verifier, recover_token_expiry)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)";

const UPDATE: &str = "UPDATE users SET name = $2, role = $3, email = $4, password = $5, \
     confirm_selector = $6, confirm_verifier = $7, confirmed = $8, attempt_count = $9, \
     last_attempt = $10, locked = $11, recover_selector = $12, recover_verifier = $13, \
     recover_token_expiry = $14
     WHERE id = $1";

const UPSERT_TAIL: &str = " ON CONFLICT (id) DO UPDATE SET
        name = EXCLUDED.name,
        role = EXCLUDED.role,
        email = EXCLUDED.email,
        password = EXCLUDED.password,
        confirm_selector = EXCLUDED.confirm_selector,
        confirm_verifier = EXCLUDED.confirm_verifier,
        confirmed = EXCLUDED.confirmed,
        attempt_count = EXCLUDED.attempt_count,
        last_attempt = EXCLUDED.last_attempt,
        locked = EXCLUDED.locked,
        recover_selector = EXCLUDED.recover_selector,
        recover_verifier = EXCLUDED.recover_verifier,
        recover_token_expiry = EXCLUDED.recover_token_expiry
     WHERE users.email = EXCLUDED.email";

fn to_micros(ts: Option<DateTime<Utc>>) -> Option<i64> {
    ts.map(|t| t.timestamp_micros())
}

fn from_micros(id: i64, column: &str, micros: Option<i64>) -> BackendResult<Option<DateTime<Utc>>> {
    micros
        .map(|m| {
            DateTime::from_timestamp_micros(m).ok_or_else(|| BackendError::CorruptRow {
                id,
                reason: format!("{column} out of range: {m}"),
            })
        })
        .transpose()
}

fn column<'r, T>(row: &'r AnyRow, id: i64, name: &str) -> BackendResult<T>
where
    T: sqlx::Decode<'r, sqlx::Any> + sqlx::Type<sqlx::Any>,
{
    row.try_get(name).map_err(|e| BackendError::CorruptRow {
        id,
        reason: format!("{name}: {e}"),
    })
}

fn decode_row(row: &AnyRow) -> BackendResult<User> {
    let id: i64 = row.try_get("id").map_err(|e| BackendError::CorruptRow {
        id: -1,
        reason: format!("id: {e}"),
    })?;

    let attempt_count: i64 = column(row, id, "attempt_count")?;
    let attempt_count = u32::try_from(attempt_count).map_err(|_| BackendError::CorruptRow {
        id,
        reason: format!("attempt_count out of range: {attempt_count}"),
    })?;
    let lockout = LockoutState {
        attempt_count,
        last_attempt: from_micros(id, "last_attempt", column(row, id, "last_attempt")?)?,
        locked_until: from_micros(id, "locked", column(row, id, "locked")?)?,
    };

    let confirmed: i64 = column(row, id, "confirmed")?;
    let mut user = User::new(
        NewUser::new(column::<String>(row, id, "email")?)
            .name(column::<String>(row, id, "name")?)
            .role(column::<String>(row, id, "role")?)
            .password(column::<String>(row, id, "password")?),
    )
    .restored(UserId::new(id), lockout);

    user.confirm_selector = column(row, id, "confirm_selector")?;
    user.confirm_verifier = column(row, id, "confirm_verifier")?;
    user.confirmed = confirmed != 0;
    user.recover_selector = column(row, id, "recover_selector")?;
    user.recover_verifier = column(row, id, "recover_verifier")?;
    user.recover_token_expiry = from_micros(
        id,
        "recover_token_expiry",
        column(row, id, "recover_token_expiry")?,
    )?;

    Ok(user)
}

fn require_id(user: &User) -> BackendResult<UserId> {
    user.id().ok_or_else(|| BackendError::MissingId {
        email: user.email().to_string(),
    })
}

/// Map a unique violation to the matching conflict error, anything else to
/// a generic SQL error.
fn write_error(user: &User, id: UserId, context: &str, err: sqlx::Error) -> BackendError {
    if let sqlx::Error::Database(db) = &err
        && db.is_unique_violation()
    {
        return if db.message().contains("email") {
            BackendError::DuplicateEmail {
                email: user.email().to_string(),
            }
        } else {
            BackendError::DuplicateRow { id }
        };
    }
    BackendError::SqlxError {
        reason: format!("{context}: {err}"),
        source: Some(err),
    }
}

/// Bind every column of `user` in `$1..$14` order.
fn bind_user<'q>(
    query: sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>>,
    id: UserId,
    user: &'q User,
) -> sqlx::query::Query<'q, sqlx::Any, sqlx::any::AnyArguments<'q>> {
    let lockout = user.lockout();
    query
        .bind(id.get())
        .bind(user.name.as_str())
        .bind(user.role.as_str())
        .bind(user.email())
        .bind(user.password.as_str())
        .bind(user.confirm_selector.as_deref())
        .bind(user.confirm_verifier.as_deref())
        .bind(i64::from(user.confirmed))
        .bind(i64::from(lockout.attempt_count))
        .bind(to_micros(lockout.last_attempt))
        .bind(to_micros(lockout.locked_until))
        .bind(user.recover_selector.as_deref())
        .bind(user.recover_verifier.as_deref())
        .bind(to_micros(user.recover_token_expiry))
}

/// Read every decodable row, ordered by identifier.
///
/// A corrupt row is logged and skipped so it cannot hide the others.
pub async fn select_all(backend: &SqlxBackend) -> BackendResult<Vec<User>> {
    let sql = format!("SELECT {COLUMNS} FROM users ORDER BY id");
    let rows = sqlx::query(&sql)
        .fetch_all(backend.pool())
        .await
        .sql_context("Failed to scan users")?;

    let mut users = Vec::with_capacity(rows.len());
    for row in &rows {
        match decode_row(row) {
            Ok(user) => users.push(user),
            Err(err) => warn!(error = %err, "Skipping corrupt user row"),
        }
    }
    Ok(users)
}

/// Highest identifier in the table, corrupt rows included.
pub async fn max_id(backend: &SqlxBackend) -> BackendResult<Option<UserId>> {
    let row = sqlx::query("SELECT MAX(id) AS max_id FROM users")
        .fetch_one(backend.pool())
        .await
        .sql_context("Failed to read highest user id")?;
    let max: Option<i64> = row
        .try_get("max_id")
        .sql_context("Failed to decode highest user id")?;
    Ok(max.map(UserId::new))
}

/// Insert a new row. Fails with a conflict if the id or email is taken.
pub async fn insert(backend: &SqlxBackend, user: &User) -> BackendResult<()> {
    let id = require_id(user)?;
    bind_user(sqlx::query(INSERT), id, user)
        .execute(backend.pool())
        .await
        .map_err(|e| write_error(user, id, "Failed to insert user", e))?;
    Ok(())
}

/// Overwrite every column of the row with the record's identifier.
pub async fn update_by_id(backend: &SqlxBackend, user: &User) -> BackendResult<()> {
    let id = require_id(user)?;
    let result = bind_user(sqlx::query(UPDATE), id, user)
        .execute(backend.pool())
        .await
        .map_err(|e| write_error(user, id, "Failed to update user", e))?;

    if result.rows_affected() == 0 {
        return Err(BackendError::RowNotFound { id });
    }
    Ok(())
}

/// Insert the row, or overwrite it if the identifier already exists with the
/// same email.
///
/// The conflict clause only updates a row owned by the same email, so a
/// reused identifier affects no rows and is reported as `DuplicateRow`.
pub async fn upsert(backend: &SqlxBackend, user: &User) -> BackendResult<()> {
    let id = require_id(user)?;
    let sql = format!("{INSERT}{UPSERT_TAIL}");
    let result = bind_user(sqlx::query(&sql), id, user)
        .execute(backend.pool())
        .await
        .map_err(|e| write_error(user, id, "Failed to upsert user", e))?;

    if result.rows_affected() == 0 {
        return Err(BackendError::DuplicateRow { id });
    }
    Ok(())
}
