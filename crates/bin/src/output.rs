//! Output formatting for human-readable and JSON output.

use chrono::{DateTime, Utc};
use credstore::{LockoutPolicy, User};

/// Output format selection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Human,
    Json,
}

impl OutputFormat {
    pub fn from_flag(json: bool) -> Self {
        if json { Self::Json } else { Self::Human }
    }
}

const USER_HEADERS: &[&str] = &["ID", "EMAIL", "NAME", "ROLE", "CONFIRMED", "ATTEMPTS", "LOCKED UNTIL"];

fn timestamp(ts: Option<DateTime<Utc>>) -> String {
    ts.map(|t| t.to_rfc3339()).unwrap_or_else(|| "-".to_string())
}

fn user_row(user: &User, now: DateTime<Utc>) -> Vec<String> {
    vec![
        user.id().map(|id| id.to_string()).unwrap_or_default(),
        user.email().to_string(),
        user.name.clone(),
        user.role.clone(),
        if user.confirmed { "yes" } else { "no" }.to_string(),
        user.lockout().attempt_count.to_string(),
        timestamp(LockoutPolicy::locked_until(user.lockout(), now)),
    ]
}

/// JSON view of a user. Credentials and verifiers are left out.
pub fn user_json(user: &User) -> serde_json::Value {
    let lockout = user.lockout();
    serde_json::json!({
        "id": user.id(),
        "email": user.email(),
        "name": user.name,
        "role": user.role,
        "confirmed": user.confirmed,
        "confirmation_pending": user.is_confirmation_pending(),
        "attempt_count": lockout.attempt_count,
        "last_attempt": lockout.last_attempt,
        "locked_until": lockout.locked_until,
        "recover_token_expiry": user.recover_token_expiry,
    })
}

/// Print users as a table or a JSON array.
pub fn print_users(
    users: &[User],
    now: DateTime<Utc>,
    format: OutputFormat,
) -> Result<(), serde_json::Error> {
    match format {
        OutputFormat::Human => {
            if users.is_empty() {
                println!("No users found.");
            } else {
                let rows: Vec<_> = users.iter().map(|u| user_row(u, now)).collect();
                print_table(USER_HEADERS, &rows);
            }
        }
        OutputFormat::Json => {
            let values: Vec<_> = users.iter().map(user_json).collect();
            println!("{}", serde_json::to_string(&values)?);
        }
    }
    Ok(())
}

/// Print a table with aligned columns in human-readable format.
///
/// `headers` and each row in `rows` must have the same length.
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.len()).collect();
    for row in rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.len());
        }
    }

    render_line(headers.iter().copied(), &widths);
    for row in rows {
        render_line(row.iter().map(String::as_str), &widths);
    }
}

fn render_line<'a>(cells: impl Iterator<Item = &'a str>, widths: &[usize]) {
    let line: Vec<String> = cells
        .zip(widths)
        .map(|(cell, &width)| format!("{cell:<width$}"))
        .collect();
    println!("{}", line.join("  ").trim_end());
}
