//! Account lockout policy.
//!
//! Pure decision logic over a record's [`LockoutState`] and the current time.
//! The policy is the only code that advances the attempt counter or sets the
//! lock-until timestamp; the store merely persists whatever it produces.
//!
//! Rules:
//! - A failure inside `window` of the previous failure increments the counter,
//!   otherwise the counter restarts at 1.
//! - Reaching `lock_after` failures locks the account until `now + duration`.
//! - A successful authentication resets the counter and clears the lock.

use chrono::{DateTime, Duration, Utc};

use crate::user::{LockoutState, User};

/// Thresholds for suspending authentication after repeated failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures within `window` that trigger a lock
    pub lock_after: u32,
    /// How close together failures must be to count toward a lock
    pub window: Duration,
    /// How long a lock lasts
    pub duration: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            lock_after: 3,
            window: Duration::minutes(5),
            duration: Duration::hours(12),
        }
    }
}

/// What [`LockoutPolicy::register_failure`] decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureOutcome {
    /// Counted, account still usable
    Counted { attempts: u32 },
    /// This failure crossed the threshold
    Locked { until: DateTime<Utc> },
}

impl LockoutPolicy {
    /// Whether authentication is currently refused for `user`.
    pub fn is_locked(&self, user: &User, now: DateTime<Utc>) -> bool {
        Self::locked_until(user.lockout(), now).is_some()
    }

    /// The instant the lock lifts, if the state is locked at `now`.
    pub fn locked_until(state: &LockoutState, now: DateTime<Utc>) -> Option<DateTime<Utc>> {
        state.locked_until.filter(|until| now < *until)
    }

    /// Record a failed authentication attempt at `now`.
    pub fn register_failure(&self, user: &mut User, now: DateTime<Utc>) -> FailureOutcome {
        let state = user.lockout_mut();

        let within_window = state
            .last_attempt
            .is_some_and(|last| now - last <= self.window);
        state.attempt_count = if within_window {
            state.attempt_count.saturating_add(1)
        } else {
            1
        };
        state.last_attempt = Some(now);

        if state.attempt_count >= self.lock_after {
            let until = now + self.duration;
            state.locked_until = Some(until);
            FailureOutcome::Locked { until }
        } else {
            FailureOutcome::Counted {
                attempts: state.attempt_count,
            }
        }
    }

    /// Clear the counter and any lock, e.g. after a successful login or an
    /// operator unlock.
    pub fn reset(&self, user: &mut User) {
        let state = user.lockout_mut();
        state.attempt_count = 0;
        state.locked_until = None;
    }
}
