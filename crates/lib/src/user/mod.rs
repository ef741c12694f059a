//! User records
//!
//! The identity entity stored by the credential store. Email is the public
//! lookup key and is fixed at construction; the identifier is assigned once by
//! the store; the lockout counters are only advanced by
//! [`LockoutPolicy`](crate::lockout::LockoutPolicy).

mod record;

pub use record::{LockoutState, NewUser, User, UserId};
