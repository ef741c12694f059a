pub mod provision;
pub mod users;
