//! Database record structures matching the `accounts` and `refresh_tokens` tables.

pub mod accounts;
pub mod refresh_tokens;
