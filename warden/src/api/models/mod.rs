//! API request and response data models.
//!
//! API models are distinct from the database records in [`crate::db::models`]; password hashes
//! and reset tokens never leave the database layer. JSON is camelCase throughout.
//!
//! - [`auth`]: Credential flow requests and the issued session
//! - [`users`]: Account views and management requests

pub mod auth;
pub mod users;
