//! HTTP request handlers.
//!
//! Handlers see an already authenticated and route-authorized request. The caller, when there is
//! one, is available through the [`CurrentAccount`](crate::auth::current_user::CurrentAccount)
//! extractor; decisions about a specific target account are made here against
//! [`crate::auth::hierarchy`].
//!
//! - [`auth`]: Login, registration, refresh-token rotation and password reset
//! - [`users`]: The caller's own profile and account management

pub mod auth;
pub mod users;
