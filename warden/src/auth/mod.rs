//! Authentication and authorization.
//!
//! # Credentials
//!
//! - **Access tokens** are HS256 JWTs, valid for `auth.jwt.access_token_ttl` (1 hour by default).
//!   They are presented as `Authorization: Bearer <token>` and never stored.
//! - **Refresh tokens** are opaque random strings stored in `refresh_tokens`. Each one can be
//!   exchanged exactly once for a new access/refresh pair.
//! - **Password reset tokens** are opaque random strings stored on the account, valid for
//!   `auth.password_reset_token_ttl` and cleared on use.
//!
//! # Request processing
//!
//! Every request passes through [`middleware::authenticate`], which resolves a bearer token to the
//! live account and rejects tokens of missing, disabled or banned accounts, then through
//! [`middleware::authorize`], which applies the path-prefix [`access`] rules. Handlers that need
//! the caller take a [`current_user::CurrentAccount`].
//!
//! Administrative actions on other accounts are further limited by the role [`hierarchy`]:
//! MASTER manages everyone, ADMIN manages the accounts it created, USER only itself.
//!
//! # Modules
//!
//! - [`access`]: Path-prefix authorization rules
//! - [`current_user`]: Extractor for the authenticated account
//! - [`gate`]: Enabled/banned checks shared by login, refresh and the middleware
//! - [`hierarchy`]: Role creation and access table
//! - [`manager`]: Login, registration, refresh and password reset flows
//! - [`middleware`]: Request gate and authorization middleware
//! - [`password`]: Argon2 password hashing
//! - [`session`]: Access token codec and opaque token generation

pub mod access;
pub mod current_user;
pub mod gate;
pub mod hierarchy;
pub mod manager;
pub mod middleware;
pub mod password;
pub mod session;
