//! Database layer for data persistence and access.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ Session manager  │  (auth core)
//! └────────┬─────────┘
//!          │  Store = AccountStore + RefreshTokenStore
//!          ↓
//! ┌──────────────────┐      ┌─────────────┐
//! │     PgStore      │      │ MemoryStore │
//! └────────┬─────────┘      └─────────────┘
//!          ↓
//! ┌──────────────────┐
//! │   Repositories   │  (db::handlers - queries over &mut PgConnection)
//! └────────┬─────────┘
//!          ↓
//! ┌──────────────────┐
//! │    PostgreSQL    │
//! └──────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: The persistence traits the auth core depends on
//! - [`postgres`]: Pool-backed implementation built on the repositories
//! - [`memory`]: In-process implementation for development and tests
//! - [`handlers`]: Repository implementations, one per table
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! The schema lives in `migrations/` and is embedded at compile time; see
//! [`migrator`](crate::migrator). Migrations run on every startup against an external database.
//!
//! # Error Handling
//!
//! Database operations return [`errors::DbError`]. Constraint violations are categorised from the
//! PostgreSQL error so that, for example, a duplicate email surfaces as a conflict rather than a
//! generic failure.

pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
