//! Repository implementations for each PostgreSQL table.
//!
//! Repositories borrow a `&mut PgConnection`, so the same repository works on a pooled
//! connection or inside a transaction:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! let mut accounts = Accounts::new(&mut tx);
//! let account = accounts.create(&request).await?;
//! tx.commit().await?;
//! ```

pub mod accounts;
pub mod refresh_tokens;
pub mod repository;

pub use accounts::Accounts;
pub use refresh_tokens::RefreshTokens;
pub use repository::Repository;
