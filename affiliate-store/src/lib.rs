//! Affiliate Store - Ledger Persistence
//!
//! Storage seam for the affiliate ledger. Services talk to the
//! [`AffiliateStore`] trait and never to a concrete backend.
//!
//! # Backends
//!
//! - [`SqliteStore`] - durable `sqlx` SQLite database
//! - [`MemoryStore`] - process-local tables, for tests and throwaway runs
//!
//! # Transactions
//!
//! - [`AffiliateStore::begin_read`] opens a consistent snapshot
//! - [`AffiliateStore::begin`] opens a write transaction; writers are serialized
//! - Status-changing writes are guarded by the status the caller read
//! - Wallet rows get their `balance_after` from the running balance inside
//!   the same transaction
//! - An uncommitted transaction rolls back on drop
//!
//! # Usage Example
//!
//! ```ignore
//! use affiliate_store::{AffiliateStore, MemoryStore};
//!
//! async fn example() -> affiliate_store::StoreResult<()> {
//!     let store = MemoryStore::new();
//!     let mut tx = store.begin().await?;
//!     // ... writes ...
//!     tx.commit().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod repos;
pub mod schema;

pub use error::*;
pub use repos::*;
pub use schema::{StoreState, SQLITE_SCHEMA};
