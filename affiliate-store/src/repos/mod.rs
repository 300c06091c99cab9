//! Affiliate Store Repositories
//!
//! Transactional data access for the affiliate ledger. Reads run on a
//! consistent snapshot; writes run inside a [`StoreTx`] that commits
//! atomically or rolls back when dropped.

mod ledger_repo;
mod memory_store;
mod sqlite_store;

pub use ledger_repo::*;
pub use memory_store::*;
pub use sqlite_store::*;
