//! Affiliate Types
//!
//! Core data types for the attribution and commission ledger.

pub mod attribution;
pub mod audit;
pub mod commission;
pub mod common;
pub mod order;
pub mod partner;
pub mod payout;
pub mod risk;
pub mod rule;
pub mod status;

pub use attribution::*;
pub use audit::*;
pub use commission::*;
pub use common::*;
pub use order::*;
pub use partner::*;
pub use payout::*;
pub use risk::*;
pub use rule::*;
pub use status::*;
