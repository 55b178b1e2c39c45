//! Persistence behind the ledger contracts.
//!
//! # Responsibility
//! - Define the ledger read capability used for deduplication.
//! - Keep SQL details inside the ledger boundary.
//!
//! # Invariants
//! - Ledger writes are insert-or-ignore; rows are never overwritten.

pub mod ledger_repo;
