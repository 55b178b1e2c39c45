//! Boundaries to external collaborators.
//!
//! # Responsibility
//! - Define what the pipeline hands to enrichment and to the note store.
//! - Define service reachability checks run before a batch.
//!
//! # Invariants
//! - Collaborator failures are per-item values, never panics.

pub mod enrich;
pub mod precheck;
pub mod sink;
