//! Inbox ingestion pipeline.
//!
//! # Responsibility
//! - Merge fragments, parse the queue, normalize and dedupe items.
//! - Coordinate one locked run end to end.
//!
//! # Invariants
//! - Stages run in order: merge, parse, normalize, dedupe, handoff, commit.
//! - Original capture order is preserved through every stage.

pub mod coordinator;
pub mod dedupe;
pub mod merge;
pub mod normalize;
pub mod parse;
