//! Domain model for captured vocabulary and its normalized projection.
//!
//! # Responsibility
//! - Define the raw queue record produced by capture clients.
//! - Define the normalized item handed to dedup and enrichment.
//!
//! # Invariants
//! - A `NormalizedItem` never carries an empty lemma.
//! - Dedup comparisons always go through [`item::lemma_key`].

pub mod entry;
pub mod item;
