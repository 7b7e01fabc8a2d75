//! Persistence for procureflix approvals.
//!
//! This crate provides the storage contracts the approval service writes
//! through:
//!
//! - **`EntityStore`**: versioned documents with compare-and-swap writes
//! - **`SequenceAllocator`**: year-scoped document numbers over a `CounterStore`
//!
//! Both come with in-memory implementations for tests and the demo server.

pub mod entity;
pub mod error;
pub mod sequence;

pub use entity::{EntityStore, InMemoryEntityStore};
pub use error::StoreError;
pub use sequence::{CounterStore, InMemoryCounterStore, SequenceAllocator};
