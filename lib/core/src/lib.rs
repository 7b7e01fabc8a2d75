//! Core domain types and utilities for the procureflix platform.
//!
//! This crate provides the foundational types, error handling, and shared
//! utilities used by the procurement approval engine and its collaborators.

pub mod error;
pub mod id;
pub mod number;

pub use error::Result;
pub use id::{EntityId, ParseIdError, UserId};
pub use number::{DocumentNumber, NumberPrefix};
