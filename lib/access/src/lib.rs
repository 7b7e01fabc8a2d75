//! Actors and roles for procurement approvals.
//!
//! Every workflow transition is performed by an [`Actor`]: a user id paired
//! with the single procurement [`Role`] that user holds. The
//! [`ActorDirectory`] resolves ids to actors for permission checks and
//! notification addressing.

pub mod actor;
pub mod directory;
pub mod error;
pub mod role;

pub use actor::Actor;
pub use directory::{ActorDirectory, InMemoryActorDirectory};
pub use error::DirectoryError;
pub use role::Role;
