//! Actor directory.
//!
//! The directory is owned by the surrounding application; the approval
//! engine only resolves ids through this trait.

use crate::actor::Actor;
use crate::error::DirectoryError;
use crate::role::Role;
use async_trait::async_trait;
use procureflix_core::UserId;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Resolves user ids to actors.
#[async_trait]
pub trait ActorDirectory: Send + Sync {
    /// Resolves a single actor.
    async fn resolve(&self, actor_id: UserId) -> Result<Actor, DirectoryError>;

    /// Lists every actor holding the given role.
    async fn members_with_role(&self, role: Role) -> Result<Vec<Actor>, DirectoryError>;
}

/// Directory backed by an in-process map.
///
/// Used by tests and by the demo server, which seeds it from configuration.
#[derive(Debug, Clone, Default)]
pub struct InMemoryActorDirectory {
    actors: Arc<RwLock<HashMap<UserId, Actor>>>,
}

impl InMemoryActorDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces an actor.
    pub fn insert(&self, actor: Actor) {
        let mut actors = self.actors.write().unwrap_or_else(|e| e.into_inner());
        actors.insert(actor.id, actor);
    }

    /// Returns the number of registered actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if no actors are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Actor> for InMemoryActorDirectory {
    fn from_iter<I: IntoIterator<Item = Actor>>(iter: I) -> Self {
        let directory = Self::new();
        for actor in iter {
            directory.insert(actor);
        }
        directory
    }
}

#[async_trait]
impl ActorDirectory for InMemoryActorDirectory {
    async fn resolve(&self, actor_id: UserId) -> Result<Actor, DirectoryError> {
        let actors = self.actors.read().unwrap_or_else(|e| e.into_inner());
        let actor = actors
            .get(&actor_id)
            .cloned()
            .ok_or(DirectoryError::UnknownActor { actor_id })?;
        debug!(%actor_id, role = %actor.role, "resolved actor");
        Ok(actor)
    }

    async fn members_with_role(&self, role: Role) -> Result<Vec<Actor>, DirectoryError> {
        let actors = self.actors.read().unwrap_or_else(|e| e.into_inner());
        let mut members: Vec<Actor> = actors.values().filter(|a| a.role == role).cloned().collect();
        members.sort_by(|a, b| a.display_name.cmp(&b.display_name));
        Ok(members)
    }
}
