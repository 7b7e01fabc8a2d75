//! Entity store.
//!
//! Entities are kept as JSON documents keyed by type and id. Writes to an
//! existing document go through [`EntityStore::compare_and_swap`], which
//! succeeds only against the version the writer read.

use crate::error::StoreError;
use async_trait::async_trait;
use procureflix_core::EntityId;
use procureflix_workflow::{EntityType, WorkflowEntity};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Document storage for workflow entities.
#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Loads an entity, or `None` if it does not exist.
    async fn load(
        &self,
        entity_type: EntityType,
        id: EntityId,
    ) -> Result<Option<WorkflowEntity>, StoreError>;

    /// Stores a new entity.
    async fn insert(&self, entity: &WorkflowEntity) -> Result<(), StoreError>;

    /// Replaces an entity if its stored version is still `expected_version`.
    ///
    /// On success the stored document carries `expected_version + 1`.
    /// Returns `false` when another writer got there first.
    async fn compare_and_swap(
        &self,
        entity_type: EntityType,
        id: EntityId,
        expected_version: u64,
        entity: &WorkflowEntity,
    ) -> Result<bool, StoreError>;

    /// Removes an entity; returns `false` if it did not exist.
    async fn delete(&self, entity_type: EntityType, id: EntityId) -> Result<bool, StoreError>;

    /// Lists every entity of a type.
    async fn list(&self, entity_type: EntityType) -> Result<Vec<WorkflowEntity>, StoreError>;
}

type DocumentKey = (EntityType, EntityId);

/// Store backed by an in-process map of JSON documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryEntityStore {
    documents: Arc<RwLock<HashMap<DocumentKey, JsonValue>>>,
}

impl InMemoryEntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.documents.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Returns true if nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the raw stored document.
    #[must_use]
    pub fn document(&self, entity_type: EntityType, id: EntityId) -> Option<JsonValue> {
        self.documents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(entity_type, id))
            .cloned()
    }
}

fn stored_version(document: &JsonValue) -> Option<u64> {
    document.get("version").and_then(JsonValue::as_u64)
}

#[async_trait]
impl EntityStore for InMemoryEntityStore {
    async fn load(
        &self,
        entity_type: EntityType,
        id: EntityId,
    ) -> Result<Option<WorkflowEntity>, StoreError> {
        let document = self.document(entity_type, id);
        document
            .map(serde_json::from_value)
            .transpose()
            .map_err(StoreError::from)
    }

    async fn insert(&self, entity: &WorkflowEntity) -> Result<(), StoreError> {
        let document = serde_json::to_value(entity)?;
        let key = (entity.entity_type(), entity.id());
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        if documents.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                entity_type: key.0,
                entity_id: key.1,
            });
        }
        documents.insert(key, document);
        debug!(entity_type = %key.0, entity_id = %key.1, "inserted entity");
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        entity_type: EntityType,
        id: EntityId,
        expected_version: u64,
        entity: &WorkflowEntity,
    ) -> Result<bool, StoreError> {
        let mut next = entity.clone();
        next.version = expected_version + 1;
        let document = serde_json::to_value(&next)?;

        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        let Some(current) = documents.get_mut(&(entity_type, id)) else {
            return Ok(false);
        };
        if stored_version(current) != Some(expected_version) {
            debug!(
                %entity_type,
                entity_id = %id,
                expected_version,
                stored_version = ?stored_version(current),
                "version mismatch"
            );
            return Ok(false);
        }
        *current = document;
        Ok(true)
    }

    async fn delete(&self, entity_type: EntityType, id: EntityId) -> Result<bool, StoreError> {
        let mut documents = self.documents.write().unwrap_or_else(|e| e.into_inner());
        Ok(documents.remove(&(entity_type, id)).is_some())
    }

    async fn list(&self, entity_type: EntityType) -> Result<Vec<WorkflowEntity>, StoreError> {
        let documents: Vec<JsonValue> = {
            let documents = self.documents.read().unwrap_or_else(|e| e.into_inner());
            documents
                .iter()
                .filter(|((t, _), _)| *t == entity_type)
                .map(|(_, doc)| doc.clone())
                .collect()
        };
        let mut entities = documents
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<WorkflowEntity>, _>>()?;
        entities.sort_by_key(WorkflowEntity::created_at);
        Ok(entities)
    }
}
