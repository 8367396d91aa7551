use async_trait::async_trait;
use serde_json::Value;
use shared::{
    domain::{Entity, EntityId},
    search::SearchTerms,
};

use crate::error::CollectionError;

/// Response of a collection read. The backend may answer with a list, a
/// single record, or nothing at all.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionPayload {
    pub data: Option<Value>,
}

impl CollectionPayload {
    pub fn empty() -> Self {
        Self { data: None }
    }

    pub fn from_value(value: Value) -> Self {
        Self { data: Some(value) }
    }

    pub fn from_entities(entities: Vec<Entity>) -> Self {
        Self {
            data: Some(Value::Array(
                entities
                    .into_iter()
                    .filter_map(|entity| serde_json::to_value(entity).ok())
                    .collect(),
            )),
        }
    }

    /// Number of records without decoding them.
    pub fn item_count(&self) -> usize {
        match &self.data {
            None | Some(Value::Null) => 0,
            Some(Value::Array(items)) => items.len(),
            Some(_) => 1,
        }
    }

    /// Absent or null data is an empty result, a lone object is a list of one.
    pub fn into_entities(self) -> Result<Vec<Entity>, CollectionError> {
        match self.data {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(Value::Array(items)) => items
                .into_iter()
                .map(|item| serde_json::from_value(item).map_err(CollectionError::from))
                .collect(),
            Some(other) => Ok(vec![serde_json::from_value(other)?]),
        }
    }
}

/// Read side of one backend collection.
#[async_trait]
pub trait RemoteCollection: Send + Sync {
    /// Label used in logs.
    fn name(&self) -> &str {
        "collection"
    }

    async fn fetch_all(&self) -> Result<CollectionPayload, CollectionError>;

    async fn fetch_filtered(
        &self,
        terms: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError>;
}

/// Write side. Consistency of mutations is left to the backend.
#[async_trait]
pub trait MutableCollection: RemoteCollection {
    async fn get_by_id(&self, id: &EntityId) -> Result<Entity, CollectionError>;

    async fn create(&self, body: &Value) -> Result<Entity, CollectionError>;

    async fn update(&self, id: &EntityId, body: &Value) -> Result<Entity, CollectionError>;

    async fn delete(&self, id: &EntityId) -> Result<(), CollectionError>;

    /// State transition on one record, e.g. `["finalizar"]` or
    /// `["instalar", "pneu", "7"]`. `params` go out as the query string.
    /// Whatever the backend answers is handed back untouched.
    async fn act(
        &self,
        id: &EntityId,
        action: &[&str],
        params: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError>;
}
