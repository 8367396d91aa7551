use std::{collections::HashMap, sync::Arc};

use serde_json::Value;
use shared::{domain::Entity, search::SearchTerms};
use tokio::sync::watch;
use tracing::debug;

use crate::{
    collection::{CollectionPayload, RemoteCollection},
    config::Settings,
    debounce::Debouncer,
};

/// Type-ahead suggestions for one display field of a collection.
pub struct Autocomplete<C: RemoteCollection + ?Sized + 'static> {
    collection: Arc<C>,
    field: String,
    min_chars: usize,
    limit: usize,
    debouncer: Debouncer,
    suggestions: Arc<watch::Sender<Vec<Entity>>>,
}

impl<C: RemoteCollection + ?Sized + 'static> Autocomplete<C> {
    pub fn new(collection: Arc<C>, field: impl Into<String>, settings: &Settings) -> Self {
        let (suggestions, _) = watch::channel(Vec::new());
        Self {
            collection,
            field: field.into(),
            min_chars: settings.autocomplete_min_chars,
            limit: settings.autocomplete_limit,
            debouncer: Debouncer::new(settings.debounce_delay()),
            suggestions: Arc::new(suggestions),
        }
    }

    pub fn suggestions(&self) -> Vec<Entity> {
        self.suggestions.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Entity>> {
        self.suggestions.subscribe()
    }

    /// Feeds the current input. Short inputs clear the list right away;
    /// longer ones query the collection once typing pauses.
    pub fn input(&mut self, value: &str) {
        if value.chars().count() < self.min_chars {
            self.debouncer.cancel();
            self.suggestions.send_replace(Vec::new());
            return;
        }

        let collection = Arc::clone(&self.collection);
        let suggestions = Arc::clone(&self.suggestions);
        let field = self.field.clone();
        let terms = SearchTerms::new().with(field.as_str(), value);
        let limit = self.limit;

        self.debouncer.schedule(async move {
            let found = collection
                .fetch_filtered(&terms)
                .await
                .and_then(CollectionPayload::into_entities);
            match found {
                Ok(entities) => {
                    suggestions.send_replace(unique_by_field(entities, &field, limit));
                }
                Err(err) => {
                    debug!(collection = collection.name(), %err, "suggestion lookup failed");
                    suggestions.send_replace(Vec::new());
                }
            }
        });
    }
}

/// Keeps one entity per distinct raw `field` value, so `1` and `"1"` stay
/// apart. The first occurrence fixes the position, the last occurrence is
/// the one kept.
pub fn unique_by_field(entities: Vec<Entity>, field: &str, limit: usize) -> Vec<Entity> {
    let mut positions: HashMap<Option<String>, usize> = HashMap::new();
    let mut unique: Vec<Entity> = Vec::new();

    for entity in entities {
        let key = raw_key(&entity, field);
        match positions.get(&key) {
            Some(&index) => unique[index] = entity,
            None => {
                positions.insert(key, unique.len());
                unique.push(entity);
            }
        }
    }

    unique.truncate(limit);
    unique
}

/// JSON text of the field; `None` when the record lacks it.
fn raw_key(entity: &Entity, field: &str) -> Option<String> {
    if field == "id" {
        return serde_json::to_string(&entity.id).ok();
    }
    entity.field(field).map(Value::to_string)
}

#[cfg(test)]
#[path = "tests/autocomplete_tests.rs"]
mod tests;
