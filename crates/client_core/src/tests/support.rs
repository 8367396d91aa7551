//! In-memory collection with scripted failures and response gates.

use std::{
    collections::HashMap,
    sync::atomic::{AtomicBool, AtomicI64, Ordering},
};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{Entity, EntityId},
    search::SearchTerms,
};
use tokio::sync::{oneshot, Mutex};

use crate::{
    collection::{CollectionPayload, MutableCollection, RemoteCollection},
    error::CollectionError,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    All,
    Filtered(SearchTerms),
    GetById(EntityId),
    Create,
    Update(EntityId),
    Delete(EntityId),
    Act(EntityId, String, SearchTerms),
}

pub struct ScriptedCollection {
    entities: Mutex<Vec<Entity>>,
    calls: Mutex<Vec<Call>>,
    gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    fail_with: Mutex<Option<String>>,
    omit_data: AtomicBool,
    next_id: AtomicI64,
}

impl ScriptedCollection {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self {
            entities: Mutex::new(entities),
            calls: Mutex::new(Vec::new()),
            gates: Mutex::new(HashMap::new()),
            fail_with: Mutex::new(None),
            omit_data: AtomicBool::new(false),
            next_id: AtomicI64::new(100),
        }
    }

    /// Holds the next read for `terms` until the returned sender fires.
    pub async fn gate(&self, terms: &SearchTerms) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.lock().await.insert(terms_key(terms), rx);
        tx
    }

    pub async fn fail_with(&self, message: impl Into<String>) {
        *self.fail_with.lock().await = Some(message.into());
    }

    pub async fn recover(&self) {
        *self.fail_with.lock().await = None;
    }

    pub fn respond_without_data(&self) {
        self.omit_data.store(true, Ordering::SeqCst);
    }

    pub async fn calls(&self) -> Vec<Call> {
        self.calls.lock().await.clone()
    }

    pub async fn last_call(&self) -> Option<Call> {
        self.calls.lock().await.last().cloned()
    }

    /// Yields until at least `count` calls were recorded.
    pub async fn wait_for_calls(&self, count: usize) {
        while self.calls.lock().await.len() < count {
            tokio::task::yield_now().await;
        }
    }

    async fn read(&self, terms: &SearchTerms, call: Call) -> Result<CollectionPayload, CollectionError> {
        self.calls.lock().await.push(call);

        let gate = self.gates.lock().await.remove(&terms_key(terms));
        if let Some(gate) = gate {
            let _ = gate.await;
        }

        if let Some(message) = self.fail_with.lock().await.clone() {
            return Err(CollectionError::Transport(message));
        }
        if self.omit_data.load(Ordering::SeqCst) {
            return Ok(CollectionPayload::empty());
        }

        let entities = self.entities.lock().await;
        let matching = entities
            .iter()
            .filter(|entity| {
                terms
                    .iter()
                    .all(|(field, value)| entity.display_field(field) == Some(value.to_string()))
            })
            .cloned()
            .collect();
        Ok(CollectionPayload::from_entities(matching))
    }

    async fn check_failure(&self) -> Result<(), CollectionError> {
        match self.fail_with.lock().await.clone() {
            Some(message) => Err(CollectionError::Status {
                status: 400,
                message: Some(message),
            }),
            None => Ok(()),
        }
    }
}

fn terms_key(terms: &SearchTerms) -> String {
    terms
        .to_query_pairs()
        .into_iter()
        .map(|(field, value)| format!("{field}={value}"))
        .collect::<Vec<_>>()
        .join("&")
}

fn entity_from_body(id: EntityId, body: &Value) -> Entity {
    let mut entity = Entity::new(id);
    if let Value::Object(fields) = body {
        for (name, value) in fields {
            if name != "id" {
                entity.fields.insert(name.clone(), value.clone());
            }
        }
    }
    entity
}

#[async_trait]
impl RemoteCollection for ScriptedCollection {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_all(&self) -> Result<CollectionPayload, CollectionError> {
        self.read(&SearchTerms::new(), Call::All).await
    }

    async fn fetch_filtered(
        &self,
        terms: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError> {
        self.read(terms, Call::Filtered(terms.clone())).await
    }
}

#[async_trait]
impl MutableCollection for ScriptedCollection {
    async fn get_by_id(&self, id: &EntityId) -> Result<Entity, CollectionError> {
        self.calls.lock().await.push(Call::GetById(id.clone()));
        self.check_failure().await?;
        self.entities
            .lock()
            .await
            .iter()
            .find(|entity| &entity.id == id)
            .cloned()
            .ok_or(CollectionError::Status {
                status: 404,
                message: Some(format!("record {id} not found")),
            })
    }

    async fn create(&self, body: &Value) -> Result<Entity, CollectionError> {
        self.calls.lock().await.push(Call::Create);
        self.check_failure().await?;
        let id = EntityId::Int(self.next_id.fetch_add(1, Ordering::SeqCst));
        let entity = entity_from_body(id, body);
        self.entities.lock().await.push(entity.clone());
        Ok(entity)
    }

    async fn update(&self, id: &EntityId, body: &Value) -> Result<Entity, CollectionError> {
        self.calls.lock().await.push(Call::Update(id.clone()));
        self.check_failure().await?;
        let entity = entity_from_body(id.clone(), body);
        let mut entities = self.entities.lock().await;
        match entities.iter_mut().find(|existing| &existing.id == id) {
            Some(existing) => *existing = entity.clone(),
            None => {
                return Err(CollectionError::Status {
                    status: 404,
                    message: Some(format!("record {id} not found")),
                })
            }
        }
        Ok(entity)
    }

    async fn delete(&self, id: &EntityId) -> Result<(), CollectionError> {
        self.calls.lock().await.push(Call::Delete(id.clone()));
        self.check_failure().await?;
        self.entities.lock().await.retain(|entity| &entity.id != id);
        Ok(())
    }

    /// Records the action path on the record as `ultimaAcao`.
    async fn act(
        &self,
        id: &EntityId,
        action: &[&str],
        params: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError> {
        let action = action.join("/");
        self.calls
            .lock()
            .await
            .push(Call::Act(id.clone(), action.clone(), params.clone()));
        self.check_failure().await?;
        let mut entities = self.entities.lock().await;
        let entity = entities
            .iter_mut()
            .find(|existing| &existing.id == id)
            .ok_or(CollectionError::Status {
                status: 404,
                message: Some(format!("record {id} not found")),
            })?;
        entity.fields.insert("ultimaAcao".into(), Value::String(action));
        Ok(CollectionPayload::from_entities(vec![entity.clone()]))
    }
}

pub fn bus(id: i64, placa: &str, marca: &str, status: &str) -> Entity {
    Entity::new(id)
        .with_field("placa", placa)
        .with_field("marca", marca)
        .with_field("status", status)
}

pub fn fleet() -> Vec<Entity> {
    vec![
        bus(1, "ABC1D23", "Volvo", "ACTIVE"),
        bus(2, "DEF4G56", "Scania", "EM_MANUTENCAO"),
        bus(3, "HIJ7K89", "Volvo", "DISPONIVEL"),
    ]
}

pub fn new_bus_body() -> Value {
    json!({ "placa": "LMN0P12", "marca": "Volvo", "status": "NOVO" })
}
