//! Search/refetch state for one remote collection.
//!
//! Every fetch takes a ticket. Only the completion holding the newest ticket
//! is written into the state, so a slow response for an older filter can
//! never replace the result of a newer one.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::Value;
use shared::{
    domain::{Entity, EntityId},
    search::SearchTerms,
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_stream::wrappers::WatchStream;
use tracing::{debug, info, warn};

use crate::{
    collection::{CollectionPayload, MutableCollection, RemoteCollection},
    error::CollectionError,
};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CollectionState {
    pub data: Vec<Entity>,
    pub loading: bool,
    pub error: Option<String>,
    pub search_terms: SearchTerms,
}

/// How a fetch ended from the view-model's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result (data or error) was written into the state.
    Applied,
    /// A newer fetch was issued meanwhile; the result was dropped.
    Superseded,
}

struct FetchTickets {
    issued: u64,
    active_terms: SearchTerms,
}

/// A started fetch. Dropping it before it settles (a cancelled caller)
/// ends the loading phase if no newer fetch took over.
struct InFlight<'a, C: RemoteCollection + ?Sized> {
    view_model: &'a CollectionViewModel<C>,
    ticket: u64,
    terms: SearchTerms,
    settled: bool,
}

impl<C: RemoteCollection + ?Sized> Drop for InFlight<'_, C> {
    fn drop(&mut self) {
        if !self.settled {
            self.view_model.abandon(self.ticket);
        }
    }
}

pub struct CollectionViewModel<C: RemoteCollection + ?Sized> {
    collection: Arc<C>,
    inner: Mutex<FetchTickets>,
    state: watch::Sender<CollectionState>,
}

impl<C: RemoteCollection + ?Sized> CollectionViewModel<C> {
    /// Binds to `collection` without fetching.
    pub fn new(collection: Arc<C>) -> Arc<Self> {
        let (state, _) = watch::channel(CollectionState::default());
        Arc::new(Self {
            collection,
            inner: Mutex::new(FetchTickets {
                issued: 0,
                active_terms: SearchTerms::new(),
            }),
            state,
        })
    }

    /// Binds to `collection` and loads it with an empty filter.
    pub async fn initialize(collection: Arc<C>) -> Arc<Self> {
        let view_model = Self::new(collection);
        view_model.refetch().await;
        view_model
    }

    pub fn state(&self) -> CollectionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<CollectionState> {
        self.state.subscribe()
    }

    /// Current state followed by every change.
    pub fn updates(&self) -> WatchStream<CollectionState> {
        WatchStream::new(self.state.subscribe())
    }

    /// Replaces the active filter and fetches it. Blank terms are dropped
    /// first; an empty filter reads the whole collection.
    pub async fn search(&self, terms: SearchTerms) -> FetchOutcome {
        let fetch = self.begin_fetch(Some(terms.sanitized()));
        self.complete_fetch(fetch).await
    }

    /// Fetches the active filter again, e.g. after a mutation.
    pub async fn refetch(&self) -> FetchOutcome {
        let fetch = self.begin_fetch(None);
        self.complete_fetch(fetch).await
    }

    fn tickets(&self) -> MutexGuard<'_, FetchTickets> {
        // A panicking holder cannot leave the counters torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn begin_fetch(&self, terms: Option<SearchTerms>) -> InFlight<'_, C> {
        let mut tickets = self.tickets();
        if let Some(terms) = terms {
            tickets.active_terms = terms;
        }
        tickets.issued += 1;
        let ticket = tickets.issued;
        let terms = tickets.active_terms.clone();

        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.search_terms = terms.clone();
        });
        info!(
            collection = self.collection.name(),
            ticket,
            terms = terms.len(),
            "fetch started"
        );
        InFlight {
            view_model: self,
            ticket,
            terms,
            settled: false,
        }
    }

    async fn complete_fetch(&self, mut fetch: InFlight<'_, C>) -> FetchOutcome {
        let payload = if fetch.terms.is_empty() {
            self.collection.fetch_all().await
        } else {
            self.collection.fetch_filtered(&fetch.terms).await
        };
        let result = payload.and_then(CollectionPayload::into_entities);
        let ticket = fetch.ticket;
        fetch.settled = true;

        let tickets = self.tickets();
        if tickets.issued != ticket {
            debug!(
                collection = self.collection.name(),
                ticket,
                latest = tickets.issued,
                "discarding stale response"
            );
            return FetchOutcome::Superseded;
        }

        match result {
            Ok(data) => {
                info!(
                    collection = self.collection.name(),
                    ticket,
                    count = data.len(),
                    "fetch completed"
                );
                self.state.send_modify(|state| {
                    state.data = data;
                    state.loading = false;
                });
            }
            Err(err) => {
                let message = err.user_message();
                warn!(
                    collection = self.collection.name(),
                    ticket,
                    %err,
                    "fetch failed"
                );
                self.state.send_modify(|state| {
                    state.error = Some(message);
                    state.data.clear();
                    state.loading = false;
                });
            }
        }
        FetchOutcome::Applied
    }

    /// The caller gave up on `ticket`. Previous data stays; only the
    /// loading flag is lowered, and only while `ticket` is the newest.
    fn abandon(&self, ticket: u64) {
        let tickets = self.tickets();
        if tickets.issued != ticket {
            return;
        }
        debug!(collection = self.collection.name(), ticket, "fetch abandoned");
        self.state.send_if_modified(|state| std::mem::replace(&mut state.loading, false));
    }
}

impl<C: RemoteCollection + ?Sized + 'static> CollectionViewModel<C> {
    pub fn search_in_background(self: &Arc<Self>, terms: SearchTerms) -> JoinHandle<FetchOutcome> {
        let view_model = Arc::clone(self);
        tokio::spawn(async move { view_model.search(terms).await })
    }

    pub fn refetch_in_background(self: &Arc<Self>) -> JoinHandle<FetchOutcome> {
        let view_model = Arc::clone(self);
        tokio::spawn(async move { view_model.refetch().await })
    }
}

impl<C: MutableCollection + ?Sized> CollectionViewModel<C> {
    /// Creates a record and resynchronises the active filter. A failed
    /// mutation is returned to the caller and leaves the state untouched.
    pub async fn create(&self, body: &Value) -> Result<Entity, CollectionError> {
        let created = self.collection.create(body).await?;
        self.refetch().await;
        Ok(created)
    }

    pub async fn update(&self, id: &EntityId, body: &Value) -> Result<Entity, CollectionError> {
        let updated = self.collection.update(id, body).await?;
        self.refetch().await;
        Ok(updated)
    }

    pub async fn delete(&self, id: &EntityId) -> Result<(), CollectionError> {
        self.collection.delete(id).await?;
        self.refetch().await;
        Ok(())
    }

    /// Runs a record action such as `finalizar` and resynchronises.
    pub async fn act(
        &self,
        id: &EntityId,
        action: &[&str],
        params: &SearchTerms,
    ) -> Result<CollectionPayload, CollectionError> {
        let response = self.collection.act(id, action, params).await?;
        self.refetch().await;
        Ok(response)
    }
}

#[cfg(test)]
#[path = "tests/view_model_tests.rs"]
mod tests;
