//! Generic cache mirroring one remote collection.
//!
//! The store keeps three observable fields: `items`, the `status` of the last
//! full fetch, and the `error` that fetch left behind. Only the store's own
//! operations write them. State sits behind a lock that is never held across
//! an `.await`, so every mutation lands atomically at the moment its remote
//! call resolves, in resolution order rather than call order.
//!
//! Overlapping fetches are sequenced with generation tokens: each call takes
//! a new generation, and a response is applied only if no later fetch was
//! issued in the meantime. A slow stale response can therefore never
//! overwrite a fresher one.
//!
//! Mutation failures are returned to the caller and leave `status`/`error`
//! untouched; those two fields describe fetches only.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;
use tracing::{debug, warn};

use super::transport::{Transport, TransportError};
use super::{StoreError, StoreResult};
use crate::models::{Entity, EntityId};

/// Status of the last full fetch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FetchStatus {
    /// Never fetched
    #[default]
    Idle,
    /// A fetch is in flight
    Loading,
    /// Last fetch replaced the cache
    Succeeded,
    /// Last fetch failed; see the store error
    Failed,
}

impl FetchStatus {
    /// Lowercase label for display and logs.
    pub fn as_str(self) -> &'static str {
        match self {
            FetchStatus::Idle => "idle",
            FetchStatus::Loading => "loading",
            FetchStatus::Succeeded => "succeeded",
            FetchStatus::Failed => "failed",
        }
    }
}

/// What a fetch call did to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The cache was replaced with `count` records
    Loaded { count: usize },
    /// The fetch failed and the failure was recorded
    Failed { message: String },
    /// A later fetch was issued first; this response was dropped
    Superseded,
    /// Nothing to do, the cache was already populated
    Cached,
}

/// A consistent copy of a store's observable state.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreSnapshot<T> {
    pub items: Vec<T>,
    pub status: FetchStatus,
    pub error: Option<String>,
}

struct StoreState<T> {
    items: Vec<T>,
    status: FetchStatus,
    error: Option<String>,
    generation: u64,
}

impl<T: Entity> StoreState<T> {
    fn position(&self, id: &EntityId) -> Option<usize> {
        self.items.iter().position(|item| item.id() == *id)
    }

    fn upsert(&mut self, entity: T) {
        match self.position(&entity.id()) {
            Some(idx) => self.items[idx] = entity,
            None => self.items.push(entity),
        }
    }

    fn replace(&mut self, entity: T) -> bool {
        match self.position(&entity.id()) {
            Some(idx) => {
                self.items[idx] = entity;
                true
            }
            None => false,
        }
    }

    fn remove(&mut self, id: &EntityId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| item.id() != *id);
        self.items.len() != before
    }
}

/// Client-side mirror of one remote collection of `T`.
pub struct EntityStore<T: Entity> {
    transport: Arc<dyn Transport>,
    collection: String,
    state: RwLock<StoreState<T>>,
}

impl<T: Entity> EntityStore<T> {
    /// Store over `T`'s default collection.
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self::with_collection(transport, T::COLLECTION)
    }

    /// Store over a named collection.
    pub fn with_collection(transport: Arc<dyn Transport>, collection: impl Into<String>) -> Self {
        Self {
            transport,
            collection: collection.into(),
            state: RwLock::new(StoreState {
                items: Vec::new(),
                status: FetchStatus::Idle,
                error: None,
                generation: 0,
            }),
        }
    }

    /// Remote collection name.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    // =========================================================================
    // Read side
    // =========================================================================

    pub fn status(&self) -> FetchStatus {
        self.read().status
    }

    pub fn error(&self) -> Option<String> {
        self.read().error.clone()
    }

    /// Copy of the cached records.
    pub fn items(&self) -> Vec<T> {
        self.read().items.clone()
    }

    /// Items, status and error taken under one lock.
    pub fn snapshot(&self) -> StoreSnapshot<T> {
        let state = self.read();
        StoreSnapshot {
            items: state.items.clone(),
            status: state.status,
            error: state.error.clone(),
        }
    }

    /// Borrow the cached records without copying them.
    pub fn with_items<R>(&self, f: impl FnOnce(&[T]) -> R) -> R {
        f(&self.read().items)
    }

    /// Cached record with `id`.
    pub fn get(&self, id: &EntityId) -> Option<T> {
        self.read().items.iter().find(|item| item.id() == *id).cloned()
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    // =========================================================================
    // Fetch
    // =========================================================================

    /// Replace the cache with the full remote collection.
    ///
    /// Failures are recorded on the store (`Failed` + error message) and the
    /// cached items are left as they were.
    pub async fn fetch_all(&self) -> FetchOutcome {
        let generation = {
            let mut state = self.write();
            state.generation += 1;
            state.status = FetchStatus::Loading;
            state.error = None;
            state.generation
        };
        debug!(collection = %self.collection, generation, "Fetching collection");

        let result = match self.transport.list(&self.collection).await {
            Ok(documents) => self.decode_all(documents),
            Err(source) => Err(self.transport_error(source)),
        };

        let mut state = self.write();
        if state.generation != generation {
            warn!(
                collection = %self.collection,
                generation,
                latest = state.generation,
                "Discarding superseded fetch response"
            );
            return FetchOutcome::Superseded;
        }

        match result {
            Ok(items) => {
                let count = items.len();
                state.items = items;
                state.status = FetchStatus::Succeeded;
                debug!(collection = %self.collection, count, "Collection loaded");
                FetchOutcome::Loaded { count }
            }
            Err(e) => {
                let message = e.to_string();
                state.status = FetchStatus::Failed;
                state.error = Some(message.clone());
                warn!(collection = %self.collection, error = %message, "Collection fetch failed");
                FetchOutcome::Failed { message }
            }
        }
    }

    /// Fetch only if nothing usable is cached yet.
    ///
    /// Fetches when the store is still idle, or when the last fetch left the
    /// cache empty and no other fetch is in flight.
    pub async fn ensure_loaded(&self) -> FetchOutcome {
        let needed = {
            let state = self.read();
            state.status == FetchStatus::Idle
                || (state.status != FetchStatus::Loading && state.items.is_empty())
        };
        if needed {
            self.fetch_all().await
        } else {
            FetchOutcome::Cached
        }
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Create a record and append the service's copy (with its id) to the cache.
    pub async fn create(&self, draft: &T::Draft) -> StoreResult<T> {
        let body = self.encode(draft)?;
        let created = self
            .transport
            .create(&self.collection, body)
            .await
            .map_err(|e| self.mutation_failed("create", e))?;
        let entity = self.decode(created)?;

        self.write().upsert(entity.clone());
        debug!(collection = %self.collection, id = %entity.id(), "Record created");
        Ok(entity)
    }

    /// Replace a record remotely, then in the cache (no-op if not cached).
    pub async fn update(&self, entity: &T) -> StoreResult<T> {
        let id = entity.id();
        let body = self.encode(entity)?;
        let stored = self
            .transport
            .replace(&self.collection, &id, body)
            .await
            .map_err(|e| self.mutation_failed("update", e))?;
        let stored = self.decode(stored)?;

        let cached = self.write().replace(stored.clone());
        debug!(collection = %self.collection, id = %id, cached, "Record updated");
        Ok(stored)
    }

    /// Delete a record remotely, then from the cache (no-op if not cached).
    pub async fn remove(&self, id: &EntityId) -> StoreResult<()> {
        self.transport
            .delete(&self.collection, id)
            .await
            .map_err(|e| self.mutation_failed("delete", e))?;

        let cached = self.write().remove(id);
        debug!(collection = %self.collection, id = %id, cached, "Record deleted");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn read(&self) -> RwLockReadGuard<'_, StoreState<T>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState<T>> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn transport_error(&self, source: TransportError) -> StoreError {
        StoreError::Transport {
            collection: self.collection.clone(),
            source,
        }
    }

    fn mutation_failed(&self, op: &str, source: TransportError) -> StoreError {
        warn!(collection = %self.collection, op, error = %source, "Mutation failed");
        self.transport_error(source)
    }

    fn encode<S: serde::Serialize + ?Sized>(&self, value: &S) -> StoreResult<Value> {
        serde_json::to_value(value).map_err(|source| StoreError::Encode {
            collection: self.collection.clone(),
            source,
        })
    }

    fn decode(&self, document: Value) -> StoreResult<T> {
        serde_json::from_value(document).map_err(|source| StoreError::Decode {
            collection: self.collection.clone(),
            source,
        })
    }

    /// Decode a full listing, keeping the first record for any repeated id.
    fn decode_all(&self, documents: Vec<Value>) -> StoreResult<Vec<T>> {
        let total = documents.len();
        let mut seen = HashSet::with_capacity(total);
        let mut items = Vec::with_capacity(total);
        for document in documents {
            let entity = self.decode(document)?;
            if seen.insert(entity.id()) {
                items.push(entity);
            }
        }
        if items.len() != total {
            warn!(
                collection = %self.collection,
                dropped = total - items.len(),
                "Listing contained duplicate ids"
            );
        }
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Patient, PatientDetails};
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
    use std::sync::Mutex;
    use tokio::sync::{mpsc, oneshot};

    use crate::store::TransportResult;

    enum Reply {
        Now(TransportResult<Vec<Value>>),
        Gate(oneshot::Receiver<TransportResult<Vec<Value>>>),
    }

    /// Transport that answers listings from a script and can hold them open.
    struct ScriptedTransport {
        replies: Mutex<VecDeque<Reply>>,
        list_started: mpsc::UnboundedSender<()>,
        fail_mutations: AtomicBool,
        next_id: AtomicI64,
    }

    impl ScriptedTransport {
        fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<()>) {
            let (tx, rx) = mpsc::unbounded_channel();
            let transport = Arc::new(Self {
                replies: Mutex::new(VecDeque::new()),
                list_started: tx,
                fail_mutations: AtomicBool::new(false),
                next_id: AtomicI64::new(100),
            });
            (transport, rx)
        }

        fn reply(&self, result: TransportResult<Vec<Value>>) {
            self.replies.lock().unwrap().push_back(Reply::Now(result));
        }

        fn gate(&self) -> oneshot::Sender<TransportResult<Vec<Value>>> {
            let (tx, rx) = oneshot::channel();
            self.replies.lock().unwrap().push_back(Reply::Gate(rx));
            tx
        }

        fn refused() -> TransportError {
            TransportError::Status {
                code: 500,
                message: "boom".into(),
            }
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn list(&self, _collection: &str) -> TransportResult<Vec<Value>> {
            let reply = self.replies.lock().unwrap().pop_front();
            let _ = self.list_started.send(());
            match reply {
                Some(Reply::Now(result)) => result,
                Some(Reply::Gate(rx)) => rx
                    .await
                    .unwrap_or_else(|_| Err(TransportError::Network("gate dropped".into()))),
                None => Ok(Vec::new()),
            }
        }

        async fn create(&self, _collection: &str, mut draft: Value) -> TransportResult<Value> {
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(Self::refused());
            }
            draft["id"] = json!(self.next_id.fetch_add(1, Ordering::SeqCst));
            Ok(draft)
        }

        async fn replace(&self, _collection: &str, _id: &EntityId, record: Value) -> TransportResult<Value> {
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(Self::refused());
            }
            Ok(record)
        }

        async fn delete(&self, _collection: &str, _id: &EntityId) -> TransportResult<()> {
            if self.fail_mutations.load(Ordering::SeqCst) {
                return Err(Self::refused());
            }
            Ok(())
        }
    }

    fn patient_json(id: i64, family: &str) -> Value {
        json!({"id": id, "nom": family, "prenom": "Test"})
    }

    fn store(transport: &Arc<ScriptedTransport>) -> EntityStore<Patient> {
        EntityStore::new(transport.clone())
    }

    #[tokio::test]
    async fn test_new_store_is_idle() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);

        assert_eq!(store.status(), FetchStatus::Idle);
        assert!(store.is_empty());
        assert_eq!(store.error(), None);
        assert_eq!(store.collection(), "patients");
    }

    #[tokio::test]
    async fn test_fetch_success_replaces_items() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        let listing = vec![patient_json(1, "Alaoui"), patient_json(2, "Bernard")];
        transport.reply(Ok(listing.clone()));

        let outcome = store.fetch_all().await;

        assert_eq!(outcome, FetchOutcome::Loaded { count: 2 });
        assert_eq!(store.status(), FetchStatus::Succeeded);
        let expected: Vec<Patient> = listing
            .into_iter()
            .map(|v| serde_json::from_value(v).unwrap())
            .collect();
        assert_eq!(store.items(), expected);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_items() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "Alaoui")]));
        transport.reply(Err(TransportError::Network("connection refused".into())));

        store.fetch_all().await;
        let before = store.items();
        let outcome = store.fetch_all().await;

        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert_eq!(store.status(), FetchStatus::Failed);
        assert!(store.error().unwrap().contains("connection refused"));
        assert_eq!(store.items(), before);
    }

    #[tokio::test]
    async fn test_fetch_drops_duplicate_ids() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "First"), json!({"id": "1", "nom": "Dup"})]));

        store.fetch_all().await;

        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].details.family_name, "First");
    }

    #[tokio::test]
    async fn test_undecodable_listing_is_a_failed_fetch() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![json!({"nom": "no id"})]));

        let outcome = store.fetch_all().await;

        assert!(matches!(outcome, FetchOutcome::Failed { .. }));
        assert_eq!(store.status(), FetchStatus::Failed);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_create_appends_service_copy() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "Alaoui")]));
        store.fetch_all().await;

        let created = store.create(&PatientDetails::new("Chraibi", "Nadia")).await.unwrap();

        assert_eq!(created.id, EntityId::Int(100));
        assert_eq!(store.len(), 2);
        assert_eq!(store.items().last(), Some(&created));
        assert_eq!(store.get(&EntityId::from("100")), Some(created));
    }

    #[tokio::test]
    async fn test_failed_mutations_leave_store_untouched() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "Alaoui")]));
        store.fetch_all().await;
        let before = store.snapshot();
        transport.fail_mutations.store(true, Ordering::SeqCst);

        let created = store.create(&PatientDetails::new("Chraibi", "Nadia")).await;
        let mut edited = before.items[0].clone();
        edited.details.phone = "0700".into();
        let updated = store.update(&edited).await;
        let removed = store.remove(&EntityId::Int(1)).await;

        assert!(created.is_err());
        assert!(updated.is_err());
        let err = removed.unwrap_err();
        assert!(matches!(err.transport_error(), Some(TransportError::Status { code: 500, .. })));
        assert_eq!(store.snapshot(), before);
        assert_eq!(store.error(), None);
        assert_eq!(store.status(), FetchStatus::Succeeded);
    }

    #[tokio::test]
    async fn test_update_replaces_in_place() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "Alaoui"), patient_json(2, "Bernard")]));
        store.fetch_all().await;

        let mut edited = store.get(&EntityId::Int(1)).unwrap();
        edited.details.phone = "0611223344".into();
        store.update(&edited).await.unwrap();

        let items = store.items();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].details.phone, "0611223344");
        assert_eq!(items[1].details.family_name, "Bernard");
    }

    #[tokio::test]
    async fn test_update_of_uncached_record_is_noop() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        let ghost: Patient = serde_json::from_value(patient_json(9, "Ghost")).unwrap();

        let stored = store.update(&ghost).await.unwrap();

        assert_eq!(stored, ghost);
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_remove() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![patient_json(1, "Alaoui"), patient_json(2, "Bernard")]));
        store.fetch_all().await;

        store.remove(&EntityId::from("1")).await.unwrap();
        store.remove(&EntityId::Int(42)).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.get(&EntityId::Int(1)).is_none());
    }

    #[tokio::test]
    async fn test_stale_fetch_cannot_overwrite_fresh_one() {
        let (transport, mut started) = ScriptedTransport::new();
        let store = Arc::new(store(&transport));
        let stale_gate = transport.gate();
        let fresh_gate = transport.gate();

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_all().await }
        });
        started.recv().await.unwrap();
        let second = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_all().await }
        });
        started.recv().await.unwrap();

        fresh_gate
            .send(Ok(vec![patient_json(1, "Fresh"), patient_json(2, "Fresh")]))
            .unwrap();
        assert_eq!(second.await.unwrap(), FetchOutcome::Loaded { count: 2 });

        stale_gate.send(Ok(vec![patient_json(1, "Stale")])).unwrap();
        assert_eq!(first.await.unwrap(), FetchOutcome::Superseded);

        assert_eq!(store.status(), FetchStatus::Succeeded);
        assert_eq!(store.len(), 2);
        assert!(store.items().iter().all(|p| p.details.family_name == "Fresh"));
    }

    #[tokio::test]
    async fn test_stale_failure_is_discarded_too() {
        let (transport, mut started) = ScriptedTransport::new();
        let store = Arc::new(store(&transport));
        let stale_gate = transport.gate();
        transport.reply(Ok(vec![patient_json(1, "Fresh")]));

        let first = tokio::spawn({
            let store = store.clone();
            async move { store.fetch_all().await }
        });
        started.recv().await.unwrap();
        assert_eq!(store.fetch_all().await, FetchOutcome::Loaded { count: 1 });

        stale_gate.send(Err(TransportError::Network("timeout".into()))).unwrap();
        assert_eq!(first.await.unwrap(), FetchOutcome::Superseded);
        assert_eq!(store.status(), FetchStatus::Succeeded);
        assert_eq!(store.error(), None);
    }

    #[tokio::test]
    async fn test_ensure_loaded_fetches_lazily() {
        let (transport, _rx) = ScriptedTransport::new();
        let store = store(&transport);
        transport.reply(Ok(vec![]));
        transport.reply(Ok(vec![patient_json(1, "Alaoui")]));

        assert_eq!(store.ensure_loaded().await, FetchOutcome::Loaded { count: 0 });
        // Empty after a fetch: try again
        assert_eq!(store.ensure_loaded().await, FetchOutcome::Loaded { count: 1 });
        assert_eq!(store.ensure_loaded().await, FetchOutcome::Cached);
    }
}
