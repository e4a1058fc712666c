//! In-memory compartment store (for testing and host prototyping).

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use uuid::Uuid;

use super::{
    ChangeCallback, CompartmentDoc, CompartmentStore, DocId, DocPatch, StoreError, StoreResult,
    StoreSubscription,
};

/// In-process document collection with synchronous listener fan-out.
///
/// Listeners are invoked in registration order with the full document set
/// after every mutation, matching the remote store's subscription semantics.
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

struct StoreInner {
    docs: Mutex<Vec<(DocId, CompartmentDoc)>>,
    listeners: Mutex<BTreeMap<u64, ChangeCallback>>,
    next_token: AtomicU64,
}

// Recover rather than poison: collection state stays usable even if a
// listener callback panicked while the lock was held.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                docs: Mutex::new(Vec::new()),
                listeners: Mutex::new(BTreeMap::new()),
                next_token: AtomicU64::new(0),
            }),
        }
    }

    fn notify(&self) {
        // Snapshot both the documents and the listener set before invoking
        // anything, so a callback can mutate the store re-entrantly.
        let docs: Vec<CompartmentDoc> = lock(&self.inner.docs)
            .iter()
            .map(|(_, doc)| doc.clone())
            .collect();
        let listeners: Vec<ChangeCallback> = lock(&self.inner.listeners).values().cloned().collect();
        for listener in listeners {
            listener(&docs);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CompartmentStore for MemoryStore {
    fn get_all(&self) -> StoreResult<Vec<CompartmentDoc>> {
        Ok(lock(&self.inner.docs)
            .iter()
            .map(|(_, doc)| doc.clone())
            .collect())
    }

    fn query_by_compartment(&self, id: u8) -> StoreResult<Option<(DocId, CompartmentDoc)>> {
        let wanted = id.to_string();
        Ok(lock(&self.inner.docs)
            .iter()
            .find(|(_, doc)| doc.compartimento == wanted)
            .map(|(doc_id, doc)| (doc_id.clone(), doc.clone())))
    }

    fn add(&self, doc: CompartmentDoc) -> StoreResult<DocId> {
        let doc_id = Uuid::new_v4().to_string();
        lock(&self.inner.docs).push((doc_id.clone(), doc));
        self.notify();
        Ok(doc_id)
    }

    fn update(&self, doc_id: &str, patch: &DocPatch) -> StoreResult<()> {
        {
            let mut docs = lock(&self.inner.docs);
            let entry = docs
                .iter_mut()
                .find(|(id, _)| id == doc_id)
                .ok_or_else(|| StoreError::NotFound(format!("document {}", doc_id)))?;
            patch.apply(&mut entry.1);
        }
        self.notify();
        Ok(())
    }

    fn on_change(&self, callback: ChangeCallback) -> StoreResult<StoreSubscription> {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        lock(&self.inner.listeners).insert(token, callback);

        let weak = Arc::downgrade(&self.inner);
        Ok(StoreSubscription::new(move || {
            if let Some(inner) = weak.upgrade() {
                lock(&inner.listeners).remove(&token);
            }
        }))
    }
}
