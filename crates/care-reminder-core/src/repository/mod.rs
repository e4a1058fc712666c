//! Schedule repository: the local compartment snapshot, kept consistent with
//! the remote store through one-shot reads and a live subscription.
//!
//! The repository owns the snapshot exclusively; resolver and scheduler only
//! read it. All mutation round-trips through the store, with the local copy
//! applied optimistically and rolled back to the last known-good remote value
//! when a write fails.

mod validate;

pub use validate::*;

use std::sync::{Arc, Mutex, MutexGuard};

use thiserror::Error;

use crate::models::{Compartment, ScheduleUpdate, COMPARTMENT_COUNT};
use crate::store::{
    CompartmentDoc, CompartmentStore, DocPatch, StoreError, StoreResult, StoreSubscription,
};

/// Repository errors.
#[derive(Error, Debug)]
pub enum RepoError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Unknown compartment id: {0}")]
    UnknownCompartment(u8),
}

pub type RepoResult<T> = Result<T, RepoError>;

// Recover rather than poison; the snapshot is plain data.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// In-memory mapping of compartment id to compartment record.
pub struct ScheduleRepository {
    store: Arc<dyn CompartmentStore>,
    snapshot: Mutex<Vec<Compartment>>,
}

impl ScheduleRepository {
    pub fn new(store: Arc<dyn CompartmentStore>) -> Self {
        Self {
            store,
            snapshot: Mutex::new(Vec::new()),
        }
    }

    /// The current id-sorted snapshot (empty until [`load`](Self::load) or the
    /// first subscription callback).
    pub fn snapshot(&self) -> Vec<Compartment> {
        lock(&self.snapshot).clone()
    }

    /// Fetch all compartments, provisioning the 14 blank slots when the
    /// collection is empty. Fails softly: a store error is logged and the
    /// last-known snapshot is returned, so callers see "no data yet" rather
    /// than a fatal failure.
    pub fn load(&self) -> Vec<Compartment> {
        match self.fetch() {
            Ok(compartments) => {
                *lock(&self.snapshot) = compartments.clone();
                compartments
            }
            Err(e) => {
                tracing::error!("failed to load compartments: {}", e);
                self.snapshot()
            }
        }
    }

    fn fetch(&self) -> StoreResult<Vec<Compartment>> {
        let mut docs = self.store.get_all()?;
        if docs.is_empty() {
            // Idempotent provisioning: only runs against an empty collection.
            tracing::info!("provisioning {} blank compartments", COMPARTMENT_COUNT);
            for id in 1..=COMPARTMENT_COUNT {
                self.store.add(CompartmentDoc::blank(id))?;
            }
            docs = self.store.get_all()?;
        }
        Ok(Self::to_snapshot(&docs))
    }

    fn to_snapshot(docs: &[CompartmentDoc]) -> Vec<Compartment> {
        let mut compartments: Vec<Compartment> = docs
            .iter()
            .filter_map(|doc| match Compartment::try_from(doc) {
                Ok(compartment) => Some(compartment),
                Err(e) => {
                    tracing::warn!("skipping malformed compartment document: {}", e);
                    None
                }
            })
            .collect();
        compartments.sort_by_key(|c| c.id);
        compartments
    }

    /// Follow live changes. `callback` receives the complete id-sorted
    /// snapshot on every store change, including changes triggered by this
    /// repository's own writes. The listener is released when the returned
    /// guard is dropped.
    pub fn subscribe<F>(self: &Arc<Self>, callback: F) -> RepoResult<StoreSubscription>
    where
        F: Fn(&[Compartment]) + Send + Sync + 'static,
    {
        let repository = Arc::clone(self);
        let subscription = self.store.on_change(Arc::new(move |docs| {
            let compartments = Self::to_snapshot(docs);
            *lock(&repository.snapshot) = compartments.clone();
            callback(&compartments);
        }))?;
        Ok(subscription)
    }

    /// Save a user edit to a compartment's schedule fields. The edit is
    /// checked against the ordering invariant first; on a store failure the
    /// optimistic local copy is rolled back and the error returned.
    pub fn update(&self, id: u8, update: ScheduleUpdate) -> RepoResult<()> {
        check_against_previous(&lock(&self.snapshot), id, &update)?;
        let patch = DocPatch::schedule(
            &update.medicine_name,
            &update.expected_date,
            &update.expected_time,
        );
        self.write_through(id, &patch, |compartment| {
            compartment.medicine_name = update.medicine_name.clone();
            compartment.expected_date = update.expected_date.clone();
            compartment.expected_time = update.expected_time.clone();
        })
    }

    /// Logical delete: blanks the name and expected schedule. The record
    /// itself is never removed and the taken/retrieved fields are untouched.
    pub fn clear(&self, id: u8) -> RepoResult<()> {
        self.write_through(id, &DocPatch::clear_schedule(), |compartment| {
            compartment.medicine_name.clear();
            compartment.expected_date.clear();
            compartment.expected_time.clear();
        })
    }

    /// Record dose consumption (the dispenser's write path).
    pub fn mark_taken(&self, id: u8, date: &str, time: &str) -> RepoResult<()> {
        self.write_through(id, &DocPatch::taken(date, time), |compartment| {
            compartment.taken_date = date.to_string();
            compartment.taken_time = time.to_string();
        })
    }

    /// Record physical withdrawal from the slot.
    pub fn mark_retrieved(&self, id: u8, date: &str, time: &str) -> RepoResult<()> {
        self.write_through(id, &DocPatch::retrieved(date, time), |compartment| {
            compartment.retrieved_date = date.to_string();
            compartment.retrieved_time = time.to_string();
        })
    }

    fn write_through(
        &self,
        id: u8,
        patch: &DocPatch,
        apply_local: impl FnOnce(&mut Compartment),
    ) -> RepoResult<()> {
        let previous = self.stage_local(id, apply_local)?;
        if let Err(e) = self.write(id, patch) {
            tracing::error!(
                "failed to save compartment {}: {}, rolling back local copy",
                id,
                e
            );
            self.restore_local(previous);
            return Err(e.into());
        }
        Ok(())
    }

    fn stage_local(
        &self,
        id: u8,
        apply_local: impl FnOnce(&mut Compartment),
    ) -> RepoResult<Compartment> {
        let mut snapshot = lock(&self.snapshot);
        let slot = snapshot
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(RepoError::UnknownCompartment(id))?;
        let previous = slot.clone();
        apply_local(slot);
        Ok(previous)
    }

    fn restore_local(&self, previous: Compartment) {
        let mut snapshot = lock(&self.snapshot);
        if let Some(slot) = snapshot.iter_mut().find(|c| c.id == previous.id) {
            *slot = previous;
        }
    }

    fn write(&self, id: u8, patch: &DocPatch) -> StoreResult<()> {
        let (doc_id, _) = self
            .store
            .query_by_compartment(id)?
            .ok_or_else(|| StoreError::NotFound(format!("compartment {}", id)))?;
        self.store.update(&doc_id, patch)
    }
}
