//! Remote compartment store contract.
//!
//! The document collection itself lives in an external service; this module
//! only specifies the gateway the core consumes (snapshot read, point lookup,
//! creation, partial merge, live subscription) and the wire shape of the
//! persisted documents. [`MemoryStore`] is the in-process implementation used
//! for tests and host prototyping.

mod memory;

pub use memory::*;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::Compartment;

/// Store gateway errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("Document not found: {0}")]
    NotFound(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Opaque store-assigned document identifier.
pub type DocId = String;

/// Persisted compartment document. Field names round-trip exactly as stored
/// in the remote collection, including `compartimento` as a string digit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompartmentDoc {
    pub compartimento: String,
    pub nome: String,
    pub horario_previsto: String,
    pub dia_previsto: String,
    pub horario_retirado: String,
    pub dia_retirado: String,
    pub horario_tomado: String,
    pub dia_tomado: String,
}

impl CompartmentDoc {
    /// Blank document for a slot, as written at provisioning time.
    pub fn blank(id: u8) -> Self {
        Self {
            compartimento: id.to_string(),
            nome: String::new(),
            horario_previsto: String::new(),
            dia_previsto: String::new(),
            horario_retirado: String::new(),
            dia_retirado: String::new(),
            horario_tomado: String::new(),
            dia_tomado: String::new(),
        }
    }
}

impl From<&Compartment> for CompartmentDoc {
    fn from(compartment: &Compartment) -> Self {
        Self {
            compartimento: compartment.id.to_string(),
            nome: compartment.medicine_name.clone(),
            horario_previsto: compartment.expected_time.clone(),
            dia_previsto: compartment.expected_date.clone(),
            horario_retirado: compartment.retrieved_time.clone(),
            dia_retirado: compartment.retrieved_date.clone(),
            horario_tomado: compartment.taken_time.clone(),
            dia_tomado: compartment.taken_date.clone(),
        }
    }
}

impl TryFrom<&CompartmentDoc> for Compartment {
    type Error = StoreError;

    fn try_from(doc: &CompartmentDoc) -> Result<Self, Self::Error> {
        let id: u8 = doc.compartimento.parse().map_err(|_| {
            StoreError::Malformed(format!("invalid compartimento: {:?}", doc.compartimento))
        })?;
        Ok(Compartment {
            id,
            medicine_name: doc.nome.clone(),
            expected_date: doc.dia_previsto.clone(),
            expected_time: doc.horario_previsto.clone(),
            retrieved_date: doc.dia_retirado.clone(),
            retrieved_time: doc.horario_retirado.clone(),
            taken_date: doc.dia_tomado.clone(),
            taken_time: doc.horario_tomado.clone(),
        })
    }
}

/// Partial field merge for [`CompartmentStore::update`]. Only `Some` fields
/// are written; `compartimento` itself is immutable and never patched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocPatch {
    pub nome: Option<String>,
    pub dia_previsto: Option<String>,
    pub horario_previsto: Option<String>,
    pub dia_retirado: Option<String>,
    pub horario_retirado: Option<String>,
    pub dia_tomado: Option<String>,
    pub horario_tomado: Option<String>,
}

impl DocPatch {
    /// Patch writing the user-editable schedule fields.
    pub fn schedule(name: &str, date: &str, time: &str) -> Self {
        Self {
            nome: Some(name.to_string()),
            dia_previsto: Some(date.to_string()),
            horario_previsto: Some(time.to_string()),
            ..Self::default()
        }
    }

    /// Logical delete: blanks name and expected schedule, nothing else.
    pub fn clear_schedule() -> Self {
        Self::schedule("", "", "")
    }

    /// Patch recording dose consumption.
    pub fn taken(date: &str, time: &str) -> Self {
        Self {
            dia_tomado: Some(date.to_string()),
            horario_tomado: Some(time.to_string()),
            ..Self::default()
        }
    }

    /// Patch recording physical withdrawal.
    pub fn retrieved(date: &str, time: &str) -> Self {
        Self {
            dia_retirado: Some(date.to_string()),
            horario_retirado: Some(time.to_string()),
            ..Self::default()
        }
    }

    /// Merge the set fields into a document.
    pub fn apply(&self, doc: &mut CompartmentDoc) {
        if let Some(nome) = &self.nome {
            doc.nome = nome.clone();
        }
        if let Some(dia) = &self.dia_previsto {
            doc.dia_previsto = dia.clone();
        }
        if let Some(horario) = &self.horario_previsto {
            doc.horario_previsto = horario.clone();
        }
        if let Some(dia) = &self.dia_retirado {
            doc.dia_retirado = dia.clone();
        }
        if let Some(horario) = &self.horario_retirado {
            doc.horario_retirado = horario.clone();
        }
        if let Some(dia) = &self.dia_tomado {
            doc.dia_tomado = dia.clone();
        }
        if let Some(horario) = &self.horario_tomado {
            doc.horario_tomado = horario.clone();
        }
    }
}

/// Live-subscription callback; receives the full current document set on
/// every change, including the triggering change itself.
pub type ChangeCallback = Arc<dyn Fn(&[CompartmentDoc]) + Send + Sync>;

/// Gateway to the remote compartment collection.
pub trait CompartmentStore: Send + Sync {
    /// Snapshot read of the whole collection.
    fn get_all(&self) -> StoreResult<Vec<CompartmentDoc>>;

    /// Point lookup by the `compartimento` field.
    fn query_by_compartment(&self, id: u8) -> StoreResult<Option<(DocId, CompartmentDoc)>>;

    /// Create a document; used only during provisioning.
    fn add(&self, doc: CompartmentDoc) -> StoreResult<DocId>;

    /// Partial field merge into an existing document.
    fn update(&self, doc_id: &str, patch: &DocPatch) -> StoreResult<()>;

    /// Register a live listener. The listener stays registered until the
    /// returned guard is dropped.
    fn on_change(&self, callback: ChangeCallback) -> StoreResult<StoreSubscription>;
}

/// Drop-guard for a live store subscription (scoped acquisition/release).
pub struct StoreSubscription {
    release: Option<Box<dyn FnOnce() + Send>>,
}

impl StoreSubscription {
    pub fn new(release: impl FnOnce() + Send + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }
}

impl Drop for StoreSubscription {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl std::fmt::Debug for StoreSubscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreSubscription").finish_non_exhaustive()
    }
}
