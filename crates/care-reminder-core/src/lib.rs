//! CareReminder Core Library
//!
//! Schedule reconciliation and notification scheduling for a 14-slot
//! medicine dispenser.
//!
//! # Architecture
//!
//! ```text
//!  Remote store ──get/query/add/update/onChange──▶ ScheduleRepository
//!                                                        │ id-sorted snapshot
//!                                                        ▼
//!                                                  next-dose resolver
//!                                                        │ lowest-id pending
//!                                                        ▼
//!                                               NotificationScheduler
//!                                                │ -3h correction,
//!                                                │ past-due filter,
//!                                                │ cancel-before-schedule
//!                                                ▼
//!                                          device alert center
//! ```
//!
//! User edits flow the other way: presentation → repository → store; the
//! store's live subscription then drives recomputation, so both paths end in
//! the same snapshot → resolve → schedule pipeline ([`DoseMonitor`]).
//!
//! # Modules
//!
//! - [`models`]: domain types (Compartment, NextDose, ScheduleUpdate)
//! - [`store`]: remote collection contract + in-memory implementation
//! - [`repository`]: local snapshot, provisioning, validated writes
//! - [`resolver`]: pure lowest-id pending scan
//! - [`notify`]: device alert contract + scheduler
//! - [`monitor`]: the subscription-driven pipeline

pub mod models;
pub mod monitor;
pub mod notify;
pub mod repository;
pub mod resolver;
pub mod store;
pub mod telemetry;

// Re-export commonly used types
pub use models::{Compartment, NextDose, ScheduleUpdate, COMPARTMENT_COUNT};
pub use monitor::DoseMonitor;
pub use notify::{
    AlertCenter, AlertPolicy, MemoryAlertCenter, NotificationScheduler, OneShotAlert,
    PermissionStatus,
};
pub use repository::{ScheduleRepository, ValidationError};
pub use resolver::next_dose;
pub use store::{CompartmentDoc, CompartmentStore, MemoryStore, StoreSubscription};

// UniFFI setup - using proc macros
uniffi::setup_scaffolding!();

use std::sync::{Arc, Mutex};

use crate::models::{SCHEDULE_DATE_FORMAT, SCHEDULE_TIME_FORMAT};

/// Placeholder the presentation layer shows when no dose is pending.
pub const NOT_AVAILABLE: &str = "N/A";

// =========================================================================
// FFI Error Type
// =========================================================================

#[derive(Debug, thiserror::Error, uniffi::Error)]
pub enum CareReminderError {
    #[error("Store error: {0}")]
    StoreError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Notification error: {0}")]
    NotificationError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<store::StoreError> for CareReminderError {
    fn from(e: store::StoreError) -> Self {
        CareReminderError::StoreError(e.to_string())
    }
}

impl From<repository::RepoError> for CareReminderError {
    fn from(e: repository::RepoError) -> Self {
        match e {
            repository::RepoError::Validation(e) => CareReminderError::ValidationError(e.to_string()),
            other => CareReminderError::StoreError(other.to_string()),
        }
    }
}

impl From<notify::NotifyError> for CareReminderError {
    fn from(e: notify::NotifyError) -> Self {
        CareReminderError::NotificationError(e.to_string())
    }
}

impl From<ValidationError> for CareReminderError {
    fn from(e: ValidationError) -> Self {
        CareReminderError::ValidationError(e.to_string())
    }
}

// =========================================================================
// FFI Types
// =========================================================================

/// FFI-safe compartment record.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiCompartment {
    pub id: u8,
    pub medicine_name: String,
    pub expected_date: String,
    pub expected_time: String,
    pub retrieved_date: String,
    pub retrieved_time: String,
    pub taken_date: String,
    pub taken_time: String,
}

impl From<Compartment> for FfiCompartment {
    fn from(compartment: Compartment) -> Self {
        Self {
            id: compartment.id,
            medicine_name: compartment.medicine_name,
            expected_date: compartment.expected_date,
            expected_time: compartment.expected_time,
            retrieved_date: compartment.retrieved_date,
            retrieved_time: compartment.retrieved_time,
            taken_date: compartment.taken_date,
            taken_time: compartment.taken_time,
        }
    }
}

impl From<FfiCompartment> for Compartment {
    fn from(compartment: FfiCompartment) -> Self {
        Self {
            id: compartment.id,
            medicine_name: compartment.medicine_name,
            expected_date: compartment.expected_date,
            expected_time: compartment.expected_time,
            retrieved_date: compartment.retrieved_date,
            retrieved_time: compartment.retrieved_time,
            taken_date: compartment.taken_date,
            taken_time: compartment.taken_time,
        }
    }
}

/// FFI-safe next-dose view; `"N/A"` in every field when nothing is pending.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiNextDose {
    pub medicine_name: String,
    pub expected_date: String,
    pub expected_time: String,
}

impl FfiNextDose {
    fn none() -> Self {
        Self {
            medicine_name: NOT_AVAILABLE.into(),
            expected_date: NOT_AVAILABLE.into(),
            expected_time: NOT_AVAILABLE.into(),
        }
    }
}

impl From<NextDose> for FfiNextDose {
    fn from(dose: NextDose) -> Self {
        Self {
            medicine_name: dose.medicine_name,
            expected_date: dose.expected_date,
            expected_time: dose.expected_time,
        }
    }
}

/// FFI-safe scheduled alert.
#[derive(Debug, Clone, uniffi::Record)]
pub struct FfiAlert {
    pub id: String,
    pub title: String,
    pub body: String,
    /// `DD/MM/YYYY HH:MM` local fire time.
    pub fire_at: String,
}

impl From<OneShotAlert> for FfiAlert {
    fn from(alert: OneShotAlert) -> Self {
        let fire_at = alert
            .fire_at
            .format(&format!("{} {}", SCHEDULE_DATE_FORMAT, SCHEDULE_TIME_FORMAT))
            .to_string();
        Self {
            id: alert.id,
            title: alert.title,
            body: alert.body,
            fire_at,
        }
    }
}

// =========================================================================
// Pure Functions (exported to FFI)
// =========================================================================

/// Resolve the next pending dose from a compartment list (sorted here, so
/// hosts may pass documents in any order).
#[uniffi::export]
pub fn resolve_next_dose(compartments: Vec<FfiCompartment>) -> FfiNextDose {
    let mut snapshot: Vec<Compartment> = compartments.into_iter().map(Into::into).collect();
    snapshot.sort_by_key(|c| c.id);
    resolver::next_dose(&snapshot)
        .map(FfiNextDose::from)
        .unwrap_or_else(FfiNextDose::none)
}

/// Check a candidate schedule edit against the ordering invariant (previous
/// slot only) without persisting anything.
#[uniffi::export]
pub fn validate_schedule_edit(
    compartment_id: u8,
    medicine_name: String,
    expected_date: String,
    expected_time: String,
    compartments: Vec<FfiCompartment>,
) -> Result<(), CareReminderError> {
    let mut snapshot: Vec<Compartment> = compartments.into_iter().map(Into::into).collect();
    snapshot.sort_by_key(|c| c.id);
    let update = ScheduleUpdate::new(medicine_name, expected_date, expected_time);
    repository::check_against_previous(&snapshot, compartment_id, &update)?;
    Ok(())
}

// =========================================================================
// Main API Object
// =========================================================================

/// Self-contained core over an in-memory store and a recording alert center
/// (for testing and host prototyping). The live pipeline starts at open and
/// stops on [`close`](CareReminderCore::close) or when the object is dropped.
#[derive(uniffi::Object)]
pub struct CareReminderCore {
    repository: Arc<ScheduleRepository>,
    alerts: Arc<MemoryAlertCenter>,
    subscription: Mutex<Option<StoreSubscription>>,
}

/// Open an in-memory core with the default alert policy.
#[uniffi::export]
pub fn open_in_memory() -> Result<Arc<CareReminderCore>, CareReminderError> {
    let store = Arc::new(MemoryStore::new());
    let repository = Arc::new(ScheduleRepository::new(store as Arc<dyn CompartmentStore>));
    let alerts = Arc::new(MemoryAlertCenter::granted());
    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::clone(&alerts) as Arc<dyn AlertCenter>,
        AlertPolicy::default(),
    ));

    let monitor = DoseMonitor::new(Arc::clone(&repository), scheduler);
    let subscription = monitor.start(|_, _| {})?;

    Ok(Arc::new(CareReminderCore {
        repository,
        alerts,
        subscription: Mutex::new(Some(subscription)),
    }))
}

#[uniffi::export]
impl CareReminderCore {
    /// The current id-sorted compartment snapshot.
    pub fn compartments(&self) -> Vec<FfiCompartment> {
        self.repository
            .snapshot()
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// The current next dose, `"N/A"` fields when nothing is pending.
    pub fn next_dose(&self) -> FfiNextDose {
        resolver::next_dose(&self.repository.snapshot())
            .map(FfiNextDose::from)
            .unwrap_or_else(FfiNextDose::none)
    }

    /// Save a schedule edit for a compartment.
    pub fn set_schedule(
        &self,
        compartment_id: u8,
        medicine_name: String,
        expected_date: String,
        expected_time: String,
    ) -> Result<(), CareReminderError> {
        self.repository.update(
            compartment_id,
            ScheduleUpdate::new(medicine_name, expected_date, expected_time),
        )?;
        Ok(())
    }

    /// Logical delete of a compartment's name and schedule.
    pub fn clear_compartment(&self, compartment_id: u8) -> Result<(), CareReminderError> {
        self.repository.clear(compartment_id)?;
        Ok(())
    }

    /// Record dose consumption.
    pub fn mark_taken(
        &self,
        compartment_id: u8,
        date: String,
        time: String,
    ) -> Result<(), CareReminderError> {
        self.repository.mark_taken(compartment_id, &date, &time)?;
        Ok(())
    }

    /// Record physical withdrawal.
    pub fn mark_retrieved(
        &self,
        compartment_id: u8,
        date: String,
        time: String,
    ) -> Result<(), CareReminderError> {
        self.repository.mark_retrieved(compartment_id, &date, &time)?;
        Ok(())
    }

    /// Alerts currently scheduled by the pipeline.
    pub fn pending_alerts(&self) -> Vec<FfiAlert> {
        self.alerts
            .scheduled()
            .into_iter()
            .map(Into::into)
            .collect()
    }

    /// Tear down the live pipeline.
    pub fn close(&self) {
        let mut subscription = self
            .subscription
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *subscription = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduled(id: u8, name: &str, date: &str, time: &str) -> FfiCompartment {
        FfiCompartment {
            id,
            medicine_name: name.into(),
            expected_date: date.into(),
            expected_time: time.into(),
            retrieved_date: String::new(),
            retrieved_time: String::new(),
            taken_date: String::new(),
            taken_time: String::new(),
        }
    }

    #[test]
    fn test_resolve_next_dose_sorts_input() {
        let dose = resolve_next_dose(vec![
            scheduled(5, "Enalapril", "11/05/2030", "12:00"),
            scheduled(2, "Losartana", "12/05/2030", "08:00"),
        ]);
        assert_eq!(dose.medicine_name, "Losartana");
    }

    #[test]
    fn test_resolve_next_dose_sentinel() {
        let dose = resolve_next_dose(vec![]);
        assert_eq!(dose.medicine_name, NOT_AVAILABLE);
        assert_eq!(dose.expected_date, NOT_AVAILABLE);
        assert_eq!(dose.expected_time, NOT_AVAILABLE);
    }

    #[test]
    fn test_validate_schedule_edit_rejects_out_of_order() {
        let result = validate_schedule_edit(
            2,
            "Dipirona".into(),
            "10/05/2025".into(),
            "07:59".into(),
            vec![scheduled(1, "Losartana", "10/05/2025", "08:00")],
        );
        assert!(matches!(
            result,
            Err(CareReminderError::ValidationError(_))
        ));
    }

    #[test]
    fn test_in_memory_core_round_trip() {
        let core = open_in_memory().unwrap();
        assert_eq!(core.compartments().len(), COMPARTMENT_COUNT as usize);
        assert_eq!(core.next_dose().medicine_name, NOT_AVAILABLE);

        core.set_schedule(1, "Losartana".into(), "10/05/2099".into(), "08:00".into())
            .unwrap();
        assert_eq!(core.next_dose().medicine_name, "Losartana");
        assert_eq!(core.pending_alerts().len(), 1);

        core.mark_taken(1, "10/05/2099".into(), "08:02".into())
            .unwrap();
        assert_eq!(core.next_dose().medicine_name, NOT_AVAILABLE);
        assert!(core.pending_alerts().is_empty());

        core.close();
    }
}
