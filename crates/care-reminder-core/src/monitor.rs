//! Subscription-driven dose pipeline: snapshot → resolve → schedule.
//!
//! Collapses the one-shot scan and the live-listener scan into a single
//! pipeline that re-runs atomically on every store change. The pipeline lives
//! as long as the guard returned by [`DoseMonitor::start`]; dropping it (when
//! the home view is dismissed) releases the store listener.

use std::sync::Arc;

use crate::models::{Compartment, NextDose};
use crate::notify::NotificationScheduler;
use crate::repository::{RepoResult, ScheduleRepository};
use crate::resolver;
use crate::store::StoreSubscription;

/// Drives resolution and alert scheduling from repository snapshots.
pub struct DoseMonitor {
    repository: Arc<ScheduleRepository>,
    scheduler: Arc<NotificationScheduler>,
}

impl DoseMonitor {
    pub fn new(repository: Arc<ScheduleRepository>, scheduler: Arc<NotificationScheduler>) -> Self {
        Self {
            repository,
            scheduler,
        }
    }

    /// Resolve the permission prompt, load (provisioning an empty collection),
    /// process the initial snapshot, then follow live changes. `observer`
    /// receives every snapshot together with the freshly resolved next dose;
    /// the presentation layer renders directly from it.
    pub fn start<F>(&self, observer: F) -> RepoResult<StoreSubscription>
    where
        F: Fn(&[Compartment], Option<&NextDose>) + Send + Sync + 'static,
    {
        self.scheduler.ensure_permission();

        let snapshot = self.repository.load();
        Self::process(&self.scheduler, &snapshot, &observer);

        let scheduler = Arc::clone(&self.scheduler);
        self.repository
            .subscribe(move |snapshot| Self::process(&scheduler, snapshot, &observer))
    }

    fn process<F>(scheduler: &NotificationScheduler, snapshot: &[Compartment], observer: &F)
    where
        F: Fn(&[Compartment], Option<&NextDose>),
    {
        let dose = resolver::next_dose(snapshot);
        if let Err(e) = scheduler.schedule_next(dose.as_ref()) {
            tracing::error!("failed to schedule dose alert: {}", e);
        }
        observer(snapshot, dose.as_ref());
    }
}
