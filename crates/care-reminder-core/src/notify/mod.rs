//! Device alert contract and one-shot notification scheduling.

mod memory;

pub use memory::*;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{Duration, Local, NaiveDateTime};
use thiserror::Error;

use crate::models::{parse_schedule, NextDose};

/// Alert backend errors.
#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("Alert backend failure: {0}")]
    Backend(String),
}

pub type NotifyResult<T> = Result<T, NotifyError>;

/// Outcome of the device permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Undetermined,
    Granted,
    Denied,
}

/// A single future-firing local device notification, not recurring.
#[derive(Debug, Clone, PartialEq)]
pub struct OneShotAlert {
    /// Stable identifier; scheduling the same id replaces any earlier alert
    /// once the scheduler has cancelled it.
    pub id: String,
    pub title: String,
    pub body: String,
    pub fire_at: NaiveDateTime,
}

/// Device notification center contract.
pub trait AlertCenter: Send + Sync {
    fn permission_status(&self) -> PermissionStatus;

    /// Prompt the user. Called at most once per pipeline start.
    fn request_permission(&self) -> PermissionStatus;

    fn schedule_one_shot(&self, alert: OneShotAlert) -> NotifyResult<()>;

    /// Remove a previously scheduled alert; unknown ids are a no-op.
    fn cancel(&self, alert_id: &str) -> NotifyResult<()>;
}

/// Display policy for dose alerts, passed explicitly to the scheduler
/// instead of mutating process-global notification-handler state.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertPolicy {
    /// Fixed title carried by every dose alert.
    pub title: String,
    /// Hardcoded correction applied symmetrically to the trigger time and
    /// the current time before comparing. The production value is -3.
    pub utc_offset_hours: i64,
    pub show_alert: bool,
    pub play_sound: bool,
    pub set_badge: bool,
}

impl Default for AlertPolicy {
    fn default() -> Self {
        Self {
            title: "CareReminder".into(),
            utc_offset_hours: -3,
            show_alert: true,
            play_sound: false,
            set_badge: false,
        }
    }
}

/// Stable id for the single next-dose alert slot.
pub const NEXT_DOSE_ALERT_ID: &str = "next-dose";

/// Result of trigger computation for a dose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Schedule an alert firing at this instant.
    Fire(NaiveDateTime),
    /// The offset-adjusted trigger is already behind the adjusted now.
    PastDue,
    /// The dose's schedule fields do not parse.
    Malformed,
}

/// Converts a resolved next dose into a device alarm: parses the schedule,
/// applies the fixed offset correction, filters past-due doses, and keeps at
/// most one alert scheduled by cancelling the stable id before each attempt.
pub struct NotificationScheduler {
    center: Arc<dyn AlertCenter>,
    policy: AlertPolicy,
    denied: AtomicBool,
}

impl NotificationScheduler {
    pub fn new(center: Arc<dyn AlertCenter>, policy: AlertPolicy) -> Self {
        Self {
            center,
            policy,
            denied: AtomicBool::new(false),
        }
    }

    pub fn policy(&self) -> &AlertPolicy {
        &self.policy
    }

    /// Resolve the permission prompt once. If the user ultimately denies,
    /// every later scheduling call becomes a silent no-op.
    pub fn ensure_permission(&self) {
        let mut status = self.center.permission_status();
        if status != PermissionStatus::Granted {
            status = self.center.request_permission();
        }
        if status != PermissionStatus::Granted {
            tracing::warn!("notification permission not granted, dose alerts disabled");
            self.denied.store(true, Ordering::Relaxed);
        }
    }

    /// Compute when the alert for `dose` should fire, relative to `now` (the
    /// device's naive local time).
    ///
    /// The fixed offset is added to both sides before comparing, reproducing
    /// the original hardcoded -3h correction; because the adjustment is
    /// symmetric the returned instant is `now + (expected - now)`, i.e. the
    /// expected wall-clock moment.
    pub fn compute_trigger(&self, dose: &NextDose, now: NaiveDateTime) -> Trigger {
        let expected = match parse_schedule(&dose.expected_date, &dose.expected_time) {
            Some(expected) => expected,
            None => return Trigger::Malformed,
        };
        let offset = Duration::hours(self.policy.utc_offset_hours);
        let adjusted_fire = expected + offset;
        let adjusted_now = now + offset;
        if adjusted_fire < adjusted_now {
            return Trigger::PastDue;
        }
        Trigger::Fire(now + (adjusted_fire - adjusted_now))
    }

    /// Replace the current next-dose alert with one for `dose`; with no dose
    /// pending, just drop any stale alert.
    pub fn schedule_next(&self, dose: Option<&NextDose>) -> NotifyResult<()> {
        if self.denied.load(Ordering::Relaxed) {
            tracing::debug!("skipping alert scheduling, permission denied");
            return Ok(());
        }

        // Cancel-before-schedule keeps the alert slot idempotent across
        // repeated snapshot changes.
        self.center.cancel(NEXT_DOSE_ALERT_ID)?;

        let dose = match dose {
            Some(dose) => dose,
            None => return Ok(()),
        };

        match self.compute_trigger(dose, Local::now().naive_local()) {
            Trigger::Fire(fire_at) => {
                tracing::info!(
                    "scheduling dose alert for compartment {} at {}",
                    dose.compartment_id,
                    fire_at
                );
                self.center.schedule_one_shot(OneShotAlert {
                    id: NEXT_DOSE_ALERT_ID.into(),
                    title: self.policy.title.clone(),
                    body: format!("Hora de tomar {}", dose.medicine_name),
                    fire_at,
                })
            }
            Trigger::PastDue => {
                tracing::debug!(
                    "next dose for compartment {} is past due, no alert",
                    dose.compartment_id
                );
                Ok(())
            }
            Trigger::Malformed => {
                tracing::warn!(
                    "unparsable schedule for compartment {} ({:?} {:?}), no alert",
                    dose.compartment_id,
                    dose.expected_date,
                    dose.expected_time
                );
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dose(date: &str, time: &str) -> NextDose {
        NextDose {
            compartment_id: 1,
            medicine_name: "Losartana".into(),
            expected_date: date.into(),
            expected_time: time.into(),
        }
    }

    fn scheduler_with(center: Arc<MemoryAlertCenter>) -> NotificationScheduler {
        NotificationScheduler::new(center, AlertPolicy::default())
    }

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_trigger_fires_at_expected_wall_clock() {
        let scheduler = scheduler_with(Arc::new(MemoryAlertCenter::granted()));
        let now = at(2030, 5, 9, 8, 0);

        // The -3h/-3h symmetric adjustment nets out to zero delay shift.
        let trigger = scheduler.compute_trigger(&dose("10/05/2030", "08:00"), now);
        assert_eq!(trigger, Trigger::Fire(at(2030, 5, 10, 8, 0)));
    }

    #[test]
    fn test_trigger_past_due() {
        let scheduler = scheduler_with(Arc::new(MemoryAlertCenter::granted()));
        let now = at(2030, 5, 10, 8, 1);
        let trigger = scheduler.compute_trigger(&dose("10/05/2030", "08:00"), now);
        assert_eq!(trigger, Trigger::PastDue);
    }

    #[test]
    fn test_trigger_at_exact_now_still_fires() {
        let scheduler = scheduler_with(Arc::new(MemoryAlertCenter::granted()));
        let now = at(2030, 5, 10, 8, 0);
        let trigger = scheduler.compute_trigger(&dose("10/05/2030", "08:00"), now);
        assert_eq!(trigger, Trigger::Fire(now));
    }

    #[test]
    fn test_trigger_malformed() {
        let scheduler = scheduler_with(Arc::new(MemoryAlertCenter::granted()));
        let now = at(2030, 5, 9, 8, 0);
        assert_eq!(
            scheduler.compute_trigger(&dose("someday", "08:00"), now),
            Trigger::Malformed
        );
    }

    #[test]
    fn test_schedule_next_arranges_one_alert() {
        let center = Arc::new(MemoryAlertCenter::granted());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();

        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();

        let alerts = center.scheduled();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].id, NEXT_DOSE_ALERT_ID);
        assert_eq!(alerts[0].title, "CareReminder");
        assert!(alerts[0].body.contains("Losartana"));
    }

    #[test]
    fn test_reschedule_replaces_instead_of_duplicating() {
        let center = Arc::new(MemoryAlertCenter::granted());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();

        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();
        scheduler
            .schedule_next(Some(&dose("11/05/2099", "09:00")))
            .unwrap();
        scheduler
            .schedule_next(Some(&dose("11/05/2099", "09:00")))
            .unwrap();

        let alerts = center.scheduled();
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].fire_at, at(2099, 5, 11, 9, 0));
    }

    #[test]
    fn test_no_dose_cancels_stale_alert() {
        let center = Arc::new(MemoryAlertCenter::granted());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();

        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();
        scheduler.schedule_next(None).unwrap();
        assert!(center.scheduled().is_empty());
    }

    #[test]
    fn test_past_due_dose_schedules_nothing() {
        let center = Arc::new(MemoryAlertCenter::granted());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();

        scheduler
            .schedule_next(Some(&dose("10/05/2005", "08:00")))
            .unwrap();
        assert!(center.scheduled().is_empty());
    }

    #[test]
    fn test_denied_permission_makes_scheduling_a_no_op() {
        let center = Arc::new(MemoryAlertCenter::denied());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();

        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();
        assert!(center.scheduled().is_empty());
        assert_eq!(center.permission_requests(), 1);
    }

    #[test]
    fn test_permission_requested_once() {
        let center = Arc::new(MemoryAlertCenter::denied());
        let scheduler = scheduler_with(Arc::clone(&center));
        scheduler.ensure_permission();
        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();
        scheduler
            .schedule_next(Some(&dose("10/05/2099", "08:00")))
            .unwrap();
        assert_eq!(center.permission_requests(), 1);
    }
}
