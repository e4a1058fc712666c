//! End-to-end schedule flow tests: provisioning, editing, resolution, and
//! alert scheduling over the in-memory store.

use std::sync::Arc;

use chrono::{Duration, Local};

use care_reminder_core::models::{ScheduleUpdate, COMPARTMENT_COUNT};
use care_reminder_core::notify::{AlertCenter, AlertPolicy, MemoryAlertCenter};
use care_reminder_core::repository::RepoError;
use care_reminder_core::resolver::next_dose;
use care_reminder_core::store::CompartmentStore;
use care_reminder_core::{
    DoseMonitor, MemoryStore, NotificationScheduler, ScheduleRepository,
};

struct Fixture {
    store: Arc<MemoryStore>,
    repository: Arc<ScheduleRepository>,
    center: Arc<MemoryAlertCenter>,
    monitor: DoseMonitor,
}

fn fixture() -> Fixture {
    let store = Arc::new(MemoryStore::new());
    let repository = Arc::new(ScheduleRepository::new(
        Arc::clone(&store) as Arc<dyn CompartmentStore>
    ));
    let center = Arc::new(MemoryAlertCenter::granted());
    let scheduler = Arc::new(NotificationScheduler::new(
        Arc::clone(&center) as Arc<dyn AlertCenter>,
        AlertPolicy::default(),
    ));
    let monitor = DoseMonitor::new(Arc::clone(&repository), scheduler);
    Fixture {
        store,
        repository,
        center,
        monitor,
    }
}

fn tomorrow() -> String {
    (Local::now() + Duration::days(1))
        .format("%d/%m/%Y")
        .to_string()
}

#[test]
fn test_blank_dispenser_resolves_to_none() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    let snapshot = fx.repository.snapshot();
    assert_eq!(snapshot.len(), COMPARTMENT_COUNT as usize);
    assert_eq!(next_dose(&snapshot), None);
    assert!(fx.center.scheduled().is_empty());
}

#[test]
fn test_provisioning_runs_once() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &tomorrow(), "08:00"))
        .unwrap();

    // A second load against the populated collection must not create rows or
    // overwrite the edit.
    fx.repository.load();
    assert_eq!(
        fx.store.get_all().unwrap().len(),
        COMPARTMENT_COUNT as usize
    );
    assert_eq!(fx.repository.snapshot()[0].medicine_name, "Losartana");
}

#[test]
fn test_edit_then_take_scenario() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    // Blank dispenser: no next dose.
    assert_eq!(next_dose(&fx.repository.snapshot()), None);

    // Schedule compartment 1 for tomorrow morning.
    let date = tomorrow();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &date, "08:00"))
        .unwrap();

    let dose = next_dose(&fx.repository.snapshot()).unwrap();
    assert_eq!(dose.compartment_id, 1);
    assert_eq!(dose.medicine_name, "Losartana");
    assert_eq!(dose.expected_date, date);
    assert_eq!(dose.expected_time, "08:00");

    let alerts = fx.center.scheduled();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].body.contains("Losartana"));

    // Mark compartment 1 taken while compartment 2 stays blank: back to none,
    // with no fallback to later-but-unscheduled compartments.
    fx.repository.mark_taken(1, &date, "08:02").unwrap();
    assert_eq!(next_dose(&fx.repository.snapshot()), None);
    assert!(fx.center.scheduled().is_empty());
}

#[test]
fn test_out_of_order_edit_names_both_compartments() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", "10/05/2025", "08:00"))
        .unwrap();

    let err = fx
        .repository
        .update(2, ScheduleUpdate::new("Dipirona", "10/05/2025", "07:59"))
        .unwrap_err();

    match err {
        RepoError::Validation(validation) => {
            assert_eq!(validation.id, 2);
            assert_eq!(validation.previous_id, 1);
            let message = validation.to_string();
            assert!(message.contains("compartment 2"));
            assert!(message.contains("compartment 1"));
        }
        other => panic!("expected validation error, got {:?}", other),
    }

    // Stored data untouched by the rejected edit.
    let (_, doc) = fx.store.query_by_compartment(2).unwrap().unwrap();
    assert!(doc.nome.is_empty());
    assert!(doc.dia_previsto.is_empty());
}

#[test]
fn test_forward_conflict_with_next_slot_is_accepted() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    fx.repository
        .update(3, ScheduleUpdate::new("Enalapril", "10/05/2099", "12:00"))
        .unwrap();

    // The check only looks at slot 1 (blank), not slot 3, so this edit is
    // accepted even though it lands after slot 3's schedule.
    fx.repository
        .update(2, ScheduleUpdate::new("Dipirona", "10/05/2099", "18:00"))
        .unwrap();

    // The locally out-of-order collection still resolves by id.
    let dose = next_dose(&fx.repository.snapshot()).unwrap();
    assert_eq!(dose.compartment_id, 2);
}

#[test]
fn test_clear_returns_slot_to_unassigned() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    let date = tomorrow();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &date, "08:00"))
        .unwrap();
    assert!(next_dose(&fx.repository.snapshot()).is_some());

    fx.repository.clear(1).unwrap();
    assert_eq!(next_dose(&fx.repository.snapshot()), None);
    assert!(fx.center.scheduled().is_empty());
}

#[test]
fn test_reedit_reschedules_single_alert() {
    let fx = fixture();
    let _pipeline = fx.monitor.start(|_, _| {}).unwrap();

    let date = tomorrow();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &date, "08:00"))
        .unwrap();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &date, "09:00"))
        .unwrap();
    fx.repository
        .update(1, ScheduleUpdate::new("Losartana", &date, "10:00"))
        .unwrap();

    // Three snapshot changes, still exactly one live alert.
    let alerts = fx.center.scheduled();
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].fire_at.format("%H:%M").to_string() == "10:00");
}
