use std::fs;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use reminder_domain::{
    agenda::AgendaView,
    clock::ManualClock,
    draft::AppointmentDraft,
    extraction::AppointmentExtractor,
    scheduler::ReminderStatus,
    storage::FileStore,
    store::{StoreChange, APPOINTMENTS_KEY},
    Appointment, AppointmentId, ExtractionError, NotificationRequest, NotificationSink,
    NotifyError, PartialAppointment, PermissionState, ReminderError, ReminderService,
};
use tempfile::tempdir;

struct HostNotifier {
    host_state: PermissionState,
    answer: PermissionState,
    prompts: Mutex<usize>,
    sent: Mutex<Vec<NotificationRequest>>,
}

impl HostNotifier {
    fn new(host_state: PermissionState, answer: PermissionState) -> Arc<Self> {
        Arc::new(Self {
            host_state,
            answer,
            prompts: Mutex::new(0),
            sent: Mutex::new(Vec::new()),
        })
    }

    fn bodies(&self) -> Vec<String> {
        self.sent.lock().iter().map(|n| n.body.clone()).collect()
    }
}

#[async_trait]
impl NotificationSink for HostNotifier {
    fn permission(&self) -> PermissionState {
        self.host_state
    }

    async fn request_permission(&self) -> PermissionState {
        *self.prompts.lock() += 1;
        self.answer
    }

    fn deliver(&self, notification: NotificationRequest) -> Result<(), NotifyError> {
        self.sent.lock().push(notification);
        Ok(())
    }
}

struct CannedExtractor(Result<Option<PartialAppointment>, String>);

#[async_trait]
impl AppointmentExtractor for CannedExtractor {
    async fn extract(
        &self,
        _text: &str,
        _today: NaiveDate,
    ) -> Result<Option<PartialAppointment>, ExtractionError> {
        self.0.clone().map_err(ExtractionError::Failed)
    }
}

fn noon() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 3, 5)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

fn build(
    root: &Path,
    notifier: Arc<HostNotifier>,
    clock: Arc<ManualClock>,
) -> ReminderService {
    ReminderService::builder()
        .with_storage(Arc::new(FileStore::new(root)))
        .with_notification_sink(notifier)
        .with_clock(clock)
        .build()
}

#[test]
fn mutations_persist_and_reload_from_disk() {
    let temp = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(noon()));
    let notifier = HostNotifier::new(PermissionState::Granted, PermissionState::Granted);
    let service = build(temp.path(), notifier.clone(), clock.clone());

    let dentist = service.add("Dentist", "2025-03-05", "14:30").expect("add");
    let gym = service.add("Gym", "2025-03-04", "07:00").expect("add");
    service
        .update(&gym.id, "Gym (legs)", "2025-03-06", "07:00")
        .expect("update");
    service.remove(&dentist.id);
    service.remove(&AppointmentId::from("never-existed"));

    let on_disk = fs::read_to_string(temp.path().join(format!("{APPOINTMENTS_KEY}.json")))
        .expect("read stored appointments");
    assert!(on_disk.contains("Gym (legs)"));
    assert!(!on_disk.contains("Dentist"));

    let reopened = build(temp.path(), notifier, clock);
    assert_eq!(reopened.list(), service.list());
    assert_eq!(
        reopened.list(),
        vec![Appointment::new(gym.id.clone(), "Gym (legs)", "2025-03-06", "07:00")]
    );
}

#[test]
fn corrupt_storage_starts_with_empty_agenda() {
    let temp = tempdir().expect("tempdir");
    fs::write(temp.path().join("appointments.json"), "[{\"id\":").expect("write fixture");
    let clock = Arc::new(ManualClock::new(noon()));
    let notifier = HostNotifier::new(PermissionState::Granted, PermissionState::Granted);
    let service = build(temp.path(), notifier, clock);

    assert_eq!(service.agenda(), AgendaView::Empty);
    service.add("Fresh start", "2025-03-05", "13:00").expect("add after corrupt load");
    assert_eq!(service.list().len(), 1);
}

#[test]
fn store_contract_violations_are_surfaced() {
    let service = ReminderService::builder().build();
    let appt = Appointment::new("fixed".into(), "Dentist", "2025-03-05", "14:30");
    service.insert(appt.clone()).expect("first insert");

    assert_eq!(
        service.insert(appt),
        Err(ReminderError::DuplicateId("fixed".into()))
    );
    assert_eq!(
        service.update(&"ghost".into(), "x", "2025-03-05", "14:30"),
        Err(ReminderError::NotFound("ghost".into()))
    );
}

#[test]
fn edit_re_arms_a_delivered_reminder() {
    let temp = tempdir().expect("tempdir");
    let clock = Arc::new(ManualClock::new(noon()));
    let notifier = HostNotifier::new(PermissionState::Granted, PermissionState::Granted);
    let service = build(temp.path(), notifier.clone(), clock.clone());

    let appt = service.add("Call Mom", "2025-03-05", "11:00").expect("add");
    assert_eq!(service.tick().delivered, vec![appt.id.clone()]);
    assert!(service.tick().delivered.is_empty());
    assert_eq!(service.status(&appt.id), Some(ReminderStatus::Notified));

    // Still in the past after the edit, so exactly one more reminder.
    service
        .update(&appt.id, "Call Mom back", "2025-03-05", "11:30")
        .expect("update");
    assert_eq!(service.status(&appt.id), Some(ReminderStatus::Due));
    service.tick();
    service.tick();
    assert_eq!(notifier.bodies(), vec!["Call Mom", "Call Mom back"]);

    // Moved into the future: nothing until the clock catches up.
    service
        .update(&appt.id, "Call Mom back", "2025-03-05", "12:30")
        .expect("update");
    assert!(service.tick().is_idle());
    clock.advance(Duration::minutes(31));
    assert_eq!(service.tick().delivered.len(), 1);
    assert_eq!(notifier.bodies().len(), 3);
}

#[tokio::test]
async fn late_grant_delivers_missed_reminders() {
    let clock = Arc::new(ManualClock::new(noon()));
    let notifier = HostNotifier::new(PermissionState::Unset, PermissionState::Granted);
    let service = ReminderService::builder()
        .with_notification_sink(notifier.clone())
        .with_clock(clock)
        .build();

    let appt = service.add("Pay rent", "2025-03-01", "09:00").expect("add");
    let held = service.tick();
    assert_eq!(held.awaiting_permission, vec![appt.id.clone()]);
    assert!(notifier.bodies().is_empty());

    assert_eq!(service.request_permission().await, PermissionState::Granted);
    assert_eq!(service.tick().delivered, vec![appt.id]);
    assert!(service.tick().is_idle());
    assert_eq!(notifier.bodies(), vec!["Pay rent"]);
}

#[tokio::test]
async fn denied_permission_is_not_prompted_again() {
    let notifier = HostNotifier::new(PermissionState::Denied, PermissionState::Granted);
    let service = ReminderService::builder()
        .with_notification_sink(notifier.clone())
        .build();

    assert_eq!(service.permission_state(), PermissionState::Denied);
    assert_eq!(service.request_permission().await, PermissionState::Denied);
    assert_eq!(*notifier.prompts.lock(), 0);
}

#[tokio::test]
async fn extraction_distinguishes_failure_from_not_understood() {
    let not_understood = ReminderService::builder()
        .with_extractor(Arc::new(CannedExtractor(Ok(None))))
        .build();
    assert!(matches!(not_understood.extract("blah").await, Ok(None)));

    let unavailable = ReminderService::builder()
        .with_extractor(Arc::new(CannedExtractor(Err("connection reset".into()))))
        .build();
    let err = unavailable.extract("dentist tomorrow").await.unwrap_err();
    assert!(matches!(err, ExtractionError::Failed(_)));
    assert!(err.is_retryable());

    assert!(matches!(
        unavailable.extract("   ").await,
        Err(ExtractionError::EmptyText)
    ));
    assert!(matches!(
        ReminderService::builder().build().extract("dentist").await,
        Err(ExtractionError::Unconfigured)
    ));
}

#[tokio::test]
async fn draft_flow_creates_and_edits_through_the_service() {
    let partial = PartialAppointment {
        title: Some("Dentist".into()),
        date: Some("2025-03-07".into()),
        time: None,
    };
    let service = ReminderService::builder()
        .with_extractor(Arc::new(CannedExtractor(Ok(Some(partial)))))
        .build();
    let mut changes = service.subscribe();

    let mut draft = AppointmentDraft::blank();
    let ticket = draft.begin_extraction().expect("ticket");
    let result = service.extract("dentist on friday").await.expect("extract");
    draft.apply_extraction(ticket, result);
    assert!(matches!(
        service.save_draft(&draft),
        Err(ReminderError::Draft(_))
    ));

    draft.time = "10:15".into();
    let created = service.save_draft(&draft).expect("create");
    assert_eq!(changes.recv().await.unwrap(), StoreChange::Added(created.id.clone()));

    let mut edit = AppointmentDraft::edit(&created);
    edit.title = "Dentist checkup".into();
    let edited = service.save_draft(&edit).expect("update");
    assert_eq!(edited.id, created.id);
    assert_eq!(changes.recv().await.unwrap(), StoreChange::Updated(created.id.clone()));
    assert_eq!(service.list().len(), 1);
    assert_eq!(service.list()[0].title, "Dentist checkup");
}
