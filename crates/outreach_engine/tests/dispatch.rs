use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use chrono::{DateTime, Utc};
use outreach_core::{ContactRecord, SendStatus, WorkingWindow};
use outreach_engine::{
    CampaignLedger, CancelFlag, DispatchSettings, MessageDispatcher, MessageTemplate, Messenger,
    Scheduler, SendError, SendOutcome, StopReason, TemplateSet,
};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

fn init_logging() {
    static INIT: Once = Once::new();
    INIT.call_once(outreach_logging::initialize_for_tests);
}

#[derive(Default)]
struct ManualScheduler {
    waits: Mutex<Vec<Duration>>,
}

#[async_trait::async_trait]
impl Scheduler for ManualScheduler {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
    }

    fn now(&self) -> DateTime<Utc> {
        // A Monday, mid-morning UTC.
        "2026-08-03T10:00:00Z".parse().unwrap()
    }
}

/// Scheduler that cancels the shared flag the first time it is asked
/// to wait, so window pauses end deterministically in tests.
struct CancellingScheduler {
    waits: Mutex<Vec<Duration>>,
    cancel: CancelFlag,
}

#[async_trait::async_trait]
impl Scheduler for CancellingScheduler {
    async fn wait(&self, duration: Duration) {
        self.waits.lock().unwrap().push(duration);
        self.cancel.cancel();
    }

    fn now(&self) -> DateTime<Utc> {
        "2026-08-03T10:00:00Z".parse().unwrap()
    }
}

/// Messenger scripted with one result per send call.
struct ScriptedMessenger {
    script: Vec<Result<SendOutcome, SendError>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl ScriptedMessenger {
    fn new(script: Vec<Result<SendOutcome, SendError>>) -> Self {
        Self {
            script,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait::async_trait]
impl Messenger for ScriptedMessenger {
    async fn send(&mut self, user_id: &str, _message: &str) -> Result<SendOutcome, SendError> {
        self.calls.lock().unwrap().push(user_id.to_string());
        if self.script.is_empty() {
            return Ok(SendOutcome::Delivered);
        }
        self.script.remove(0)
    }
}

fn contact(name: &str, company: &str) -> ContactRecord {
    ContactRecord {
        full_name: name.to_string(),
        company_name: company.to_string(),
        user_id: format!("uid-{}", name.to_lowercase().replace(' ', "-")),
        ..ContactRecord::default()
    }
}

fn templates() -> TemplateSet {
    TemplateSet::new(vec![MessageTemplate {
        id: "t1".to_string(),
        weight: 100,
        text: "Hi {name}!".to_string(),
    }])
    .unwrap()
}

fn settings() -> DispatchSettings {
    DispatchSettings::default()
}

fn dispatcher(
    script: Vec<Result<SendOutcome, SendError>>,
    settings: DispatchSettings,
) -> (MessageDispatcher<ScriptedMessenger>, Arc<Mutex<Vec<String>>>) {
    let messenger = ScriptedMessenger::new(script);
    let calls = messenger.calls.clone();
    (
        MessageDispatcher::new("main", messenger, templates(), settings),
        calls,
    )
}

#[tokio::test]
async fn delivers_and_records_one_entry_per_contact() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme"), contact("John Roe", "Beta")];
    let (mut dispatcher, calls) = dispatcher(Vec::new(), settings());

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::AudienceExhausted);
    assert_eq!(summary.sent, 2);
    assert_eq!(calls.lock().unwrap().len(), 2);
    assert_eq!(ledger.entries().len(), 2);
    assert_eq!(ledger.entries()[0].status, SendStatus::Sent);
    assert_eq!(ledger.entries()[0].account, "main");
    assert_eq!(ledger.entries()[0].template_id.as_deref(), Some("t1"));
    assert_eq!(ledger.entries()[0].timestamp, "2026-08-03T10:00:00Z");
}

#[tokio::test]
async fn daily_limit_stops_and_defers_the_rest() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [
        contact("A One", "C1"),
        contact("B Two", "C2"),
        contact("C Three", "C3"),
    ];
    let (mut dispatcher, _) = dispatcher(
        Vec::new(),
        DispatchSettings {
            daily_limit: 2,
            ..settings()
        },
    );

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::DailyLimitReached);
    assert_eq!(summary.sent, 2);
    assert_eq!(summary.deferred, 1);
    assert_eq!(ledger.entries().len(), 2);
}

#[tokio::test]
async fn resumes_past_contacts_already_in_the_ledger() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("ledger.jsonl");
    let contacts = [contact("Jane Doe", "Acme"), contact("John Roe", "Beta")];

    // First run sends only Jane, then the process dies.
    {
        let mut ledger = CampaignLedger::open(&path).unwrap();
        let (mut dispatcher, _) = dispatcher(
            Vec::new(),
            DispatchSettings {
                test_contact_limit: Some(1),
                ..settings()
            },
        );
        dispatcher
            .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
            .await
            .unwrap();
    }

    // Second run must skip Jane and only message John.
    let mut ledger = CampaignLedger::open(&path).unwrap();
    let (mut dispatcher, calls) = dispatcher(Vec::new(), settings());
    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(calls.lock().unwrap().as_slice(), ["uid-john-roe"]);
}

#[tokio::test]
async fn transient_failures_retry_then_record_failed() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme")];
    let (mut dispatcher, calls) = dispatcher(
        vec![
            Err(SendError::Transient("503".to_string())),
            Err(SendError::Transient("503".to_string())),
            Err(SendError::Transient("503".to_string())),
        ],
        settings(),
    );

    let scheduler = ManualScheduler::default();
    let summary = dispatcher
        .run(&contacts, &mut ledger, &scheduler, &CancelFlag::new())
        .await
        .unwrap();

    // Three attempts, one ledger entry, exponential backoffs between.
    assert_eq!(calls.lock().unwrap().len(), 3);
    assert_eq!(summary.failed, 1);
    assert_eq!(ledger.entries().len(), 1);
    assert_eq!(ledger.entries()[0].status, SendStatus::Failed);
    let waits = scheduler.waits.lock().unwrap();
    assert!(waits.contains(&Duration::from_secs(5)));
    assert!(waits.contains(&Duration::from_secs(10)));
}

#[tokio::test]
async fn transient_then_success_notes_the_retry() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme")];
    let (mut dispatcher, _) = dispatcher(
        vec![
            Err(SendError::Transient("503".to_string())),
            Ok(SendOutcome::Delivered),
        ],
        settings(),
    );

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.sent, 1);
    assert_eq!(ledger.entries()[0].status, SendStatus::Sent);
    assert_eq!(
        ledger.entries()[0].detail.as_deref(),
        Some("delivered after 2 attempts")
    );
}

#[tokio::test]
async fn already_contacted_counts_as_sent_without_delivery() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme")];
    let (mut dispatcher, _) = dispatcher(vec![Ok(SendOutcome::AlreadyContacted)], settings());

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.sent, 0);
    assert_eq!(summary.already_contacted, 1);
    assert_eq!(ledger.entries()[0].status, SendStatus::Sent);
}

#[tokio::test]
async fn repeated_rate_limits_stop_the_identity() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [
        contact("A One", "C1"),
        contact("B Two", "C2"),
        contact("C Three", "C3"),
    ];
    let (mut dispatcher, _) = dispatcher(
        vec![
            Err(SendError::RateLimited),
            Err(SendError::RateLimited),
            Err(SendError::RateLimited),
        ],
        DispatchSettings {
            rate_limit_stop_after: 3,
            ..settings()
        },
    );

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::IdentityBlocked);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.deferred, 2);
    assert_eq!(ledger.entries().len(), 1);
    assert_eq!(ledger.entries()[0].status, SendStatus::Failed);
}

#[tokio::test]
async fn closed_window_waits_before_sending() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme")];
    // Monday 10:00 UTC is before this afternoon-only window.
    let window = WorkingWindow {
        start_minute: 14 * 60,
        end_minute: 17 * 60,
        days: [true; 7],
    };
    let (mut dispatcher, calls) = dispatcher(
        Vec::new(),
        DispatchSettings {
            window,
            ..settings()
        },
    );

    // The manual scheduler cannot move the clock forward, so cancel
    // from inside the first wait to end the window pause.
    let cancel = CancelFlag::new();
    let scheduler = CancellingScheduler {
        waits: Mutex::new(Vec::new()),
        cancel: cancel.clone(),
    };
    let summary = dispatcher
        .run(&contacts, &mut ledger, &scheduler, &cancel)
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::Cancelled);
    assert!(calls.lock().unwrap().is_empty());
    assert_eq!(scheduler.waits.lock().unwrap().as_slice(), [Duration::from_secs(60)]);
}

#[tokio::test]
async fn window_that_never_opens_stops_the_run() {
    init_logging();
    let dir = TempDir::new().unwrap();
    let mut ledger = CampaignLedger::open(dir.path().join("ledger.jsonl")).unwrap();
    let contacts = [contact("Jane Doe", "Acme")];
    let window = WorkingWindow {
        start_minute: 9 * 60,
        end_minute: 17 * 60,
        days: [false; 7],
    };
    let (mut dispatcher, calls) = dispatcher(
        Vec::new(),
        DispatchSettings {
            window,
            ..settings()
        },
    );

    let summary = dispatcher
        .run(&contacts, &mut ledger, &ManualScheduler::default(), &CancelFlag::new())
        .await
        .unwrap();

    assert_eq!(summary.stop, StopReason::WorkingWindowClosed);
    assert_eq!(summary.deferred, 1);
    assert!(calls.lock().unwrap().is_empty());
}
