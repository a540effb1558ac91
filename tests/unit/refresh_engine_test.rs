//! Refresh engine: diffing fetched streams, notification toggles and the
//! auto-refresh loop.

#[path = "../common/mod.rs"]
mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use common::*;
use gitdesk::managers::account::Account;
use gitdesk::managers::change_detector::StreamKind;
use gitdesk::managers::refresh_engine::{RefreshEngine, RefreshReport, StreamBatch};
use gitdesk::services::credential_store::CredentialStore;
use gitdesk::services::http_transport::{
    HttpRequest, HttpResponse, HttpTransport, Method, ProgressFn, ScriptedTransport,
};
use gitdesk::services::notifier::RecordingNotifier;
use gitdesk::types::auth::SetupOutcome;
use gitdesk::types::errors::ApiError;
use gitdesk::types::repository::Repository;
use gitdesk::types::settings::NotificationSettings;
use parking_lot::Mutex;
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::AsyncWrite;
use tokio::sync::{watch, Semaphore};
use tokio_util::sync::CancellationToken;

const ALL_ON: NotificationSettings = NotificationSettings {
    activity: true,
    notifications: true,
    starred: true,
    watched: true,
};

struct Harness {
    _dir: TempDir,
    transport: ScriptedTransport,
    account: Arc<Account>,
    notifier: RecordingNotifier,
    engine: Arc<RefreshEngine>,
}

async fn harness(toggles: NotificationSettings) -> Harness {
    let transport = ScriptedTransport::new();
    harness_over(toggles, transport.clone(), Arc::new(transport)).await
}

/// `scripted` holds the canned responses; requests go out through `wire`.
async fn harness_over(
    toggles: NotificationSettings,
    scripted: ScriptedTransport,
    wire: Arc<dyn HttpTransport>,
) -> Harness {
    let dir = TempDir::new().unwrap();
    let store = Arc::new(CredentialStore::new(dir.path()).unwrap());
    save_credential(&store, 0, "gho_token", "octocat");
    script_user(&scripted, "octocat");
    let account = Arc::new(Account::new(0, store, wire, TestPrompt::accepting()));
    assert_eq!(account.connect().await, SetupOutcome::Ready);

    let notifier = RecordingNotifier::new();
    let engine = Arc::new(RefreshEngine::new(Arc::new(notifier.clone()), toggles));
    Harness {
        _dir: dir,
        transport: scripted,
        account,
        notifier,
        engine,
    }
}

/// Holds every `/user/starred` request for `delay` and then until a gate
/// permit is free, before answering from the script.
#[derive(Clone)]
struct GatedTransport {
    inner: ScriptedTransport,
    gate: Arc<Semaphore>,
    delay: Duration,
    waiting: Arc<AtomicUsize>,
}

impl GatedTransport {
    fn new(inner: &ScriptedTransport, permits: usize, delay: Duration) -> Self {
        Self {
            inner: inner.clone(),
            gate: Arc::new(Semaphore::new(permits)),
            delay,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }
}

#[async_trait]
impl HttpTransport for GatedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        if request.path() == "/user/starred" {
            self.waiting.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let _permit = self.gate.acquire().await.map_err(|e| ApiError::Network(e.to_string()))?;
        }
        self.inner.send(request).await
    }

    async fn download(
        &self,
        request: HttpRequest,
        sink: &mut (dyn AsyncWrite + Unpin + Send),
        progress: ProgressFn<'_>,
    ) -> Result<u64, ApiError> {
        self.inner.download(request, sink, progress).await
    }
}

fn list(items: Vec<Value>) -> HttpResponse {
    HttpResponse::json_body(200, &Value::Array(items))
}

fn starred(pushes: &[&str]) -> HttpResponse {
    list(
        pushes
            .iter()
            .enumerate()
            .map(|(i, p)| repo_json(i as u64 + 1, &format!("repo{}", i + 1), p))
            .collect(),
    )
}

const T1: &str = "2024-01-01T00:00:00Z";
const T2: &str = "2024-02-01T00:00:00Z";

#[tokio::test]
async fn test_starred_push_notifies_once() {
    let h = harness(ALL_ON).await;
    h.transport.push(Method::Get, "/user/starred", starred(&[T1, T1]));
    h.transport.push(Method::Get, "/user/starred", starred(&[T1, T2]));

    let (repos, change) = h.engine.refresh_starred(&h.account).await;
    assert_eq!(repos.len(), 2);
    assert!(change.is_none(), "first load only seeds");
    assert!(h.notifier.is_empty());

    let (_, change) = h.engine.refresh_starred(&h.account).await;
    let change = change.unwrap();
    assert_eq!(change.title, "1 starred repo updated");
    assert_eq!(change.message, "octo/repo2");

    // the last scripted page repeats, so nothing changed
    let (_, change) = h.engine.refresh_starred(&h.account).await;
    assert!(change.is_none());

    let shown = h.notifier.shown();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].title, "1 starred repo updated");
    assert_eq!(shown[0].body, "octo/repo2");
}

#[tokio::test]
async fn test_disabled_stream_still_replaces_snapshot() {
    let h = harness(NotificationSettings::default()).await;
    h.transport.push(Method::Get, "/user/starred", starred(&[T1]));
    h.transport.push(Method::Get, "/user/starred", starred(&[T2]));

    h.engine.refresh_starred(&h.account).await;
    let (_, change) = h.engine.refresh_starred(&h.account).await;
    assert!(change.is_none());
    assert!(h.notifier.is_empty());

    h.engine.set_toggles(ALL_ON);
    let (_, change) = h.engine.refresh_starred(&h.account).await;
    assert!(change.is_none(), "a suppressed change is not reported later");
    assert!(h.notifier.is_empty());
}

#[tokio::test]
async fn test_failed_fetch_keeps_previous_snapshot() {
    let h = harness(ALL_ON).await;
    h.transport.push(Method::Get, "/user/starred", starred(&[T1]));
    h.transport.push(Method::Get, "/user/starred", HttpResponse::status_only(500));
    h.transport.push(Method::Get, "/user/starred", starred(&[T2]));

    h.engine.refresh_starred(&h.account).await;
    let (repos, change) = h.engine.refresh_starred(&h.account).await;
    assert!(repos.is_empty());
    assert!(change.is_none());

    let (_, change) = h.engine.refresh_starred(&h.account).await;
    assert_eq!(change.unwrap().count, 1, "diffed against the fetch before the failure");
}

#[tokio::test]
async fn test_failed_first_fetch_leaves_stream_uninitialized() {
    let h = harness(ALL_ON).await;
    h.transport.push(Method::Get, "/notifications", HttpResponse::status_only(503));

    let (items, change) = h.engine.refresh_notifications(&h.account).await;

    assert!(items.is_empty() && change.is_none());
    assert!(!h.engine.is_initialized(StreamKind::Notifications).await);
}

#[tokio::test]
async fn test_new_unread_notification_is_announced() {
    let h = harness(ALL_ON).await;
    h.transport.push(
        Method::Get,
        "/notifications",
        list(vec![notification_json("t1", "Build broke", true)]),
    );
    h.transport.push(
        Method::Get,
        "/notifications",
        list(vec![
            notification_json("t2", "Review requested", true),
            notification_json("t1", "Build broke", true),
        ]),
    );

    h.engine.refresh_notifications(&h.account).await;
    let (items, change) = h.engine.refresh_notifications(&h.account).await;

    assert_eq!(items.len(), 2);
    assert_eq!(change.unwrap().title, "1 new GitHub notification");
    assert_eq!(h.notifier.shown()[0].body, "Review requested (octo/repo)");
}

#[tokio::test]
async fn test_partial_notification_listing_keeps_snapshot() {
    let h = harness(ALL_ON).await;
    let first_page: Vec<Value> = (0..50)
        .map(|i| notification_json(&format!("t{}", i), "Build broke", true))
        .collect();
    let second_page: Vec<Value> = (50..60)
        .map(|i| notification_json(&format!("t{}", i), "Build broke", true))
        .collect();
    h.transport
        .push_with_query(Method::Get, "/notifications", &[("page", "1")], list(first_page));
    for reply in [list(second_page.clone()), HttpResponse::status_only(502), list(second_page)] {
        h.transport
            .push_with_query(Method::Get, "/notifications", &[("page", "2")], reply);
    }

    let (seeded, _) = h.engine.refresh_notifications(&h.account).await;
    let (failed, change) = h.engine.refresh_notifications(&h.account).await;
    assert_eq!(seeded.len(), 60);
    assert!(failed.is_empty() && change.is_none());

    let (items, change) = h.engine.refresh_notifications(&h.account).await;
    assert_eq!(items.len(), 60);
    assert!(change.is_none(), "threads seen before the failure are not new");
    assert!(h.notifier.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_refreshes_of_one_stream_are_serialized() {
    let scripted = ScriptedTransport::new();
    let gated = GatedTransport::new(&scripted, Semaphore::MAX_PERMITS, Duration::from_millis(50));
    let h = harness_over(ALL_ON, scripted, Arc::new(gated)).await;
    h.transport.push(Method::Get, "/user/starred", starred(&[T1]));
    h.transport.push(Method::Get, "/user/starred", starred(&[T2]));
    h.engine.refresh_starred(&h.account).await;

    let ((_, a), (_, b)) = tokio::join!(
        h.engine.refresh_starred(&h.account),
        h.engine.refresh_starred(&h.account)
    );

    assert_eq!(a.is_some() as usize + b.is_some() as usize, 1);
    assert_eq!(h.notifier.len(), 1);
    let latest: Vec<Repository> = vec![serde_json::from_value(repo_json(1, "repo1", T2)).unwrap()];
    assert!(
        h.engine.ingest(StreamBatch::Starred(&latest)).await.is_none(),
        "snapshot holds the response applied last"
    );
}

#[tokio::test]
async fn test_blocked_stream_does_not_hold_up_another() {
    let scripted = ScriptedTransport::new();
    let gated = GatedTransport::new(&scripted, 0, Duration::ZERO);
    let h = harness_over(ALL_ON, scripted, Arc::new(gated.clone())).await;
    h.transport.push(Method::Get, "/user/starred", starred(&[T1]));
    h.transport.push(
        Method::Get,
        "/users/octocat/received_events",
        list(vec![event_json("e1", "hubot")]),
    );

    let starred_task = {
        let engine = Arc::clone(&h.engine);
        let account = Arc::clone(&h.account);
        tokio::spawn(async move { engine.refresh_starred(&account).await })
    };
    while gated.waiting.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    let (events, _) = tokio::time::timeout(Duration::from_secs(5), h.engine.refresh_feed(&h.account))
        .await
        .expect("feed refresh waited on the starred fetch");
    assert_eq!(events.len(), 1);
    assert!(h.engine.is_initialized(StreamKind::Feed).await);
    assert!(!starred_task.is_finished());

    gated.gate.add_permits(1);
    let (repos, _) = starred_task.await.unwrap();
    assert_eq!(repos.len(), 1);
}

#[tokio::test]
async fn test_ingest_matches_fetch_path() {
    let h = harness(ALL_ON).await;
    let a: Vec<Repository> = vec![serde_json::from_value(repo_json(1, "a", T1)).unwrap()];
    let b: Vec<Repository> = vec![serde_json::from_value(repo_json(1, "a", T2)).unwrap()];

    assert!(h.engine.ingest(StreamBatch::Watched(&a)).await.is_none());
    let change = h.engine.ingest(StreamBatch::Watched(&b)).await.unwrap();

    assert_eq!(change.stream, StreamKind::Watched);
    assert_eq!(change.title, "1 watched repo updated");
    assert!(!h.engine.is_initialized(StreamKind::Starred).await, "streams are independent");
}

fn script_all_lists(transport: &ScriptedTransport) {
    transport.push(
        Method::Get,
        "/users/octocat/received_events",
        list(vec![event_json("e1", "hubot"), event_json("e2", "hubot")]),
    );
    transport.push(Method::Get, "/user/repos", list(vec![repo_json(10, "mine", T1)]));
    transport.push(Method::Get, "/user/starred", starred(&[T1, T1, T1]));
    transport.push(Method::Get, "/user/subscriptions", starred(&[T1]));
    transport.push(Method::Get, "/user/following", list(vec![user_json("hubot")]));
    transport.push(
        Method::Get,
        "/notifications",
        list(vec![notification_json("t1", "a", true)]),
    );
}

#[tokio::test]
async fn test_refresh_all_loads_every_list() {
    let h = harness(ALL_ON).await;
    script_all_lists(&h.transport);

    let report = h.engine.refresh_all(&h.account).await;

    assert_eq!(report.feed.len(), 2);
    assert_eq!(report.repos.len(), 1);
    assert_eq!(report.starred.len(), 3);
    assert_eq!(report.watched.len(), 1);
    assert_eq!(report.following.len(), 1);
    assert_eq!(report.notifications.len(), 1);
    assert!(report.notified.is_empty());
    for kind in StreamKind::ALL {
        assert!(h.engine.is_initialized(kind).await, "{} not seeded", kind.as_str());
    }
}

#[tokio::test]
async fn test_refresh_all_collects_notified_changes() {
    let h = harness(ALL_ON).await;
    script_all_lists(&h.transport);
    h.transport.push(
        Method::Get,
        "/users/octocat/received_events",
        list(vec![event_json("e3", "hubot"), event_json("e1", "hubot")]),
    );
    h.engine.refresh_all(&h.account).await;

    let report = h.engine.refresh_all(&h.account).await;

    assert_eq!(report.notified.len(), 1);
    assert_eq!(report.notified[0].stream, StreamKind::Feed);
    assert_eq!(h.notifier.len(), 1);
}

#[tokio::test]
async fn test_failed_list_is_empty_in_report() {
    let h = harness(ALL_ON).await;
    script_all_lists(&h.transport);
    h.transport.push(Method::Get, "/user/following", HttpResponse::status_only(500));
    // the first refresh consumes the 200, later ones get the 500
    h.engine.refresh_all(&h.account).await;

    let report = h.engine.refresh_all(&h.account).await;
    assert!(report.following.is_empty());
    assert_eq!(report.repos.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_ticks_until_cancelled() {
    let h = harness(ALL_ON).await;
    script_all_lists(&h.transport);
    let (_tx, rx) = watch::channel(Some(Arc::clone(&h.account)));
    let cancel = CancellationToken::new();
    let reports: Arc<Mutex<Vec<RefreshReport>>> = Arc::default();

    let task = {
        let engine = Arc::clone(&h.engine);
        let cancel = cancel.clone();
        let reports = Arc::clone(&reports);
        tokio::spawn(async move {
            engine
                .run_auto_refresh(1, rx, cancel, move |report| reports.lock().push(report))
                .await;
        })
    };

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert!(reports.lock().is_empty(), "first refresh waits a full interval");

    tokio::time::sleep(Duration::from_secs(120)).await;
    assert_eq!(reports.lock().len(), 2);

    cancel.cancel();
    task.await.unwrap();
    assert_eq!(reports.lock()[0].feed.len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_auto_refresh_follows_current_account() {
    let h = harness(ALL_ON).await;
    script_all_lists(&h.transport);
    let (tx, rx) = watch::channel(None);
    let cancel = CancellationToken::new();
    let reports: Arc<Mutex<Vec<RefreshReport>>> = Arc::default();

    let task = {
        let engine = Arc::clone(&h.engine);
        let cancel = cancel.clone();
        let reports = Arc::clone(&reports);
        tokio::spawn(async move {
            engine
                .run_auto_refresh(1, rx, cancel, move |report| reports.lock().push(report))
                .await;
        })
    };

    tokio::time::sleep(Duration::from_secs(90)).await;
    assert!(reports.lock().is_empty(), "no account, nothing to refresh");

    tx.send_replace(Some(Arc::clone(&h.account)));
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(reports.lock().len(), 1);

    cancel.cancel();
    task.await.unwrap();
}

#[tokio::test]
async fn test_zero_interval_disables_auto_refresh() {
    let h = harness(ALL_ON).await;
    let (_tx, rx) = watch::channel(Some(Arc::clone(&h.account)));
    let mut called = false;

    h.engine
        .run_auto_refresh(0, rx, CancellationToken::new(), |_| called = true)
        .await;

    assert!(!called);
    assert!(h.transport.requests().iter().all(|r| r.path() == "/user"));
}

#[tokio::test]
async fn test_toggles_can_be_replaced() {
    let h = harness(NotificationSettings::default()).await;
    assert_eq!(h.engine.toggles(), NotificationSettings::default());
    h.engine.set_toggles(ALL_ON);
    assert_eq!(h.engine.toggles(), ALL_ON);
}
