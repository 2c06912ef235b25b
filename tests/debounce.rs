//! Debounce scheduler timing on a paused clock, and ghost-text delivery in
//! real time against a mock completion endpoint.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::json;
use tokio::sync::watch;

use common::{MockServer, Reply, chat_reply};
use ghostline::config::HostConfig;
use ghostline::debounce::{DEBOUNCE_DELAY, DebounceScheduler, ValueSink};
use ghostline::orchestrator::Orchestrator;
use ghostline::session::Session;
use ghostline::toolcall::ToolSet;

#[derive(Default)]
struct Recorder(Mutex<Vec<String>>);

impl ValueSink for Recorder {
    fn commit(&self, value: &str) {
        self.0.lock().unwrap().push(value.to_string());
    }
}

fn host(server: &MockServer) -> HostConfig {
    HostConfig::from_json(json!({"api_url": server.url("/v1/chat/completions")})).unwrap()
}

fn scheduler(server: &MockServer, quiet: Duration) -> (DebounceScheduler, Arc<Recorder>, watch::Sender<HostConfig>) {
    let (tx, rx) = watch::channel(host(server));
    let sink = Arc::new(Recorder::default());
    let scheduler = DebounceScheduler::with_quiet_period(
        Arc::new(Orchestrator::new().with_tools(ToolSet::empty())),
        Arc::new(Session::new()),
        rx,
        sink.clone(),
        quiet,
    );
    (scheduler, sink, tx)
}

fn prompt_of(req: &common::Recorded) -> String {
    req.body["messages"][0]["content"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Timing (paused clock)
// ---------------------------------------------------------------------------

/// Scheduler whose endpoint URL does not parse, so every call fails at once
/// without network I/O. `total_requests` records when a call fired.
fn offline_scheduler() -> (DebounceScheduler, Arc<Session>) {
    let host = HostConfig::from_json(json!({"api_url": "not a url"})).unwrap();
    let (_tx, rx) = watch::channel(host);
    let session = Arc::new(Session::new());
    let scheduler = DebounceScheduler::new(
        Arc::new(Orchestrator::new().with_tools(ToolSet::empty())),
        session.clone(),
        rx,
        Arc::new(Recorder::default()),
    );
    (scheduler, session)
}

/// Let spawned timer and call tasks run at the current instant.
async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}

async fn advance(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    settle().await;
}

#[tokio::test(start_paused = true)]
async fn call_fires_exactly_one_quiet_period_after_last_keystroke() {
    assert_eq!(DEBOUNCE_DELAY, Duration::from_millis(500));
    let (scheduler, session) = offline_scheduler();

    for text in ["H", "He", "Hel", "Hell"] {
        scheduler.on_text_changed(text);
        advance(100).await;
    }
    scheduler.on_text_changed("Hello");

    advance(499).await;
    assert_eq!(session.counters().total_requests, 0);

    advance(1).await;
    assert_eq!(session.counters().total_requests, 1);

    advance(5_000).await;
    let c = session.counters();
    assert_eq!(c.total_requests, 1);
    assert_eq!(c.failed_requests, 1);
    assert!(scheduler.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn keystroke_just_before_deadline_restarts_timer() {
    let (scheduler, session) = offline_scheduler();

    scheduler.on_text_changed("Our");
    advance(499).await;
    scheduler.on_text_changed("Our f");
    advance(499).await;
    assert_eq!(session.counters().total_requests, 0);

    advance(1).await;
    assert_eq!(session.counters().total_requests, 1);
}

#[tokio::test(start_paused = true)]
async fn whitespace_only_text_makes_no_call() {
    let (scheduler, session) = offline_scheduler();

    scheduler.on_text_changed("   ");
    advance(2_000).await;
    assert_eq!(session.counters(), Default::default());
    assert!(scheduler.current().is_none());
}

#[tokio::test(start_paused = true)]
async fn dropping_scheduler_cancels_pending_timer() {
    let (scheduler, session) = offline_scheduler();

    scheduler.on_text_changed("pending");
    advance(100).await;
    drop(scheduler);
    advance(2_000).await;
    assert_eq!(session.counters().total_requests, 0);
}

// ---------------------------------------------------------------------------
// Delivery (real time, mock endpoint)
// ---------------------------------------------------------------------------

#[tokio::test]
async fn slow_stale_response_never_displays() {
    let server = MockServer::start(|req, _| {
        let prompt = req.body["messages"][0]["content"].as_str().unwrap_or("");
        if prompt == "Our" {
            Reply::ok(chat_reply(" stale", 1, 1)).after(Duration::from_millis(800))
        } else {
            Reply::ok(chat_reply(" are low", 1, 1))
        }
    })
    .await;
    let (scheduler, _, _tx) = scheduler(&server, Duration::from_millis(100));
    let mut shown = scheduler.subscribe();

    scheduler.on_text_changed("Our");
    tokio::time::sleep(Duration::from_millis(250)).await;
    assert_eq!(server.requests().len(), 1, "first call in flight");

    scheduler.on_text_changed("Our fees");
    tokio::time::sleep(Duration::from_millis(1200)).await;

    let current = scheduler.current().expect("second suggestion displayed");
    assert_eq!(current.ghost_text(), "Our fees are low");

    assert!(shown.has_changed().unwrap());
    let last = shown.borrow_and_update().clone();
    assert_eq!(last.map(|p| p.completion), Some(" are low".to_string()));

    let c = scheduler.session().counters();
    assert_eq!(c.total_requests, 2);
    assert_eq!(c.cancelled_requests, 1);
}

#[tokio::test]
async fn accept_commits_and_fetches_continuation() {
    let server = MockServer::start(|_, index| {
        Reply::ok(chat_reply(if index == 0 { " are low" } else { " and fair" }, 1, 1))
    })
    .await;
    let (scheduler, sink, _tx) = scheduler(&server, Duration::from_millis(100));

    scheduler.on_text_changed("Our fees");
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(scheduler.current().is_some());

    let accepted = scheduler.accept();
    assert_eq!(accepted.as_deref(), Some("Our fees are low"));
    assert_eq!(*sink.0.lock().unwrap(), vec!["Our fees are low".to_string()]);
    assert!(scheduler.current().is_none());

    tokio::time::sleep(Duration::from_millis(500)).await;
    let requests = server.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(prompt_of(&requests[1]), "Our fees are low");
    assert_eq!(
        scheduler.current().map(|p| p.ghost_text()).as_deref(),
        Some("Our fees are low and fair")
    );
    assert_eq!(sink.0.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn host_config_changes_apply_to_next_call() {
    let server = MockServer::start(|_, _| Reply::ok(chat_reply("!", 1, 1))).await;
    let (scheduler, _, tx) = scheduler(&server, Duration::from_millis(50));

    tx.send_modify(|host| host.prompt_template = Some("Title: {question_title}\n{text}".into()));
    tx.send_modify(|host| host.question_title = Some("Fees".into()));

    scheduler.on_text_changed("Hi");
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(prompt_of(&server.requests()[0]), "Title: Fees\nHi");
}
