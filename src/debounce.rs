//! Keystroke entry point: coalesce edits, run one orchestrator call per quiet
//! period, and publish the resulting ghost text.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{HostConfig, RequestConfig};
use crate::orchestrator::{Orchestrator, Suggestion};
use crate::session::Session;

/// Quiet period after the last keystroke before a call is made.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Receives the field's committed value.
pub trait ValueSink: Send + Sync {
    fn commit(&self, value: &str);
}

/// A completion ready to be shown after `source_text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PendingSuggestion {
    pub source_text: String,
    pub completion: String,
    pub generation: u64,
}

impl PendingSuggestion {
    /// What the field shows: the typed text followed by the completion.
    pub fn ghost_text(&self) -> String {
        format!("{}{}", self.source_text, self.completion)
    }
}

struct State {
    text: String,
    timer: Option<JoinHandle<()>>,
}

struct Inner {
    orchestrator: Arc<Orchestrator>,
    session: Arc<Session>,
    host: watch::Receiver<HostConfig>,
    state: Mutex<State>,
    display: watch::Sender<Option<PendingSuggestion>>,
    sink: Arc<dyn ValueSink>,
    quiet_period: Duration,
}

pub struct DebounceScheduler {
    inner: Arc<Inner>,
}

impl DebounceScheduler {
    pub fn new(
        orchestrator: Arc<Orchestrator>,
        session: Arc<Session>,
        host: watch::Receiver<HostConfig>,
        sink: Arc<dyn ValueSink>,
    ) -> Self {
        Self::with_quiet_period(orchestrator, session, host, sink, DEBOUNCE_DELAY)
    }

    pub fn with_quiet_period(
        orchestrator: Arc<Orchestrator>,
        session: Arc<Session>,
        host: watch::Receiver<HostConfig>,
        sink: Arc<dyn ValueSink>,
        quiet_period: Duration,
    ) -> Self {
        let (display, _) = watch::channel(None);
        Self {
            inner: Arc::new(Inner {
                orchestrator,
                session,
                host,
                state: Mutex::new(State {
                    text: String::new(),
                    timer: None,
                }),
                display,
                sink,
                quiet_period,
            }),
        }
    }

    /// Handle one edit: hide the current suggestion and restart the timer.
    ///
    /// Must be called from within a tokio runtime.
    pub fn on_text_changed(&self, text: impl Into<String>) {
        let text = text.into();
        let mut state = self.inner.lock_state();
        state.text.clone_from(&text);
        self.inner.display.send_replace(None);

        if let Some(previous) = state.timer.take() {
            previous.abort();
        }

        let inner = Arc::clone(&self.inner);
        state.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(inner.quiet_period).await;
            // The call runs detached so a later keystroke only resets the
            // timer; the next call supersedes this one through its token.
            tokio::spawn(inner.fire(text));
        }));
    }

    /// Accept the displayed suggestion: the ghost text becomes the field
    /// value, is committed once, and a continuation is requested for it.
    pub fn accept(&self) -> Option<String> {
        let pending = self.inner.display.send_replace(None)?;
        let accepted = pending.ghost_text();
        self.inner.sink.commit(&accepted);
        self.on_text_changed(accepted.clone());
        Some(accepted)
    }

    /// Commit the typed text as-is (focus lost) and hide any suggestion.
    pub fn commit(&self) -> String {
        let text = self.inner.lock_state().text.clone();
        self.inner.display.send_replace(None);
        self.inner.sink.commit(&text);
        text
    }

    pub fn current(&self) -> Option<PendingSuggestion> {
        self.inner.display.borrow().clone()
    }

    pub fn text(&self) -> String {
        self.inner.lock_state().text.clone()
    }

    /// Watch the displayed suggestion. `None` means nothing is shown.
    pub fn subscribe(&self) -> watch::Receiver<Option<PendingSuggestion>> {
        self.inner.display.subscribe()
    }

    pub fn session(&self) -> &Arc<Session> {
        &self.inner.session
    }
}

impl Drop for DebounceScheduler {
    fn drop(&mut self) {
        if let Some(timer) = self.inner.lock_state().timer.take() {
            timer.abort();
        }
        self.inner.session.calls().cancel_all();
    }
}

impl Inner {
    fn lock_state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(self: Arc<Self>, text: String) {
        if text.trim().is_empty() {
            return;
        }

        // Rebuilt on every call so host edits apply to the next keystroke.
        let host = self.host.borrow().clone();
        let config = match RequestConfig::from_host(&host) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("suggestion skipped: {e}");
                return;
            }
        };

        let suggestion = self.orchestrator.suggest(&self.session, &config, &text).await;
        self.apply(&text, suggestion);
    }

    fn apply(&self, text: &str, suggestion: Suggestion) {
        if suggestion.text.is_empty() {
            return;
        }
        let state = self.lock_state();
        let current = self.session.calls().current_generation();
        if suggestion.generation != current || state.text != text {
            tracing::debug!(generation = suggestion.generation, current, "discarding stale suggestion");
            return;
        }
        self.display.send_replace(Some(PendingSuggestion {
            source_text: text.to_string(),
            completion: suggestion.text,
            generation: suggestion.generation,
        }));
    }
}
