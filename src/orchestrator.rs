//! One logical suggestion call: supersede, admit, build, dispatch, resolve.

use serde::Serialize;

use crate::config::RequestConfig;
use crate::dispatch::cancel::CallHandle;
use crate::dispatch::http::HttpDispatch;
use crate::dispatch::rate_limit::RateLimiter;
use crate::dispatch::send_billed;
use crate::error::GhostError;
use crate::prompt::{ApiFormat, build_payload, render_prompt};
use crate::session::Session;
use crate::toolcall::ToolSet;
use crate::toolcall::protocol::{self, ToolRound};

/// The completion text for one call and the generation it belongs to.
/// `text` is empty when the call produced nothing usable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Suggestion {
    pub text: String,
    pub generation: u64,
}

pub struct Orchestrator {
    http: HttpDispatch,
    tools: ToolSet,
    limiter: RateLimiter,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator {
    /// Orchestrator with the standard tool set and the wall-clock limiter.
    pub fn new() -> Self {
        Self {
            http: HttpDispatch::new(),
            tools: ToolSet::standard(),
            limiter: RateLimiter::new(),
        }
    }

    pub fn with_tools(mut self, tools: ToolSet) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    /// Produce a suggestion for `text`.
    ///
    /// Starting the call cancels whatever call `session` had in flight. All
    /// failures are absorbed: the result is then an empty suggestion and the
    /// session counters are the only record.
    pub async fn suggest(&self, session: &Session, config: &RequestConfig, text: &str) -> Suggestion {
        let handle = session.calls().begin_call();
        let generation = handle.generation;

        if text.trim().is_empty() {
            return Suggestion {
                text: String::new(),
                generation,
            };
        }

        let text = match self.run(session, config, text, &handle).await {
            Ok(text) => text,
            Err(GhostError::Cancelled) => {
                tracing::debug!(generation, "suggestion call superseded");
                String::new()
            }
            Err(e) => {
                tracing::warn!(generation, status = ?e.status(), "suggestion failed: {e}");
                String::new()
            }
        };

        Suggestion { text, generation }
    }

    async fn run(
        &self,
        session: &Session,
        config: &RequestConfig,
        text: &str,
        handle: &CallHandle,
    ) -> Result<String, GhostError> {
        self.limiter
            .admit(session, config.rpm_limit, &handle.token)
            .await?;

        let prompt = render_prompt(config, text);
        let descriptors = self.tools.descriptors();
        let payload = build_payload(config, &prompt, Some(descriptors.as_slice()));

        let first = send_billed(&self.http, session, config, &payload, &handle.token).await?;

        // Legacy responses cannot carry tool calls; only chat may branch.
        if payload.shape != ApiFormat::Chat && first.has_tool_calls() {
            return Err(GhostError::SchemaParse(
                "tool calls in a legacy completion response".to_string(),
            ));
        }

        let round = ToolRound {
            http: &self.http,
            session,
            config,
            tools: &self.tools,
        };
        protocol::resolve(&round, text, &first, handle).await
    }
}
