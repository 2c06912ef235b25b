use std::sync::Arc;
use std::time::Instant;

use rmcp::handler::server::router::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData as McpError, ServerHandler, tool, tool_handler, tool_router};
use serde::Serialize;
use tokio::sync::watch;

use crate::config::{Config, DEFAULT_RPM_LIMIT, HostConfig, RequestConfig};
use crate::debounce::{DebounceScheduler, PendingSuggestion, ValueSink};
use crate::orchestrator::Orchestrator;
use crate::response::{BridgeMetadata, BridgeResponse};
use crate::session::Session;
use crate::tools::configure::ConfigureRequest;
use crate::tools::editor::{SuggestRequest, TextChangedRequest};

/// Value sink for the stdio bridge: committed values are logged.
pub struct LogSink;

impl ValueSink for LogSink {
    fn commit(&self, value: &str) {
        tracing::info!(chars = value.chars().count(), "value committed");
    }
}

/// What the `suggestion` tool reports.
#[derive(Debug, Serialize)]
struct SuggestionView {
    source_text: String,
    completion: String,
    ghost_text: String,
    generation: u64,
}

impl From<PendingSuggestion> for SuggestionView {
    fn from(p: PendingSuggestion) -> Self {
        Self {
            ghost_text: p.ghost_text(),
            source_text: p.source_text,
            completion: p.completion,
            generation: p.generation,
        }
    }
}

#[derive(Clone)]
pub struct GhostlineServer {
    orchestrator: Arc<Orchestrator>,
    session: Arc<Session>,
    host: Arc<watch::Sender<HostConfig>>,
    scheduler: Arc<DebounceScheduler>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl GhostlineServer {
    pub fn new(config: Config) -> Self {
        Self::with_parts(config, Arc::new(Orchestrator::new()), Arc::new(LogSink))
    }

    pub fn with_parts(
        config: Config,
        orchestrator: Arc<Orchestrator>,
        sink: Arc<dyn ValueSink>,
    ) -> Self {
        let (host, host_rx) = watch::channel(config.host);
        let session = Arc::new(Session::new());
        let scheduler = Arc::new(DebounceScheduler::new(
            Arc::clone(&orchestrator),
            Arc::clone(&session),
            host_rx,
            sink,
        ));
        tracing::info!(tools = orchestrator.tools().len(), "orchestrator ready");
        Self {
            orchestrator,
            session,
            host: Arc::new(host),
            scheduler,
            tool_router: Self::tool_router(),
        }
    }

    fn rpm_limit(&self) -> u32 {
        self.host.borrow().rpm_limit.unwrap_or(DEFAULT_RPM_LIMIT)
    }

    #[tool(
        name = "configure",
        description = "Update the host configuration (endpoint, key, prompt template, model parameters, knowledge base credentials). Applies to the next request."
    )]
    async fn configure(
        &self,
        Parameters(req): Parameters<ConfigureRequest>,
    ) -> Result<CallToolResult, McpError> {
        let replace = req.replace();
        let mut next = if replace {
            HostConfig::default()
        } else {
            self.host.borrow().clone()
        };
        next.merge(req.config)
            .map_err(|e| McpError::invalid_params(e.user_message(), None))?;
        next.apply_env();

        let usable = RequestConfig::from_host(&next);
        self.host.send_replace(next);

        let content = match usable {
            Ok(_) => "configuration updated".to_string(),
            Err(e) => format!("configuration updated; suggestions unavailable: {}", e.user_message()),
        };
        tracing::info!(replace, "host configuration updated");
        Ok(BridgeResponse::success(content, BridgeMetadata::new("configure", 0.0)).into_call_tool_result())
    }

    #[tool(
        name = "text_changed",
        description = "Report the field's full text after an edit. Hides the current suggestion; a new one is requested after 500 ms without further edits."
    )]
    async fn text_changed(
        &self,
        Parameters(req): Parameters<TextChangedRequest>,
    ) -> Result<CallToolResult, McpError> {
        self.scheduler.on_text_changed(req.text);
        Ok(BridgeResponse::success(
            "scheduled".to_string(),
            BridgeMetadata::new("text_changed", 0.0),
        )
        .into_call_tool_result())
    }

    #[tool(
        name = "suggestion",
        description = "Return the ghost text currently displayed, if any, and the text it was computed for.",
        annotations(read_only_hint = true)
    )]
    async fn suggestion(&self) -> Result<CallToolResult, McpError> {
        let current = self.scheduler.current();
        let metadata = match &current {
            Some(p) => BridgeMetadata::new("suggestion", 0.0).with_generation(p.generation),
            None => BridgeMetadata::new("suggestion", 0.0),
        };
        let view = current.map(SuggestionView::from);
        Ok(BridgeResponse::json(&view, metadata).into_call_tool_result())
    }

    #[tool(
        name = "accept",
        description = "Accept the displayed suggestion. The ghost text becomes the field value and the next continuation is requested."
    )]
    async fn accept(&self) -> Result<CallToolResult, McpError> {
        let accepted = self.scheduler.accept();
        Ok(BridgeResponse::json(&accepted, BridgeMetadata::new("accept", 0.0)).into_call_tool_result())
    }

    #[tool(
        name = "commit",
        description = "Commit the field's typed text as its value (focus lost) and hide any suggestion."
    )]
    async fn commit(&self) -> Result<CallToolResult, McpError> {
        let value = self.scheduler.commit();
        Ok(BridgeResponse::success(value, BridgeMetadata::new("commit", 0.0)).into_call_tool_result())
    }

    #[tool(
        name = "suggest",
        description = "Run one suggestion request for `text` now, without debouncing. Supersedes any request in flight. Returns the completion (empty when none)."
    )]
    async fn suggest(
        &self,
        Parameters(req): Parameters<SuggestRequest>,
    ) -> Result<CallToolResult, McpError> {
        let config = RequestConfig::from_host(&self.host.borrow())
            .map_err(|e| McpError::invalid_params(e.user_message(), None))?;

        let start = Instant::now();
        let suggestion = self
            .orchestrator
            .suggest(&self.session, &config, &req.text)
            .await;

        let metadata = BridgeMetadata::new("suggest", start.elapsed().as_secs_f64())
            .with_generation(suggestion.generation);
        Ok(BridgeResponse::success(suggestion.text, metadata).into_call_tool_result())
    }

    #[tool(
        name = "stats",
        description = "Request counts, the per-minute budget and accumulated cost for this session.",
        annotations(read_only_hint = true)
    )]
    async fn stats(&self) -> Result<CallToolResult, McpError> {
        let snapshot = self.session.snapshot(self.rpm_limit());
        Ok(BridgeResponse::markdown(snapshot.to_markdown(), BridgeMetadata::new("stats", 0.0))
            .into_call_tool_result())
    }

    #[tool(
        name = "reset",
        description = "Zero all request and cost counters."
    )]
    async fn reset(&self) -> Result<CallToolResult, McpError> {
        self.session.reset();
        let snapshot = self.session.snapshot(self.rpm_limit());
        Ok(BridgeResponse::markdown(snapshot.to_markdown(), BridgeMetadata::new("reset", 0.0))
            .into_call_tool_result())
    }
}

#[tool_handler]
impl ServerHandler for GhostlineServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "ghostline".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            instructions: Some(
                "Ghostline: inline completion for a text field.\n\n\
                 Workflow:\n\
                 1. Call `configure` once with at least `api_url` (and `api_key`, `model`, `prompt_template`).\n\
                 2. Call `text_changed` with the full text after every edit.\n\
                 3. Poll `suggestion` for ghost text; call `accept` to take it, `commit` on blur.\n\
                 Use `suggest` when the host debounces on its own. `stats` and `reset` manage the session counters."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
