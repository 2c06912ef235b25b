pub mod cancel;
pub mod http;
pub mod rate_limit;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::config::RequestConfig;
use crate::cost;
use crate::error::GhostError;
use crate::parsers;
use crate::prompt::Payload;
use crate::session::Session;

/// Token usage reported by the completion endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Usage {
    pub prompt_tokens: Option<u64>,
    pub completion_tokens: Option<u64>,
}

/// A function call requested by the model in a chat response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolCall {
    pub id: Option<String>,
    pub name: String,
    /// Raw JSON argument blob exactly as the model produced it.
    pub arguments: String,
}

/// Parsed completion response, shared by both API shapes.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompletionResult {
    pub text: String,
    /// Empty when the model did not request any tool.
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<Usage>,
}

impl CompletionResult {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Send one completion request and record it in the session counters.
///
/// Counts the request as issued, then exactly one of: cancelled, failed
/// (non-2xx or transport error), or succeeded. A 2xx reply also consumes a
/// slot of the minute budget and is priced in the same counter update; a
/// body that does not parse for the payload's shape is priced from the
/// prompt estimate. If the session is reset while the request is in
/// flight, its outcome is not recorded.
pub async fn send_billed(
    http: &http::HttpDispatch,
    session: &Session,
    config: &RequestConfig,
    payload: &Payload,
    token: &CancellationToken,
) -> Result<CompletionResult, GhostError> {
    let epoch = session.record_issued();

    let outcome = http
        .post_json(&config.api_url, &payload.headers, &payload.body, token)
        .await
        .and_then(|bytes| parsers::parser_for(payload.shape).parse(&bytes));

    let recorded = session.update_since(epoch, |c| match &outcome {
        Err(e) if e.is_cancelled() => {
            c.record_cancelled();
            None
        }
        Err(e) if e.is_transport_failure() => {
            c.record_failure();
            None
        }
        _ => {
            c.record_success();
            let usage = outcome.as_ref().ok().and_then(|r| r.usage.as_ref());
            Some(cost::account(
                c,
                usage,
                &payload.prompt,
                config.input_price,
                config.output_price,
            ))
        }
    });

    match recorded {
        Some(Some(delta)) => tracing::debug!(
            shape = payload.shape.as_str(),
            input_cost = delta.input,
            output_cost = delta.output,
            "completion received"
        ),
        Some(None) => {}
        None => tracing::debug!("session reset while request was in flight; outcome not recorded"),
    }

    outcome
}
