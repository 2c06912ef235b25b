//! Two-round tool calling: run the tools the model asked for, then ask again
//! with their results and without a tool manifest.

use serde_json::{Map, Value};

use crate::config::RequestConfig;
use crate::dispatch::cancel::CallHandle;
use crate::dispatch::http::HttpDispatch;
use crate::dispatch::{self, CompletionResult, ToolCall};
use crate::error::GhostError;
use crate::parsers::extract_answer;
use crate::prompt::{build_payload, follow_up_prompt};
use crate::session::Session;
use crate::toolcall::{ToolContext, ToolResult, ToolSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolState {
    Initial,
    ExecutingTools,
    FollowUpDispatched,
    Done,
}

/// Everything one protocol run needs besides the first-round response.
pub struct ToolRound<'a> {
    pub http: &'a HttpDispatch,
    pub session: &'a Session,
    pub config: &'a RequestConfig,
    pub tools: &'a ToolSet,
}

/// Tool arguments as a JSON value. Malformed or non-object JSON becomes `{}`.
pub fn parse_arguments(raw: &str) -> Value {
    match serde_json::from_str::<Value>(raw) {
        Ok(value @ Value::Object(_)) => value,
        Ok(other) => {
            tracing::debug!("tool arguments are not an object ({other}), using {{}}");
            Value::Object(Map::new())
        }
        Err(e) => {
            tracing::debug!("malformed tool arguments ({e}), using {{}}");
            Value::Object(Map::new())
        }
    }
}

/// Run every call in order, one at a time. Unregistered names produce a
/// placeholder result instead of an error.
pub async fn execute_tool_calls(
    tools: &ToolSet,
    calls: &[ToolCall],
    ctx: &ToolContext<'_>,
) -> Vec<ToolResult> {
    let mut results = Vec::with_capacity(calls.len());
    for call in calls {
        let text = match tools.get(&call.name) {
            Some(tool) => {
                let args = parse_arguments(&call.arguments);
                tool.call(&args, ctx).await
            }
            None => {
                tracing::warn!(tool = %call.name, "model requested an unregistered tool");
                format!("Unknown tool: {}", call.name)
            }
        };
        results.push(ToolResult {
            call: call.clone(),
            text,
        });
    }
    results
}

/// Turn the first-round response into the final suggestion.
///
/// Without tool calls this is just answer extraction. With tool calls the
/// tools run under the first round's token, then the follow-up is sent
/// under a fresh handle for the same generation. If the generation was
/// superseded meanwhile, the follow-up is never sent.
pub async fn resolve(
    round: &ToolRound<'_>,
    input: &str,
    first: &CompletionResult,
    handle: &CallHandle,
) -> Result<String, GhostError> {
    let mut state = ProtocolState::Initial;

    if !first.has_tool_calls() {
        advance(&mut state, ProtocolState::Done);
        return Ok(extract_answer(&first.text));
    }

    advance(&mut state, ProtocolState::ExecutingTools);
    let ctx = ToolContext {
        http: round.http,
        config: round.config,
        token: &handle.token,
    };
    let results = execute_tool_calls(round.tools, &first.tool_calls, &ctx).await;

    let follow_up = round
        .session
        .calls()
        .fresh_handle(handle.generation)
        .ok_or(GhostError::Cancelled)?;

    let texts: Vec<String> = results.into_iter().map(|r| r.text).collect();
    let prompt = follow_up_prompt(input, &texts);
    let payload = build_payload(round.config, &prompt, None);

    advance(&mut state, ProtocolState::FollowUpDispatched);
    let reply = dispatch::send_billed(
        round.http,
        round.session,
        round.config,
        &payload,
        &follow_up.token,
    )
    .await?;

    advance(&mut state, ProtocolState::Done);
    Ok(extract_answer(&reply.text))
}

fn advance(state: &mut ProtocolState, next: ProtocolState) {
    tracing::debug!(from = ?state, to = ?next, "tool protocol");
    *state = next;
}
