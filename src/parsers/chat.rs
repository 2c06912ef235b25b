use serde::Deserialize;
use serde_json::Value;

use crate::dispatch::{CompletionResult, ToolCall, Usage};
use crate::error::GhostError;
use crate::parsers::ResponseParser;

/// Parses chat-completions responses: `choices[0].message.{content,tool_calls}`.
/// Falls back to `choices[0].text` for servers that answer a chat request in
/// the legacy envelope.
pub struct ChatParser;

#[derive(Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    message: Option<Message>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct Message {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Deserialize)]
struct WireToolCall {
    id: Option<String>,
    function: Option<WireFunction>,
}

#[derive(Deserialize)]
struct WireFunction {
    name: Option<String>,
    /// Usually a JSON-encoded string; some servers send an object.
    arguments: Option<Value>,
}

#[derive(Deserialize)]
pub(crate) struct WireUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
}

impl From<WireUsage> for Usage {
    fn from(u: WireUsage) -> Self {
        Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
        }
    }
}

impl ResponseParser for ChatParser {
    fn parse(&self, body: &[u8]) -> Result<CompletionResult, GhostError> {
        let completion: ChatCompletion = serde_json::from_slice(body)
            .map_err(|e| GhostError::SchemaParse(format!("chat response: {e}")))?;

        let usage = completion.usage.map(Usage::from);
        let Some(choice) = completion.choices.into_iter().next() else {
            return Err(GhostError::SchemaParse(
                "chat response has no choices".to_string(),
            ));
        };

        if let Some(message) = choice.message {
            let tool_calls = message
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .filter_map(into_tool_call)
                .collect();
            return Ok(CompletionResult {
                text: message.content.unwrap_or_default(),
                tool_calls,
                usage,
            });
        }

        match choice.text {
            Some(text) => Ok(CompletionResult {
                text,
                tool_calls: Vec::new(),
                usage,
            }),
            None => Err(GhostError::SchemaParse(
                "chat response choice has neither message nor text".to_string(),
            )),
        }
    }
}

/// Tool calls without a function name cannot be dispatched; drop them.
fn into_tool_call(wire: WireToolCall) -> Option<ToolCall> {
    let function = wire.function?;
    let name = function.name.filter(|n| !n.is_empty())?;
    let arguments = match function.arguments {
        Some(Value::String(s)) => s,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    Some(ToolCall {
        id: wire.id,
        name,
        arguments,
    })
}
