use serde::Deserialize;

use crate::dispatch::{CompletionResult, Usage};
use crate::error::GhostError;
use crate::parsers::ResponseParser;
use crate::parsers::chat::WireUsage;

/// Parses legacy completions responses: `choices[0].text`.
/// Tool calling is never available in this shape.
pub struct LegacyParser;

#[derive(Deserialize)]
struct Completion {
    #[serde(default)]
    choices: Vec<Choice>,
    usage: Option<WireUsage>,
}

#[derive(Deserialize)]
struct Choice {
    text: Option<String>,
}

impl ResponseParser for LegacyParser {
    fn parse(&self, body: &[u8]) -> Result<CompletionResult, GhostError> {
        let completion: Completion = serde_json::from_slice(body)
            .map_err(|e| GhostError::SchemaParse(format!("completion response: {e}")))?;

        let text = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.text)
            .ok_or_else(|| {
                GhostError::SchemaParse("empty choices or missing text".to_string())
            })?;

        Ok(CompletionResult {
            text,
            tool_calls: Vec::new(),
            usage: completion.usage.map(Usage::from),
        })
    }
}
