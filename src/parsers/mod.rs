pub mod answer;
pub mod chat;
pub mod legacy;

use crate::dispatch::CompletionResult;
use crate::error::GhostError;
use crate::prompt::ApiFormat;

pub use answer::extract_answer;

/// Trait for parsing a completion endpoint's response body.
/// Each API shape has its own envelope.
pub trait ResponseParser: Send + Sync {
    /// Parse raw response bytes into a completion result.
    fn parse(&self, body: &[u8]) -> Result<CompletionResult, GhostError>;
}

/// Resolve the parser for an API shape.
pub fn parser_for(shape: ApiFormat) -> Box<dyn ResponseParser> {
    match shape {
        ApiFormat::Chat => Box::new(chat::ChatParser),
        ApiFormat::Legacy => Box::new(legacy::LegacyParser),
    }
}
