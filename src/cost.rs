//! Token usage to cost conversion.

use crate::dispatch::Usage;
use crate::session::SessionCounters;

/// Rough characters-per-token ratio used when the endpoint reports no usage.
const CHARS_PER_TOKEN: u64 = 4;

const TOKENS_PER_PRICE_UNIT: f64 = 1_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenCount {
    pub prompt: u64,
    pub completion: u64,
    /// True when the prompt count is an estimate.
    pub estimated: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CostDelta {
    pub input: f64,
    pub output: f64,
}

/// Reported counts when present; otherwise `ceil(chars / 4)` prompt tokens
/// and zero completion tokens. There is deliberately no output estimate.
pub fn token_count(usage: Option<&Usage>, prompt: &str) -> TokenCount {
    let reported_prompt = usage.and_then(|u| u.prompt_tokens).filter(|&n| n > 0);
    let completion = usage.and_then(|u| u.completion_tokens).unwrap_or(0);

    match reported_prompt {
        Some(prompt_tokens) => TokenCount {
            prompt: prompt_tokens,
            completion,
            estimated: false,
        },
        None => TokenCount {
            prompt: (prompt.chars().count() as u64).div_ceil(CHARS_PER_TOKEN),
            completion,
            estimated: true,
        },
    }
}

/// Prices are per million tokens.
pub fn price(tokens: TokenCount, input_price: f64, output_price: f64) -> CostDelta {
    CostDelta {
        input: tokens.prompt as f64 / TOKENS_PER_PRICE_UNIT * input_price,
        output: tokens.completion as f64 / TOKENS_PER_PRICE_UNIT * output_price,
    }
}

/// Price one response and fold it into `counters`.
pub fn account(
    counters: &mut SessionCounters,
    usage: Option<&Usage>,
    prompt: &str,
    input_price: f64,
    output_price: f64,
) -> CostDelta {
    let tokens = token_count(usage, prompt);
    let delta = price(tokens, input_price, output_price);
    counters.add_cost(delta.input, delta.output);
    delta
}
