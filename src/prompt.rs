//! Prompt and payload construction for the two completion API shapes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::config::{RequestConfig, Stop};
use crate::toolcall::ToolDescriptor;

const TEXT_PLACEHOLDER: &str = "{text}";
const TITLE_PLACEHOLDER: &str = "{question_title}";

/// URL fragment that identifies a chat-completions endpoint.
const CHAT_PATH: &str = "/chat/completions";

/// Host keys that style the widget and never reach a payload.
const PRESENTATION_KEYS: &[&str] = &["border", "fontFamily"];

/// Completion API shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiFormat {
    /// `messages` in, `choices[0].message` out. Supports tool calling.
    Chat,
    /// `prompt` in, `choices[0].text` out.
    Legacy,
}

impl ApiFormat {
    /// Parse the host's `api_format` setting. Unknown values mean "sniff".
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "chat" => Some(Self::Chat),
            "legacy" | "completion" | "completions" => Some(Self::Legacy),
            _ => None,
        }
    }

    /// Explicit `chat` wins, then the URL decides, then legacy.
    pub fn resolve(explicit: Option<ApiFormat>, api_url: &str) -> Self {
        if explicit == Some(Self::Chat) || api_url.contains(CHAT_PATH) {
            Self::Chat
        } else {
            Self::Legacy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Legacy => "legacy",
        }
    }
}

/// How the prompt text is produced from the typed input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Substitute `{text}` and `{question_title}` into the template.
    #[default]
    Templated,
    /// Send the typed text as-is and ignore the template.
    RawInput,
}

/// A ready-to-send request: body, headers, and the shape it was built for.
#[derive(Debug, Clone)]
pub struct Payload {
    pub shape: ApiFormat,
    pub prompt: String,
    pub body: Value,
    pub headers: Vec<(String, String)>,
}

/// Render the prompt for `input` according to the configured mode.
pub fn render_prompt(config: &RequestConfig, input: &str) -> String {
    match config.prompt_mode {
        PromptMode::RawInput => input.to_string(),
        PromptMode::Templated => substitute(
            &config.prompt_template,
            &[
                (TEXT_PLACEHOLDER, input),
                (TITLE_PLACEHOLDER, config.question_title.as_str()),
            ],
        ),
    }
}

/// Replace every placeholder occurrence in one left-to-right pass, so text
/// that itself contains a placeholder is never substituted twice.
fn substitute(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    'scan: while !rest.is_empty() {
        if rest.starts_with('{') {
            for (placeholder, value) in values {
                if let Some(tail) = rest.strip_prefix(placeholder) {
                    out.push_str(value);
                    rest = tail;
                    continue 'scan;
                }
            }
        }
        let ch_len = rest.chars().next().map_or(1, char::len_utf8);
        out.push_str(&rest[..ch_len]);
        rest = &rest[ch_len..];
    }

    out
}

/// Build the request for `prompt`. `tools` is the manifest for the first
/// round; pass `None` for follow-ups so tool calling never recurses.
pub fn build_payload(
    config: &RequestConfig,
    prompt: &str,
    tools: Option<&[ToolDescriptor]>,
) -> Payload {
    let shape = ApiFormat::resolve(config.api_format, &config.api_url);

    let mut body = Map::new();
    match shape {
        ApiFormat::Chat => {
            if !config.params.extra.is_empty() {
                let dropped: Vec<&String> = config.params.extra.keys().collect();
                tracing::debug!(?dropped, "chat payload: parameters outside the whitelist are not forwarded");
            }
            body.insert(
                "messages".to_string(),
                json!([{"role": "user", "content": prompt}]),
            );
            forward_params(config, &mut body);
            if let Some(tools) = tools.filter(|t| !t.is_empty()) {
                let manifest: Vec<Value> = tools.iter().map(ToolDescriptor::manifest_entry).collect();
                body.insert("tools".to_string(), Value::Array(manifest));
                body.insert("tool_choice".to_string(), json!("auto"));
            }
            body.insert("stream".to_string(), json!(false));
        }
        ApiFormat::Legacy => {
            forward_extra(config, &mut body);
            forward_params(config, &mut body);
            body.insert("prompt".to_string(), json!(prompt));
            body.insert("echo".to_string(), json!(false));
        }
    }

    Payload {
        shape,
        prompt: prompt.to_string(),
        body: Value::Object(body),
        headers: build_headers(config.api_key.as_deref()),
    }
}

/// Legacy payloads carry every unrecognized host key as-is, except the
/// presentation keys the widget consumes itself.
fn forward_extra(config: &RequestConfig, body: &mut Map<String, Value>) {
    for (key, value) in &config.params.extra {
        if !PRESENTATION_KEYS.contains(&key.as_str()) {
            body.insert(key.clone(), value.clone());
        }
    }
}

fn forward_params(config: &RequestConfig, body: &mut Map<String, Value>) {
    let params = &config.params;
    if let Some(model) = &params.model {
        body.insert("model".to_string(), json!(model));
    }
    if let Some(max_tokens) = params.max_tokens {
        body.insert("max_tokens".to_string(), json!(max_tokens));
    }
    if let Some(temperature) = params.temperature {
        body.insert("temperature".to_string(), json!(temperature));
    }
    if let Some(top_p) = params.top_p {
        body.insert("top_p".to_string(), json!(top_p));
    }
    match &params.stop {
        Some(Stop::One(s)) => {
            body.insert("stop".to_string(), json!(s));
        }
        Some(Stop::Many(list)) => {
            body.insert("stop".to_string(), json!(list));
        }
        None => {}
    }
}

/// JSON content type always; bearer auth only when a key is configured.
pub fn build_headers(api_key: Option<&str>) -> Vec<(String, String)> {
    let mut headers = vec![("Content-Type".to_string(), "application/json".to_string())];
    if let Some(key) = api_key.filter(|k| !k.is_empty()) {
        headers.push(("Authorization".to_string(), format!("Bearer {key}")));
    }
    headers
}

/// Prompt for the second round: the tool results followed by the original
/// partial input.
pub fn follow_up_prompt(input: &str, tool_results: &[String]) -> String {
    format!(
        "Based on search results: {}\n\nComplete: \"{input}\"",
        tool_results.join("\n")
    )
}
