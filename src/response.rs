use rmcp::model::{CallToolResult, Content};
use serde::Serialize;

/// JSON envelope returned by every bridge tool.
/// Sent as `Content::text(json_string)` so hosts parse one stable shape.
#[derive(Debug, Serialize)]
pub struct BridgeResponse {
    pub status: &'static str,
    pub content: String,
    /// "text", "markdown" or "json".
    pub content_type: &'static str,
    pub metadata: BridgeMetadata,
}

#[derive(Debug, Serialize)]
pub struct BridgeMetadata {
    pub tool_name: String,
    /// Call generation the content belongs to, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation: Option<u64>,
    #[serde(serialize_with = "serialize_finite_f64")]
    pub duration_seconds: f64,
}

impl BridgeMetadata {
    pub fn new(tool_name: &str, duration_seconds: f64) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            generation: None,
            duration_seconds,
        }
    }

    pub fn with_generation(mut self, generation: u64) -> Self {
        self.generation = Some(generation);
        self
    }
}

/// Serialize f64, clamping non-finite values (NaN, Inf) to 0.0.
fn serialize_finite_f64<S: serde::Serializer>(v: &f64, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(if v.is_finite() { *v } else { 0.0 })
}

impl BridgeResponse {
    pub fn success(content: String, metadata: BridgeMetadata) -> Self {
        Self {
            status: "success",
            content,
            content_type: "text",
            metadata,
        }
    }

    /// Success carrying a serialized value.
    pub fn json<T: Serialize>(value: &T, metadata: BridgeMetadata) -> Self {
        match serde_json::to_string(value) {
            Ok(content) => Self {
                content_type: "json",
                ..Self::success(content, metadata)
            },
            Err(e) => Self::error(format!("serialization failed: {e}"), metadata),
        }
    }

    pub fn markdown(content: String, metadata: BridgeMetadata) -> Self {
        Self {
            content_type: "markdown",
            ..Self::success(content, metadata)
        }
    }

    pub fn error(message: String, metadata: BridgeMetadata) -> Self {
        Self {
            status: "error",
            content: message,
            content_type: "text",
            metadata,
        }
    }

    /// Convert to MCP CallToolResult.
    /// Always a transport-level success; failures are reported in the JSON
    /// payload as `"status": "error"`.
    pub fn into_call_tool_result(self) -> CallToolResult {
        match serde_json::to_string(&self) {
            Ok(json) => CallToolResult::success(vec![Content::text(json)]),
            Err(e) => {
                let escaped = e.to_string().replace('\\', "\\\\").replace('"', "\\\"");
                CallToolResult::success(vec![Content::text(format!(
                    r#"{{"status":"error","content":"serialization failed: {escaped}","content_type":"text","metadata":{{}}}}"#
                ))])
            }
        }
    }
}
