use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{Map, Value};

/// Update the host configuration bag used for subsequent calls.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct ConfigureRequest {
    /// Configuration keys, e.g. {"api_url": "...", "model": "...", "rpm_limit": 20}.
    /// A key set to null clears it.
    pub config: Map<String, Value>,
    /// Replace the whole bag instead of merging into it (default false).
    /// Environment fallbacks are applied again either way.
    pub replace: Option<bool>,
}

impl ConfigureRequest {
    pub fn replace(&self) -> bool {
        self.replace.unwrap_or(false)
    }
}
