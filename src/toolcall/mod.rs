pub mod knowledge;
pub mod protocol;

use std::sync::Arc;

use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::RequestConfig;
use crate::dispatch::ToolCall;
use crate::dispatch::http::HttpDispatch;

/// Declarative description of a callable tool, as advertised to the model.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// JSON Schema of the argument object.
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Build a descriptor whose parameter schema is derived from `T`.
    pub fn for_args<T: JsonSchema>(name: &str, description: &str) -> Self {
        let schema = schemars::schema_for!(T);
        let mut parameters = serde_json::to_value(&schema).unwrap_or_else(|_| json!({}));
        if let Some(obj) = parameters.as_object_mut() {
            // Function-calling APIs want a bare object schema.
            obj.remove("$schema");
            obj.remove("title");
        }
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters,
        }
    }

    /// Entry for the chat payload's `tools` array.
    pub fn manifest_entry(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// Everything a tool may use while running inside one logical call.
pub struct ToolContext<'a> {
    pub http: &'a HttpDispatch,
    pub config: &'a RequestConfig,
    pub token: &'a CancellationToken,
}

/// A tool the model can invoke. `call` never fails: problems degrade to an
/// empty result so the suggestion flow continues.
pub trait Tool: Send + Sync {
    fn descriptor(&self) -> &ToolDescriptor;

    fn call<'a>(&'a self, args: &'a Value, ctx: &'a ToolContext<'a>) -> BoxFuture<'a, String>;
}

/// A tool call together with what it produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ToolResult {
    pub call: ToolCall,
    /// Empty on failure or missing credentials.
    pub text: String,
}

/// The set of tools the orchestrator advertises and dispatches to.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn empty() -> Self {
        Self { tools: Vec::new() }
    }

    /// The knowledge base search tool only.
    pub fn standard() -> Self {
        Self::empty().with_tool(Arc::new(knowledge::KnowledgeSearch::new()))
    }

    /// Add a tool. A later tool with the same name shadows an earlier one.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        let name = tool.descriptor().name.clone();
        self.tools.retain(|t| t.descriptor().name != name);
        self.tools.push(tool);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.descriptor().name == name)
    }

    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.descriptor().clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }
}
