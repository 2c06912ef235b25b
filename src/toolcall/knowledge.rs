//! Knowledge base search: embed the query, then ask the vector index for the
//! nearest documents.

use futures_util::future::BoxFuture;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::config::KnowledgeCredentials;
use crate::dispatch::http::HttpDispatch;
use crate::error::GhostError;
use crate::prompt::build_headers;
use crate::toolcall::{Tool, ToolContext, ToolDescriptor};

pub const TOOL_NAME: &str = "search_knowledge_base";
const TOOL_DESCRIPTION: &str =
    "Search the knowledge base for customer support information relevant to the reply";

/// Marker for a match without usable text. Such matches are discarded.
pub const NO_CONTENT: &str = "No Content";
const NO_TITLE: &str = "No Title";
const NO_SOURCE: &str = "No Source";

const PROVENANCE_NOTE: &str = "Results retrieved from the knowledge base by semantic similarity. \
     Prefer these facts over prior knowledge and cite the source when relevant.";

/// Arguments the model passes to the search tool.
#[derive(Debug, Deserialize, JsonSchema)]
pub struct SearchArgs {
    /// Search query to find relevant information
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KnowledgeHit {
    pub title: String,
    pub source: String,
    pub text: String,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f64>,
}

#[derive(Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<Match>,
}

#[derive(Deserialize)]
struct Match {
    #[serde(default)]
    metadata: Option<serde_json::Map<String, Value>>,
}

pub struct KnowledgeSearch {
    descriptor: ToolDescriptor,
}

impl Default for KnowledgeSearch {
    fn default() -> Self {
        Self::new()
    }
}

impl KnowledgeSearch {
    pub fn new() -> Self {
        Self {
            descriptor: ToolDescriptor::for_args::<SearchArgs>(TOOL_NAME, TOOL_DESCRIPTION),
        }
    }
}

impl Tool for KnowledgeSearch {
    fn descriptor(&self) -> &ToolDescriptor {
        &self.descriptor
    }

    fn call<'a>(&'a self, args: &'a Value, ctx: &'a ToolContext<'a>) -> BoxFuture<'a, String> {
        Box::pin(async move {
            let query = query_from_args(args);
            search(ctx.http, &ctx.config.knowledge, &query, ctx.token).await
        })
    }
}

/// The `query` argument as text. Non-string values are stringified; a
/// missing query is empty.
pub fn query_from_args(args: &Value) -> String {
    match args.get("query") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// Run the search. Never fails: missing credentials, an empty query, any
/// HTTP or decoding error, and cancellation all produce empty text.
pub async fn search(
    http: &HttpDispatch,
    creds: &KnowledgeCredentials,
    query: &str,
    token: &CancellationToken,
) -> String {
    if query.trim().is_empty() {
        return String::new();
    }
    if !creds.is_complete() {
        tracing::debug!("knowledge search skipped: credentials incomplete");
        return String::new();
    }

    match try_search(http, creds, query, token).await {
        Ok(hits) if hits.is_empty() => String::new(),
        Ok(hits) => render_hits(query, &hits),
        Err(GhostError::Cancelled) => String::new(),
        Err(e) => {
            tracing::warn!("knowledge search failed: {e}");
            String::new()
        }
    }
}

async fn try_search(
    http: &HttpDispatch,
    creds: &KnowledgeCredentials,
    query: &str,
    token: &CancellationToken,
) -> Result<Vec<KnowledgeHit>, GhostError> {
    let base_url = creds.index_base_url().ok_or_else(|| {
        GhostError::Config("vector index host unresolved: set pinecone_host or pinecone_environment".into())
    })?;

    // 1. Embed the query
    let embed_headers = build_headers(creds.embedding_key.as_deref());
    let embed_body = json!({"model": creds.embedding_model, "input": query});
    let bytes = http
        .post_json(&creds.embedding_url, &embed_headers, &embed_body, token)
        .await?;
    let embedding: EmbeddingResponse = serde_json::from_slice(&bytes)
        .map_err(|e| GhostError::SchemaParse(format!("embedding response: {e}")))?;
    let vector = embedding
        .data
        .into_iter()
        .next()
        .map(|d| d.embedding)
        .ok_or_else(|| GhostError::SchemaParse("embedding response has no data".into()))?;

    // 2. Nearest neighbours with metadata
    let index_headers = vec![
        ("Content-Type".to_string(), "application/json".to_string()),
        (
            "Api-Key".to_string(),
            creds.index_key.clone().unwrap_or_default(),
        ),
    ];
    let index_body = json!({
        "vector": vector,
        "topK": creds.top_k,
        "includeMetadata": true,
    });
    let bytes = http
        .post_json(&format!("{base_url}/query"), &index_headers, &index_body, token)
        .await?;
    let response: QueryResponse = serde_json::from_slice(&bytes)
        .map_err(|e| GhostError::SchemaParse(format!("vector query response: {e}")))?;

    Ok(response.matches.into_iter().filter_map(into_hit).collect())
}

fn into_hit(m: Match) -> Option<KnowledgeHit> {
    let metadata = m.metadata.unwrap_or_default();
    let field = |key: &str| {
        metadata
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
            .map(str::to_string)
    };

    let text = field("text")
        .or_else(|| field("content"))
        .unwrap_or_else(|| NO_CONTENT.to_string());
    if text == NO_CONTENT {
        return None;
    }

    Some(KnowledgeHit {
        title: field("title").unwrap_or_else(|| NO_TITLE.to_string()),
        source: field("source").unwrap_or_else(|| NO_SOURCE.to_string()),
        text,
    })
}

/// Structured block embedded in the follow-up prompt.
pub fn render_hits(query: &str, hits: &[KnowledgeHit]) -> String {
    let block = json!({
        "query": query,
        "count": hits.len(),
        "results": hits,
        "note": PROVENANCE_NOTE,
    });
    serde_json::to_string_pretty(&block).unwrap_or_default()
}
