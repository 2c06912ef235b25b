//! Knowledge base search against mock embedding and vector index endpoints.

mod common;

use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use common::{MockServer, Reply, request_config};
use ghostline::config::KnowledgeCredentials;
use ghostline::dispatch::http::HttpDispatch;
use ghostline::toolcall::knowledge::search;

fn credentials(server: &MockServer) -> KnowledgeCredentials {
    request_config(json!({
        "api_url": server.url("/v1/chat/completions"),
        "openai_api_key": "sk-embed",
        "pinecone_api_key": "pc-key",
        "pinecone_index_name": "support",
        "pinecone_host": server.base,
        "embedding_api_url": server.url("/v1/embeddings"),
        "embedding_model": "text-embedding-3-small",
        "search_top": 3,
    }))
    .knowledge
}

fn embedding() -> Reply {
    Reply::ok(json!({"data": [{"embedding": [0.5, -0.5]}]}))
}

#[tokio::test]
async fn hits_are_rendered_with_query_and_note() {
    let server = MockServer::start(|req, _| match req.path.as_str() {
        "/v1/embeddings" => embedding(),
        _ => Reply::ok(json!({"matches": [
            {"metadata": {"title": "Fees", "source": "https://lysa.se/fees", "text": "0.4% annually"}},
            {"metadata": {"content": "Withdrawals take two days"}},
            {"metadata": {"title": "Nothing", "text": "No Content"}},
            {"id": "no-metadata"}
        ]})),
    })
    .await;
    let creds = credentials(&server);

    let out = search(&HttpDispatch::new(), &creds, "fees", &CancellationToken::new()).await;
    let block: Value = serde_json::from_str(&out).unwrap();

    assert_eq!(block["query"], "fees");
    assert_eq!(block["count"], 2);
    assert_eq!(block["results"][0]["title"], "Fees");
    assert_eq!(block["results"][1]["text"], "Withdrawals take two days");
    assert_eq!(block["results"][1]["title"], "No Title");
    assert_eq!(block["results"][1]["source"], "No Source");
    assert!(block["note"].is_string());

    let embed = &server.requests_to("/v1/embeddings")[0];
    assert_eq!(embed.body["model"], "text-embedding-3-small");
    let query = &server.requests_to("/query")[0];
    assert_eq!(query.body["topK"], 3);
}

#[tokio::test]
async fn only_sentinel_matches_give_empty_text() {
    let server = MockServer::start(|req, _| match req.path.as_str() {
        "/v1/embeddings" => embedding(),
        _ => Reply::ok(json!({"matches": [{"metadata": {"text": "No Content"}}]})),
    })
    .await;

    let out = search(&HttpDispatch::new(), &credentials(&server), "fees", &CancellationToken::new()).await;
    assert_eq!(out, "");
}

#[tokio::test]
async fn embedding_failure_degrades_to_empty() {
    let server = MockServer::start(|_, _| Reply::status(401, r#"{"error":"bad key"}"#)).await;

    let out = search(&HttpDispatch::new(), &credentials(&server), "fees", &CancellationToken::new()).await;
    assert_eq!(out, "");
    assert!(server.requests_to("/query").is_empty());
}

#[tokio::test]
async fn malformed_index_response_degrades_to_empty() {
    let server = MockServer::start(|req, _| match req.path.as_str() {
        "/v1/embeddings" => embedding(),
        _ => Reply::ok(json!({"matches": "not a list"})),
    })
    .await;

    let out = search(&HttpDispatch::new(), &credentials(&server), "fees", &CancellationToken::new()).await;
    assert_eq!(out, "");
}

#[tokio::test]
async fn missing_credential_makes_no_request() {
    let server = MockServer::start(|_, _| embedding()).await;
    let mut creds = credentials(&server);
    creds.index_key = None;

    let out = search(&HttpDispatch::new(), &creds, "fees", &CancellationToken::new()).await;
    assert_eq!(out, "");
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn unresolvable_index_host_gives_empty_text() {
    let server = MockServer::start(|_, _| embedding()).await;
    let mut creds = credentials(&server);
    creds.index_host = None;
    creds.index_environment = None;

    let out = search(&HttpDispatch::new(), &creds, "fees", &CancellationToken::new()).await;
    assert_eq!(out, "");
    assert!(server.requests().is_empty());
}

#[tokio::test]
async fn cancelled_token_gives_empty_text() {
    let server = MockServer::start(|_, _| embedding()).await;
    let token = CancellationToken::new();
    token.cancel();

    let out = search(&HttpDispatch::new(), &credentials(&server), "fees", &token).await;
    assert_eq!(out, "");
    assert!(server.requests().is_empty());
}
