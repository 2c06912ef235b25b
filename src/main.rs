use std::path::PathBuf;

use rmcp::{ServiceExt, transport::stdio};

use ghostline::config::Config;
use ghostline::server::GhostlineServer;

/// `.env` candidates: next to the binary, then the cargo project root for
/// development builds (target/release/../..).
fn dotenv_candidates() -> Vec<PathBuf> {
    let Some(dir) = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(PathBuf::from))
    else {
        return Vec::new();
    };
    vec![dir.join(".env"), dir.join("../../.env")]
}

fn load_dotenv() -> Option<PathBuf> {
    for path in dotenv_candidates() {
        if path.exists() && dotenvy::from_path(&path).is_ok() {
            return Some(path);
        }
    }
    dotenvy::dotenv().ok()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // stdout carries the MCP transport; logs go to stderr.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .init();

    match load_dotenv() {
        Some(path) => tracing::info!("ghostline starting (env from {})", path.display()),
        None => tracing::info!("ghostline starting"),
    }

    let config = Config::load();
    let server = GhostlineServer::new(config);

    let service = server
        .serve(stdio())
        .await
        .inspect_err(|e| tracing::error!("serving error: {e:?}"))?;

    service.waiting().await?;

    tracing::info!("ghostline shutting down");
    Ok(())
}
