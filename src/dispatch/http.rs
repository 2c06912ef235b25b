use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::error::GhostError;

const MAX_RESPONSE_BYTES: usize = 2 * 1024 * 1024; // 2MB

/// Upper bound for a single request, headers through body.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

pub struct HttpDispatch {
    client: Client,
}

impl Default for HttpDispatch {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpDispatch {
    pub fn new() -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(4)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("failed to build tuned HTTP client, using defaults: {e}");
                Client::new()
            });

        Self { client }
    }

    /// POST a JSON body and return the raw response bytes of a 2xx reply.
    ///
    /// Cancelling `token` drops the in-flight request future, which closes the
    /// underlying connection, and yields `GhostError::Cancelled`.
    pub async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        token: &CancellationToken,
    ) -> Result<Vec<u8>, GhostError> {
        if token.is_cancelled() {
            return Err(GhostError::Cancelled);
        }

        let mut request = self.client.post(url).timeout(REQUEST_TIMEOUT);
        for (k, v) in headers {
            request = request.header(k, v);
        }

        let exchange = async {
            let response = request.json(body).send().await?;
            let status = response.status();

            // Cap error body reads to MAX_RESPONSE_BYTES to prevent memory exhaustion
            if !status.is_success() {
                let error_bytes = response.bytes().await.unwrap_or_default();
                let truncated = &error_bytes[..error_bytes.len().min(MAX_RESPONSE_BYTES)];
                let text = String::from_utf8_lossy(truncated);
                return Err(GhostError::Upstream {
                    status: status.as_u16(),
                    message: text.into_owned(),
                });
            }

            let bytes = response.bytes().await?;
            if bytes.len() > MAX_RESPONSE_BYTES {
                return Err(GhostError::SchemaParse(format!(
                    "response too large: {} bytes (max {})",
                    bytes.len(),
                    MAX_RESPONSE_BYTES
                )));
            }
            Ok::<Vec<u8>, GhostError>(bytes.to_vec())
        };

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(GhostError::Cancelled),
            result = exchange => result,
        }
    }
}
