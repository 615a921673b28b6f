use async_trait::async_trait;
use genealogy_core::{
    parse_root_ref, parse_tree, ApiConfig, GenealogyError, MatrixTreeQuery, Node, NodeId, Result,
    SponsorTreeQuery, TreeBackend,
};
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::{debug, warn};

/// Outcome of a single failed attempt.
enum AttemptError {
    /// Worth another try: transport errors, timeouts, 5xx, 408, 429.
    Transient(GenealogyError),
    Permanent(GenealogyError),
}

/// reqwest implementation of the four genealogy endpoints.
///
/// Every call is retried independently with exponential backoff. The
/// configured timeout bounds the whole call, retries and backoff included.
pub struct HttpTreeBackend {
    client: Client,
    config: ApiConfig,
}

impl HttpTreeBackend {
    pub fn new(config: ApiConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| GenealogyError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Send a GET with retry logic and return the response body.
    async fn send_request(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let deadline = Duration::from_secs(self.config.timeout_secs);
        match tokio::time::timeout(deadline, self.send_with_retries(path, query)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("GET {} gave up after {}s", path, self.config.timeout_secs);
                Err(GenealogyError::FetchFailed(format!(
                    "Request timed out after {}s",
                    self.config.timeout_secs
                )))
            }
        }
    }

    async fn send_with_retries(&self, path: &str, query: &[(&str, String)]) -> Result<String> {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            if attempt > 0 {
                // Exponential backoff: base, 2x base, 4x base, ...
                let factor = 2u64.saturating_pow(attempt - 1);
                let delay = Duration::from_millis(self.config.retry_backoff_ms.saturating_mul(factor));
                tokio::time::sleep(delay).await;
            }

            match self.try_request(path, query).await {
                Ok(body) => return Ok(body),
                Err(AttemptError::Permanent(e)) => return Err(e),
                Err(AttemptError::Transient(e)) => {
                    if attempt < self.config.max_retries {
                        warn!(
                            "GET {} failed (attempt {}/{}), retrying: {}",
                            path,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| GenealogyError::FetchFailed("All retry attempts failed".to_string())))
    }

    /// Try a single request
    async fn try_request(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> std::result::Result<String, AttemptError> {
        let mut request = self.client.get(self.url(path)).query(query);
        if let Some(token) = &self.config.api_token {
            request = request.bearer_auth(token);
        }

        debug!("GET {} {:?}", path, query);
        let response = request
            .send()
            .await
            .map_err(|e| AttemptError::Transient(transport_error(e)))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AttemptError::Transient(transport_error(e)))?;

        if status.is_success() {
            return Ok(body);
        }

        let message = server_message(&body).unwrap_or_else(|| format!("HTTP {}", status));
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                AttemptError::Permanent(GenealogyError::Unauthorized(message))
            }
            StatusCode::NOT_FOUND => AttemptError::Permanent(GenealogyError::NotFound(message)),
            s if s.is_server_error()
                || s == StatusCode::REQUEST_TIMEOUT
                || s == StatusCode::TOO_MANY_REQUESTS =>
            {
                AttemptError::Transient(GenealogyError::FetchFailed(message))
            }
            _ => AttemptError::Permanent(GenealogyError::FetchFailed(message)),
        })
    }
}

fn transport_error(err: reqwest::Error) -> GenealogyError {
    if err.is_timeout() {
        GenealogyError::FetchFailed(format!("Request timed out: {}", err))
    } else {
        GenealogyError::FetchFailed(format!("Request failed: {}", err))
    }
}

/// Pull a human-readable message out of an error body.
fn server_message(body: &str) -> Option<String> {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return None;
    }

    match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(value) => ["message", "error", "detail"]
            .iter()
            .find_map(|field| value.get(*field).and_then(|v| v.as_str()))
            .map(str::to_string),
        Err(_) => Some(trimmed.chars().take(200).collect()),
    }
}

#[async_trait]
impl TreeBackend for HttpTreeBackend {
    async fn matrix_tree(&self, query: &MatrixTreeQuery) -> Result<Node> {
        let mut params = vec![
            ("max_depth", query.max_depth.to_string()),
            ("source", query.source.to_string()),
        ];
        if let Some(root) = &query.root_node_id {
            params.push(("root_node_id", root.to_string()));
        }
        if let Some(identifier) = &query.identifier {
            params.push(("identifier", identifier.clone()));
        }

        let body = self.send_request(&self.config.matrix_tree_path, &params).await?;
        parse_tree(&body)
    }

    async fn sponsor_tree(&self, query: &SponsorTreeQuery) -> Result<Node> {
        let mut params = vec![("max_depth", query.max_depth.to_string())];
        if let Some(root) = &query.root_node_id {
            params.push(("root_node_id", root.to_string()));
        }

        let body = self.send_request(&self.config.sponsor_tree_path, &params).await?;
        parse_tree(&body)
    }

    async fn resolve_root(&self, identifier: &str) -> Result<NodeId> {
        let params = [("identifier", identifier.to_string())];
        let body = self.send_request(&self.config.resolve_root_path, &params).await?;
        parse_root_ref(&body)
    }

    async fn default_admin_root(&self) -> Result<NodeId> {
        let body = self.send_request(&self.config.default_root_path, &[]).await?;
        parse_root_ref(&body)
    }
}
