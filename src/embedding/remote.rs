//! Remote embedding client for Vertex-style `:predict` endpoints.

use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{EmbeddingProvider, EmbeddingRole};
use crate::config::Number;
use crate::error::ProviderError;

/// Blocking embeddings client. Each request is tagged with the retrieval task
/// type so documents and queries get their own encodings.
pub struct RemoteEmbedder {
    client: Client,
    endpoint: String,
    model: String,
    dimensions: usize,
    max_retries: usize,
}

impl RemoteEmbedder {
    /// `endpoint` is either the full `...:predict` URL or a model collection
    /// URL to which `/{model}:predict` is appended.
    pub fn new(
        endpoint: String,
        api_key: Option<String>,
        model: String,
        dimensions: usize,
        timeout: Duration,
        max_retries: usize,
    ) -> Result<Self> {
        anyhow::ensure!(
            endpoint.starts_with("http://") || endpoint.starts_with("https://"),
            "embedding endpoint must be an http(s) URL"
        );
        anyhow::ensure!(!model.trim().is_empty(), "missing embedding model name");
        anyhow::ensure!(dimensions > 0, "embedding dimensions must be positive");

        let mut headers = HeaderMap::new();
        if let Some(key) = api_key {
            let auth = format!("Bearer {}", key.trim());
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth).context("invalid embedding API key")?,
            );
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build embedding HTTP client")?;

        let trimmed = endpoint.trim_end_matches('/');
        let endpoint = if trimmed.ends_with(":predict") {
            trimmed.to_string()
        } else {
            format!("{}/{}:predict", trimmed, model)
        };

        Ok(Self {
            client,
            endpoint,
            model,
            dimensions,
            max_retries,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn should_retry(&self, status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
    }

    fn is_retryable_error(&self, err: &reqwest::Error) -> bool {
        err.is_timeout() || err.is_connect() || err.is_request()
    }

    /// `attempt` counts the retries already made; the first request is not one.
    fn can_retry(&self, attempt: usize) -> bool {
        attempt < self.max_retries
    }

    fn retry_backoff(&self, attempt: usize) -> Duration {
        let capped = attempt.min(4) as u32;
        Duration::from_millis(250 * (1 << capped))
    }
}

impl EmbeddingProvider for RemoteEmbedder {
    fn name(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<Number>, ProviderError> {
        let request = PredictRequest {
            instances: [PredictInstance {
                content: text,
                task_type: role.task_type(),
            }],
            parameters: PredictParameters {
                output_dimensionality: self.dimensions,
            },
        };

        let mut attempt = 0usize;
        loop {
            match self.client.post(&self.endpoint).json(&request).send() {
                Ok(resp) => {
                    let status = resp.status();
                    if status.is_success() {
                        let parsed: PredictResponse = resp
                            .json()
                            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
                        let values = parsed
                            .predictions
                            .into_iter()
                            .next()
                            .map(|p| p.embeddings.values)
                            .ok_or(ProviderError::Empty)?;
                        if values.is_empty() {
                            return Err(ProviderError::Empty);
                        }
                        debug!(model = %self.model, ?role, dims = values.len(), "remote embedding ok");
                        return Ok(values);
                    }

                    let body = resp
                        .text()
                        .unwrap_or_else(|_| "<body unavailable>".to_string());
                    if self.should_retry(status) && self.can_retry(attempt) {
                        attempt += 1;
                        thread::sleep(self.retry_backoff(attempt));
                        continue;
                    }
                    return Err(ProviderError::Status {
                        status: status.as_u16(),
                        body,
                    });
                }
                Err(err) => {
                    if self.is_retryable_error(&err) && self.can_retry(attempt) {
                        attempt += 1;
                        thread::sleep(self.retry_backoff(attempt));
                        continue;
                    }
                    return Err(err.into());
                }
            }
        }
    }
}

#[derive(Serialize)]
struct PredictRequest<'a> {
    instances: [PredictInstance<'a>; 1],
    parameters: PredictParameters,
}

#[derive(Serialize)]
struct PredictInstance<'a> {
    content: &'a str,
    task_type: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PredictParameters {
    output_dimensionality: usize,
}

#[derive(Debug, Deserialize)]
struct PredictResponse {
    #[serde(default)]
    predictions: Vec<Prediction>,
}

#[derive(Debug, Deserialize)]
struct Prediction {
    embeddings: PredictionEmbeddings,
}

#[derive(Debug, Deserialize)]
struct PredictionEmbeddings {
    #[serde(default)]
    values: Vec<Number>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_is_appended_to_collection_urls() {
        let embedder = RemoteEmbedder::new(
            "https://example.com/v1/publishers/google/models/".into(),
            None,
            "text-embedding-004".into(),
            768,
            Duration::from_secs(1),
            1,
        )
        .unwrap();
        assert_eq!(
            embedder.endpoint(),
            "https://example.com/v1/publishers/google/models/text-embedding-004:predict"
        );
    }

    #[test]
    fn full_predict_urls_are_kept() {
        let embedder = RemoteEmbedder::new(
            "http://localhost:9000/models/x:predict".into(),
            Some("token".into()),
            "x".into(),
            8,
            Duration::from_secs(1),
            1,
        )
        .unwrap();
        assert_eq!(embedder.endpoint(), "http://localhost:9000/models/x:predict");
    }

    #[test]
    fn rejects_non_http_endpoints() {
        assert!(RemoteEmbedder::new(
            "ftp://nope".into(),
            None,
            "m".into(),
            8,
            Duration::from_secs(1),
            1
        )
        .is_err());
    }

    #[test]
    fn unreachable_service_is_a_provider_error() {
        // Port 9 (discard) on localhost is not expected to serve HTTP.
        let embedder = RemoteEmbedder::new(
            "http://127.0.0.1:9/models/m:predict".into(),
            None,
            "m".into(),
            8,
            Duration::from_millis(500),
            0,
        )
        .unwrap();
        assert!(embedder.embed("text", EmbeddingRole::Query).is_err());
    }

    #[test]
    fn max_retries_counts_retries_after_the_first_request() {
        let build = |max_retries| {
            RemoteEmbedder::new(
                "http://localhost:9000/models/x:predict".into(),
                None,
                "x".into(),
                8,
                Duration::from_secs(1),
                max_retries,
            )
            .unwrap()
        };

        let never = build(0);
        assert!(!never.can_retry(0));

        let twice = build(2);
        assert!(twice.can_retry(0));
        assert!(twice.can_retry(1));
        assert!(!twice.can_retry(2));
    }

    #[test]
    fn request_body_carries_task_type() {
        let request = PredictRequest {
            instances: [PredictInstance {
                content: "hi",
                task_type: EmbeddingRole::Query.task_type(),
            }],
            parameters: PredictParameters {
                output_dimensionality: 768,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["instances"][0]["task_type"], "RETRIEVAL_QUERY");
        assert_eq!(json["parameters"]["outputDimensionality"], 768);
    }

    #[test]
    fn response_values_are_parsed() {
        let parsed: PredictResponse = serde_json::from_str(
            r#"{"predictions":[{"embeddings":{"values":[0.5,-0.25],"statistics":{"token_count":2}}}]}"#,
        )
        .unwrap();
        assert_eq!(parsed.predictions[0].embeddings.values, vec![0.5, -0.25]);
    }
}
