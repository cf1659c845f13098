//! Text embedding providers.
//!
//! Pipelines never talk to a provider directly. They go through
//! [`ResilientEmbedder`], which tries the remote provider first and falls back
//! to the deterministic [`FallbackEmbedder`] on any failure, tagging the
//! result with where it came from.

mod fallback;
mod remote;

pub use fallback::{stable_seed, FallbackEmbedder};
pub use remote::RemoteEmbedder;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::{Number, Settings};
use crate::error::ProviderError;

/// What the text will be used for; remote models encode the two differently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingRole {
    Document,
    Query,
}

impl EmbeddingRole {
    pub fn task_type(self) -> &'static str {
        match self {
            EmbeddingRole::Document => "RETRIEVAL_DOCUMENT",
            EmbeddingRole::Query => "RETRIEVAL_QUERY",
        }
    }
}

/// A source of fixed-dimension text embeddings.
pub trait EmbeddingProvider: Send + Sync {
    fn name(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Vec<Number>, ProviderError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbeddingSource {
    Primary,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Embedding {
    pub vector: Vec<Number>,
    pub source: EmbeddingSource,
}

impl Embedding {
    pub fn is_fallback(&self) -> bool {
        self.source == EmbeddingSource::Fallback
    }

    pub fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }
}

pub struct ResilientEmbedder {
    primary: Option<Box<dyn EmbeddingProvider>>,
    fallback: Box<dyn EmbeddingProvider>,
}

impl ResilientEmbedder {
    pub fn new(
        primary: Option<Box<dyn EmbeddingProvider>>,
        fallback: Box<dyn EmbeddingProvider>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub fn fallback_only(dimensions: usize) -> Self {
        Self::new(None, Box::new(FallbackEmbedder::new(dimensions)))
    }

    /// Wires the remote embedder when an endpoint is configured. A remote
    /// client that cannot be built leaves the embedder in fallback-only mode.
    pub fn from_settings(settings: &Settings) -> Self {
        let fallback = Box::new(FallbackEmbedder::new(settings.dimensions));
        let Some(endpoint) = settings.embedding_endpoint.clone() else {
            warn!("embedding endpoint not configured; using deterministic fallback embeddings");
            return Self::new(None, fallback);
        };

        match RemoteEmbedder::new(
            endpoint,
            settings.embedding_api_key.clone(),
            settings.embedding_model.clone(),
            settings.dimensions,
            settings.request_timeout(),
            settings.max_retries,
        ) {
            Ok(remote) => {
                info!(model = %settings.embedding_model, "remote embedding provider initialized");
                Self::new(Some(Box::new(remote)), fallback)
            }
            Err(e) => {
                warn!(error = %e, "failed to initialize remote embedder; using fallback embeddings");
                Self::new(None, fallback)
            }
        }
    }

    pub fn dimensions(&self) -> usize {
        self.fallback.dimensions()
    }

    pub fn has_primary(&self) -> bool {
        self.primary.is_some()
    }

    /// Embeds `text`, degrading to the fallback when the primary provider
    /// fails, returns nothing, or returns the wrong number of dimensions.
    /// Errors only when the fallback fails as well.
    pub fn embed(&self, text: &str, role: EmbeddingRole) -> Result<Embedding, ProviderError> {
        if let Some(primary) = &self.primary {
            let expected = self.dimensions();
            match primary.embed(text, role) {
                Ok(vector) if vector.len() == expected => {
                    return Ok(Embedding {
                        vector,
                        source: EmbeddingSource::Primary,
                    });
                }
                Ok(vector) if vector.is_empty() => {
                    warn!(provider = primary.name(), ?role, "primary embedding was empty; using fallback");
                }
                Ok(vector) => {
                    let err = ProviderError::Dimension {
                        expected,
                        actual: vector.len(),
                    };
                    warn!(provider = primary.name(), ?role, error = %err, "using fallback embedding");
                }
                Err(e) => {
                    warn!(provider = primary.name(), ?role, error = %e, "primary embedding failed; using fallback");
                }
            }
        }

        let vector = self.fallback.embed(text, role)?;
        Ok(Embedding {
            vector,
            source: EmbeddingSource::Fallback,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        result: fn() -> Result<Vec<Number>, ProviderError>,
    }

    impl EmbeddingProvider for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn dimensions(&self) -> usize {
            4
        }

        fn embed(&self, _text: &str, _role: EmbeddingRole) -> Result<Vec<Number>, ProviderError> {
            (self.result)()
        }
    }

    fn with_primary(result: fn() -> Result<Vec<Number>, ProviderError>) -> ResilientEmbedder {
        ResilientEmbedder::new(
            Some(Box::new(Fixed { result })),
            Box::new(FallbackEmbedder::new(4)),
        )
    }

    #[test]
    fn primary_result_is_used_when_valid() {
        let embedder = with_primary(|| Ok(vec![1.0, 0.0, 0.0, 0.0]));
        let embedding = embedder.embed("text", EmbeddingRole::Document).unwrap();
        assert_eq!(embedding.source, EmbeddingSource::Primary);
        assert_eq!(embedding.vector, vec![1.0, 0.0, 0.0, 0.0]);
    }

    #[test]
    fn failures_degrade_to_the_fallback() {
        let cases: [fn() -> Result<Vec<Number>, ProviderError>; 3] = [
            || Err(ProviderError::Status { status: 503, body: "down".into() }),
            || Ok(Vec::new()),
            || Ok(vec![1.0, 2.0]),
        ];
        let expected = FallbackEmbedder::new(4)
            .embed("text", EmbeddingRole::Query)
            .unwrap();
        for case in cases {
            let embedding = with_primary(case).embed("text", EmbeddingRole::Query).unwrap();
            assert!(embedding.is_fallback());
            assert_eq!(embedding.vector, expected);
        }
    }

    #[test]
    fn fallback_only_never_calls_a_primary() {
        let embedder = ResilientEmbedder::fallback_only(16);
        assert!(!embedder.has_primary());
        let embedding = embedder.embed("hello", EmbeddingRole::Document).unwrap();
        assert!(embedding.is_fallback());
        assert_eq!(embedding.vector.len(), 16);
    }

    #[test]
    fn role_maps_to_retrieval_task_type() {
        assert_eq!(EmbeddingRole::Document.task_type(), "RETRIEVAL_DOCUMENT");
        assert_eq!(EmbeddingRole::Query.task_type(), "RETRIEVAL_QUERY");
    }
}
