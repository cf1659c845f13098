use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::{Number, DEFAULT_MAX_TOP_K};
use crate::embedding::{EmbeddingRole, ResilientEmbedder};
use crate::error::QueryError;
use crate::generation::{AnswerMode, CompositionRequest, ResilientGenerator};
use crate::index::{ScoredChunk, VectorIndex};
use crate::references::{extract_references, merge_references};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Answer {
    pub text: String,
    pub references: Vec<String>,
    pub mode: AnswerMode,
    /// Set when generation fell back to canned text.
    pub degraded: bool,
    /// Top similarity, only for answers grounded on a semantic query embedding.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<Number>,
    pub excerpts_used: usize,
}

pub struct QueryPipeline {
    index: Arc<VectorIndex>,
    embedder: Arc<ResilientEmbedder>,
    generator: Arc<ResilientGenerator>,
    max_top_k: usize,
}

impl QueryPipeline {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<ResilientEmbedder>,
        generator: Arc<ResilientGenerator>,
    ) -> Self {
        Self {
            index,
            embedder,
            generator,
            max_top_k: DEFAULT_MAX_TOP_K,
        }
    }

    pub fn with_max_top_k(mut self, max_top_k: usize) -> Self {
        self.max_top_k = max_top_k;
        self
    }

    pub fn generator(&self) -> &ResilientGenerator {
        &self.generator
    }

    /// Answers `query` from the `top_k` closest chunks, or as a general
    /// assistant when nothing is retrieved. Provider outages degrade the
    /// answer but never fail the call.
    pub fn answer(&self, query: &str, top_k: usize) -> Result<Answer, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        if top_k == 0 || top_k > self.max_top_k {
            return Err(QueryError::InvalidTopK {
                requested: top_k,
                max: self.max_top_k,
            });
        }

        let (retrieved, semantic) = self.retrieve(query, top_k)?;
        if retrieved.is_empty() {
            info!("no relevant context retrieved; answering in general mode");
            let composition = self.generator.compose(&CompositionRequest::general(query));
            return Ok(Answer {
                text: composition.text,
                references: Vec::new(),
                mode: AnswerMode::General,
                degraded: composition.degraded,
                confidence: None,
                excerpts_used: 0,
            });
        }

        let excerpts: Vec<String> = retrieved.iter().map(|r| r.chunk.text.clone()).collect();
        let composition = self
            .generator
            .compose(&CompositionRequest::compliance(query, &excerpts));

        let mut references = Vec::new();
        for scored in &retrieved {
            merge_references(&mut references, &scored.chunk.references);
        }
        if references.is_empty() {
            references = extract_references(&composition.text);
        }

        let confidence = if semantic {
            retrieved.first().map(|r| r.similarity)
        } else {
            None
        };
        info!(
            excerpts = excerpts.len(),
            references = references.len(),
            degraded = composition.degraded,
            "answered compliance query"
        );
        Ok(Answer {
            text: composition.text,
            references,
            mode: AnswerMode::Compliance,
            degraded: composition.degraded,
            confidence,
            excerpts_used: excerpts.len(),
        })
    }

    /// Returns the retrieved chunks and whether the query vector came from
    /// the primary embedder.
    fn retrieve(&self, query: &str, top_k: usize) -> Result<(Vec<ScoredChunk>, bool), QueryError> {
        if self.index.is_empty() {
            debug!("index is empty; skipping query embedding");
            return Ok((Vec::new(), false));
        }
        let embedding = match self.embedder.embed(query, EmbeddingRole::Query) {
            Ok(embedding) if !embedding.is_empty() => embedding,
            Ok(_) => {
                warn!("query embedding was empty; answering without context");
                return Ok((Vec::new(), false));
            }
            Err(e) => {
                warn!(error = %e, "query embedding failed; answering without context");
                return Ok((Vec::new(), false));
            }
        };
        let semantic = !embedding.is_fallback();
        let retrieved = self.index.retrieve(&embedding.vector, top_k)?;
        Ok((retrieved, semantic))
    }
}
