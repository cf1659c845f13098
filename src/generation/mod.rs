//! Answer composition.
//!
//! [`ResilientGenerator`] is the only entry point the query pipeline uses. It
//! turns every provider failure into the canned text for the current mode, so
//! composing an answer cannot fail.

mod openai;
pub mod prompts;

pub use openai::OpenAiGenerator;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::Settings;
use crate::error::ProviderError;

pub const COMPLIANCE_FALLBACK: &str = "Service unavailable. Please try again later.";
pub const GENERAL_FALLBACK: &str = "Hello! Service is currently unavailable. Please try again later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerMode {
    /// Grounded strictly on retrieved excerpts.
    Compliance,
    /// Open-domain assistant, no retrieved context.
    General,
}

impl AnswerMode {
    pub fn fallback_text(self) -> &'static str {
        match self {
            AnswerMode::Compliance => COMPLIANCE_FALLBACK,
            AnswerMode::General => GENERAL_FALLBACK,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CompositionRequest<'a> {
    pub mode: AnswerMode,
    pub query: &'a str,
    pub excerpts: &'a [String],
}

impl<'a> CompositionRequest<'a> {
    pub fn compliance(query: &'a str, excerpts: &'a [String]) -> Self {
        Self {
            mode: AnswerMode::Compliance,
            query,
            excerpts,
        }
    }

    pub fn general(query: &'a str) -> Self {
        Self {
            mode: AnswerMode::General,
            query,
            excerpts: &[],
        }
    }
}

/// Something that can write an answer for a query and its context.
pub trait GenerationProvider: Send + Sync {
    fn name(&self) -> &str;

    fn compose(&self, request: &CompositionRequest<'_>) -> Result<String, ProviderError>;
}

/// Always answers with the fixed text for the requested mode.
#[derive(Debug, Clone, Copy, Default)]
pub struct CannedGenerator;

impl GenerationProvider for CannedGenerator {
    fn name(&self) -> &str {
        "canned"
    }

    fn compose(&self, request: &CompositionRequest<'_>) -> Result<String, ProviderError> {
        Ok(request.mode.fallback_text().to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Composition {
    pub text: String,
    pub mode: AnswerMode,
    /// True when the text did not come from the primary provider.
    pub degraded: bool,
}

pub struct ResilientGenerator {
    primary: Option<Box<dyn GenerationProvider>>,
    fallback: Box<dyn GenerationProvider>,
}

impl ResilientGenerator {
    pub fn new(
        primary: Option<Box<dyn GenerationProvider>>,
        fallback: Box<dyn GenerationProvider>,
    ) -> Self {
        Self { primary, fallback }
    }

    pub fn canned_only() -> Self {
        Self::new(None, Box::new(CannedGenerator))
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let Some(api_key) = settings.generation_api_key.clone() else {
            warn!("generation API key not configured; answers will use fallback responses");
            return Self::canned_only();
        };

        match OpenAiGenerator::new(
            api_key,
            settings.generation_base_url.clone(),
            settings.generation_model.clone(),
            settings.temperature,
            settings.top_p,
            settings.generation_top_k,
            settings.max_output_tokens,
            settings.request_timeout(),
        ) {
            Ok(generator) => {
                info!(model = %settings.generation_model, "generation provider initialized");
                Self::new(Some(Box::new(generator)), Box::new(CannedGenerator))
            }
            Err(e) => {
                error!(error = %e, "failed to initialize generation provider");
                Self::canned_only()
            }
        }
    }

    pub fn model_name(&self) -> &str {
        self.primary
            .as_deref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    pub fn compose(&self, request: &CompositionRequest<'_>) -> Composition {
        if let Some(primary) = &self.primary {
            match primary.compose(request) {
                Ok(text) if !text.trim().is_empty() => {
                    info!(mode = ?request.mode, "generated answer");
                    return Composition {
                        text,
                        mode: request.mode,
                        degraded: false,
                    };
                }
                Ok(_) => {
                    error!(provider = primary.name(), mode = ?request.mode, "generation returned no text");
                }
                Err(e) => {
                    error!(provider = primary.name(), mode = ?request.mode, error = %e, "generation failed");
                }
            }
        }

        let text = match self.fallback.compose(request) {
            Ok(text) => text,
            Err(e) => {
                error!(provider = self.fallback.name(), error = %e, "fallback generation failed");
                request.mode.fallback_text().to_string()
            }
        };
        Composition {
            text,
            mode: request.mode,
            degraded: true,
        }
    }
}
