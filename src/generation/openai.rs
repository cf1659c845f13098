use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};

use super::prompts::{build_compliance_prompt, COMPLIANCE_SYSTEM_PROMPT, GENERAL_SYSTEM_PROMPT};
use super::{AnswerMode, CompositionRequest, GenerationProvider};
use crate::error::ProviderError;

/// Chat-completions client for OpenAI-compatible servers.
pub struct OpenAiGenerator {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    top_p: f32,
    top_k: Option<u32>,
    max_tokens: usize,
}

impl OpenAiGenerator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        api_key: String,
        base_url: String,
        model: String,
        temperature: f32,
        top_p: f32,
        top_k: Option<u32>,
        max_tokens: usize,
        timeout: Duration,
    ) -> Result<Self> {
        anyhow::ensure!(!api_key.trim().is_empty(), "missing generation API key");
        anyhow::ensure!(!model.trim().is_empty(), "missing generation model name");
        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth).context("invalid generation API key")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .context("failed to build generation HTTP client")?;
        let endpoint = format!("{}/chat/completions", base_url.trim_end_matches('/'));
        Ok(Self {
            client,
            endpoint,
            model,
            temperature,
            top_p,
            top_k,
            max_tokens,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn chat_request<'a>(&'a self, messages: Vec<ChatMessage<'a>>) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            top_p: self.top_p,
            top_k: self.top_k,
            max_tokens: self.max_tokens,
            messages,
        }
    }
}

impl GenerationProvider for OpenAiGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    fn compose(&self, request: &CompositionRequest<'_>) -> Result<String, ProviderError> {
        let user_content = match request.mode {
            AnswerMode::Compliance => build_compliance_prompt(request.query, request.excerpts),
            AnswerMode::General => request.query.to_string(),
        };
        let system_content = match request.mode {
            AnswerMode::Compliance => COMPLIANCE_SYSTEM_PROMPT,
            AnswerMode::General => GENERAL_SYSTEM_PROMPT,
        };
        let body = self.chat_request(vec![
            ChatMessage {
                role: "system",
                content: system_content,
            },
            ChatMessage {
                role: "user",
                content: &user_content,
            },
        ]);

        let resp = self.client.post(&self.endpoint).json(&body).send()?;
        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp
                .text()
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        let parsed: ChatResponse = resp
            .json()
            .map_err(|e| ProviderError::Malformed(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .find_map(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(ProviderError::Empty)
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    top_p: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_k: Option<u32>,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generator(top_k: Option<u32>) -> OpenAiGenerator {
        OpenAiGenerator::new(
            "sk-test".into(),
            "http://127.0.0.1:9/v1/".into(),
            "gpt-4o-mini".into(),
            0.1,
            0.8,
            top_k,
            256,
            Duration::from_millis(500),
        )
        .unwrap()
    }

    #[test]
    fn endpoint_joins_base_url() {
        assert_eq!(generator(None).endpoint(), "http://127.0.0.1:9/v1/chat/completions");
    }

    #[test]
    fn request_omits_unset_top_k() {
        let g = generator(None);
        let json = serde_json::to_value(g.chat_request(Vec::new())).unwrap();
        assert!(json.get("top_k").is_none());
        assert_eq!(json["max_tokens"], 256);

        let g = generator(Some(40));
        let json = serde_json::to_value(g.chat_request(Vec::new())).unwrap();
        assert_eq!(json["top_k"], 40);
    }

    #[test]
    fn blank_api_key_is_rejected() {
        assert!(OpenAiGenerator::new(
            "  ".into(),
            "https://api.openai.com/v1".into(),
            "gpt-4o-mini".into(),
            0.1,
            0.8,
            None,
            16,
            Duration::from_secs(1),
        )
        .is_err());
    }

    #[test]
    fn unreachable_server_is_an_error() {
        let g = generator(None);
        assert!(g.compose(&CompositionRequest::general("hello")).is_err());
    }

    #[test]
    fn null_content_is_treated_as_missing() {
        let parsed: ChatResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }
}
