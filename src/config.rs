use anyhow::{Context, Result};
use config::{Config, Environment, File as ConfigFile};
use serde::de::DeserializeOwned;
use std::env;
use std::str::FromStr;
use std::time::Duration;

pub type Number = f32;

pub const EPSILON: f32 = 1e-6;

pub const DEFAULT_DIMENSIONS: usize = 768;
pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;
pub const DEFAULT_TOP_K: usize = 5;
pub const DEFAULT_MAX_TOP_K: usize = 20;

const ENV_PREFIX: &str = "POLICYRAG";
const CONFIG_FILE: &str = "policyrag_config";
const PLACEHOLDER_KEYS: &[&str] = &["your-openai-api-key-here", "your-api-key-here"];

/// Resolved runtime settings for the pipelines and the remote providers.
#[derive(Debug, Clone)]
pub struct Settings {
    pub dimensions: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
    pub max_top_k: usize,
    pub embedding_endpoint: Option<String>,
    pub embedding_api_key: Option<String>,
    pub embedding_model: String,
    pub generation_base_url: String,
    pub generation_api_key: Option<String>,
    pub generation_model: String,
    pub temperature: f32,
    pub top_p: f32,
    pub generation_top_k: Option<u32>,
    pub max_output_tokens: usize,
    pub request_timeout_secs: u64,
    pub max_retries: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dimensions: DEFAULT_DIMENSIONS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            top_k: DEFAULT_TOP_K,
            max_top_k: DEFAULT_MAX_TOP_K,
            embedding_endpoint: None,
            embedding_api_key: None,
            embedding_model: "text-embedding-004".to_string(),
            generation_base_url: "https://api.openai.com/v1".to_string(),
            generation_api_key: None,
            generation_model: "gpt-4o-mini".to_string(),
            temperature: 0.1,
            top_p: 0.8,
            generation_top_k: Some(40),
            max_output_tokens: 4096,
            request_timeout_secs: 30,
            max_retries: 2,
        }
    }
}

impl Settings {
    /// Loads settings from `policyrag_config.*` and `POLICYRAG_*` variables,
    /// falling back to the defaults for anything left unset.
    pub fn load() -> Result<Self> {
        let config = Config::builder()
            .add_source(ConfigFile::with_name(CONFIG_FILE).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX))
            .build()
            .context("failed to read policyrag configuration")?;
        Self::from_config(&config)
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let defaults = Self::default();

        let settings = Self {
            dimensions: setting(config, "dimensions")?.unwrap_or(defaults.dimensions),
            chunk_size: setting(config, "chunk_size")?.unwrap_or(defaults.chunk_size),
            chunk_overlap: setting(config, "chunk_overlap")?.unwrap_or(defaults.chunk_overlap),
            top_k: setting(config, "top_k")?.unwrap_or(defaults.top_k),
            max_top_k: setting(config, "max_top_k")?.unwrap_or(defaults.max_top_k),
            embedding_endpoint: setting::<String>(config, "embedding_endpoint")?
                .filter(|s| !s.trim().is_empty()),
            embedding_api_key: setting::<String>(config, "embedding_api_key")?
                .and_then(real_secret),
            embedding_model: setting(config, "embedding_model")?
                .unwrap_or(defaults.embedding_model),
            generation_base_url: setting(config, "generation_base_url")?
                .unwrap_or(defaults.generation_base_url),
            generation_api_key: setting::<String>(config, "generation_api_key")?
                .and_then(real_secret),
            generation_model: setting(config, "generation_model")?
                .unwrap_or(defaults.generation_model),
            temperature: setting(config, "temperature")?.unwrap_or(defaults.temperature),
            top_p: setting(config, "top_p")?.unwrap_or(defaults.top_p),
            generation_top_k: setting::<u32>(config, "generation_top_k")?
                .or(defaults.generation_top_k)
                .filter(|k| *k > 0),
            max_output_tokens: setting(config, "max_output_tokens")?
                .unwrap_or(defaults.max_output_tokens),
            request_timeout_secs: setting(config, "request_timeout_secs")?
                .unwrap_or(defaults.request_timeout_secs),
            max_retries: setting(config, "max_retries")?.unwrap_or(defaults.max_retries),
        };

        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimensions == 0 {
            anyhow::bail!("POLICYRAG_DIMENSIONS must be greater than zero.");
        }
        if self.chunk_size == 0 {
            anyhow::bail!("POLICYRAG_CHUNK_SIZE must be greater than zero.");
        }
        if self.chunk_overlap >= self.chunk_size {
            anyhow::bail!(
                "POLICYRAG_CHUNK_OVERLAP ({}) must be smaller than POLICYRAG_CHUNK_SIZE ({}).",
                self.chunk_overlap,
                self.chunk_size
            );
        }
        if self.top_k == 0 || self.top_k > self.max_top_k {
            anyhow::bail!(
                "POLICYRAG_TOP_K must be between 1 and {} (got {}).",
                self.max_top_k,
                self.top_k
            );
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn print_config(&self) {
        println!("dimensions={}", self.dimensions);
        println!("chunk_size={}", self.chunk_size);
        println!("chunk_overlap={}", self.chunk_overlap);
        println!("top_k={}", self.top_k);
        println!("max_top_k={}", self.max_top_k);
        println!(
            "embedding_endpoint={}",
            self.embedding_endpoint.as_deref().unwrap_or("<fallback only>")
        );
        println!("embedding_api_key={}", redact(&self.embedding_api_key));
        println!("embedding_model={}", self.embedding_model);
        println!("generation_base_url={}", self.generation_base_url);
        println!("generation_api_key={}", redact(&self.generation_api_key));
        println!("generation_model={}", self.generation_model);
        println!("temperature={}", self.temperature);
        println!("top_p={}", self.top_p);
        match self.generation_top_k {
            Some(k) => println!("generation_top_k={}", k),
            None => println!("generation_top_k=<unset>"),
        }
        println!("max_output_tokens={}", self.max_output_tokens);
        println!("request_timeout_secs={}", self.request_timeout_secs);
        println!("max_retries={}", self.max_retries);
    }
}

/// Reads a key from the merged config, then from the bare `POLICYRAG_<KEY>`
/// environment variable. A present but unparsable value is an error.
fn setting<T>(config: &Config, key: &str) -> Result<Option<T>>
where
    T: DeserializeOwned + FromStr,
{
    if let Ok(value) = config.get::<T>(key) {
        return Ok(Some(value));
    }
    let var = format!("{}_{}", ENV_PREFIX, key.to_uppercase());
    match env::var(&var) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| anyhow::anyhow!("{} has an invalid value: '{}'", var, raw)),
        _ => Ok(None),
    }
}

fn real_secret(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || PLACEHOLDER_KEYS.contains(&trimmed) {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn redact(secret: &Option<String>) -> &'static str {
    if secret.is_some() {
        "<set>"
    } else {
        "<unset>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(pairs: &[(&str, &str)]) -> Result<Settings> {
        let mut builder = Config::builder();
        for (key, value) in pairs {
            builder = builder.set_override(*key, *value)?;
        }
        Settings::from_config(&builder.build()?)
    }

    #[test]
    fn defaults_match_documented_values() {
        let settings = build(&[]).unwrap();
        assert_eq!(settings.dimensions, 768);
        assert_eq!(settings.chunk_size, 500);
        assert_eq!(settings.chunk_overlap, 50);
        assert_eq!(settings.top_k, 5);
        assert!(settings.embedding_endpoint.is_none());
        assert!(settings.generation_api_key.is_none());
    }

    #[test]
    fn overrides_are_parsed_from_strings() {
        let settings = build(&[("chunk_size", "120"), ("top_k", "3"), ("temperature", "0.4")]).unwrap();
        assert_eq!(settings.chunk_size, 120);
        assert_eq!(settings.top_k, 3);
        assert!((settings.temperature - 0.4).abs() < 1e-6);
    }

    #[test]
    fn placeholder_api_key_counts_as_unset() {
        let settings = build(&[("generation_api_key", "your-openai-api-key-here")]).unwrap();
        assert!(settings.generation_api_key.is_none());
    }

    #[test]
    fn overlap_must_be_smaller_than_chunk_size() {
        let err = build(&[("chunk_size", "40"), ("chunk_overlap", "40")]).unwrap_err();
        assert!(err.to_string().contains("CHUNK_OVERLAP"));
    }

    #[test]
    fn top_k_must_fit_under_max() {
        assert!(build(&[("top_k", "21")]).is_err());
        assert!(build(&[("top_k", "0")]).is_err());
    }
}
