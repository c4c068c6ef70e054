use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub rewriter: RewriterConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

/// Ranking knobs for the hybrid index and the request deadlines around it.
#[derive(Debug, Deserialize, Clone)]
pub struct SearchConfig {
    /// Weight on the cosine-similarity term of the combined score.
    #[serde(default = "default_semantic_weight")]
    pub semantic_weight: f64,
    /// Weight on the Jaro-Winkler term of the combined score.
    #[serde(default = "default_fuzzy_weight")]
    pub fuzzy_weight: f64,
    /// Result-list cap applied when a request does not specify `top_k`.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    #[serde(default = "default_reindex_timeout")]
    pub reindex_timeout_secs: u64,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            semantic_weight: default_semantic_weight(),
            fuzzy_weight: default_fuzzy_weight(),
            default_top_k: default_top_k(),
            search_timeout_secs: default_search_timeout(),
            reindex_timeout_secs: default_reindex_timeout(),
        }
    }
}

fn default_semantic_weight() -> f64 {
    0.70
}
fn default_fuzzy_weight() -> f64 {
    0.30
}
fn default_top_k() -> usize {
    10
}
fn default_search_timeout() -> u64 {
    20
}
fn default_reindex_timeout() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    /// One of `gemini`, `ollama`, or `disabled`.
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default = "default_embedding_model")]
    pub model: String,
    /// Override the provider endpoint (mainly for Ollama and tests).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: default_embedding_model(),
            url: None,
            timeout_secs: default_provider_timeout(),
            max_retries: default_max_retries(),
        }
    }
}

fn default_embedding_provider() -> String {
    "gemini".to_string()
}
fn default_embedding_model() -> String {
    "text-embedding-004".to_string()
}
fn default_provider_timeout() -> u64 {
    15
}
fn default_max_retries() -> u32 {
    3
}

#[derive(Debug, Deserialize, Clone)]
pub struct RewriterConfig {
    /// One of `gemini` or `passthrough`.
    #[serde(default = "default_rewriter_provider")]
    pub provider: String,
    #[serde(default = "default_rewriter_model")]
    pub model: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

impl Default for RewriterConfig {
    fn default() -> Self {
        Self {
            provider: default_rewriter_provider(),
            model: default_rewriter_model(),
            url: None,
            timeout_secs: default_provider_timeout(),
        }
    }
}

fn default_rewriter_provider() -> String {
    "gemini".to_string()
}
fn default_rewriter_model() -> String {
    "gemini-1.5-flash".to_string()
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CatalogConfig {
    /// JSON file of items loaded into the index at startup. Optional: the
    /// service also accepts a full catalog via `POST /reindex`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    // Validate search weights
    if !config.search.semantic_weight.is_finite() || config.search.semantic_weight < 0.0 {
        anyhow::bail!("search.semantic_weight must be a non-negative number");
    }
    if !config.search.fuzzy_weight.is_finite() || config.search.fuzzy_weight < 0.0 {
        anyhow::bail!("search.fuzzy_weight must be a non-negative number");
    }
    if config.search.semantic_weight == 0.0 && config.search.fuzzy_weight == 0.0 {
        anyhow::bail!("at least one of search.semantic_weight / search.fuzzy_weight must be > 0");
    }
    if config.search.default_top_k == 0 {
        anyhow::bail!("search.default_top_k must be >= 1");
    }

    match config.embedding.provider.as_str() {
        "gemini" | "ollama" | "disabled" => {}
        other => anyhow::bail!(
            "Unknown embedding provider: '{}'. Must be gemini, ollama, or disabled.",
            other
        ),
    }

    match config.rewriter.provider.as_str() {
        "gemini" | "passthrough" => {}
        other => anyhow::bail!(
            "Unknown rewriter provider: '{}'. Must be gemini or passthrough.",
            other
        ),
    }

    Ok(config)
}
