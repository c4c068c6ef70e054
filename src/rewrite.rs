//! Query rewriting boundary.
//!
//! Defines the [`QueryRewriter`] trait and two implementations:
//! - **[`GeminiRewriter`]** — asks a Gemini model to spell-correct and
//!   normalize the query, expecting strict JSON back.
//! - **[`PassthroughRewriter`]** — returns the raw query as the sole
//!   variant; used when no API key is configured.
//!
//! The index and merger only ever see the resulting [`Rewrite`]; how the
//! variants were produced is this module's business alone. Rewriting is
//! best-effort by contract: callers treat any rewriter failure by falling
//! back to [`Rewrite::passthrough`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

use crate::config::RewriterConfig;
use crate::models::Rewrite;

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Trait for query rewriters.
///
/// One raw user query in, one normalized [`Rewrite`] out. Implementations
/// may call out to an LLM; callers impose deadlines by wrapping the future.
#[async_trait]
pub trait QueryRewriter: Send + Sync {
    /// Rewrite `raw` into a primary query plus up to three alternatives.
    ///
    /// # Errors
    ///
    /// Fails on an empty raw query or when the backing model call fails.
    /// Callers are expected to absorb failures with
    /// [`Rewrite::passthrough`] rather than failing the request.
    async fn rewrite(&self, raw: &str) -> Result<Rewrite>;
}

/// Create the appropriate [`QueryRewriter`] based on configuration.
pub fn create_rewriter(config: &RewriterConfig) -> Result<Box<dyn QueryRewriter>> {
    match config.provider.as_str() {
        "gemini" => Ok(Box::new(GeminiRewriter::new(config)?)),
        "passthrough" => Ok(Box::new(PassthroughRewriter)),
        other => bail!("Unknown rewriter provider: {}", other),
    }
}

// ============ Passthrough ============

/// Rewriter that performs no rewriting at all.
pub struct PassthroughRewriter;

#[async_trait]
impl QueryRewriter for PassthroughRewriter {
    async fn rewrite(&self, raw: &str) -> Result<Rewrite> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty query");
        }
        Ok(Rewrite::passthrough(raw))
    }
}

// ============ Gemini ============

/// LLM-backed rewriter using the Gemini `generateContent` endpoint.
///
/// The model is instructed to return strict JSON
/// (`{"primary": "...", "alternatives": ["..."]}`). Output that is not
/// valid JSON degrades to the raw query rather than erroring; only the
/// HTTP call itself can fail.
pub struct GeminiRewriter {
    model: String,
    base_url: String,
    timeout_secs: u64,
}

impl GeminiRewriter {
    /// # Errors
    ///
    /// Returns an error if `GOOGLE_API_KEY` is not in the environment.
    pub fn new(config: &RewriterConfig) -> Result<Self> {
        if std::env::var("GOOGLE_API_KEY").is_err() {
            bail!("GOOGLE_API_KEY environment variable not set");
        }
        Ok(Self {
            model: config.model.clone(),
            base_url: config
                .url
                .clone()
                .unwrap_or_else(|| GEMINI_BASE_URL.to_string()),
            timeout_secs: config.timeout_secs,
        })
    }
}

const REWRITE_INSTRUCTIONS: &str = r#"
You are a query rewriter for an e-commerce product search.
Tasks:
1) Fix spelling mistakes and normalize the query while preserving user intent.
2) Keep brand/model/series tokens (e.g., "iPhone 14 Pro", "Galaxy S23") intact if obvious.
3) Return STRICT JSON ONLY with this schema (no markdown, no prose):

{
  "primary": "<one corrected query string>",
  "alternatives": ["<alt1>", "<alt2>"]
}

Guidelines:
- Avoid adding new intent or extra adjectives.
- Prefer common brand spellings (e.g., "samsung", "google", "iphone").
- If the input is already clean, return it unchanged as "primary".
- Provide up to 2 short alternatives (synonyms, close spellings) or an empty list.
"#;

#[async_trait]
impl QueryRewriter for GeminiRewriter {
    async fn rewrite(&self, raw: &str) -> Result<Rewrite> {
        let raw = raw.trim();
        if raw.is_empty() {
            bail!("empty query");
        }

        let api_key = std::env::var("GOOGLE_API_KEY")
            .map_err(|_| anyhow::anyhow!("GOOGLE_API_KEY not set"))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()?;

        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
        let body = serde_json::json!({
            "contents": [{
                "parts": [
                    { "text": REWRITE_INSTRUCTIONS },
                    { "text": format!("Input: {raw:?}") },
                ],
            }],
        });

        let response = client
            .post(&url)
            .header("x-goog-api-key", &api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        let text = extract_text(&json);
        Ok(parse_rewrite(&text, raw))
    }
}

/// Concatenate the text parts of the first candidate in a
/// `generateContent` response. Missing pieces yield an empty string.
fn extract_text(json: &serde_json::Value) -> String {
    let parts = json
        .get("candidates")
        .and_then(|c| c.get(0))
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(|p| p.as_array());

    match parts {
        Some(parts) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
            .collect(),
        None => String::new(),
    }
}

/// Strict-JSON payload the model is asked to produce.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RewritePayload {
    #[serde(default)]
    primary: String,
    #[serde(default)]
    alternatives: Vec<String>,
}

/// Parse model output into a normalized [`Rewrite`].
///
/// Malformed JSON and a blanked-out primary both fall back to `raw`; a
/// bad model answer must never lose the user's query.
fn parse_rewrite(text: &str, raw: &str) -> Rewrite {
    let payload: RewritePayload = match serde_json::from_str(text) {
        Ok(payload) => payload,
        Err(_) => return Rewrite::passthrough(raw),
    };

    let mut rewrite = Rewrite {
        primary: payload.primary,
        alternatives: payload.alternatives,
    }
    .normalized();

    if rewrite.primary.is_empty() {
        rewrite.primary = raw.to_string();
    }
    rewrite
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_concatenates_parts() {
        let json = serde_json::json!({
            "candidates": [{
                "content": { "parts": [ { "text": "{\"primary\":" }, { "text": " \"x\"}" } ] }
            }]
        });
        assert_eq!(extract_text(&json), "{\"primary\": \"x\"}");
    }

    #[test]
    fn test_extract_text_handles_missing_candidates() {
        assert_eq!(extract_text(&serde_json::json!({})), "");
    }

    #[test]
    fn test_parse_rewrite_valid_json() {
        let rw = parse_rewrite(
            r#"{"primary": "iphone 14", "alternatives": ["apple iphone", "iphone"]}"#,
            "ifone 14",
        );
        assert_eq!(rw.primary, "iphone 14");
        assert_eq!(rw.alternatives, vec!["apple iphone", "iphone"]);
    }

    #[test]
    fn test_parse_rewrite_malformed_json_falls_back_to_raw() {
        let rw = parse_rewrite("here is your query: iphone", "ifone 14");
        assert_eq!(rw.primary, "ifone 14");
        assert!(rw.alternatives.is_empty());
    }

    #[test]
    fn test_parse_rewrite_unknown_fields_fall_back_to_raw() {
        let rw = parse_rewrite(r#"{"primary": "x", "extra": true}"#, "raw query");
        assert_eq!(rw.primary, "raw query");
    }

    #[test]
    fn test_parse_rewrite_blank_primary_falls_back_to_raw() {
        let rw = parse_rewrite(r#"{"primary": "  ", "alternatives": ["ok"]}"#, "galaxy");
        assert_eq!(rw.primary, "galaxy");
        assert_eq!(rw.alternatives, vec!["ok"]);
    }

    #[tokio::test]
    async fn test_passthrough_rejects_empty() {
        assert!(PassthroughRewriter.rewrite("   ").await.is_err());
    }

    #[tokio::test]
    async fn test_passthrough_returns_raw_as_primary() {
        let rw = PassthroughRewriter.rewrite(" galaxy s23 ").await.unwrap();
        assert_eq!(rw.primary, "galaxy s23");
        assert!(rw.alternatives.is_empty());
    }
}
