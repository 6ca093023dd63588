//! Cohere native provider implementation.
//!
//! Uses Cohere's Generate API (`/v1/generate`) for raw-prompt completion.
//!
//! Features:
//! - Bearer authentication
//! - `num_generations` for multiple returned sequences
//! - Top-k (`k`) and nucleus (`p`) sampling parameters
//! - Billed token units reported as usage

use async_trait::async_trait;
use fewshot_core::error::ProviderError;
use fewshot_core::provider::*;
use serde::Deserialize;
use tracing::{debug, warn};

const DEFAULT_BASE_URL: &str = "https://api.cohere.ai";
/// Cohere rejects more generations per call.
const MAX_GENERATIONS: u32 = 5;

/// Cohere Generate API provider.
pub struct CohereProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl CohereProvider {
    /// Create a new Cohere provider.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            name: "cohere".into(),
            base_url: DEFAULT_BASE_URL.into(),
            api_key: api_key.into(),
            client: crate::http_client(120),
        }
    }

    /// Create with a custom base URL (e.g., for testing or proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn request_body(model: &str, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "prompt": prompt,
            "max_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "k": params.top_k,
            "p": params.top_p,
            "frequency_penalty": params.frequency_penalty,
            "presence_penalty": params.presence_penalty,
            "num_generations": params.num_return_sequences.min(MAX_GENERATIONS),
            "return_likelihoods": "NONE",
        })
    }

    fn into_outputs(response: GenerateResponse) -> (Vec<String>, Option<Usage>) {
        let texts = response.generations.into_iter().map(|g| g.text).collect();
        let usage = response
            .meta
            .and_then(|m| m.billed_units)
            .map(|units| {
                let prompt_tokens = units.input_tokens.unwrap_or(0.0) as u32;
                let completion_tokens = units.output_tokens.unwrap_or(0.0) as u32;
                Usage {
                    prompt_tokens,
                    completion_tokens,
                    total_tokens: prompt_tokens + completion_tokens,
                }
            });
        (texts, usage)
    }
}

#[async_trait]
impl Provider for CohereProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        if request.params.num_return_sequences > MAX_GENERATIONS {
            warn!(
                requested = request.params.num_return_sequences,
                max = MAX_GENERATIONS,
                "Cohere caps generations per prompt"
            );
        }

        let url = format!("{}/v1/generate", self.base_url);
        let mut outputs = Vec::with_capacity(request.prompts.len());
        let mut total: Option<Usage> = None;

        for prompt in &request.prompts {
            let body = Self::request_body(&request.model, prompt, &request.params);
            debug!(provider = %self.name, model = %request.model, "Sending generate request");

            let response = self
                .client
                .post(&url)
                .header("Authorization", format!("Bearer {}", self.api_key))
                .header("Content-Type", "application/json")
                .header("Accept", "application/json")
                .json(&body)
                .send()
                .await
                .map_err(|e| ProviderError::Network(e.to_string()))?;

            let status = response.status().as_u16();
            if status != 200 {
                let error_body = response.text().await.unwrap_or_default();
                warn!(status, body = %error_body, "Cohere API error");
                return Err(crate::status_error(status, error_body));
            }

            let api_response: GenerateResponse =
                response.json().await.map_err(|e| ProviderError::ApiError {
                    status_code: 200,
                    message: format!("Failed to parse Cohere response: {e}"),
                })?;

            let (texts, usage) = Self::into_outputs(api_response);
            if let Some(usage) = usage {
                total.get_or_insert_with(Usage::default).add(&usage);
            }
            outputs.push(texts);
        }

        Ok(GenerationResponse {
            outputs,
            usage: total,
            model: request.model,
        })
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(1)
    }
}

// --- Cohere API types ---

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    generations: Vec<Generation>,
    #[serde(default)]
    meta: Option<ResponseMeta>,
}

#[derive(Debug, Deserialize)]
struct Generation {
    text: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMeta {
    #[serde(default)]
    billed_units: Option<BilledUnits>,
}

#[derive(Debug, Deserialize)]
struct BilledUnits {
    #[serde(default)]
    input_tokens: Option<f64>,
    #[serde(default)]
    output_tokens: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_name() {
        let provider = CohereProvider::new("co-test");
        assert_eq!(provider.name(), "cohere");
        assert_eq!(provider.max_batch_size(), Some(1));
    }

    #[test]
    fn custom_base_url() {
        let provider = CohereProvider::new("k").with_base_url("https://proxy.example.com/");
        assert_eq!(provider.base_url, "https://proxy.example.com");
    }

    #[test]
    fn request_body_uses_cohere_names() {
        let params = GenerationParams {
            top_k: 40,
            top_p: 0.75,
            num_return_sequences: 9,
            ..GenerationParams::default()
        };
        let body = CohereProvider::request_body("command", "prompt", &params);
        assert_eq!(body["k"], 40);
        assert_eq!(body["num_generations"], MAX_GENERATIONS);
        assert!(body.get("top_k").is_none());
        assert!((body["p"].as_f64().unwrap() - 0.75).abs() < 1e-6);
    }

    #[test]
    fn parse_generate_response() {
        let json = r#"{
            "id": "gen-1",
            "generations": [{"id": "a", "text": " The cat sat."}],
            "prompt": "Complex: ...",
            "meta": {"api_version": {"version": "1"}, "billed_units": {"input_tokens": 30, "output_tokens": 5}}
        }"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        let (texts, usage) = CohereProvider::into_outputs(response);
        assert_eq!(texts, vec![" The cat sat.".to_string()]);
        let usage = usage.unwrap();
        assert_eq!(usage.prompt_tokens, 30);
        assert_eq!(usage.total_tokens, 35);
    }

    #[test]
    fn parse_response_without_meta() {
        let json = r#"{"generations": [{"text": "x"}, {"text": "y"}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        let (texts, usage) = CohereProvider::into_outputs(response);
        assert_eq!(texts.len(), 2);
        assert!(usage.is_none());
    }
}
