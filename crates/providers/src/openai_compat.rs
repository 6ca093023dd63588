//! OpenAI-compatible provider implementation.
//!
//! Uses the legacy text completions endpoint (`/v1/completions`), which takes
//! a raw prompt string and returns `n` continuations. Works with OpenAI and
//! any server exposing the same endpoint (vLLM, llama.cpp server, Together AI).
//!
//! The endpoint accepts one prompt per request, so the provider reports a
//! maximum batch size of 1 and sends batched prompts one after another.

use async_trait::async_trait;
use fewshot_core::error::ProviderError;
use fewshot_core::provider::*;
use serde::Deserialize;
use tracing::{debug, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// An OpenAI-compatible text completion provider.
pub struct OpenAiCompatProvider {
    name: String,
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Create a new OpenAI-compatible provider.
    pub fn new(
        name: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: crate::http_client(120),
        }
    }

    /// Create an OpenAI provider (convenience constructor).
    pub fn openai(api_key: impl Into<String>) -> Self {
        Self::new("openai", OPENAI_BASE_URL, api_key)
    }

    /// Request body for a single prompt.
    fn request_body(model: &str, prompt: &str, params: &GenerationParams) -> serde_json::Value {
        serde_json::json!({
            "model": model,
            "prompt": prompt,
            "max_tokens": params.max_new_tokens,
            "temperature": params.temperature,
            "top_p": params.top_p,
            "n": params.num_return_sequences,
            "frequency_penalty": params.frequency_penalty,
            "presence_penalty": params.presence_penalty,
        })
    }

    /// Continuations in choice-index order.
    fn into_outputs(response: CompletionResponse) -> (Vec<String>, Option<Usage>) {
        let mut choices = response.choices;
        choices.sort_by_key(|c| c.index);
        let texts = choices.into_iter().map(|c| c.text).collect();
        let usage = response.usage.map(|u| Usage {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        });
        (texts, usage)
    }

    async fn complete_one(
        &self,
        model: &str,
        prompt: &str,
        params: &GenerationParams,
    ) -> std::result::Result<CompletionResponse, ProviderError> {
        let url = format!("{}/completions", self.base_url);
        let body = Self::request_body(model, prompt, params);

        debug!(provider = %self.name, model, chars = prompt.len(), "Sending completion request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if status != 200 {
            let error_body = response.text().await.unwrap_or_default();
            warn!(status, body = %error_body, "Provider returned error");
            return Err(crate::status_error(status, error_body));
        }

        response.json().await.map_err(|e| ProviderError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })
    }
}

#[async_trait]
impl Provider for OpenAiCompatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        let mut outputs = Vec::with_capacity(request.prompts.len());
        let mut total: Option<Usage> = None;
        let mut model = request.model.clone();

        for prompt in &request.prompts {
            let response = self
                .complete_one(&request.model, prompt, &request.params)
                .await?;
            if let Some(m) = &response.model {
                model = m.clone();
            }
            let (texts, usage) = Self::into_outputs(response);
            if texts.is_empty() {
                return Err(ProviderError::ApiError {
                    status_code: 200,
                    message: "No choices in response".into(),
                });
            }
            if let Some(usage) = usage {
                total.get_or_insert_with(Usage::default).add(&usage);
            }
            outputs.push(texts);
        }

        Ok(GenerationResponse {
            outputs,
            usage: total,
            model,
        })
    }

    fn max_batch_size(&self) -> Option<usize> {
        Some(1)
    }

    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        let url = format!("{}/models", self.base_url);
        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .send()
            .await
            .map_err(|e| ProviderError::Network(e.to_string()))?;

        Ok(response.status().is_success())
    }
}

// --- API types ---

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    choices: Vec<CompletionChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    text: String,
    #[serde(default)]
    index: u32,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    total_tokens: u32,
}
