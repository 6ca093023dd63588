//! Provider trait: the abstraction over text-generation backends.
//!
//! A Provider takes a batch of rendered prompts and returns one or more
//! continuations per prompt. Implementations: a local GGUF model, and hosted
//! completion APIs (OpenAI-compatible, Cohere).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use crate::error::ProviderError;

/// Decoding parameters shared by every backend.
///
/// Backends ignore the knobs they don't support.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Maximum number of new tokens per continuation
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,

    /// How many continuations to return per prompt
    #[serde(default = "default_num_return_sequences")]
    pub num_return_sequences: u32,

    /// Sample instead of greedy decoding
    #[serde(default = "default_true")]
    pub do_sample: bool,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_top_p")]
    pub top_p: f32,

    /// 0 disables top-k filtering
    #[serde(default)]
    pub top_k: u32,

    #[serde(default)]
    pub frequency_penalty: f32,

    #[serde(default)]
    pub presence_penalty: f32,

    /// Seed for backends with local sampling, copied from the run seed
    #[serde(skip)]
    pub seed: u64,
}

fn default_max_new_tokens() -> u32 {
    100
}
fn default_num_return_sequences() -> u32 {
    1
}
fn default_true() -> bool {
    true
}
fn default_temperature() -> f32 {
    1.0
}
fn default_top_p() -> f32 {
    0.9
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_new_tokens: default_max_new_tokens(),
            num_return_sequences: default_num_return_sequences(),
            do_sample: true,
            temperature: default_temperature(),
            top_p: default_top_p(),
            top_k: 0,
            frequency_penalty: 0.0,
            presence_penalty: 0.0,
            seed: 0,
        }
    }
}

/// A batch of rendered prompts to complete.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Backend-specific model identifier (e.g. "text-davinci-003", "command")
    pub model: String,

    /// One rendered prompt per input
    pub prompts: Vec<String>,

    pub params: GenerationParams,
}

/// Raw continuations for a batch, one inner list per prompt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationResponse {
    /// `outputs[i]` holds `num_return_sequences` candidates for `prompts[i]`
    pub outputs: Vec<Vec<String>>,

    /// Token usage statistics, when the backend reports them
    pub usage: Option<Usage>,

    /// Which model actually responded
    pub model: String,
}

/// Token usage information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Accumulate another usage report into this one.
    pub fn add(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}

/// The core Provider trait.
///
/// The inference runner calls `generate()` once per batch without knowing
/// which backend is behind it.
#[async_trait]
pub trait Provider: Send + Sync {
    /// A human-readable name for this provider (e.g., "openai", "local").
    fn name(&self) -> &str;

    /// Generate continuations for every prompt in the request.
    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError>;

    /// Largest batch the backend accepts in a single call, `None` if unbounded.
    ///
    /// Hosted APIs take one prompt per request.
    fn max_batch_size(&self) -> Option<usize> {
        None
    }

    /// Health check: can we reach the provider?
    async fn health_check(&self) -> std::result::Result<bool, ProviderError> {
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generation_params_defaults() {
        let params = GenerationParams::default();
        assert_eq!(params.max_new_tokens, 100);
        assert_eq!(params.num_return_sequences, 1);
        assert!(params.do_sample);
        assert!((params.top_p - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: GenerationParams = serde_json::from_str(r#"{"top_k": 40}"#).unwrap();
        assert_eq!(params.top_k, 40);
        assert_eq!(params.max_new_tokens, 100);
    }

    #[test]
    fn usage_accumulates() {
        let mut total = Usage::default();
        total.add(&Usage {
            prompt_tokens: 10,
            completion_tokens: 5,
            total_tokens: 15,
        });
        total.add(&Usage {
            prompt_tokens: 1,
            completion_tokens: 1,
            total_tokens: 2,
        });
        assert_eq!(total.total_tokens, 17);
        assert_eq!(total.prompt_tokens, 11);
    }
}
