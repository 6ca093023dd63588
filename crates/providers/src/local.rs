//! Local inference provider that runs models directly on your hardware.
//!
//! Uses [Candle](https://github.com/huggingface/candle) (Rust-native ML) to run
//! GGUF-quantized language models. Prompts are fed to the model verbatim, with
//! no chat template, since few-shot prompts already carry their own format.
//!
//! Supported model families:
//! - **TinyLlama** (1.1B params, Q4_K_M ~670 MB)
//! - **SmolLM** (135M–1.7B params)
//! - **Phi-2** (2.7B params)
//! - **Qwen2** (0.5B–1.5B params)
//! - any Llama-architecture GGUF file given by path
//!
//! # Example
//! ```bash
//! fewshot infer --model tinyllama --examples pool.jsonl --input test.txt
//! fewshot infer --model /path/to/model.gguf --examples pool.jsonl --input test.txt
//! ```

use async_trait::async_trait;
use candle_core::quantized::gguf_file;
use candle_core::{Device, Tensor};
use candle_transformers::generation::{LogitsProcessor, Sampling};
use candle_transformers::models::quantized_llama as qlm;
use fewshot_core::error::ProviderError;
use fewshot_core::provider::{
    GenerationParams, GenerationRequest, GenerationResponse, Provider, Usage,
};
use hf_hub::api::sync::Api;
use std::path::Path;
use std::sync::Arc;
use tokenizers::Tokenizer;
use tokio::sync::Mutex;
use tracing::{debug, info};

// ── Well-known model aliases ───────────────────────────────────────────

/// Model presets: friendly aliases that resolve to HuggingFace repos + filenames.
struct ModelPreset {
    repo: &'static str,
    gguf_file: &'static str,
    tokenizer_repo: &'static str,
}

fn resolve_preset(alias: &str) -> Option<ModelPreset> {
    let alias_lower = alias.to_lowercase();
    match alias_lower.as_str() {
        "tinyllama" | "tiny-llama" | "tinyllama-1.1b" => Some(ModelPreset {
            repo: "TheBloke/TinyLlama-1.1B-Chat-v1.0-GGUF",
            gguf_file: "tinyllama-1.1b-chat-v1.0.Q4_K_M.gguf",
            tokenizer_repo: "TinyLlama/TinyLlama-1.1B-Chat-v1.0",
        }),
        "smollm" | "smollm:135m" | "smollm-135m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-135M-Instruct-GGUF",
            gguf_file: "smollm-135m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-135M-Instruct",
        }),
        "smollm:360m" | "smollm-360m" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-360M-Instruct-GGUF",
            gguf_file: "smollm-360m-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-360M-Instruct",
        }),
        "smollm:1.7b" | "smollm-1.7b" => Some(ModelPreset {
            repo: "TheBloke/SmolLM-1.7B-Instruct-GGUF",
            gguf_file: "smollm-1.7b-instruct.Q4_K_M.gguf",
            tokenizer_repo: "HuggingFaceTB/SmolLM-1.7B-Instruct",
        }),
        "phi2" | "phi-2" => Some(ModelPreset {
            repo: "TheBloke/phi-2-GGUF",
            gguf_file: "phi-2.Q4_K_M.gguf",
            tokenizer_repo: "microsoft/phi-2",
        }),
        "qwen:0.5b" | "qwen-0.5b" | "qwen2-0.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-0.5B-Instruct-GGUF",
            gguf_file: "qwen2-0_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-0.5B-Instruct",
        }),
        "qwen:1.5b" | "qwen-1.5b" | "qwen2-1.5b" => Some(ModelPreset {
            repo: "Qwen/Qwen2-1.5B-Instruct-GGUF",
            gguf_file: "qwen2-1_5b-instruct-q4_k_m.gguf",
            tokenizer_repo: "Qwen/Qwen2-1.5B-Instruct",
        }),
        _ => None,
    }
}

/// Whether `name` should be treated as a path to a GGUF file.
pub fn is_gguf_path(name: &str) -> bool {
    name.to_lowercase().ends_with(".gguf")
}

/// Map generation parameters onto a Candle sampling strategy.
fn sampling_for(params: &GenerationParams) -> Sampling {
    if !params.do_sample || params.temperature <= 0.0 {
        return Sampling::ArgMax;
    }
    let temperature = params.temperature as f64;
    let top_p = params.top_p as f64;
    let use_top_p = top_p > 0.0 && top_p < 1.0;
    match (params.top_k, use_top_p) {
        (0, false) => Sampling::All { temperature },
        (0, true) => Sampling::TopP {
            p: top_p,
            temperature,
        },
        (k, false) => Sampling::TopK {
            k: k as usize,
            temperature,
        },
        (k, true) => Sampling::TopKThenTopP {
            k: k as usize,
            p: top_p,
            temperature,
        },
    }
}

// ── Local Provider ─────────────────────────────────────────────────────

/// A provider that runs GGUF-quantized language models locally via Candle.
///
/// The model sits behind a Mutex because Candle inference on CPU is
/// single-threaded and the KV cache is mutable state.
pub struct LocalProvider {
    inner: Arc<Mutex<Option<LocalModelState>>>,
    model_name: String,
}

/// The loaded model state (tokenizer + weights).
struct LocalModelState {
    model: qlm::ModelWeights,
    tokenizer: Tokenizer,
    device: Device,
    eos_token_id: u32,
    /// Sequences generated so far; offsets the sampling seed so repeated
    /// draws differ while the whole run stays reproducible.
    sequences: u64,
}

impl LocalProvider {
    /// Create a new local provider.
    ///
    /// `model_name` can be:
    /// - A preset alias: `"tinyllama"`, `"smollm:135m"`, `"phi2"`
    /// - A path to a local GGUF file: `"/path/to/model.gguf"`
    ///
    /// The model is loaded lazily on first request.
    pub fn new(model_name: &str) -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            model_name: model_name.to_string(),
        }
    }

    async fn ensure_loaded(&self) -> Result<(), ProviderError> {
        let mut state = self.inner.lock().await;
        if state.is_none() {
            info!(model = %self.model_name, "Loading local model on first request...");
            let name = self.model_name.clone();
            let loaded = tokio::task::spawn_blocking(move || LocalModelState::load(&name))
                .await
                .map_err(|e| ProviderError::ApiError {
                    status_code: 500,
                    message: format!("Model loading task failed: {e}"),
                })??;
            *state = Some(loaded);
        }
        Ok(())
    }
}

fn load_tokenizer(path: &Path) -> Result<Tokenizer, ProviderError> {
    Tokenizer::from_file(path)
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to load tokenizer: {e}")))
}

fn load_weights(path: &Path, device: &Device) -> Result<qlm::ModelWeights, ProviderError> {
    let mut file = std::fs::File::open(path)
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to open model file: {e}")))?;

    let gguf = gguf_file::Content::read(&mut file)
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to parse GGUF file: {e}")))?;

    qlm::ModelWeights::from_gguf(gguf, &mut file, device)
        .map_err(|e| ProviderError::NotConfigured(format!("Failed to load model weights: {e}")))
}

fn eos_token(tokenizer: &Tokenizer) -> u32 {
    tokenizer
        .token_to_id("</s>")
        .or_else(|| tokenizer.token_to_id("<|endoftext|>"))
        .or_else(|| tokenizer.token_to_id("<|im_end|>"))
        .or_else(|| tokenizer.token_to_id("<|eot_id|>"))
        .unwrap_or(2) // fallback to common EOS id
}

impl LocalModelState {
    /// Load a model by name or path.
    fn load(model_name: &str) -> Result<Self, ProviderError> {
        let device = Device::Cpu;

        if is_gguf_path(model_name) {
            let path = Path::new(model_name);
            if !path.exists() {
                return Err(ProviderError::ModelNotFound(format!(
                    "GGUF file not found: {model_name}"
                )));
            }
            return Self::load_from_path(path, &device);
        }

        let preset = resolve_preset(model_name).ok_or_else(|| {
            ProviderError::ModelNotFound(format!(
                "Unknown local model '{model_name}'. Available presets: tinyllama, smollm, \
                 smollm:135m, smollm:360m, smollm:1.7b, phi2, qwen:0.5b, qwen:1.5b. \
                 Or provide a path to a .gguf file."
            ))
        })?;

        info!(
            model = model_name,
            repo = preset.repo,
            file = preset.gguf_file,
            "Downloading/loading local model"
        );

        // Download via HuggingFace Hub (cached automatically)
        let api = Api::new().map_err(|e| {
            ProviderError::Network(format!("Failed to initialize HuggingFace Hub API: {e}"))
        })?;

        let model_path = api
            .model(preset.repo.to_string())
            .get(preset.gguf_file)
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download model '{}' from '{}': {e}",
                    preset.gguf_file, preset.repo
                ))
            })?;
        info!(path = %model_path.display(), "Model file ready");

        let tokenizer_path = api
            .model(preset.tokenizer_repo.to_string())
            .get("tokenizer.json")
            .map_err(|e| {
                ProviderError::Network(format!(
                    "Failed to download tokenizer from '{}': {e}",
                    preset.tokenizer_repo
                ))
            })?;

        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let model = load_weights(&model_path, &device)?;
        let eos_token_id = eos_token(&tokenizer);

        info!(eos_token_id, "Local model loaded successfully");

        Ok(Self {
            model,
            tokenizer,
            device,
            eos_token_id,
            sequences: 0,
        })
    }

    /// Load from an explicit GGUF file path; `tokenizer.json` must sit next to it.
    fn load_from_path(path: &Path, device: &Device) -> Result<Self, ProviderError> {
        info!(path = %path.display(), "Loading local GGUF model");

        let tokenizer_path = path.with_file_name("tokenizer.json");
        if !tokenizer_path.exists() {
            return Err(ProviderError::NotConfigured(format!(
                "No tokenizer.json found next to {}",
                path.display()
            )));
        }
        let tokenizer = load_tokenizer(&tokenizer_path)?;
        let model = load_weights(path, device)?;
        let eos_token_id = eos_token(&tokenizer);

        Ok(Self {
            model,
            tokenizer,
            device: device.clone(),
            eos_token_id,
            sequences: 0,
        })
    }

    /// Generate one continuation: tokenize → sample tokens → decode.
    ///
    /// Returns the continuation only, with prompt and completion token counts.
    fn generate_one(
        &mut self,
        prompt: &str,
        params: &GenerationParams,
    ) -> Result<(String, u32, u32), ProviderError> {
        let encoding = self
            .tokenizer
            .encode(prompt, true)
            .map_err(|e| ProviderError::ApiError {
                status_code: 500,
                message: format!("Tokenization failed: {e}"),
            })?;

        let prompt_tokens = encoding.get_ids();
        let prompt_len = prompt_tokens.len();

        let seed = params.seed.wrapping_add(self.sequences);
        self.sequences += 1;
        let mut logits_processor = LogitsProcessor::from_sampling(seed, sampling_for(params));

        debug!(
            prompt_tokens = prompt_len,
            max_new_tokens = params.max_new_tokens,
            seed,
            "Starting local generation"
        );

        let mut generated: Vec<u32> = Vec::new();
        let mut input = Tensor::new(prompt_tokens, &self.device)
            .and_then(|t| t.unsqueeze(0))
            .map_err(map_candle_err)?;
        let mut index_pos = 0;

        for _ in 0..params.max_new_tokens {
            let step_len = input.dim(1).map_err(map_candle_err)?;
            let logits = self
                .model
                .forward(&input, index_pos)
                .and_then(|l| l.squeeze(0))
                .map_err(map_candle_err)?;
            index_pos += step_len;

            let next_token = logits_processor.sample(&logits).map_err(map_candle_err)?;
            if next_token == self.eos_token_id {
                break;
            }
            generated.push(next_token);

            input = Tensor::new(&[next_token][..], &self.device)
                .and_then(|t| t.unsqueeze(0))
                .map_err(map_candle_err)?;
        }

        let output = self
            .tokenizer
            .decode(&generated, true)
            .map_err(|e| ProviderError::ApiError {
                status_code: 500,
                message: format!("Detokenization failed: {e}"),
            })?;

        debug!(completion_tokens = generated.len(), "Generation complete");
        Ok((output, prompt_len as u32, generated.len() as u32))
    }
}

/// Map Candle errors to ProviderError.
fn map_candle_err(e: candle_core::Error) -> ProviderError {
    ProviderError::ApiError {
        status_code: 500,
        message: format!("Candle inference error: {e}"),
    }
}

// ── Provider trait implementation ──────────────────────────────────────

#[async_trait]
impl Provider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn generate(
        &self,
        request: GenerationRequest,
    ) -> std::result::Result<GenerationResponse, ProviderError> {
        self.ensure_loaded().await?;

        let prompts = request.prompts;
        let params = request.params;
        let inner = self.inner.clone();

        // Run inference on a blocking thread (Candle is CPU-bound)
        let (outputs, usage) = tokio::task::spawn_blocking(move || {
            let mut guard = inner.blocking_lock();
            let state = guard.as_mut().ok_or_else(|| {
                ProviderError::NotConfigured("Local model is not loaded".into())
            })?;

            let mut usage = Usage::default();
            let mut outputs = Vec::with_capacity(prompts.len());
            for prompt in &prompts {
                let mut candidates = Vec::with_capacity(params.num_return_sequences as usize);
                for _ in 0..params.num_return_sequences {
                    let (text, prompt_tokens, completion_tokens) =
                        state.generate_one(prompt, &params)?;
                    usage.add(&Usage {
                        prompt_tokens,
                        completion_tokens,
                        total_tokens: prompt_tokens + completion_tokens,
                    });
                    candidates.push(text);
                }
                outputs.push(candidates);
            }
            Ok::<_, ProviderError>((outputs, usage))
        })
        .await
        .map_err(|e| ProviderError::ApiError {
            status_code: 500,
            message: format!("Inference task panicked: {e}"),
        })??;

        Ok(GenerationResponse {
            outputs,
            usage: Some(usage),
            model: format!("local/{}", request.model),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_preset_aliases() {
        assert!(resolve_preset("tinyllama").is_some());
        assert!(resolve_preset("TinyLlama").is_some());
        assert!(resolve_preset("smollm:135m").is_some());
        assert!(resolve_preset("phi2").is_some());
        assert!(resolve_preset("qwen:0.5b").is_some());
        assert!(resolve_preset("nonexistent").is_none());
    }

    #[test]
    fn gguf_paths_detected() {
        assert!(is_gguf_path("/models/llama.Q4_K_M.gguf"));
        assert!(is_gguf_path("model.GGUF"));
        assert!(!is_gguf_path("tinyllama"));
    }

    #[test]
    fn greedy_when_not_sampling() {
        let params = GenerationParams {
            do_sample: false,
            ..GenerationParams::default()
        };
        assert!(matches!(sampling_for(&params), Sampling::ArgMax));
    }

    #[test]
    fn default_params_use_nucleus_sampling() {
        let params = GenerationParams::default();
        assert!(matches!(sampling_for(&params), Sampling::TopP { .. }));
    }

    #[test]
    fn top_k_and_top_p_combined() {
        let params = GenerationParams {
            top_k: 50,
            top_p: 0.9,
            ..GenerationParams::default()
        };
        assert!(matches!(
            sampling_for(&params),
            Sampling::TopKThenTopP { k: 50, .. }
        ));
    }

    #[tokio::test]
    async fn missing_gguf_file_is_model_not_found() {
        let provider = LocalProvider::new("/nonexistent/model.gguf");
        let request = GenerationRequest {
            model: "/nonexistent/model.gguf".into(),
            prompts: vec!["x".into()],
            params: GenerationParams::default(),
        };
        let err = provider.generate(request).await.unwrap_err();
        assert!(matches!(err, ProviderError::ModelNotFound(_)));
    }
}
