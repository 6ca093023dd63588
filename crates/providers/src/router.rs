//! Provider router: selects the text generation backend from the model name.
//!
//! Hosted models are named with a provider prefix, `openai-<model>` or
//! `cohere-<model>`; the prefix is matched case-insensitively and the
//! remainder is the provider's model id. Anything else is a local model
//! (a preset alias or a GGUF path).

use crate::cohere::CohereProvider;
use crate::openai_compat::{OPENAI_BASE_URL, OpenAiCompatProvider};
use fewshot_config::InferenceConfig;
use fewshot_core::error::ProviderError;
use fewshot_core::provider::Provider;
use std::sync::Arc;
use tracing::info;

/// Which backend serves a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    OpenAi,
    Cohere,
    Local,
}

impl Backend {
    /// Config key under `[providers]` for hosted backends.
    pub fn provider_key(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Cohere => "cohere",
            Self::Local => "local",
        }
    }

    pub fn is_hosted(&self) -> bool {
        !matches!(self, Self::Local)
    }
}

/// A model name split into backend and provider-side model id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedModel {
    pub backend: Backend,
    pub model: String,
}

/// Split a configured model name into backend and model id.
pub fn resolve_model(name: &str) -> ResolvedModel {
    let lower = name.to_lowercase();
    for (prefix, backend) in [("openai-", Backend::OpenAi), ("cohere-", Backend::Cohere)] {
        if let Some(model) = lower.strip_prefix(prefix) {
            return ResolvedModel {
                backend,
                model: model.to_string(),
            };
        }
    }
    ResolvedModel {
        backend: Backend::Local,
        model: name.to_string(),
    }
}

/// Build the provider for `config.model_name_or_path`.
///
/// Returns the provider and the model id to put in requests.
pub fn build_from_config(
    config: &InferenceConfig,
) -> Result<(Arc<dyn Provider>, String), ProviderError> {
    let resolved = resolve_model(&config.model_name_or_path);
    let key = resolved.backend.provider_key();

    let provider: Arc<dyn Provider> = match resolved.backend {
        Backend::OpenAi | Backend::Cohere => {
            let api_key = config.api_key_for(key).ok_or_else(|| {
                ProviderError::NotConfigured(format!(
                    "No API key for {key}; set {}_API_KEY or providers.{key}.api_key",
                    key.to_uppercase()
                ))
            })?;
            info!(
                provider = key,
                model = %resolved.model,
                "Using hosted model; full reproducibility is not guaranteed"
            );
            if resolved.backend == Backend::OpenAi {
                let base_url = config
                    .api_url_for(key)
                    .unwrap_or_else(|| OPENAI_BASE_URL.to_string());
                Arc::new(OpenAiCompatProvider::new(key, base_url, api_key))
            } else {
                let mut provider = CohereProvider::new(api_key);
                if let Some(url) = config.api_url_for(key) {
                    provider = provider.with_base_url(url);
                }
                Arc::new(provider)
            }
        }
        Backend::Local => build_local(&resolved.model)?,
    };

    Ok((provider, resolved.model))
}

#[cfg(feature = "local")]
fn build_local(model: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    info!(model, "Using local model");
    Ok(Arc::new(crate::local::LocalProvider::new(model)))
}

#[cfg(not(feature = "local"))]
fn build_local(model: &str) -> Result<Arc<dyn Provider>, ProviderError> {
    Err(ProviderError::NotConfigured(format!(
        "'{model}' is a local model, but this build has no local inference; \
         rebuild with `--features local` or use an openai-/cohere- model"
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use fewshot_config::ProviderConfig;

    #[test]
    fn hosted_prefixes_are_stripped() {
        assert_eq!(
            resolve_model("openai-gpt-3.5-turbo-instruct"),
            ResolvedModel {
                backend: Backend::OpenAi,
                model: "gpt-3.5-turbo-instruct".into()
            }
        );
        assert_eq!(resolve_model("Cohere-Command").backend, Backend::Cohere);
        assert_eq!(resolve_model("Cohere-Command").model, "command");
    }

    #[test]
    fn everything_else_is_local() {
        let resolved = resolve_model("/models/Llama-2-7B.gguf");
        assert_eq!(resolved.backend, Backend::Local);
        assert_eq!(resolved.model, "/models/Llama-2-7B.gguf");
        assert!(!resolved.backend.is_hosted());
    }

    #[test]
    fn openai_without_url_builds_against_public_endpoint() {
        let config = InferenceConfig {
            model_name_or_path: "openai-davinci-002".into(),
            api_key: Some("sk-test".into()),
            ..InferenceConfig::default()
        };
        assert_eq!(config.api_url_for("openai"), None);
        let (provider, model) = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(model, "davinci-002");
    }

    #[test]
    fn hosted_model_requires_a_key() {
        let config = InferenceConfig {
            model_name_or_path: "openai-davinci-002".into(),
            ..InferenceConfig::default()
        };
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }

    #[test]
    fn builds_openai_with_configured_key() {
        let mut config = InferenceConfig {
            model_name_or_path: "openai-gpt-3.5-turbo-instruct".into(),
            ..InferenceConfig::default()
        };
        config.providers.insert(
            "openai".into(),
            ProviderConfig {
                api_key: Some("sk-test".into()),
                api_url: Some("http://localhost:8000/v1".into()),
            },
        );
        let (provider, model) = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
        assert_eq!(provider.max_batch_size(), Some(1));
        assert_eq!(model, "gpt-3.5-turbo-instruct");
    }

    #[test]
    fn builds_cohere_from_top_level_key() {
        let config = InferenceConfig {
            model_name_or_path: "cohere-command".into(),
            api_key: Some("co-test".into()),
            ..InferenceConfig::default()
        };
        let (provider, model) = build_from_config(&config).unwrap();
        assert_eq!(provider.name(), "cohere");
        assert_eq!(model, "command");
    }

    #[cfg(not(feature = "local"))]
    #[test]
    fn local_model_needs_feature() {
        let config = InferenceConfig::default();
        assert!(matches!(
            build_from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));
    }
}
