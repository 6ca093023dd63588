//! Configuration loading, validation, and management for fewshot.
//!
//! Loads an inference run configuration from `fewshot.toml` (or an explicit
//! path) with environment variable overrides, optionally overlays a JSON
//! prompt preset, and validates all settings before a run starts.

use fewshot_core::{GenerationParams, PromptLayout, PromptTemplate, SelectorKind};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Default config file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "fewshot.toml";

/// The root configuration structure for one inference run.
#[derive(Clone, Serialize, Deserialize)]
pub struct InferenceConfig {
    /// API key (can be overridden per-provider)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model to run. `openai-<model>` and `cohere-<model>` select a hosted
    /// API; anything else is treated as a local model preset or GGUF path.
    #[serde(default = "default_model")]
    pub model_name_or_path: String,

    /// Seed for exemplar sampling and local decoding
    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Number of inputs prompted per model call
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Decoding parameters
    #[serde(default)]
    pub generation: GenerationParams,

    /// Input and exemplar datasets
    #[serde(default)]
    pub data: DataConfig,

    /// Prompt construction
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Where predictions go
    #[serde(default)]
    pub output: OutputConfig,

    /// Provider-specific configurations
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,
}

fn default_model() -> String {
    "tinyllama".into()
}
fn default_seed() -> u64 {
    42
}
fn default_batch_size() -> usize {
    4
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for InferenceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceConfig")
            .field("api_key", &redact(&self.api_key))
            .field("model_name_or_path", &self.model_name_or_path)
            .field("seed", &self.seed)
            .field("batch_size", &self.batch_size)
            .field("generation", &self.generation)
            .field("data", &self.data)
            .field("prompt", &self.prompt)
            .field("output", &self.output)
            .field("providers", &self.providers)
            .finish()
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    /// JSONL file with the exemplar pool
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub examples: Option<PathBuf>,

    /// Inputs to simplify: JSONL records or one sentence per line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_file: Option<PathBuf>,

    #[serde(default = "default_source_field")]
    pub source_field: String,

    #[serde(default = "default_target_field")]
    pub target_field: String,
}

fn default_source_field() -> String {
    "complex".into()
}
fn default_target_field() -> String {
    "simple".into()
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            examples: None,
            input_file: None,
            source_field: default_source_field(),
            target_field: default_target_field(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Instruction placed before the exemplars
    #[serde(default = "default_prefix")]
    pub prefix: String,

    /// Final block holding the live input, with one `{input}` placeholder
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Per-exemplar template, with `{<source_field>}` and `{<target_field>}`
    #[serde(default = "default_template")]
    pub template: String,

    /// Text placed between prompt pieces
    #[serde(default = "default_separator")]
    pub separator: String,

    #[serde(default)]
    pub format: PromptLayout,

    /// Exemplars per prompt
    #[serde(default = "default_few_shot_n")]
    pub few_shot_n: usize,

    /// References per exemplar for multi-reference datasets
    #[serde(default = "default_n_refs")]
    pub n_refs: usize,

    #[serde(default)]
    pub selector: SelectorKind,

    /// Word budget for the length selector
    #[serde(default = "default_selector_max_length")]
    pub selector_max_length: usize,

    /// Minimum overlap score for the n-gram selector
    #[serde(default)]
    pub selector_ngram_threshold: f32,

    /// JSON prompt preset overriding the fields above
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preset: Option<PathBuf>,
}

fn default_prefix() -> String {
    "Simplify the following sentence:".into()
}
fn default_suffix() -> String {
    "Complex: {input}\nSimple:".into()
}
fn default_template() -> String {
    "Complex: {complex}\nSimple: {simple}".into()
}
fn default_separator() -> String {
    "\n\n".into()
}
fn default_few_shot_n() -> usize {
    3
}
fn default_n_refs() -> usize {
    1
}
fn default_selector_max_length() -> usize {
    2048
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            prefix: default_prefix(),
            suffix: default_suffix(),
            template: default_template(),
            separator: default_separator(),
            format: PromptLayout::default(),
            few_shot_n: default_few_shot_n(),
            n_refs: default_n_refs(),
            selector: SelectorKind::default(),
            selector_max_length: default_selector_max_length(),
            selector_ngram_threshold: 0.0,
            preset: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory under which a descriptive file name is derived
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_dir: Option<PathBuf>,

    /// Explicit predictions file (wins over `output_dir`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_file: Option<PathBuf>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
}

/// Where predictions are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutputTarget {
    Stdout,
    File(PathBuf),
}

impl OutputTarget {
    /// Sidecar path holding the persisted run configuration:
    /// `<predictions file name>.meta.json` in the same directory.
    pub fn metadata_path(&self) -> Option<PathBuf> {
        match self {
            Self::Stdout => None,
            Self::File(path) => {
                let mut name = path.file_name()?.to_os_string();
                name.push(".meta.json");
                Some(path.with_file_name(name))
            }
        }
    }
}

impl InferenceConfig {
    /// Load configuration from `path`, or from `./fewshot.toml` when `None`.
    ///
    /// Also checks environment variables:
    /// - `FEWSHOT_API_KEY` (highest priority), then `OPENAI_API_KEY` and
    ///   `COHERE_API_KEY` for their respective providers
    /// - `FEWSHOT_MODEL` to override the model
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(&path)?;

        if config.api_key.is_none() {
            config.api_key = std::env::var("FEWSHOT_API_KEY").ok();
        }

        for (provider, var) in [("openai", "OPENAI_API_KEY"), ("cohere", "COHERE_API_KEY")] {
            if let Ok(key) = std::env::var(var) {
                let entry = config.providers.entry(provider.to_string()).or_default();
                if entry.api_key.is_none() {
                    entry.api_key = Some(key);
                }
            }
        }

        if let Ok(model) = std::env::var("FEWSHOT_MODEL") {
            config.model_name_or_path = model;
        }

        if let Some(preset) = config.prompt.preset.clone() {
            config.apply_preset(&preset)?;
        }

        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay a JSON prompt preset onto the prompt settings.
    ///
    /// Both the short field names (`prefix`, `suffix`, ...) and the long
    /// command-line style names (`prompt_prefix`, `example_separator`, ...)
    /// are accepted. Each override is logged.
    pub fn apply_preset(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let values: serde_json::Map<String, serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| ConfigError::ParseError {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        for (key, value) in &values {
            let applied = match key.as_str() {
                "prefix" | "prompt_prefix" => {
                    self.prompt.prefix = preset_string(key, value)?;
                    true
                }
                "suffix" | "prompt_suffix" => {
                    self.prompt.suffix = preset_string(key, value)?;
                    true
                }
                "template" | "prompt_template" => {
                    self.prompt.template = preset_string(key, value)?;
                    true
                }
                "separator" | "example_separator" => {
                    self.prompt.separator = preset_string(key, value)?;
                    true
                }
                "format" | "prompt_format" => {
                    self.prompt.format = preset_string(key, value)?
                        .parse()
                        .map_err(|e: fewshot_core::PromptError| {
                            ConfigError::ValidationError(e.to_string())
                        })?;
                    true
                }
                "few_shot_n" => {
                    self.prompt.few_shot_n = preset_usize(key, value)?;
                    true
                }
                "n_refs" => {
                    self.prompt.n_refs = preset_usize(key, value)?;
                    true
                }
                "source_field" => {
                    self.data.source_field = preset_string(key, value)?;
                    true
                }
                "target_field" => {
                    self.data.target_field = preset_string(key, value)?;
                    true
                }
                _ => false,
            };

            if applied {
                tracing::info!("Overriding default value for {key} from {}", path.display());
            } else {
                tracing::warn!("Ignoring unknown key '{key}' in prompt preset {}", path.display());
            }
        }

        self.prompt.preset = Some(path.to_path_buf());
        self.validate()
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::ValidationError("batch_size must be at least 1".into()));
        }

        if self.prompt.n_refs == 0 {
            return Err(ConfigError::ValidationError("n_refs must be at least 1".into()));
        }

        if self.generation.num_return_sequences == 0 {
            return Err(ConfigError::ValidationError(
                "num_return_sequences must be at least 1".into(),
            ));
        }

        if self.generation.temperature < 0.0 || self.generation.temperature > 2.0 {
            return Err(ConfigError::ValidationError(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if self.generation.top_p <= 0.0 || self.generation.top_p > 1.0 {
            return Err(ConfigError::ValidationError(
                "top_p must be in (0.0, 1.0]".into(),
            ));
        }

        let suffix = PromptTemplate::new(self.prompt.suffix.as_str(), &["input"])
            .map_err(|e| ConfigError::ValidationError(format!("prompt suffix: {e}")))?;
        let placeholders = suffix.occurrences("input");
        if placeholders != 1 {
            return Err(ConfigError::ValidationError(format!(
                "prompt suffix must contain exactly one {{input}} placeholder, found {placeholders}"
            )));
        }

        Ok(())
    }

    /// API key for a named provider: provider section first, then the global key.
    pub fn api_key_for(&self, provider: &str) -> Option<String> {
        self.providers
            .get(provider)
            .and_then(|p| p.api_key.clone())
            .or_else(|| self.api_key.clone())
    }

    /// Custom base URL for a named provider, if configured.
    pub fn api_url_for(&self, provider: &str) -> Option<String> {
        self.providers.get(provider).and_then(|p| p.api_url.clone())
    }

    /// Resolve where predictions are written.
    ///
    /// An explicit `output_file` wins; otherwise a descriptive name is
    /// derived under `output_dir`; with neither, predictions go to stdout.
    pub fn output_target(&self) -> OutputTarget {
        if let Some(file) = &self.output.output_file {
            return OutputTarget::File(file.clone());
        }
        match &self.output.output_dir {
            Some(dir) => OutputTarget::File(dir.join(self.derived_output_name())),
            None => OutputTarget::Stdout,
        }
    }

    /// `<model>/<input>_<preset>_fs<n>_nr<n>_s<seed>.jsonl`
    fn derived_output_name(&self) -> PathBuf {
        let model = self
            .model_name_or_path
            .trim_end_matches('/')
            .rsplit(['/', '\\'])
            .next()
            .unwrap_or("model")
            .to_string();
        let input = file_stem_or(self.data.input_file.as_deref(), "input");
        let preset = file_stem_or(self.prompt.preset.as_deref(), "custom");

        PathBuf::from(model).join(format!(
            "{input}_{preset}_fs{}_nr{}_s{}.jsonl",
            self.prompt.few_shot_n, self.prompt.n_refs, self.seed
        ))
    }

    /// A copy with every API key removed, safe to persist next to predictions.
    pub fn without_secrets(&self) -> Self {
        let mut config = self.clone();
        config.api_key = None;
        for provider in config.providers.values_mut() {
            provider.api_key = None;
        }
        config
    }

    /// Generate a default config TOML string (for the `config` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model_name_or_path: default_model(),
            seed: default_seed(),
            batch_size: default_batch_size(),
            generation: GenerationParams::default(),
            data: DataConfig::default(),
            prompt: PromptConfig::default(),
            output: OutputConfig::default(),
            providers: HashMap::new(),
        }
    }
}

fn file_stem_or(path: Option<&Path>, fallback: &str) -> String {
    path.and_then(|p| p.file_stem())
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| fallback.to_string())
}

fn preset_string(key: &str, value: &serde_json::Value) -> Result<String, ConfigError> {
    value
        .as_str()
        .map(String::from)
        .ok_or_else(|| ConfigError::ValidationError(format!("preset key '{key}' must be a string")))
}

fn preset_usize(key: &str, value: &serde_json::Value) -> Result<usize, ConfigError> {
    value
        .as_u64()
        .map(|n| n as usize)
        .ok_or_else(|| {
            ConfigError::ValidationError(format!("preset key '{key}' must be a non-negative integer"))
        })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = InferenceConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.prompt.format, PromptLayout::PrefixInitial);
        assert_eq!(config.data.source_field, "complex");
        assert_eq!(config.seed, 42);
    }

    #[test]
    fn config_roundtrip_toml() {
        let config = InferenceConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: InferenceConfig = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.prompt.suffix, config.prompt.suffix);
        assert_eq!(parsed.prompt.separator, "\n\n");
        assert_eq!(parsed.batch_size, config.batch_size);
    }

    #[test]
    fn parses_sectioned_toml() {
        let toml_str = r#"
model_name_or_path = "openai-text-davinci-003"
seed = 489
batch_size = 8

[generation]
max_new_tokens = 64
top_k = 50

[prompt]
format = "prefix_every"
few_shot_n = 5
n_refs = 2
selector = "ngram"

[data]
examples = "asset.valid.jsonl"
"#;
        let config: InferenceConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.seed, 489);
        assert_eq!(config.generation.max_new_tokens, 64);
        assert_eq!(config.generation.top_k, 50);
        assert_eq!(config.prompt.format, PromptLayout::PrefixEvery);
        assert_eq!(config.prompt.selector, SelectorKind::Ngram);
        assert_eq!(config.data.examples, Some(PathBuf::from("asset.valid.jsonl")));
        assert_eq!(config.data.target_field, "simple");
    }

    #[test]
    fn unknown_layout_fails_to_parse() {
        let toml_str = "[prompt]\nformat = \"prefix_sometimes\"\n";
        assert!(toml::from_str::<InferenceConfig>(toml_str).is_err());
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = InferenceConfig::default();
        config.generation.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_refs_rejected() {
        let mut config = InferenceConfig::default();
        config.prompt.n_refs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn suffix_without_placeholder_rejected() {
        let mut config = InferenceConfig::default();
        config.prompt.suffix = "Simple:".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("found 0"));
    }

    #[test]
    fn suffix_placeholders_counted_like_the_template() {
        let mut config = InferenceConfig::default();
        config.prompt.suffix = "{{input}} Complex: {input}\nSimple:".into();
        assert!(config.validate().is_ok());

        config.prompt.suffix = "{input} / {input}".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("found 2"));

        config.prompt.suffix = "Complex: {source}\nSimple:".into();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("undeclared slot"));
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let result = InferenceConfig::load_from(Path::new("/nonexistent/fewshot.toml"));
        let config = result.unwrap();
        assert_eq!(config.model_name_or_path, "tinyllama");
    }

    #[test]
    fn preset_overrides_prompt_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p0.json");
        let mut file = std::fs::File::create(&path).unwrap();
        write!(
            file,
            r#"{{"prompt_prefix": "Rewrite simply.", "prompt_suffix": "Original: {{input}}\nSimple:", "prompt_format": "prefix_every", "example_separator": "\n\n\n", "unused": 1}}"#
        )
        .unwrap();

        let mut config = InferenceConfig::default();
        config.apply_preset(&path).unwrap();
        assert_eq!(config.prompt.prefix, "Rewrite simply.");
        assert_eq!(config.prompt.suffix, "Original: {input}\nSimple:");
        assert_eq!(config.prompt.format, PromptLayout::PrefixEvery);
        assert_eq!(config.prompt.separator, "\n\n\n");
        assert_eq!(config.prompt.preset.as_deref(), Some(path.as_path()));
    }

    #[test]
    fn preset_with_bad_layout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"prompt_format": "suffix_only"}"#).unwrap();

        let mut config = InferenceConfig::default();
        assert!(config.apply_preset(&path).is_err());
    }

    #[test]
    fn output_target_resolution() {
        let mut config = InferenceConfig::default();
        assert_eq!(config.output_target(), OutputTarget::Stdout);

        config.model_name_or_path = "bigscience/bloom-560m".into();
        config.data.input_file = Some(PathBuf::from("data/asset.test.jsonl"));
        config.prompt.preset = Some(PathBuf::from("prompts/p0.json"));
        config.output.output_dir = Some(PathBuf::from("out"));
        assert_eq!(
            config.output_target(),
            OutputTarget::File(PathBuf::from("out/bloom-560m/asset.test_p0_fs3_nr1_s42.jsonl"))
        );

        config.output.output_file = Some(PathBuf::from("preds.jsonl"));
        let target = config.output_target();
        assert_eq!(target, OutputTarget::File(PathBuf::from("preds.jsonl")));
        assert_eq!(target.metadata_path(), Some(PathBuf::from("preds.jsonl.meta.json")));
    }

    #[test]
    fn metadata_never_overwrites_json_predictions() {
        let target = OutputTarget::File(PathBuf::from("out").join("preds.json"));
        let meta = target.metadata_path().unwrap();
        assert_ne!(meta, PathBuf::from("out").join("preds.json"));
        assert_eq!(meta, PathBuf::from("out").join("preds.json.meta.json"));
        assert_eq!(OutputTarget::Stdout.metadata_path(), None);
    }

    #[test]
    fn provider_key_falls_back_to_global() {
        let mut config = InferenceConfig {
            api_key: Some("global".into()),
            ..InferenceConfig::default()
        };
        assert_eq!(config.api_key_for("cohere").as_deref(), Some("global"));

        config.providers.insert(
            "cohere".into(),
            ProviderConfig {
                api_key: Some("co-key".into()),
                api_url: None,
            },
        );
        assert_eq!(config.api_key_for("cohere").as_deref(), Some("co-key"));
    }

    #[test]
    fn debug_output_redacts_keys() {
        let config = InferenceConfig {
            api_key: Some("sk-secret".into()),
            ..InferenceConfig::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn without_secrets_drops_every_key() {
        let mut config = InferenceConfig {
            api_key: Some("sk-secret".into()),
            ..InferenceConfig::default()
        };
        config.providers.insert(
            "cohere".into(),
            ProviderConfig {
                api_key: Some("co-secret".into()),
                api_url: Some("https://example.invalid".into()),
            },
        );
        let clean = config.without_secrets();
        let json = serde_json::to_string(&clean).unwrap();
        assert!(!json.contains("secret"));
        assert!(json.contains("example.invalid"));
    }
}
