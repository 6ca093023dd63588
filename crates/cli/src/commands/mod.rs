pub mod config_cmd;
pub mod infer;
pub mod preview;

use clap::Args;
use fewshot_config::InferenceConfig;
use fewshot_core::{PromptLayout, SelectorKind};
use fewshot_pipeline::InputRecord;
use std::path::PathBuf;

/// Options shared by every command that builds prompts.
#[derive(Args, Debug, Default)]
pub struct PromptArgs {
    /// Config file (defaults to ./fewshot.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// JSON prompt preset overriding the prompt settings
    #[arg(short, long)]
    pub preset: Option<PathBuf>,

    /// JSONL exemplar pool
    #[arg(short, long)]
    pub examples: Option<PathBuf>,

    /// Inputs: JSONL records or one sentence per line
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    #[arg(long)]
    pub seed: Option<u64>,

    /// Exemplars per prompt
    #[arg(long)]
    pub few_shot_n: Option<usize>,

    /// References per exemplar
    #[arg(long)]
    pub n_refs: Option<usize>,

    /// prefix_initial or prefix_every
    #[arg(long)]
    pub prompt_format: Option<PromptLayout>,

    /// random, length or ngram
    #[arg(long)]
    pub selector: Option<SelectorKind>,
}

impl PromptArgs {
    /// Load the config file and apply command-line overrides on top.
    pub fn load_config(&self) -> Result<InferenceConfig, Box<dyn std::error::Error>> {
        let mut config = InferenceConfig::load(self.config.as_deref())
            .map_err(|e| format!("Failed to load config: {e}"))?;
        self.apply(&mut config)?;
        config.validate()?;
        Ok(config)
    }

    fn apply(&self, config: &mut InferenceConfig) -> Result<(), Box<dyn std::error::Error>> {
        if let Some(preset) = &self.preset {
            config.apply_preset(preset)?;
        }
        if let Some(examples) = &self.examples {
            config.data.examples = Some(examples.clone());
        }
        if let Some(input) = &self.input {
            config.data.input_file = Some(input.clone());
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(n) = self.few_shot_n {
            config.prompt.few_shot_n = n;
        }
        if let Some(n) = self.n_refs {
            config.prompt.n_refs = n;
        }
        if let Some(format) = self.prompt_format {
            config.prompt.format = format;
        }
        if let Some(selector) = self.selector {
            config.prompt.selector = selector;
        }
        Ok(())
    }
}

/// Read the configured input file.
pub fn load_inputs(
    config: &InferenceConfig,
) -> Result<Vec<InputRecord>, Box<dyn std::error::Error>> {
    let path = config
        .data
        .input_file
        .as_deref()
        .ok_or("No input file: pass --input or set data.input_file")?;
    Ok(fewshot_pipeline::read_inputs(
        path,
        &config.data.source_field,
        &config.data.target_field,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overrides_replace_config_values() {
        let args = PromptArgs {
            seed: Some(7),
            few_shot_n: Some(5),
            prompt_format: Some(PromptLayout::PrefixEvery),
            selector: Some(SelectorKind::Ngram),
            input: Some(PathBuf::from("in.txt")),
            ..PromptArgs::default()
        };
        let mut config = InferenceConfig::default();
        args.apply(&mut config).unwrap();

        assert_eq!(config.seed, 7);
        assert_eq!(config.prompt.few_shot_n, 5);
        assert_eq!(config.prompt.format, PromptLayout::PrefixEvery);
        assert_eq!(config.prompt.selector, SelectorKind::Ngram);
        assert_eq!(config.data.input_file, Some(PathBuf::from("in.txt")));
        assert_eq!(config.prompt.n_refs, 1);
    }

    #[test]
    fn missing_input_file_is_reported() {
        let err = load_inputs(&InferenceConfig::default()).unwrap_err();
        assert!(err.to_string().contains("--input"));
    }
}
