//! `fewshot infer`: run few-shot inference over an input file.

use super::{PromptArgs, load_inputs};
use fewshot_config::OutputTarget;
use fewshot_pipeline::{InferenceRunner, RunMetadata};
use fewshot_providers::PricingTable;
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use tracing::info;

pub async fn run(
    args: PromptArgs,
    model: Option<String>,
    output: Option<PathBuf>,
    batch_size: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = args.load_config()?;
    if let Some(model) = model {
        config.model_name_or_path = model;
    }
    if let Some(output) = output {
        config.output.output_file = Some(output);
    }
    if let Some(batch_size) = batch_size {
        config.batch_size = batch_size;
    }
    config.validate()?;

    let inputs = load_inputs(&config)?;
    let (provider, model) = fewshot_providers::build_from_config(&config)?;
    let provider_name = provider.name().to_string();
    let mut runner = InferenceRunner::from_config(&config, provider, model.as_str())?;

    let target = config.output_target();
    let summary = match &target {
        OutputTarget::Stdout => {
            let mut out = std::io::stdout();
            runner.run(&inputs, &mut out).await?
        }
        OutputTarget::File(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            if let Some(meta_path) = target.metadata_path() {
                RunMetadata::new(&config, provider_name.as_str(), model.as_str())
                    .write(&meta_path)?;
            }
            info!(path = %path.display(), inputs = inputs.len(), "Writing predictions");
            let mut out = BufWriter::new(File::create(path)?);
            runner.run(&inputs, &mut out).await?
        }
    };

    if summary.usage.total_tokens > 0 {
        let cost = PricingTable::with_defaults().usage_cost(&model, &summary.usage);
        info!(
            prompt_tokens = summary.usage.prompt_tokens,
            completion_tokens = summary.usage.completion_tokens,
            total_tokens = summary.usage.total_tokens,
            cost_usd = format!("{cost:.6}"),
            "Token usage"
        );
    }

    Ok(())
}
