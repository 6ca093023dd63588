//! `fewshot config`: configuration management commands.

use fewshot_config::InferenceConfig;
use std::path::Path;

pub async fn show() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", InferenceConfig::default_toml());
    Ok(())
}

pub async fn validate(path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    println!("🔍 Validating configuration...");

    match InferenceConfig::load(path) {
        Ok(config) => {
            println!("   ✅ Config parsed successfully");

            let mut warnings = Vec::new();
            if config.data.examples.is_none() {
                warnings.push("No exemplar pool set (data.examples)");
            }
            if config.data.input_file.is_none() {
                warnings.push("No input file set (data.input_file)");
            }
            let backend = fewshot_providers::resolve_model(&config.model_name_or_path).backend;
            if backend.is_hosted() && config.api_key_for(backend.provider_key()).is_none() {
                warnings.push("Hosted model selected but no API key is set");
            }

            if warnings.is_empty() {
                println!("   ✅ All checks passed");
            } else {
                println!();
                for w in &warnings {
                    println!("   ⚠️  {w}");
                }
            }

            println!();
            println!("   Model:     {}", config.model_name_or_path);
            println!("   Layout:    {}", config.prompt.format);
            println!("   Selector:  {}", config.prompt.selector);
            println!("   Few-shot:  {}", config.prompt.few_shot_n);
            println!("   Seed:      {}", config.seed);
        }
        Err(e) => {
            println!("   ❌ Config error: {e}");
            return Err(e.into());
        }
    }

    Ok(())
}
