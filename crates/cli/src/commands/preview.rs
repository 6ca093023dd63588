//! `fewshot preview`: print assembled prompts without calling a model.

use super::{PromptArgs, load_inputs};
use rand::SeedableRng;
use rand::rngs::StdRng;

pub async fn run(args: PromptArgs, limit: usize) -> Result<(), Box<dyn std::error::Error>> {
    let config = args.load_config()?;
    let inputs = load_inputs(&config)?;
    let assembler = fewshot_pipeline::build_assembler(&config)?;
    let mut rng = StdRng::seed_from_u64(config.seed);

    let shown = &inputs[..limit.min(inputs.len())];
    for (i, input) in shown.iter().enumerate() {
        let prompt = assembler.assemble(&input.source, &mut rng)?;
        println!("── Prompt {} / {} ──", i + 1, inputs.len());
        println!("{prompt}");
        println!();
    }

    Ok(())
}
