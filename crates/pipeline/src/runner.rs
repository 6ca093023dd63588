//! Batched inference driver.
//!
//! For each batch: assemble prompts, call the provider once, clean the raw
//! outputs, and write one [`PredictionRecord`] per input. Batches run
//! strictly in order and the run's RNG is consumed in input order, so a
//! fixed seed reproduces the same prompts.

use crate::dataset::{self, InputRecord, PredictionRecord};
use crate::prompt::{ExampleTemplate, Postprocessor, PromptAssembler};
use crate::selector::{SelectorOptions, build_selector};
use fewshot_config::InferenceConfig;
use fewshot_core::{
    Error, GenerationParams, GenerationRequest, PromptError, Provider, Result, Usage,
};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Build the prompt assembler a configuration describes.
///
/// Validates the configuration, loads the exemplar pool from
/// `data.examples` and builds the configured selector over it.
pub fn build_assembler(config: &InferenceConfig) -> Result<PromptAssembler> {
    config.validate().map_err(|e| Error::Config {
        message: e.to_string(),
    })?;

    let examples_path = config
        .data
        .examples
        .as_deref()
        .ok_or(PromptError::MissingExemplarSource)?;
    let pool = dataset::load_exemplars(
        examples_path,
        &config.data.source_field,
        &config.data.target_field,
    )?;

    let template = ExampleTemplate::new(
        config.prompt.template.as_str(),
        config.data.source_field.as_str(),
        config.data.target_field.as_str(),
    )?;
    let options = SelectorOptions {
        few_shot_n: config.prompt.few_shot_n,
        n_refs: config.prompt.n_refs,
        max_length: config.prompt.selector_max_length,
        ngram_threshold: config.prompt.selector_ngram_threshold,
    };
    let selector = build_selector(config.prompt.selector, pool, &options, &template)?;
    info!(
        selector = selector.name(),
        few_shot_n = options.few_shot_n,
        n_refs = options.n_refs,
        layout = %config.prompt.format,
        "Prompt pipeline configured"
    );

    Ok(PromptAssembler::builder()
        .with_selector(selector)
        .with_prefix(config.prompt.prefix.as_str())
        .with_suffix(config.prompt.suffix.as_str())
        .with_template(template)
        .with_separator(config.prompt.separator.as_str())
        .with_layout(config.prompt.format)
        .build()?)
}

/// Totals for a finished run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunSummary {
    pub written: usize,
    pub batches: usize,
    pub elapsed: Duration,
    pub usage: Usage,
}

/// Drives prompt assembly, generation and postprocessing over a dataset.
pub struct InferenceRunner {
    /// Text generation backend
    provider: Arc<dyn Provider>,

    /// Model identifier passed to the provider
    model: String,

    assembler: PromptAssembler,
    postprocessor: Postprocessor,
    params: GenerationParams,

    /// Requested batch size; see [`effective_batch_size`](Self::effective_batch_size)
    batch_size: usize,

    /// Seeded from the run seed, shared by every selection in the run
    rng: StdRng,
}

impl InferenceRunner {
    /// Create a runner with a batch size of 1.
    pub fn new(
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
        assembler: PromptAssembler,
        params: GenerationParams,
        seed: u64,
    ) -> std::result::Result<Self, PromptError> {
        let postprocessor = assembler.postprocessor()?;
        Ok(Self {
            provider,
            model: model.into(),
            assembler,
            postprocessor,
            params,
            batch_size: 1,
            rng: StdRng::seed_from_u64(seed),
        })
    }

    /// Wire a runner from a validated configuration.
    ///
    /// `model` is the identifier the provider expects.
    pub fn from_config(
        config: &InferenceConfig,
        provider: Arc<dyn Provider>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let assembler = build_assembler(config)?;

        let mut params = config.generation.clone();
        params.seed = config.seed;

        Ok(Self::new(provider, model, assembler, params, config.seed)?
            .with_batch_size(config.batch_size))
    }

    /// Set the number of inputs sent to the provider per call.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// The batch size actually used, capped by the provider's limit.
    pub fn effective_batch_size(&self) -> usize {
        match self.provider.max_batch_size() {
            Some(max) if self.batch_size > max => max.max(1),
            _ => self.batch_size,
        }
    }

    /// Assemble the prompts for `inputs` without calling the provider.
    pub fn preview(&mut self, inputs: &[InputRecord]) -> Result<Vec<String>> {
        let sources: Vec<&str> = inputs.iter().map(|i| i.source.as_str()).collect();
        Ok(self.assembler.assemble_batch(sources.as_slice(), &mut self.rng)?)
    }

    /// Run one batch through assembly, generation and postprocessing.
    pub async fn run_batch(
        &mut self,
        batch: &[InputRecord],
    ) -> Result<(Vec<PredictionRecord>, Option<Usage>)> {
        let prompts = self.preview(batch)?;

        let request = GenerationRequest {
            model: self.model.clone(),
            prompts: prompts.clone(),
            params: self.params.clone(),
        };
        debug!(provider = self.provider.name(), prompts = prompts.len(), "Generating");
        let response = self.provider.generate(request).await?;

        let cleaned = self.postprocessor.postprocess(prompts.as_slice(), &response.outputs)?;

        let records = batch
            .iter()
            .zip(prompts)
            .zip(cleaned)
            .map(|((input, prompt), model_output)| PredictionRecord {
                model_output,
                prompt,
                source: input.source.clone(),
                references: input.references.clone(),
            })
            .collect();

        Ok((records, response.usage))
    }

    /// Run every input in order, writing predictions as JSON lines.
    pub async fn run<W: Write>(
        &mut self,
        inputs: &[InputRecord],
        writer: &mut W,
    ) -> Result<RunSummary> {
        let batch_size = self.effective_batch_size();
        if batch_size < self.batch_size {
            warn!(
                provider = self.provider.name(),
                requested = self.batch_size,
                used = batch_size,
                "Provider accepts smaller batches, reducing batch size"
            );
        }

        let started = Instant::now();
        let mut summary = RunSummary::default();
        let total_batches = inputs.len().div_ceil(batch_size);

        for (i, batch) in dataset::batches(inputs, batch_size).enumerate() {
            let (records, usage) = self.run_batch(batch).await?;
            for record in &records {
                record.write_jsonl(writer)?;
            }
            writer.flush()?;

            if let Some(usage) = usage {
                summary.usage.add(&usage);
            }
            summary.written += records.len();
            summary.batches += 1;
            debug!(batch = i + 1, of = total_batches, written = summary.written, "Batch done");
        }

        summary.elapsed = started.elapsed();
        info!(
            written = summary.written,
            batches = summary.batches,
            elapsed_secs = summary.elapsed.as_secs_f64(),
            "Inference complete"
        );
        Ok(summary)
    }
}
