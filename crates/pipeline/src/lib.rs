//! The few-shot inference pipeline.
//!
//! Each input goes through four stages:
//!
//! 1. **Select** exemplars from the pool (random, length-bounded or n-gram ranked)
//! 2. **Assemble** the prompt: prefix, rendered exemplars, suffix with the input
//! 3. **Generate** continuations through a [`Provider`](fewshot_core::Provider)
//! 4. **Postprocess** each continuation into a single cleaned hypothesis
//!
//! Selection and assembly are synchronous and draw randomness from one
//! seeded generator owned by the [`InferenceRunner`], so a run is
//! reproducible from its seed.

pub mod dataset;
pub mod prompt;
pub mod runner;
pub mod selector;

pub use dataset::{
    InputRecord, PredictionRecord, RunMetadata, batches, load_exemplars, read_inputs,
};
pub use prompt::{
    DEFAULT_LABELS, ExampleTemplate, ExemplarSource, Postprocessor, PromptAssembler,
    PromptAssemblerBuilder, PromptTemplate, postprocess,
};
pub use runner::{InferenceRunner, RunSummary, build_assembler};
pub use selector::{
    ExampleSelector, LengthExampleSelector, NgramOverlapExampleSelector, RandomExampleSelector,
    SelectorOptions, build_selector, flatten, sample_pool,
};
