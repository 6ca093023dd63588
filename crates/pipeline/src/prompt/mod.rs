//! Prompt construction and output cleanup.
//!
//! - [`assembler`]: prefix, exemplars and suffix joined under a layout
//! - [`postprocess`]: raw continuation to cleaned hypothesis

pub mod assembler;
pub mod postprocess;

pub use assembler::{ExemplarSource, PromptAssembler, PromptAssemblerBuilder};
pub use fewshot_core::{ExampleTemplate, PromptTemplate};
pub use postprocess::{DEFAULT_LABELS, Postprocessor, postprocess};
