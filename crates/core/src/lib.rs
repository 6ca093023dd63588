//! # fewshot Core
//!
//! Domain types, traits, and error definitions for few-shot prompted
//! inference. This crate has no runtime dependencies beyond serde and
//! thiserror; it defines the domain model that the other crates implement
//! against.
//!
//! - [`exemplar`]: labeled source/target pairs and their flattened form
//! - [`prompt`]: layout and selector enums
//! - [`provider`]: the text-generation backend abstraction
//! - [`template`]: named-slot format strings and the exemplar template
//! - [`error`]: per-context error enums

pub mod error;
pub mod exemplar;
pub mod prompt;
pub mod provider;
pub mod template;

// Re-export key types at crate root for ergonomics
pub use error::{DatasetError, Error, PromptError, ProviderError, Result};
pub use exemplar::{Exemplar, FlattenedExemplar, ReferenceShortage, Target};
pub use prompt::{PromptLayout, SelectorKind};
pub use provider::{GenerationParams, GenerationRequest, GenerationResponse, Provider, Usage};
pub use template::{ExampleTemplate, PromptTemplate};
