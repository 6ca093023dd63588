//! Error types for the fewshot domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use std::path::PathBuf;
use thiserror::Error;

/// The top-level error type for all fewshot operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Prompt construction errors ---
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Dataset errors ---
    #[error("Dataset error: {0}")]
    Dataset(#[from] DatasetError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- I/O ---
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

/// Errors raised while selecting exemplars or assembling prompts.
///
/// All of these are configuration-class failures: they surface immediately
/// and are never recovered inside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("Expected either a list of examples or an example selector, got neither")]
    MissingExemplarSource,

    #[error("Unknown prompt layout '{0}' (expected 'prefix_initial' or 'prefix_every')")]
    UnknownLayout(String),

    #[error("Cannot sample {requested} examples from a pool of {available}")]
    SampleTooLarge { requested: usize, available: usize },

    #[error("Prompt suffix must contain exactly one {{input}} placeholder, found {found}")]
    InvalidSuffix { found: usize },

    #[error("Invalid prompt template: {0}")]
    Template(String),

    #[error("No value supplied for template slot '{0}'")]
    MissingSlot(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError {
        status_code: u16,
        message: String,
    },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model not found: {0}")]
    ModelNotFound(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("Failed to read {path}: {reason}")]
    Read { path: PathBuf, reason: String },

    #[error("Malformed record on line {line}: {reason}")]
    Parse { line: usize, reason: String },

    #[error("Record on line {line} has no usable '{field}' field")]
    MissingField { line: usize, field: String },

    #[error("No records found in {0}")]
    Empty(PathBuf),
}
