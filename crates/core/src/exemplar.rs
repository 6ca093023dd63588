//! Exemplar domain types.
//!
//! An exemplar is a labeled source/target pair used as a few-shot
//! demonstration. Multi-reference datasets (e.g. ASSET, ten simplifications
//! per complex sentence) store the target as a list of references.

use crate::error::DatasetError;
use serde::{Deserialize, Serialize};

/// The target side of an exemplar: one reference or several.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    Single(String),
    Multi(Vec<String>),
}

impl Target {
    /// Number of references available.
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Multi(refs) => refs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for Target {
    fn from(s: &str) -> Self {
        Self::Single(s.to_string())
    }
}

impl From<Vec<String>> for Target {
    fn from(refs: Vec<String>) -> Self {
        Self::Multi(refs)
    }
}

/// A labeled exemplar, immutable once loaded into a pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exemplar {
    pub source: String,
    pub target: Target,
}

impl Exemplar {
    pub fn new(source: impl Into<String>, target: impl Into<Target>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }

    /// Build an exemplar from a JSON record using the configured field names.
    ///
    /// `line` is only used for error reporting.
    pub fn from_record(
        record: &serde_json::Value,
        source_field: &str,
        target_field: &str,
        line: usize,
    ) -> Result<Self, DatasetError> {
        let source = record
            .get(source_field)
            .and_then(|v| v.as_str())
            .ok_or_else(|| DatasetError::MissingField {
                line,
                field: source_field.to_string(),
            })?;

        let target_value = record
            .get(target_field)
            .ok_or_else(|| DatasetError::MissingField {
                line,
                field: target_field.to_string(),
            })?;

        let target: Target = serde_json::from_value(target_value.clone()).map_err(|_| {
            DatasetError::MissingField {
                line,
                field: target_field.to_string(),
            }
        })?;

        Ok(Self {
            source: source.to_string(),
            target,
        })
    }
}

/// An exemplar reduced to exactly one source and one target string.
///
/// Created per selection call and discarded after prompt assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlattenedExemplar {
    pub source: String,
    pub target: String,
}

impl FlattenedExemplar {
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
        }
    }
}

/// Fewer references were available than requested while flattening.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceShortage {
    pub requested: usize,
    pub available: usize,
}
