//! Reading exemplar pools and inputs, and the prediction record format.

use chrono::{DateTime, Utc};
use fewshot_config::InferenceConfig;
use fewshot_core::{DatasetError, Exemplar, Target};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::Path;
use tracing::debug;

/// One input to simplify, with optional gold references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputRecord {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Target>,
}

impl InputRecord {
    pub fn new(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            references: None,
        }
    }
}

/// One line of the predictions file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredictionRecord {
    /// Cleaned hypotheses, one per returned sequence.
    pub model_output: Vec<String>,
    pub prompt: String,
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub references: Option<Target>,
}

impl PredictionRecord {
    /// Write the record as a single JSON line.
    pub fn write_jsonl<W: Write>(&self, writer: &mut W) -> fewshot_core::Result<()> {
        serde_json::to_writer(&mut *writer, self)?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Run description persisted next to the predictions file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub started_at: DateTime<Utc>,
    pub provider: String,
    pub model: String,
    /// Resolved configuration with API keys removed.
    pub config: InferenceConfig,
}

impl RunMetadata {
    pub fn new(
        config: &InferenceConfig,
        provider: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            started_at: Utc::now(),
            provider: provider.into(),
            model: model.into(),
            config: config.without_secrets(),
        }
    }

    /// Write as pretty JSON, creating parent directories.
    pub fn write(&self, path: &Path) -> fewshot_core::Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(path = %path.display(), "Wrote run metadata");
        Ok(())
    }
}

fn read_to_string(path: &Path) -> Result<String, DatasetError> {
    std::fs::read_to_string(path).map_err(|e| DatasetError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Parse non-blank JSONL lines into values, numbering lines from 1.
fn json_lines(content: &str) -> impl Iterator<Item = Result<(usize, serde_json::Value), DatasetError>> + '_ {
    content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            serde_json::from_str(line)
                .map(|value| (i + 1, value))
                .map_err(|e| DatasetError::Parse {
                    line: i + 1,
                    reason: e.to_string(),
                })
        })
}

/// Load an exemplar pool from a JSONL file.
///
/// Each record must carry `source_field` as a string and `target_field` as a
/// string or a list of strings.
pub fn load_exemplars(
    path: &Path,
    source_field: &str,
    target_field: &str,
) -> Result<Vec<Exemplar>, DatasetError> {
    let content = read_to_string(path)?;
    let exemplars = json_lines(&content)
        .map(|record| {
            let (line, value) = record?;
            Exemplar::from_record(&value, source_field, target_field, line)
        })
        .collect::<Result<Vec<_>, _>>()?;

    if exemplars.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), count = exemplars.len(), "Loaded exemplar pool");
    Ok(exemplars)
}

/// Read the inputs to run inference on.
///
/// `.jsonl` files are read as records with `source_field` and an optional
/// `target_field` holding references; any other file is one input per
/// non-blank line.
pub fn read_inputs(
    path: &Path,
    source_field: &str,
    target_field: &str,
) -> Result<Vec<InputRecord>, DatasetError> {
    let content = read_to_string(path)?;
    let is_jsonl = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("jsonl"));

    let inputs = if is_jsonl {
        json_lines(&content)
            .map(|record| -> Result<InputRecord, DatasetError> {
                let (line, value) = record?;
                let source = value
                    .get(source_field)
                    .and_then(|v| v.as_str())
                    .ok_or_else(|| DatasetError::MissingField {
                        line,
                        field: source_field.to_string(),
                    })?;
                let references = value
                    .get(target_field)
                    .and_then(|v| serde_json::from_value::<Target>(v.clone()).ok());
                Ok(InputRecord {
                    source: source.to_string(),
                    references,
                })
            })
            .collect::<Result<Vec<_>, DatasetError>>()?
    } else {
        content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(InputRecord::new)
            .collect()
    };

    if inputs.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), count = inputs.len(), "Read inputs");
    Ok(inputs)
}

/// Split `items` into ordered batches of at most `batch_size`.
pub fn batches<T>(items: &[T], batch_size: usize) -> std::slice::Chunks<'_, T> {
    items.chunks(batch_size.max(1))
}
