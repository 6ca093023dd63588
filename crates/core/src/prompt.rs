//! Prompt-shape enums shared by configuration and the prompting pipeline.

use crate::error::PromptError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Where the instructional prefix appears in a multi-exemplar prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptLayout {
    /// Prefix once, before the first exemplar.
    #[default]
    PrefixInitial,
    /// Prefix before every exemplar and before the suffix.
    PrefixEvery,
}

impl PromptLayout {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrefixInitial => "prefix_initial",
            Self::PrefixEvery => "prefix_every",
        }
    }
}

impl FromStr for PromptLayout {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "prefix_initial" => Ok(Self::PrefixInitial),
            "prefix_every" => Ok(Self::PrefixEvery),
            other => Err(PromptError::UnknownLayout(other.to_string())),
        }
    }
}

impl fmt::Display for PromptLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exemplar selection strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    /// Uniform sampling without replacement.
    #[default]
    Random,
    /// Pool order, capped by a word budget.
    Length,
    /// Ranked by n-gram overlap with the input.
    Ngram,
}

impl FromStr for SelectorKind {
    type Err = PromptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random" => Ok(Self::Random),
            "length" => Ok(Self::Length),
            "ngram" | "ngram_overlap" => Ok(Self::Ngram),
            other => Err(PromptError::InvalidArgument(format!(
                "unknown example selector '{other}' (expected random, length or ngram)"
            ))),
        }
    }
}

impl fmt::Display for SelectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Random => "random",
            Self::Length => "length",
            Self::Ngram => "ngram",
        })
    }
}
