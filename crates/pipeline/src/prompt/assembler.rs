//! Few-shot prompt assembly.
//!
//! A prompt is the prefix, the rendered exemplars and the suffix (with the
//! live input substituted), joined by the example separator. Empty pieces
//! are skipped.
//!
//! # Layouts
//!
//! | Layout | Joiner | Result for one exemplar `E` |
//! |--------|--------|-----------------------------|
//! | `prefix_initial` | `sep` | `P sep E sep S` |
//! | `prefix_every` | `sep P sep` | `P sep E sep P sep S` |
//!
//! With `prefix_every` the plain join puts `P sep P` at the very start of
//! the string. That head is collapsed to a single `P`. Only the head is
//! rewritten, so a prefix that happens to repeat elsewhere is left alone.

use super::postprocess::Postprocessor;
use crate::selector::ExampleSelector;
use fewshot_core::{
    ExampleTemplate, Exemplar, FlattenedExemplar, PromptError, PromptLayout, PromptTemplate,
};
use rand::RngCore;
use std::borrow::Cow;
use tracing::debug;

const INPUT_SLOT: &str = "input";

// ── Types ─────────────────────────────────────────────────────────────────

/// Where the exemplars for each prompt come from.
pub enum ExemplarSource {
    /// The same exemplars for every input.
    Fixed(Vec<FlattenedExemplar>),
    /// A fresh selection per input.
    Selector(Box<dyn ExampleSelector>),
}

impl std::fmt::Debug for ExemplarSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Fixed(list) => f.debug_tuple("Fixed").field(&list.len()).finish(),
            Self::Selector(s) => f.debug_tuple("Selector").field(&s.name()).finish(),
        }
    }
}

/// Builds one prompt per input.
#[derive(Debug)]
pub struct PromptAssembler {
    source: ExemplarSource,
    prefix: String,
    suffix: PromptTemplate,
    example_template: ExampleTemplate,
    separator: String,
    layout: PromptLayout,
}

/// Collects assembler settings; [`PromptAssemblerBuilder::build`] validates them.
#[derive(Default)]
pub struct PromptAssemblerBuilder {
    examples: Option<Vec<FlattenedExemplar>>,
    selector: Option<Box<dyn ExampleSelector>>,
    prefix: String,
    suffix: Option<String>,
    example_template: Option<ExampleTemplate>,
    separator: Option<String>,
    layout: PromptLayout,
}

// ── Builder ───────────────────────────────────────────────────────────────

impl PromptAssemblerBuilder {
    pub fn with_examples(mut self, examples: Vec<FlattenedExemplar>) -> Self {
        self.examples = Some(examples);
        self
    }

    /// Takes precedence over [`with_examples`](Self::with_examples).
    pub fn with_selector(mut self, selector: Box<dyn ExampleSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Must contain exactly one `{input}` placeholder.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = Some(suffix.into());
        self
    }

    pub fn with_template(mut self, template: ExampleTemplate) -> Self {
        self.example_template = Some(template);
        self
    }

    pub fn with_separator(mut self, separator: impl Into<String>) -> Self {
        self.separator = Some(separator.into());
        self
    }

    pub fn with_layout(mut self, layout: PromptLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn build(self) -> Result<PromptAssembler, PromptError> {
        let source = match (self.selector, self.examples) {
            (Some(selector), _) => ExemplarSource::Selector(selector),
            (None, Some(examples)) => ExemplarSource::Fixed(examples),
            (None, None) => return Err(PromptError::MissingExemplarSource),
        };

        let suffix = PromptTemplate::new(
            self.suffix.unwrap_or_else(|| "{input}".to_string()),
            &[INPUT_SLOT],
        )?;
        let found = suffix.occurrences(INPUT_SLOT);
        if found != 1 {
            return Err(PromptError::InvalidSuffix { found });
        }

        Ok(PromptAssembler {
            source,
            prefix: self.prefix,
            suffix,
            example_template: self.example_template.unwrap_or_default(),
            separator: self.separator.unwrap_or_else(|| "\n\n".to_string()),
            layout: self.layout,
        })
    }
}

// ── Assembly ──────────────────────────────────────────────────────────────

impl PromptAssembler {
    pub fn builder() -> PromptAssemblerBuilder {
        PromptAssemblerBuilder::default()
    }

    pub fn layout(&self) -> PromptLayout {
        self.layout
    }

    pub fn separator(&self) -> &str {
        &self.separator
    }

    /// A postprocessor that splits on this assembler's separator and strips
    /// the labels of its example template.
    pub fn postprocessor(&self) -> Result<Postprocessor, PromptError> {
        Postprocessor::for_template(&self.separator, &self.example_template)
    }

    /// Append an exemplar to the selector's pool.
    pub fn add_example(&mut self, exemplar: Exemplar) -> Result<(), PromptError> {
        match &mut self.source {
            ExemplarSource::Selector(selector) => {
                selector.add_example(exemplar);
                Ok(())
            }
            ExemplarSource::Fixed(_) => Err(PromptError::InvalidArgument(
                "exemplars can only be added to a selector, not a fixed list".into(),
            )),
        }
    }

    /// Build the prompt for one input.
    pub fn assemble(&self, input: &str, rng: &mut dyn RngCore) -> Result<String, PromptError> {
        let exemplars: Cow<'_, [FlattenedExemplar]> = match &self.source {
            ExemplarSource::Fixed(list) => Cow::Borrowed(list.as_slice()),
            ExemplarSource::Selector(selector) => Cow::Owned(selector.select(input, rng)?),
        };

        let mut pieces = Vec::with_capacity(exemplars.len() + 2);
        pieces.push(self.prefix.clone());
        for exemplar in exemplars.iter() {
            pieces.push(self.example_template.render(exemplar)?);
        }
        pieces.push(self.suffix.render(&[(INPUT_SLOT, input)])?);

        let joiner = match self.layout {
            PromptLayout::PrefixInitial => self.separator.clone(),
            PromptLayout::PrefixEvery => {
                format!("{sep}{prefix}{sep}", sep = self.separator, prefix = self.prefix)
            }
        };

        let joined = pieces
            .iter()
            .filter(|p| !p.is_empty())
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(&joiner);

        let prompt = match self.layout {
            PromptLayout::PrefixEvery => self.collapse_head(joined),
            PromptLayout::PrefixInitial => joined,
        };

        debug!(
            layout = %self.layout,
            exemplars = exemplars.len(),
            chars = prompt.len(),
            "Assembled prompt"
        );

        Ok(prompt.trim().to_string())
    }

    /// Build one prompt per input, in order.
    pub fn assemble_batch<S: AsRef<str>>(
        &self,
        inputs: &[S],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<String>, PromptError> {
        inputs
            .iter()
            .map(|input| self.assemble(input.as_ref(), rng))
            .collect()
    }

    fn collapse_head(&self, prompt: String) -> String {
        if self.prefix.is_empty() {
            return prompt;
        }
        let doubled = format!("{p}{sep}{p}", p = self.prefix, sep = self.separator);
        match prompt.strip_prefix(&doubled) {
            Some(rest) => format!("{}{rest}", self.prefix),
            None => prompt,
        }
    }
}
