//! Pool-order selection under a word budget.

use super::{ExampleSelector, check_n_refs, flatten_all};
use crate::prompt::ExampleTemplate;
use fewshot_core::{Exemplar, FlattenedExemplar, PromptError};
use rand::RngCore;

/// Takes exemplars in pool order while the rendered exemplars plus the input
/// fit within `max_length` words, up to `few_shot_n` exemplars.
///
/// Word counts are taken from each exemplar rendered with its first
/// reference, so the budget does not depend on reference sampling.
#[derive(Debug, Clone)]
pub struct LengthExampleSelector {
    examples: Vec<Exemplar>,
    lengths: Vec<usize>,
    template: ExampleTemplate,
    few_shot_n: usize,
    n_refs: usize,
    max_length: usize,
}

impl LengthExampleSelector {
    pub fn new(
        examples: Vec<Exemplar>,
        template: ExampleTemplate,
        few_shot_n: usize,
        n_refs: usize,
        max_length: usize,
    ) -> Result<Self, PromptError> {
        check_n_refs(n_refs)?;
        let lengths = examples
            .iter()
            .map(|ex| rendered_words(&template, ex))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            examples,
            lengths,
            template,
            few_shot_n,
            n_refs,
            max_length,
        })
    }
}

fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

fn rendered_words(template: &ExampleTemplate, exemplar: &Exemplar) -> Result<usize, PromptError> {
    let target = match &exemplar.target {
        fewshot_core::Target::Single(t) => t.clone(),
        fewshot_core::Target::Multi(refs) => refs.first().cloned().unwrap_or_default(),
    };
    let text = template.render(&FlattenedExemplar::new(exemplar.source.clone(), target))?;
    Ok(word_count(&text))
}

impl ExampleSelector for LengthExampleSelector {
    fn name(&self) -> &str {
        "length"
    }

    fn add_example(&mut self, exemplar: Exemplar) {
        // A template that rendered the existing pool renders any exemplar.
        let words = rendered_words(&self.template, &exemplar).unwrap_or(0);
        self.examples.push(exemplar);
        self.lengths.push(words);
    }

    fn select(
        &self,
        input: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<FlattenedExemplar>, PromptError> {
        let mut remaining = self.max_length.saturating_sub(word_count(input));
        let mut chosen = Vec::new();

        for (exemplar, &words) in self.examples.iter().zip(&self.lengths) {
            if chosen.len() == self.few_shot_n || words > remaining {
                break;
            }
            remaining -= words;
            chosen.push(exemplar);
        }

        Ok(flatten_all(chosen, self.n_refs, rng))
    }
}
