//! Selection ranked by n-gram overlap with the input.

use super::{ExampleSelector, check_n_refs, flatten_all};
use fewshot_core::{Exemplar, FlattenedExemplar, PromptError};
use rand::RngCore;
use std::collections::HashMap;

const MAX_ORDER: usize = 4;

/// Ranks the pool by how many of each exemplar source's n-grams also occur
/// in the input, and returns the best `few_shot_n`.
#[derive(Debug, Clone)]
pub struct NgramOverlapExampleSelector {
    examples: Vec<Exemplar>,
    few_shot_n: usize,
    n_refs: usize,
    threshold: f32,
}

impl NgramOverlapExampleSelector {
    /// Exemplars scoring at or below `threshold` are dropped; a negative
    /// threshold keeps the whole pool. Scores never exceed 1.0, so a
    /// threshold of 1.0 or more is rejected.
    pub fn new(
        examples: Vec<Exemplar>,
        few_shot_n: usize,
        n_refs: usize,
        threshold: f32,
    ) -> Result<Self, PromptError> {
        check_n_refs(n_refs)?;
        if threshold >= 1.0 {
            return Err(PromptError::InvalidArgument(format!(
                "n-gram threshold must be below 1.0, got {threshold}"
            )));
        }
        Ok(Self {
            examples,
            few_shot_n,
            n_refs,
            threshold,
        })
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

fn ngram_counts(tokens: &[String], n: usize) -> HashMap<&[String], usize> {
    let mut counts = HashMap::new();
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Mean clipped n-gram precision of `candidate` against `reference`, for
/// orders 1 up to 4 (or the candidate length if shorter). In `[0, 1]`.
pub fn overlap_score(reference: &str, candidate: &str) -> f32 {
    let reference = tokens(reference);
    let candidate = tokens(candidate);
    let orders = MAX_ORDER.min(candidate.len());
    if orders == 0 || reference.is_empty() {
        return 0.0;
    }

    let mut total = 0.0;
    for n in 1..=orders {
        let cand = ngram_counts(&candidate, n);
        let refs = ngram_counts(&reference, n);
        let matched: usize = cand
            .iter()
            .map(|(gram, count)| (*count).min(refs.get(gram).copied().unwrap_or(0)))
            .sum();
        let possible = candidate.len() + 1 - n;
        total += matched as f32 / possible as f32;
    }
    total / orders as f32
}

impl ExampleSelector for NgramOverlapExampleSelector {
    fn name(&self) -> &str {
        "ngram"
    }

    fn add_example(&mut self, exemplar: Exemplar) {
        self.examples.push(exemplar);
    }

    fn select(
        &self,
        input: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<FlattenedExemplar>, PromptError> {
        let mut scored: Vec<(f32, &Exemplar)> = self
            .examples
            .iter()
            .map(|ex| (overlap_score(input, &ex.source), ex))
            .filter(|(score, _)| self.threshold < 0.0 || *score > self.threshold)
            .collect();

        // Stable sort keeps pool order among equal scores.
        scored.sort_by(|a, b| b.0.total_cmp(&a.0));
        scored.truncate(self.few_shot_n);

        Ok(flatten_all(
            scored.into_iter().map(|(_, ex)| ex),
            self.n_refs,
            rng,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn pool() -> Vec<Exemplar> {
        vec![
            Exemplar::new("The weather today is remarkably pleasant.", "It is nice out."),
            Exemplar::new("The cat sat on the mat quietly.", "The cat sat."),
            Exemplar::new("Quantum chromodynamics describes gluons.", "Physics."),
            Exemplar::new("The cat sat on the mat.", "Cat on mat."),
        ]
    }

    #[test]
    fn identical_text_scores_one() {
        let s = overlap_score("the cat sat on the mat", "the cat sat on the mat");
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn disjoint_text_scores_zero() {
        assert_eq!(overlap_score("alpha beta", "gamma delta"), 0.0);
        assert_eq!(overlap_score("alpha", ""), 0.0);
    }

    #[test]
    fn ranks_by_overlap() {
        let selector = NgramOverlapExampleSelector::new(pool(), 2, 1, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let picked = selector.select("The cat sat on the mat.", &mut rng).unwrap();
        assert_eq!(picked.len(), 2);
        assert_eq!(picked[0].source, "The cat sat on the mat.");
        assert_eq!(picked[1].source, "The cat sat on the mat quietly.");
    }

    #[test]
    fn zero_threshold_drops_unrelated_exemplars() {
        let selector = NgramOverlapExampleSelector::new(pool(), 4, 1, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let picked = selector.select("gluons", &mut rng).unwrap();
        assert_eq!(picked.len(), 1);
        assert_eq!(picked[0].target, "Physics.");
    }

    #[test]
    fn negative_threshold_keeps_pool_order_for_ties() {
        let selector = NgramOverlapExampleSelector::new(pool(), 4, 1, -1.0).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let picked = selector.select("zzz", &mut rng).unwrap();
        let sources: Vec<_> = picked.iter().map(|f| f.source.as_str()).collect();
        let expected: Vec<_> = pool().iter().map(|e| e.source.clone()).collect();
        assert_eq!(sources, expected);
    }

    #[test]
    fn threshold_of_one_or_more_rejected() {
        assert!(NgramOverlapExampleSelector::new(pool(), 2, 1, 1.5).is_err());
        assert!(NgramOverlapExampleSelector::new(pool(), 2, 1, 1.0).is_err());
    }

    #[test]
    fn identical_text_passes_highest_threshold() {
        let pool = vec![Exemplar::new("the cat sat", "A cat sat.")];
        assert!((overlap_score("the cat sat", "the cat sat") - 1.0).abs() < f32::EPSILON);

        let selector = NgramOverlapExampleSelector::new(pool, 1, 1, 0.99).unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let picked = selector.select("the cat sat", &mut rng).unwrap();
        assert_eq!(picked.len(), 1);
    }
}
