//! Exemplar selection strategies.
//!
//! Every strategy owns its exemplar pool and flattens the exemplars it picks
//! through [`flatten`], so multi-reference targets are treated the same way
//! regardless of how the exemplars were chosen. Randomness is always passed
//! in by the caller; selectors never create their own generator.

pub mod length;
pub mod ngram;
pub mod random;

pub use length::LengthExampleSelector;
pub use ngram::NgramOverlapExampleSelector;
pub use random::RandomExampleSelector;

use crate::prompt::ExampleTemplate;
use fewshot_core::{Exemplar, FlattenedExemplar, PromptError, ReferenceShortage, SelectorKind, Target};
use rand::RngCore;
use tracing::warn;

/// A strategy for choosing the demonstrations shown before each input.
pub trait ExampleSelector: Send + Sync {
    /// Strategy name, used in logs.
    fn name(&self) -> &str;

    /// Append an exemplar to the pool.
    fn add_example(&mut self, exemplar: Exemplar);

    /// Choose and flatten exemplars for one input.
    fn select(
        &self,
        input: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<FlattenedExemplar>, PromptError>;
}

/// Knobs shared by all selector strategies.
#[derive(Debug, Clone)]
pub struct SelectorOptions {
    /// Exemplars per prompt.
    pub few_shot_n: usize,
    /// References sampled per multi-reference target.
    pub n_refs: usize,
    /// Word budget for [`LengthExampleSelector`].
    pub max_length: usize,
    /// Minimum overlap score for [`NgramOverlapExampleSelector`]; negative keeps everything.
    pub ngram_threshold: f32,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self {
            few_shot_n: 3,
            n_refs: 1,
            max_length: 2048,
            ngram_threshold: 0.0,
        }
    }
}

/// Build the selector named by `kind` over `pool`.
pub fn build_selector(
    kind: SelectorKind,
    pool: Vec<Exemplar>,
    options: &SelectorOptions,
    template: &ExampleTemplate,
) -> Result<Box<dyn ExampleSelector>, PromptError> {
    let selector: Box<dyn ExampleSelector> = match kind {
        SelectorKind::Random => Box::new(RandomExampleSelector::new(
            pool,
            options.few_shot_n,
            options.n_refs,
        )?),
        SelectorKind::Length => Box::new(LengthExampleSelector::new(
            pool,
            template.clone(),
            options.few_shot_n,
            options.n_refs,
            options.max_length,
        )?),
        SelectorKind::Ngram => Box::new(NgramOverlapExampleSelector::new(
            pool,
            options.few_shot_n,
            options.n_refs,
            options.ngram_threshold,
        )?),
    };
    Ok(selector)
}

/// Pick `count` distinct exemplars uniformly at random, without replacement.
pub fn sample_pool<'a>(
    pool: &'a [Exemplar],
    count: usize,
    rng: &mut dyn RngCore,
) -> Result<Vec<&'a Exemplar>, PromptError> {
    if count > pool.len() {
        return Err(PromptError::SampleTooLarge {
            requested: count,
            available: pool.len(),
        });
    }
    Ok(rand::seq::index::sample(rng, pool.len(), count)
        .into_iter()
        .map(|i| &pool[i])
        .collect())
}

/// Reduce an exemplar to a single source/target pair.
///
/// Multi-reference targets contribute `min(n_refs, len)` randomly chosen
/// references. With `n_refs > 1` each is written as `"<i>: <ref>"` and the
/// references are joined by a single space. A shortage is logged and also
/// returned.
pub fn flatten(
    exemplar: &Exemplar,
    n_refs: usize,
    rng: &mut dyn RngCore,
) -> (FlattenedExemplar, Option<ReferenceShortage>) {
    match &exemplar.target {
        Target::Single(target) => {
            let shortage = (n_refs > 1).then(|| {
                warn!(
                    requested = n_refs,
                    available = 1,
                    "Exemplar has a single reference, fewer than requested"
                );
                ReferenceShortage {
                    requested: n_refs,
                    available: 1,
                }
            });
            (
                FlattenedExemplar::new(exemplar.source.clone(), target.clone()),
                shortage,
            )
        }
        Target::Multi(references) => {
            let available = references.len();
            let take = n_refs.min(available);
            let shortage = (available < n_refs).then(|| {
                warn!(
                    requested = n_refs,
                    available,
                    "Exemplar has fewer references than requested"
                );
                ReferenceShortage {
                    requested: n_refs,
                    available,
                }
            });

            let picked = rand::seq::index::sample(rng, available, take);
            let target = if n_refs > 1 {
                picked
                    .iter()
                    .enumerate()
                    .map(|(i, idx)| format!("{i}: {}", references[idx]))
                    .collect::<Vec<_>>()
                    .join(" ")
            } else {
                picked
                    .iter()
                    .next()
                    .map(|idx| references[idx].clone())
                    .unwrap_or_default()
            };

            (
                FlattenedExemplar::new(exemplar.source.clone(), target),
                shortage,
            )
        }
    }
}

/// Flatten a selection in order, discarding the shortage signals.
pub(crate) fn flatten_all<'a>(
    chosen: impl IntoIterator<Item = &'a Exemplar>,
    n_refs: usize,
    rng: &mut dyn RngCore,
) -> Vec<FlattenedExemplar> {
    chosen
        .into_iter()
        .map(|exemplar| flatten(exemplar, n_refs, rng).0)
        .collect()
}

pub(crate) fn check_n_refs(n_refs: usize) -> Result<(), PromptError> {
    if n_refs == 0 {
        return Err(PromptError::InvalidArgument(
            "n_refs must be at least 1".into(),
        ));
    }
    Ok(())
}


#[cfg(test)]
mod tests {
    use super::test_support::{multi_ref, pool};
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::collections::HashSet;

    #[test]
    fn sample_returns_distinct_pool_members() {
        let pool = pool(10);
        let mut rng = StdRng::seed_from_u64(7);
        for k in 0..=10 {
            let picked = sample_pool(&pool, k, &mut rng).unwrap();
            assert_eq!(picked.len(), k);
            let unique: HashSet<_> = picked.iter().map(|e| e.source.as_str()).collect();
            assert_eq!(unique.len(), k);
            assert!(picked.iter().all(|e| pool.contains(e)));
        }
    }

    #[test]
    fn sample_larger_than_pool_fails() {
        let pool = pool(2);
        let mut rng = StdRng::seed_from_u64(0);
        let err = sample_pool(&pool, 3, &mut rng).unwrap_err();
        assert_eq!(
            err,
            PromptError::SampleTooLarge {
                requested: 3,
                available: 2
            }
        );
    }

    #[test]
    fn single_reference_with_one_ref_is_identity() {
        let ex = Exemplar::new("A long sentence.", "Short.");
        let mut rng = StdRng::seed_from_u64(1);
        let (flat, shortage) = flatten(&ex, 1, &mut rng);
        assert_eq!(flat, FlattenedExemplar::new("A long sentence.", "Short."));
        assert!(shortage.is_none());
    }

    #[test]
    fn single_reference_with_many_refs_warns() {
        let ex = Exemplar::new("src", "only");
        let mut rng = StdRng::seed_from_u64(1);
        let (flat, shortage) = flatten(&ex, 3, &mut rng);
        assert_eq!(flat.target, "only");
        assert_eq!(
            shortage,
            Some(ReferenceShortage {
                requested: 3,
                available: 1
            })
        );
    }

    #[test]
    fn ten_references_three_requested() {
        let ex = multi_ref(10);
        let mut rng = StdRng::seed_from_u64(3);
        let (flat, shortage) = flatten(&ex, 3, &mut rng);
        assert!(shortage.is_none());

        let segments: Vec<&str> = flat.target.split(' ').collect();
        assert_eq!(segments.len(), 6, "three 'i:' markers plus three refs");
        let markers: Vec<&str> = segments.iter().step_by(2).copied().collect();
        assert_eq!(markers, vec!["0:", "1:", "2:"]);

        let refs: HashSet<&str> = segments.iter().skip(1).step_by(2).copied().collect();
        assert_eq!(refs.len(), 3);
        assert!(refs.iter().all(|r| r.starts_with("ref")));
    }

    #[test]
    fn shortage_clamps_to_available() {
        let ex = multi_ref(2);
        let mut rng = StdRng::seed_from_u64(3);
        let (flat, shortage) = flatten(&ex, 5, &mut rng);
        assert_eq!(
            shortage,
            Some(ReferenceShortage {
                requested: 5,
                available: 2
            })
        );
        assert!(flat.target.starts_with("0: "));
        assert!(flat.target.contains(" 1: "));
        assert!(!flat.target.contains("2: "));
    }

    #[test]
    fn one_reference_from_list_has_no_index() {
        let ex = multi_ref(4);
        let mut rng = StdRng::seed_from_u64(9);
        let (flat, _) = flatten(&ex, 1, &mut rng);
        assert!(flat.target.starts_with("ref"));
        assert!(!flat.target.contains(':'));
    }

    #[test]
    fn flatten_is_reproducible_for_a_seed() {
        let ex = multi_ref(10);
        let a = flatten(&ex, 3, &mut StdRng::seed_from_u64(11)).0;
        let b = flatten(&ex, 3, &mut StdRng::seed_from_u64(11)).0;
        assert_eq!(a, b);
    }

    #[test]
    fn build_selector_dispatches_on_kind() {
        let template = ExampleTemplate::default();
        let options = SelectorOptions::default();
        for (kind, name) in [
            (SelectorKind::Random, "random"),
            (SelectorKind::Length, "length"),
            (SelectorKind::Ngram, "ngram"),
        ] {
            let selector = build_selector(kind, pool(5), &options, &template).unwrap();
            assert_eq!(selector.name(), name);
        }
    }

    #[test]
    fn zero_refs_rejected() {
        let options = SelectorOptions {
            n_refs: 0,
            ..Default::default()
        };
        let result = build_selector(
            SelectorKind::Random,
            pool(3),
            &options,
            &ExampleTemplate::default(),
        );
        assert!(result.is_err());
    }
}
