//! Uniform random sampling without replacement.

use super::{ExampleSelector, check_n_refs, flatten_all, sample_pool};
use fewshot_core::{Exemplar, FlattenedExemplar, PromptError};
use rand::RngCore;

/// Draws a fresh sample of `few_shot_n` exemplars on every call.
///
/// Random state is consumed in a fixed order: one pool sample, then one
/// reference sample per multi-reference exemplar, in selection order.
#[derive(Debug, Clone)]
pub struct RandomExampleSelector {
    examples: Vec<Exemplar>,
    few_shot_n: usize,
    n_refs: usize,
}

impl RandomExampleSelector {
    pub fn new(examples: Vec<Exemplar>, few_shot_n: usize, n_refs: usize) -> Result<Self, PromptError> {
        check_n_refs(n_refs)?;
        Ok(Self {
            examples,
            few_shot_n,
            n_refs,
        })
    }

    pub fn pool(&self) -> &[Exemplar] {
        &self.examples
    }
}

impl ExampleSelector for RandomExampleSelector {
    fn name(&self) -> &str {
        "random"
    }

    fn add_example(&mut self, exemplar: Exemplar) {
        self.examples.push(exemplar);
    }

    fn select(
        &self,
        _input: &str,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<FlattenedExemplar>, PromptError> {
        let chosen = sample_pool(&self.examples, self.few_shot_n, rng)?;
        Ok(flatten_all(chosen, self.n_refs, rng))
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::pool;
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn selects_requested_count() {
        let selector = RandomExampleSelector::new(pool(8), 3, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let picked = selector.select("anything", &mut rng).unwrap();
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn too_few_examples_is_an_error() {
        let selector = RandomExampleSelector::new(pool(2), 3, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        assert!(matches!(
            selector.select("x", &mut rng),
            Err(PromptError::SampleTooLarge { .. })
        ));
    }

    #[test]
    fn add_example_grows_pool() {
        let mut selector = RandomExampleSelector::new(pool(2), 3, 1).unwrap();
        selector.add_example(Exemplar::new("c", "s"));
        assert_eq!(selector.pool().len(), 3);

        let mut rng = StdRng::seed_from_u64(0);
        assert_eq!(selector.select("x", &mut rng).unwrap().len(), 3);
    }

    #[test]
    fn same_seed_same_selection() {
        let selector = RandomExampleSelector::new(pool(20), 4, 1).unwrap();
        let a = selector.select("x", &mut StdRng::seed_from_u64(5)).unwrap();
        let b = selector.select("x", &mut StdRng::seed_from_u64(5)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn consecutive_draws_are_independent() {
        let selector = RandomExampleSelector::new(pool(50), 5, 1).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let first = selector.select("x", &mut rng).unwrap();
        let second = selector.select("x", &mut rng).unwrap();
        assert_ne!(first, second);
    }
}
