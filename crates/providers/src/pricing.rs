//! Built-in pricing table for hosted completion models.
//!
//! Prices are in USD per 1 million tokens. Each model has an input and
//! output price.

use fewshot_core::Usage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-million-token pricing for a model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
    /// Create a new pricing entry.
    pub fn new(input_per_m: f64, output_per_m: f64) -> Self {
        Self {
            input_per_m,
            output_per_m,
        }
    }

    /// Compute cost for the given token counts.
    pub fn cost(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        (input_tokens as f64 * self.input_per_m + output_tokens as f64 * self.output_per_m)
            / 1_000_000.0
    }
}

/// Pricing table with built-in defaults and custom overrides.
#[derive(Debug, Clone)]
pub struct PricingTable {
    prices: HashMap<String, ModelPricing>,
}

impl PricingTable {
    /// Create a pricing table with built-in model prices.
    pub fn with_defaults() -> Self {
        let mut prices = HashMap::new();

        // ── OpenAI completions ─────────────────────────────────────
        prices.insert(
            "openai/gpt-3.5-turbo-instruct".into(),
            ModelPricing::new(1.5, 2.0),
        );
        prices.insert("openai/davinci-002".into(), ModelPricing::new(2.0, 2.0));
        prices.insert("openai/babbage-002".into(), ModelPricing::new(0.4, 0.4));
        prices.insert("openai/text-davinci-003".into(), ModelPricing::new(20.0, 20.0));
        prices.insert("openai/text-curie-001".into(), ModelPricing::new(2.0, 2.0));

        // ── Cohere generate ────────────────────────────────────────
        prices.insert("cohere/command".into(), ModelPricing::new(1.0, 2.0));
        prices.insert("cohere/command-light".into(), ModelPricing::new(0.3, 0.6));
        prices.insert("cohere/command-nightly".into(), ModelPricing::new(1.0, 2.0));

        Self { prices }
    }

    /// Create an empty pricing table.
    pub fn empty() -> Self {
        Self {
            prices: HashMap::new(),
        }
    }

    /// Look up pricing for a model. Returns None if not found.
    pub fn get(&self, model: &str) -> Option<&ModelPricing> {
        self.prices.get(model)
    }

    /// Add or update pricing for a model.
    pub fn set(&mut self, model: impl Into<String>, pricing: ModelPricing) {
        self.prices.insert(model.into(), pricing);
    }

    /// Find pricing for `model`, returning None if it is not in the table.
    ///
    /// Tries an exact match, then the provider-qualified names
    /// (`command` → `cohere/command`), then the longest key whose bare name
    /// prefixes the model (`gpt-3.5-turbo-instruct-0914` →
    /// `openai/gpt-3.5-turbo-instruct`).
    pub fn lookup(&self, model: &str) -> Option<&ModelPricing> {
        if let Some(p) = self.prices.get(model) {
            return Some(p);
        }

        for provider in ["openai", "cohere"] {
            if let Some(p) = self.prices.get(&format!("{provider}/{model}")) {
                return Some(p);
            }
        }

        let model_lower = model.to_lowercase();
        let bare_model = model_lower.rsplit('/').next().unwrap_or(&model_lower);

        self.prices
            .iter()
            .filter_map(|(key, pricing)| {
                let bare_key = key.rsplit('/').next().unwrap_or(key);
                bare_model
                    .starts_with(&bare_key.to_lowercase())
                    .then_some((bare_key.len(), pricing))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, pricing)| pricing)
    }

    /// Compute cost for a model call, returning 0.0 if model is not in table.
    pub fn compute_cost(&self, model: &str, input_tokens: u32, output_tokens: u32) -> f64 {
        self.lookup(model)
            .map(|p| p.cost(input_tokens, output_tokens))
            .unwrap_or(0.0)
    }

    /// Cost of an accumulated [`Usage`].
    pub fn usage_cost(&self, model: &str, usage: &Usage) -> f64 {
        self.compute_cost(model, usage.prompt_tokens, usage.completion_tokens)
    }

    /// List all known model names.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.prices.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of models in the pricing table.
    pub fn len(&self) -> usize {
        self.prices.len()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

impl Default for PricingTable {
    fn default() -> Self {
        Self::with_defaults()
    }
}
