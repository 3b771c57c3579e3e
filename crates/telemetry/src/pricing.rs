//! Built-in pricing for the model families Eidolon deploys with.
//!
//! Prices are in USD per 1 million tokens. Model names are matched by
//! family prefix so dated release suffixes (e.g. `claude-sonnet-4-5`)
//! resolve without table churn.

use serde::{Deserialize, Serialize};

/// Per-million-token pricing for a model family.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPricing {
    /// Price per 1M input tokens in USD.
    pub input_per_m: f64,
    /// Price per 1M output tokens in USD.
    pub output_per_m: f64,
}

impl ModelPricing {
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

/// Family-prefix pricing table. First matching prefix wins.
const MODEL_PRICING: &[(&str, ModelPricing)] = &[
    (
        "claude-sonnet",
        ModelPricing {
            input_per_m: 3.0,
            output_per_m: 15.0,
        },
    ),
    (
        "claude-haiku",
        ModelPricing {
            input_per_m: 0.8,
            output_per_m: 4.0,
        },
    ),
];

/// Estimate the USD cost of one completion, or `None` when the model
/// family is not in the table.
pub fn estimate_completion_cost_usd(
    model: &str,
    input_tokens: u32,
    output_tokens: u32,
) -> Option<f64> {
    let pricing = resolve_pricing(model)?;
    Some(pricing.cost(input_tokens, output_tokens))
}

fn resolve_pricing(model: &str) -> Option<ModelPricing> {
    let normalized = model.trim().to_lowercase();
    if normalized.is_empty() {
        return None;
    }
    MODEL_PRICING
        .iter()
        .find(|(prefix, _)| normalized.starts_with(prefix))
        .map(|(_, pricing)| *pricing)
}
