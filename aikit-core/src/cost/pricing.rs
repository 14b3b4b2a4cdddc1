//! Per-provider model price table

use serde::{Deserialize, Serialize};

/// Price per usage unit, in USD
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelPrice {
    pub input: f64,
    pub output: f64,
}

impl ModelPrice {
    pub fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }

    /// Build from prices quoted per thousand units
    pub fn per_thousand(input: f64, output: f64) -> Self {
        Self {
            input: input / 1000.0,
            output: output / 1000.0,
        }
    }

    /// Both prices are finite and not negative
    pub fn is_valid(&self) -> bool {
        self.input.is_finite() && self.output.is_finite() && self.input >= 0.0 && self.output >= 0.0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct ProviderPricing {
    provider: String,
    /// Insertion order matters: the first entry is the fallback price
    models: Vec<(String, ModelPrice)>,
}

/// How a price was found for a (provider, model) pair
#[derive(Debug, Clone, PartialEq)]
pub enum PriceMatch {
    /// The model id is a configured key
    Exact(ModelPrice),

    /// The model id contains a configured family name
    Family { family: String, price: ModelPrice },

    /// Nothing matched; the provider's first configured price applies
    Fallback { used_model: String, price: ModelPrice },

    /// No table for the provider at all
    UnknownProvider,
}

impl PriceMatch {
    pub fn price(&self) -> Option<ModelPrice> {
        match self {
            PriceMatch::Exact(price) => Some(*price),
            PriceMatch::Family { price, .. } => Some(*price),
            PriceMatch::Fallback { price, .. } => Some(*price),
            PriceMatch::UnknownProvider => None,
        }
    }
}

/// Price lookup table, keyed by lower-case provider name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    providers: Vec<ProviderPricing>,
}

impl Default for PriceTable {
    fn default() -> Self {
        let mut table = Self::empty();

        table.set("openai", "gpt-4", ModelPrice::per_thousand(0.03, 0.06));
        table.set("openai", "gpt-4-turbo", ModelPrice::per_thousand(0.01, 0.03));
        table.set("openai", "gpt-3.5-turbo", ModelPrice::per_thousand(0.0005, 0.0015));

        table.set("claude", "claude-3-opus", ModelPrice::per_thousand(0.015, 0.075));
        table.set("claude", "claude-3-sonnet", ModelPrice::per_thousand(0.003, 0.015));
        table.set("claude", "claude-3-haiku", ModelPrice::per_thousand(0.00025, 0.00125));

        table.set("gemini", "gemini-pro", ModelPrice::per_thousand(0.00025, 0.0005));
        table.set("gemini", "gemini-ultra", ModelPrice::per_thousand(0.0005, 0.001));

        table
    }
}

impl PriceTable {
    /// Table without any prices
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Insert or replace the price of one model
    pub fn set(&mut self, provider: &str, model: &str, price: ModelPrice) {
        let provider = provider.to_lowercase();
        let model = model.to_lowercase();

        let index = match self.providers.iter().position(|p| p.provider == provider) {
            Some(index) => index,
            None => {
                self.providers.push(ProviderPricing {
                    provider,
                    models: Vec::new(),
                });
                self.providers.len() - 1
            }
        };

        let models = &mut self.providers[index].models;
        match models.iter_mut().find(|(name, _)| *name == model) {
            Some((_, existing)) => *existing = price,
            None => models.push((model, price)),
        }
    }

    /// Resolve the price for a model: exact key, then the longest family
    /// name contained in the id, then the provider's first price
    pub fn lookup(&self, provider: &str, model: &str) -> PriceMatch {
        let provider = provider.to_lowercase();
        let Some(pricing) = self.providers.iter().find(|p| p.provider == provider) else {
            return PriceMatch::UnknownProvider;
        };

        let model = model.to_lowercase();
        if let Some((_, price)) = pricing.models.iter().find(|(name, _)| *name == model) {
            return PriceMatch::Exact(*price);
        }

        let family = pricing
            .models
            .iter()
            .filter(|(name, _)| model.contains(name.as_str()))
            .max_by_key(|(name, _)| name.len());
        if let Some((name, price)) = family {
            return PriceMatch::Family {
                family: name.clone(),
                price: *price,
            };
        }

        match pricing.models.first() {
            Some((name, price)) => PriceMatch::Fallback {
                used_model: name.clone(),
                price: *price,
            },
            None => PriceMatch::UnknownProvider,
        }
    }

    /// Provider names with a price table
    pub fn providers(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.provider.as_str()).collect()
    }
}
