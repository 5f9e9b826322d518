use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tribunal_core::config::{PricingSettings, UnitPrice};

/// Per-model unit prices (cost per token), supplied by configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PriceTable {
    default: Option<UnitPrice>,
    models: BTreeMap<String, UnitPrice>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: &PricingSettings) -> Self {
        Self {
            default: settings.default,
            models: settings.models.clone(),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>, price: UnitPrice) -> Self {
        self.models.insert(model.into(), price);
        self
    }

    pub fn with_default(mut self, price: UnitPrice) -> Self {
        self.default = Some(price);
        self
    }

    pub fn price_for(&self, model: Option<&str>) -> Option<UnitPrice> {
        model
            .and_then(|m| self.models.get(m).copied())
            .or(self.default)
    }

    pub fn cost(price: UnitPrice, input_tokens: u64, output_tokens: u64) -> f64 {
        input_tokens as f64 * price.input + output_tokens as f64 * price.output
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_price_overrides_default() {
        let table = PriceTable::new()
            .with_default(UnitPrice {
                input: 1e-6,
                output: 2e-6,
            })
            .with_model(
                "judge-large",
                UnitPrice {
                    input: 1e-5,
                    output: 3e-5,
                },
            );
        assert_eq!(table.price_for(Some("judge-large")).unwrap().input, 1e-5);
        assert_eq!(table.price_for(Some("other")).unwrap().input, 1e-6);
        assert_eq!(table.price_for(None).unwrap().output, 2e-6);
        assert!(PriceTable::new().price_for(Some("x")).is_none());
    }

    #[test]
    fn cost_is_linear_in_tokens() {
        let price = UnitPrice {
            input: 0.5,
            output: 2.0,
        };
        assert_eq!(PriceTable::cost(price, 10, 3), 11.0);
    }
}
