//! Provider pricing

use serde::{Deserialize, Serialize};

/// Per-1K-token pricing for a provider, held in micro-dollars for precision
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderPricing {
    /// Price per 1K input tokens in micro-dollars
    pub input_price_per_1k_micros: i64,
    /// Price per 1K output tokens in micro-dollars
    pub output_price_per_1k_micros: i64,
}

impl ProviderPricing {
    /// Create pricing from USD prices per 1K tokens
    pub fn new(input_per_1k: f64, output_per_1k: f64) -> Self {
        Self {
            input_price_per_1k_micros: (input_per_1k * 1_000_000.0).round() as i64,
            output_price_per_1k_micros: (output_per_1k * 1_000_000.0).round() as i64,
        }
    }

    /// Get input price per 1K tokens in USD
    pub fn input_price_per_1k(&self) -> f64 {
        self.input_price_per_1k_micros as f64 / 1_000_000.0
    }

    /// Get output price per 1K tokens in USD
    pub fn output_price_per_1k(&self) -> f64 {
        self.output_price_per_1k_micros as f64 / 1_000_000.0
    }

    /// Calculate cost in micro-dollars for given token counts
    pub fn calculate_cost(&self, input_tokens: u32, output_tokens: u32) -> i64 {
        let input_cost = (input_tokens as i64 * self.input_price_per_1k_micros) / 1000;
        let output_cost = (output_tokens as i64 * self.output_price_per_1k_micros) / 1000;

        input_cost + output_cost
    }

    /// Calculate cost in USD
    pub fn calculate_cost_usd(&self, input_tokens: u32, output_tokens: u32) -> f64 {
        self.calculate_cost(input_tokens, output_tokens) as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pricing_conversion() {
        let pricing = ProviderPricing::new(0.0025, 0.01);
        assert_eq!(pricing.input_price_per_1k_micros, 2_500);
        assert_eq!(pricing.output_price_per_1k_micros, 10_000);
        assert!((pricing.input_price_per_1k() - 0.0025).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_cost() {
        let pricing = ProviderPricing::new(0.03, 0.06);

        // 1000 input tokens at $0.03/1K + 500 output tokens at $0.06/1K
        assert_eq!(pricing.calculate_cost(1000, 500), 60_000);
        assert!((pricing.calculate_cost_usd(1000, 500) - 0.06).abs() < 1e-9);
    }

    #[test]
    fn test_free_provider_costs_nothing() {
        assert_eq!(ProviderPricing::default().calculate_cost(5000, 5000), 0);
    }
}
