//! Static per-model pricing (USD per 1K tokens)

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::provider::TokenUsage;

/// Input and output price per 1K tokens
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ModelPrice {
    pub input_per_1k: Decimal,
    pub output_per_1k: Decimal,
}

impl ModelPrice {
    const fn new(input_per_1k: Decimal, output_per_1k: Decimal) -> Self {
        Self {
            input_per_1k,
            output_per_1k,
        }
    }
}

/// Digits kept after the decimal point in reported costs
pub const COST_SCALE: u32 = 8;

const PRICING_PER_1K: &[(&str, ModelPrice)] = &[
    ("gpt-4o-mini", ModelPrice::new(dec!(0.15), dec!(0.60))),
    ("gpt-4o", ModelPrice::new(dec!(5.00), dec!(15.00))),
    ("gpt-4.1-mini", ModelPrice::new(dec!(0.30), dec!(1.20))),
    ("gpt-4.1", ModelPrice::new(dec!(5.00), dec!(15.00))),
    ("o4-mini", ModelPrice::new(dec!(0.30), dec!(1.20))),
    ("o4", ModelPrice::new(dec!(5.00), dec!(15.00))),
];

/// Price for `model`: exact name first, then the longest table key that
/// prefixes it (dated variants like `gpt-4o-mini-2024-07-18`).
pub fn price_for(model: &str) -> Option<ModelPrice> {
    if let Some((_, price)) = PRICING_PER_1K.iter().find(|(key, _)| *key == model) {
        return Some(*price);
    }

    PRICING_PER_1K
        .iter()
        .filter(|(key, _)| model.starts_with(key))
        .max_by_key(|(key, _)| key.len())
        .map(|(_, price)| *price)
}

/// Cost of one invocation; unknown models cost zero
pub fn estimate_cost_usd(model: &str, usage: &TokenUsage) -> Decimal {
    let Some(price) = price_for(model) else {
        tracing::debug!(model, "no pricing entry, cost is zero");
        return Decimal::ZERO;
    };

    let thousand = dec!(1000);
    let cost = Decimal::from(usage.prompt_tokens) / thousand * price.input_per_1k
        + Decimal::from(usage.completion_tokens) / thousand * price.output_per_1k;

    cost.round_dp(COST_SCALE)
}
