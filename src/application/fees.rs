use crate::domain::money::{Amount, round_money};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

const FREE_BELOW: Decimal = dec!(10);
const LOW_TIER_CEILING: Decimal = dec!(100);
const LOW_TIER_RATE: Decimal = dec!(0.005);
const HIGH_TIER_RATE: Decimal = dec!(0.01);

/// Tiered transfer fee on the pre-fee amount.
///
/// `< 10` is free, `10..=100` pays 0.5%, above 100 pays 1%.
pub fn fee(amount: Amount) -> Decimal {
    let value = amount.value();
    let rate = if value < FREE_BELOW {
        Decimal::ZERO
    } else if value <= LOW_TIER_CEILING {
        LOW_TIER_RATE
    } else {
        HIGH_TIER_RATE
    };
    round_money(value * rate)
}
