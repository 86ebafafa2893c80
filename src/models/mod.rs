pub mod account;
pub mod basket;
pub mod order;

use rust_decimal::Decimal;

/// Convert a config value into money/price space. Non-finite input becomes zero.
pub fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}
