use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Point-in-time account and basket figures read once per tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub balance: Decimal,
    pub equity: Decimal,
    pub margin: Decimal,
    /// Mark-to-market profit of the open basket.
    pub floating_profit: Decimal,
    pub bid: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl AccountSnapshot {
    /// Equity as a percentage of used margin. Zero when no margin is in use.
    pub fn margin_level_pct(&self) -> Decimal {
        ratio_pct(self.equity, self.margin)
    }
}

/// `numerator / denominator * 100`, or zero when the denominator is not positive
/// or the result does not fit in a `Decimal`.
pub fn ratio_pct(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    numerator
        .checked_div(denominator)
        .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn snapshot(equity: Decimal, margin: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            balance: dec!(10000),
            equity,
            margin,
            floating_profit: Decimal::ZERO,
            bid: dec!(1.1),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_margin_level() {
        assert_eq!(snapshot(dec!(10000), dec!(500)).margin_level_pct(), dec!(2000));
    }

    #[test]
    fn test_margin_level_without_margin_is_zero() {
        assert_eq!(snapshot(dec!(10000), Decimal::ZERO).margin_level_pct(), Decimal::ZERO);
        assert_eq!(snapshot(dec!(10000), dec!(-3)).margin_level_pct(), Decimal::ZERO);
    }

    #[test]
    fn test_margin_level_overflow_is_zero() {
        let tiny = Decimal::new(1, 20);
        assert_eq!(snapshot(dec!(10000000000), tiny).margin_level_pct(), Decimal::ZERO);
        assert_eq!(ratio_pct(Decimal::MAX, dec!(0.5)), Decimal::ZERO);
    }
}
