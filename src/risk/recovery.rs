use crate::execution::hedge_close::RealizedProfit;
use rust_decimal::Decimal;
use tracing::info;

/// Running total of realized profit across basket cycles (recovery capital).
///
/// Mutated only through `add_profit`, which takes a `RealizedProfit` by value.
#[derive(Debug, Default)]
pub struct RecoveryAccumulator {
    total: Decimal,
    closes: u64,
    last: Option<Decimal>,
}

impl RecoveryAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_profit(&mut self, profit: RealizedProfit) {
        let amount = profit.amount();
        self.total += amount;
        self.closes += 1;
        self.last = Some(amount);
        info!("Recovery capital: {amount:.2} total={:.2}", self.total);
    }

    pub fn total(&self) -> Decimal {
        self.total
    }

    pub fn close_count(&self) -> u64 {
        self.closes
    }

    pub fn last_added(&self) -> Option<Decimal> {
        self.last
    }

    /// Drain the accumulated capital, e.g. when a recovery cycle spends it.
    pub fn take(&mut self) -> Decimal {
        let drained = self.total;
        self.total = Decimal::ZERO;
        info!("Recovery capital drained: {drained:.2}");
        drained
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_adds_signed_amounts() {
        let mut acc = RecoveryAccumulator::new();
        acc.add_profit(RealizedProfit::new(dec!(118.40)));
        acc.add_profit(RealizedProfit::new(dec!(-40.15)));
        assert_eq!(acc.total(), dec!(78.25));
        assert_eq!(acc.close_count(), 2);
        assert_eq!(acc.last_added(), Some(dec!(-40.15)));
    }

    #[test]
    fn test_take_drains() {
        let mut acc = RecoveryAccumulator::new();
        acc.add_profit(RealizedProfit::new(dec!(10)));
        assert_eq!(acc.take(), dec!(10));
        assert_eq!(acc.total(), Decimal::ZERO);
        assert_eq!(acc.close_count(), 1);
    }
}
