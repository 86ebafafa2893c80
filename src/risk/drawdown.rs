use crate::models::account::ratio_pct;
use rust_decimal::Decimal;

/// Equity drawdown against a per-cycle baseline.
///
/// The baseline is captured when a basket opens. With `from_peak` it also ratchets
/// up to the highest equity seen during the cycle.
#[derive(Debug, Clone, Default)]
pub struct DrawdownMonitor {
    baseline: Option<Decimal>,
    from_peak: bool,
}

impl DrawdownMonitor {
    pub fn new(from_peak: bool) -> Self {
        Self {
            baseline: None,
            from_peak,
        }
    }

    pub fn baseline(&self) -> Option<Decimal> {
        self.baseline
    }

    pub fn set_baseline(&mut self, equity: Decimal) {
        self.baseline = Some(equity);
    }

    pub fn observe(&mut self, equity: Decimal) {
        match self.baseline {
            None => self.baseline = Some(equity),
            Some(base) if self.from_peak && equity > base => self.baseline = Some(equity),
            Some(_) => {}
        }
    }

    /// Signed percentage deviation of `equity` from the baseline (negative = loss).
    /// Zero without a usable baseline.
    pub fn drawdown_pct(&self, equity: Decimal) -> Decimal {
        match self.baseline {
            Some(base) => ratio_pct(equity - base, base),
            None => Decimal::ZERO,
        }
    }

    pub fn reset(&mut self) {
        self.baseline = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ten_percent_drawdown() {
        let mut dd = DrawdownMonitor::new(false);
        dd.set_baseline(dec!(10000));
        assert_eq!(dd.drawdown_pct(dec!(9000)), dec!(-10));
    }

    #[test]
    fn test_first_observation_sets_baseline() {
        let mut dd = DrawdownMonitor::new(false);
        assert_eq!(dd.drawdown_pct(dec!(5000)), Decimal::ZERO);
        dd.observe(dec!(8000));
        dd.observe(dec!(9000));
        assert_eq!(dd.baseline(), Some(dec!(8000)));
    }

    #[test]
    fn test_peak_mode_ratchets() {
        let mut dd = DrawdownMonitor::new(true);
        dd.observe(dec!(10000));
        dd.observe(dec!(11000));
        dd.observe(dec!(10500));
        assert_eq!(dd.baseline(), Some(dec!(11000)));
        assert_eq!(dd.drawdown_pct(dec!(9900)), dec!(-10));
    }

    #[test]
    fn test_zero_baseline_guarded() {
        let mut dd = DrawdownMonitor::new(false);
        dd.set_baseline(Decimal::ZERO);
        assert_eq!(dd.drawdown_pct(dec!(100)), Decimal::ZERO);
    }

    #[test]
    fn test_reset_clears_baseline() {
        let mut dd = DrawdownMonitor::new(false);
        dd.set_baseline(dec!(10000));
        dd.reset();
        assert_eq!(dd.baseline(), None);
    }
}
