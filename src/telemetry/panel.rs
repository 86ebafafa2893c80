use crate::config::PanelConfig;
use crate::models::account::AccountSnapshot;
use crate::models::basket::Basket;
use crate::models::order::OrderSide;
use crate::telemetry::{CloseReport, CloseReporter};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::fmt;
use tracing::info;

const PL_HISTORY: usize = 20;

/// One closed-basket line: `(profit, timestamp, price)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlLine {
    pub profit: Decimal,
    pub at: DateTime<Utc>,
    pub price: Decimal,
}

impl fmt::Display for PlLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "P/L {:.2} @ {} ({})",
            self.profit.round_dp(2),
            self.price,
            self.at.format("%Y-%m-%d %H:%M:%S")
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PositionCounts {
    pub buy: usize,
    pub sell: usize,
}

impl PositionCounts {
    pub fn of(basket: Option<&Basket>) -> Self {
        basket
            .map(|b| Self {
                buy: b.count_side(OrderSide::Buy),
                sell: b.count_side(OrderSide::Sell),
            })
            .unwrap_or_default()
    }

    /// Buy count minus sell count.
    pub fn net(&self) -> i64 {
        self.buy as i64 - self.sell as i64
    }
}

/// Text statistics for an account panel. Rendering lives elsewhere.
pub struct PanelStats {
    trade_mode: String,
    symbol: String,
    history: VecDeque<PlLine>,
}

impl PanelStats {
    pub fn new(config: &PanelConfig) -> Self {
        Self {
            trade_mode: config.trade_mode.clone(),
            symbol: config.symbol.clone(),
            history: VecDeque::with_capacity(PL_HISTORY),
        }
    }

    pub fn print_pl(&mut self, profit: Decimal, at: DateTime<Utc>, price: Decimal) {
        let line = PlLine { profit, at, price };
        info!("{line}");
        if self.history.len() >= PL_HISTORY {
            self.history.pop_front();
        }
        self.history.push_back(line);
    }

    pub fn last_pl(&self) -> Option<&PlLine> {
        self.history.back()
    }

    pub fn history(&self) -> impl Iterator<Item = &PlLine> {
        self.history.iter()
    }

    pub fn system_line(&self, snapshot: &AccountSnapshot) -> String {
        let mode = if self.trade_mode.is_empty() {
            "Not set"
        } else {
            self.trade_mode.as_str()
        };
        format!(
            "System: {mode} / {} / Margin%={:.2}",
            self.symbol,
            snapshot.margin_level_pct().round_dp(2)
        )
    }

    pub fn positions_line(&self, counts: PositionCounts) -> String {
        format!(
            "Buy: {} / Sell: {} / Net: {}",
            counts.buy,
            counts.sell,
            counts.net()
        )
    }
}

impl CloseReporter for PanelStats {
    fn on_close(&mut self, report: &CloseReport) {
        self.print_pl(report.realized_profit, report.closed_at, report.price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::basket::GridOrder;
    use crate::models::order::Ticket;
    use rust_decimal_macros::dec;

    fn panel(mode: &str) -> PanelStats {
        PanelStats::new(&PanelConfig {
            trade_mode: mode.into(),
            symbol: "EURUSD".into(),
        })
    }

    fn snapshot(margin: Decimal) -> AccountSnapshot {
        AccountSnapshot {
            balance: dec!(10000),
            equity: dec!(10000),
            margin,
            floating_profit: Decimal::ZERO,
            bid: dec!(1.1),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_system_line_without_margin() {
        let p = panel("");
        assert_eq!(
            p.system_line(&snapshot(Decimal::ZERO)),
            "System: Not set / EURUSD / Margin%=0.00"
        );
    }

    #[test]
    fn test_system_line_with_margin() {
        let p = panel("Grid");
        assert_eq!(
            p.system_line(&snapshot(dec!(400))),
            "System: Grid / EURUSD / Margin%=2500.00"
        );
    }

    #[test]
    fn test_net_is_buy_minus_sell() {
        let orders = [(1, OrderSide::Buy), (2, OrderSide::Sell), (3, OrderSide::Sell)]
            .into_iter()
            .map(|(t, side)| GridOrder {
                ticket: Ticket(t),
                side,
                lots: dec!(0.1),
                open_price: dec!(1.1),
                opened_at: Utc::now(),
                hedge: false,
            })
            .collect();
        let basket = Basket::new(orders, Utc::now());
        let counts = PositionCounts::of(Some(&basket));
        assert_eq!(counts.net(), -1);
        assert_eq!(panel("").positions_line(counts), "Buy: 1 / Sell: 2 / Net: -1");
        assert_eq!(PositionCounts::of(None).net(), 0);
    }

    #[test]
    fn test_print_pl_keeps_bounded_history() {
        let mut p = panel("");
        for i in 0..25 {
            p.print_pl(Decimal::from(i), Utc::now(), dec!(1.1));
        }
        assert_eq!(p.history().count(), PL_HISTORY);
        assert_eq!(p.last_pl().map(|l| l.profit), Some(dec!(24)));
    }
}
