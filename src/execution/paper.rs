use crate::config::SimulationConfig;
use crate::execution::{AccountFeed, ExecutionError, TradeExecutor};
use crate::models::account::AccountSnapshot;
use crate::models::basket::GridOrder;
use crate::models::order::{CloseFill, OrderSide, Ticket};
use crate::models::to_decimal;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use tracing::debug;

const PRICE_DP: u32 = 5;
const MONEY_DP: u32 = 2;

/// Simulated venue and account for paper runs.
///
/// Closes fill at the touch plus random adverse slippage and pay a per-lot commission,
/// so booked profit lands below the floating mark the way it does on a real account.
pub struct PaperBroker {
    balance: Decimal,
    bid: Decimal,
    spread: Decimal,
    contract_size: Decimal,
    commission_per_lot: Decimal,
    margin_per_lot: Decimal,
    max_slippage: f64,
    reject_probability: f64,
    volatility: f64,
    positions: BTreeMap<Ticket, GridOrder>,
    next_ticket: u64,
    rng: StdRng,
}

impl PaperBroker {
    pub fn new(config: &SimulationConfig) -> Self {
        Self {
            balance: to_decimal(config.starting_balance),
            bid: to_decimal(config.start_price).round_dp(PRICE_DP),
            spread: to_decimal(config.spread).round_dp(PRICE_DP),
            contract_size: to_decimal(config.contract_size),
            commission_per_lot: to_decimal(config.commission_per_lot),
            margin_per_lot: to_decimal(config.margin_per_lot),
            max_slippage: config.max_slippage,
            reject_probability: config.reject_probability,
            volatility: config.volatility,
            positions: BTreeMap::new(),
            next_ticket: 1,
            rng: StdRng::seed_from_u64(config.seed),
        }
    }

    pub fn bid(&self) -> Decimal {
        self.bid
    }

    pub fn ask(&self) -> Decimal {
        self.bid + self.spread
    }

    pub fn balance(&self) -> Decimal {
        self.balance
    }

    pub fn set_bid(&mut self, bid: Decimal) {
        self.bid = bid;
    }

    /// Move the bid by a uniform random step within ±volatility.
    pub fn random_walk(&mut self) {
        let step = self.rng.gen_range(-1.0..=1.0) * self.volatility;
        let next = (self.bid + to_decimal(step)).round_dp(PRICE_DP);
        if next > Decimal::ZERO {
            self.bid = next;
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &GridOrder> {
        self.positions.values()
    }

    pub fn floating_profit(&self) -> Decimal {
        self.positions
            .values()
            .map(|o| self.mark_profit(o, self.bid, self.ask()))
            .sum()
    }

    fn mark_profit(&self, order: &GridOrder, bid: Decimal, ask: Decimal) -> Decimal {
        let exit = match order.side {
            OrderSide::Buy => bid,
            OrderSide::Sell => ask,
        };
        ((exit - order.open_price) * order.side.sign() * order.lots * self.contract_size)
            .round_dp(MONEY_DP)
    }

    fn used_margin(&self) -> Decimal {
        self.positions
            .values()
            .map(|o| o.lots * self.margin_per_lot)
            .sum()
    }
}

impl TradeExecutor for PaperBroker {
    fn open_market(
        &mut self,
        side: OrderSide,
        lots: Decimal,
        comment: &str,
    ) -> Result<GridOrder, ExecutionError> {
        if lots <= Decimal::ZERO {
            return Err(ExecutionError::Rejected(format!("invalid volume {lots}")));
        }
        let open_price = match side {
            OrderSide::Buy => self.ask(),
            OrderSide::Sell => self.bid,
        };
        let ticket = Ticket(self.next_ticket);
        self.next_ticket += 1;

        let order = GridOrder {
            ticket,
            side,
            lots,
            open_price,
            opened_at: Utc::now(),
            hedge: false,
        };
        debug!("Paper open {ticket} {side:?} {lots} @ {open_price} ({comment})");
        self.positions.insert(ticket, order.clone());
        Ok(order)
    }

    fn close_order(&mut self, ticket: Ticket) -> Result<CloseFill, ExecutionError> {
        if !self.positions.contains_key(&ticket) {
            return Err(ExecutionError::UnknownTicket(ticket));
        }
        if self.reject_probability > 0.0 && self.rng.gen_bool(self.reject_probability) {
            return Err(ExecutionError::Requote(ticket));
        }

        let slip = to_decimal(self.rng.gen::<f64>() * self.max_slippage).round_dp(PRICE_DP);
        let bid = self.bid - slip;
        let ask = self.ask() + slip;
        let Some(order) = self.positions.remove(&ticket) else {
            return Err(ExecutionError::UnknownTicket(ticket));
        };

        let gross_profit = self.mark_profit(&order, bid, ask);
        let commission = (self.commission_per_lot * order.lots).round_dp(MONEY_DP);
        let close_price = match order.side {
            OrderSide::Buy => bid,
            OrderSide::Sell => ask,
        };
        let fill = CloseFill {
            ticket,
            close_price,
            gross_profit,
            commission,
            swap: Decimal::ZERO,
            closed_at: Utc::now(),
        };
        self.balance += fill.net_profit();
        Ok(fill)
    }

    fn open_tickets(&self) -> Vec<Ticket> {
        self.positions.keys().copied().collect()
    }
}

impl AccountFeed for PaperBroker {
    fn snapshot(&self) -> AccountSnapshot {
        let floating_profit = self.floating_profit();
        AccountSnapshot {
            balance: self.balance,
            equity: self.balance + floating_profit,
            margin: self.used_margin(),
            floating_profit,
            bid: self.bid,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quiet_config() -> SimulationConfig {
        SimulationConfig {
            start_price: 1.10000,
            spread: 0.00010,
            contract_size: 100_000.0,
            commission_per_lot: 7.0,
            max_slippage: 0.0,
            reject_probability: 0.0,
            ..SimulationConfig::default()
        }
    }

    #[test]
    fn test_floating_profit_marks_at_bid_for_longs() {
        let mut broker = PaperBroker::new(&quiet_config());
        broker.open_market(OrderSide::Buy, dec!(0.10), "t").unwrap();
        // Bought at ask 1.10010
        broker.set_bid(dec!(1.10110));
        assert_eq!(broker.floating_profit(), dec!(10.00));
    }

    #[test]
    fn test_close_books_commission() {
        let mut broker = PaperBroker::new(&quiet_config());
        let order = broker.open_market(OrderSide::Buy, dec!(0.10), "t").unwrap();
        broker.set_bid(dec!(1.10110));
        let floating = broker.floating_profit();

        let fill = broker.close_order(order.ticket).unwrap();
        assert_eq!(fill.gross_profit, floating);
        assert_eq!(fill.net_profit(), dec!(9.30));
        assert_eq!(broker.balance(), dec!(10009.30));
        assert!(broker.open_tickets().is_empty());
    }

    #[test]
    fn test_close_unknown_ticket() {
        let mut broker = PaperBroker::new(&quiet_config());
        assert_eq!(
            broker.close_order(Ticket(99)).unwrap_err(),
            ExecutionError::UnknownTicket(Ticket(99))
        );
    }

    #[test]
    fn test_snapshot_equity_and_margin() {
        let mut broker = PaperBroker::new(&quiet_config());
        let snap = broker.snapshot();
        assert_eq!(snap.margin, Decimal::ZERO);
        assert_eq!(snap.margin_level_pct(), Decimal::ZERO);

        broker.open_market(OrderSide::Sell, dec!(0.20), "t").unwrap();
        let snap = broker.snapshot();
        assert_eq!(snap.equity, snap.balance + snap.floating_profit);
        assert_eq!(snap.margin, dec!(220));
    }

    #[test]
    fn test_always_reject_is_transient() {
        let config = SimulationConfig {
            reject_probability: 0.999_999,
            ..quiet_config()
        };
        let mut broker = PaperBroker::new(&config);
        let order = broker.open_market(OrderSide::Buy, dec!(0.10), "t").unwrap();
        let err = broker.close_order(order.ticket).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(broker.open_tickets(), vec![order.ticket]);
    }
}
