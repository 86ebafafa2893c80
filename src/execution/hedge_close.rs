use crate::config::HedgeConfig;
use crate::execution::{ExecutionError, TradeExecutor};
use crate::models::basket::Basket;
use crate::models::order::{OrderSide, Ticket};
use rust_decimal::Decimal;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Profit booked by an executed close.
///
/// Only `HedgeClose` creates these, and the value is consumed by move, so the
/// recovery accumulator can never be fed a floating-profit estimate.
#[derive(Debug, PartialEq, Eq)]
pub struct RealizedProfit(Decimal);

impl RealizedProfit {
    pub(crate) fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn amount(&self) -> Decimal {
        self.0
    }
}

/// Which orders a close call managed to flatten.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CloseStatus {
    pub closed: Vec<Ticket>,
    /// Orders still open after every attempt; they stay in the basket.
    pub failed: Vec<Ticket>,
    /// Subset of `failed` refused with a permanent error. The venue may no longer hold them.
    pub refused: Vec<Ticket>,
    pub hedge_ticket: Option<Ticket>,
}

impl CloseStatus {
    pub fn fully_closed(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Debug)]
#[must_use = "realized profit must be accumulated and reported"]
pub struct HedgeCloseResult {
    realized: RealizedProfit,
    status: CloseStatus,
}

impl HedgeCloseResult {
    pub fn realized_amount(&self) -> Decimal {
        self.realized.amount()
    }

    pub fn fully_closed(&self) -> bool {
        self.status.fully_closed()
    }

    pub fn status(&self) -> &CloseStatus {
        &self.status
    }

    pub fn into_parts(self) -> (RealizedProfit, CloseStatus) {
        (self.realized, self.status)
    }
}

/// Flattens a basket, optionally locking net exposure with one offsetting order first.
///
/// Closes are blocking calls into the executor. Transient rejections are retried up to
/// `max_close_attempts` per order; orders that still fail remain in the basket and are
/// left out of the realized sum.
pub struct HedgeClose<E> {
    executor: E,
    config: HedgeConfig,
}

impl<E: TradeExecutor> HedgeClose<E> {
    pub fn new(executor: E, config: HedgeConfig) -> Self {
        Self { executor, config }
    }

    pub fn executor(&self) -> &E {
        &self.executor
    }

    pub fn executor_mut(&mut self) -> &mut E {
        &mut self.executor
    }

    pub fn execute(&mut self, basket: &mut Basket) -> HedgeCloseResult {
        let mut status = CloseStatus::default();

        if basket.is_empty() {
            return HedgeCloseResult {
                realized: RealizedProfit::new(Decimal::ZERO),
                status,
            };
        }

        if self.config.use_hedge {
            status.hedge_ticket = self.lock_exposure(basket);
        }

        let mut realized = Decimal::ZERO;
        for ticket in basket.tickets() {
            match self.with_retry(&ticket.to_string(), |ex| ex.close_order(ticket)) {
                Ok(fill) => {
                    let net = fill.net_profit();
                    debug!("Closed {ticket} @ {} net={net:.2}", fill.close_price);
                    realized += net;
                    basket.remove(ticket);
                    status.closed.push(ticket);
                }
                Err(e) => {
                    error!("Close of {ticket} failed: {e}, order left open");
                    if !e.is_transient() {
                        status.refused.push(ticket);
                    }
                    status.failed.push(ticket);
                }
            }
        }

        info!(
            "HedgeClose: closed={} failed={} realized={realized:.2}",
            status.closed.len(),
            status.failed.len()
        );

        HedgeCloseResult {
            realized: RealizedProfit::new(realized),
            status,
        }
    }

    /// Place one order offsetting the basket's net lots so aggregate P&L stops moving
    /// while the members are closed one by one.
    fn lock_exposure(&mut self, basket: &mut Basket) -> Option<Ticket> {
        let net = basket.net_lots();
        if basket.len() < 2 || net.is_zero() {
            return None;
        }

        let side = if net > Decimal::ZERO {
            OrderSide::Sell
        } else {
            OrderSide::Buy
        };
        let lots = net.abs();

        match self.with_retry("hedge", |ex| ex.open_market(side, lots, "hedge-close")) {
            Ok(mut order) => {
                order.hedge = true;
                let ticket = order.ticket;
                info!("Hedge {ticket} placed: {side:?} {lots} lots");
                basket.push(order);
                Some(ticket)
            }
            Err(e) => {
                warn!("Hedge placement failed ({e}), closing directly");
                None
            }
        }
    }

    fn with_retry<T>(
        &mut self,
        label: &str,
        mut op: impl FnMut(&mut E) -> Result<T, ExecutionError>,
    ) -> Result<T, ExecutionError> {
        let attempts = self.config.max_close_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(&mut self.executor) {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < attempts => {
                    warn!("{label}: attempt {attempt}/{attempts} failed ({e}), retrying");
                    if self.config.retry_delay_ms > 0 {
                        std::thread::sleep(Duration::from_millis(self.config.retry_delay_ms));
                    }
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::basket::GridOrder;
    use crate::models::order::CloseFill;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use std::collections::{HashMap, VecDeque};

    /// Venue that answers each close from a per-ticket script.
    #[derive(Default)]
    struct ScriptedVenue {
        closes: HashMap<Ticket, VecDeque<Result<Decimal, ExecutionError>>>,
        close_calls: Vec<Ticket>,
        hedge_fails: bool,
        hedge_profit: Decimal,
        opened: Vec<(OrderSide, Decimal)>,
    }

    impl TradeExecutor for ScriptedVenue {
        fn open_market(
            &mut self,
            side: OrderSide,
            lots: Decimal,
            _comment: &str,
        ) -> Result<GridOrder, ExecutionError> {
            if self.hedge_fails {
                return Err(ExecutionError::Rejected("not enough money".into()));
            }
            self.opened.push((side, lots));
            let ticket = Ticket(900);
            self.closes
                .insert(ticket, VecDeque::from([Ok(self.hedge_profit)]));
            Ok(GridOrder {
                ticket,
                side,
                lots,
                open_price: dec!(1.1),
                opened_at: Utc::now(),
                hedge: false,
            })
        }

        fn close_order(&mut self, ticket: Ticket) -> Result<CloseFill, ExecutionError> {
            self.close_calls.push(ticket);
            let next = self
                .closes
                .get_mut(&ticket)
                .and_then(|q| q.pop_front())
                .unwrap_or(Err(ExecutionError::UnknownTicket(ticket)));
            next.map(|profit| CloseFill {
                ticket,
                close_price: dec!(1.1),
                gross_profit: profit,
                commission: Decimal::ZERO,
                swap: Decimal::ZERO,
                closed_at: Utc::now(),
            })
        }

        fn open_tickets(&self) -> Vec<Ticket> {
            Vec::new()
        }
    }

    fn config(use_hedge: bool) -> HedgeConfig {
        HedgeConfig {
            use_hedge,
            max_close_attempts: 3,
            retry_delay_ms: 0,
        }
    }

    fn basket(sides: &[(u64, OrderSide)]) -> Basket {
        let orders = sides
            .iter()
            .map(|&(t, side)| GridOrder {
                ticket: Ticket(t),
                side,
                lots: dec!(0.10),
                open_price: dec!(1.1),
                opened_at: Utc::now(),
                hedge: false,
            })
            .collect();
        Basket::new(orders, Utc::now())
    }

    #[test]
    fn test_sums_realized_fills() {
        let mut venue = ScriptedVenue::default();
        venue.closes.insert(Ticket(1), VecDeque::from([Ok(dec!(60.10))]));
        venue.closes.insert(Ticket(2), VecDeque::from([Ok(dec!(58.30))]));
        let mut hc = HedgeClose::new(venue, config(false));
        let mut b = basket(&[(1, OrderSide::Buy), (2, OrderSide::Buy)]);

        let result = hc.execute(&mut b);
        assert!(result.fully_closed());
        assert_eq!(result.realized_amount(), dec!(118.40));
        assert!(b.is_empty());
    }

    #[test]
    fn test_transient_failure_retried() {
        let mut venue = ScriptedVenue::default();
        venue.closes.insert(
            Ticket(1),
            VecDeque::from([Err(ExecutionError::ServerBusy), Ok(dec!(10))]),
        );
        let mut hc = HedgeClose::new(venue, config(false));
        let mut b = basket(&[(1, OrderSide::Buy)]);

        let result = hc.execute(&mut b);
        assert!(result.fully_closed());
        assert_eq!(result.realized_amount(), dec!(10));
        assert_eq!(hc.executor().close_calls.len(), 2);
    }

    #[test]
    fn test_exhausted_retries_leave_order_open() {
        let mut venue = ScriptedVenue::default();
        venue.closes.insert(Ticket(1), VecDeque::from([Ok(dec!(5))]));
        venue.closes.insert(
            Ticket(2),
            VecDeque::from([
                Err(ExecutionError::Requote(Ticket(2))),
                Err(ExecutionError::Requote(Ticket(2))),
                Err(ExecutionError::Requote(Ticket(2))),
            ]),
        );
        let mut hc = HedgeClose::new(venue, config(false));
        let mut b = basket(&[(1, OrderSide::Buy), (2, OrderSide::Buy)]);

        let result = hc.execute(&mut b);
        assert!(!result.fully_closed());
        assert_eq!(result.realized_amount(), dec!(5));
        assert_eq!(result.status().failed, vec![Ticket(2)]);
        assert!(result.status().refused.is_empty());
        assert_eq!(b.tickets(), vec![Ticket(2)]);
        assert_eq!(hc.executor().close_calls.len(), 4);
    }

    #[test]
    fn test_permanent_failure_not_retried() {
        let mut venue = ScriptedVenue::default();
        venue.closes.insert(
            Ticket(1),
            VecDeque::from([Err(ExecutionError::MarketClosed), Ok(dec!(1))]),
        );
        let mut hc = HedgeClose::new(venue, config(false));
        let mut b = basket(&[(1, OrderSide::Sell)]);

        let result = hc.execute(&mut b);
        assert!(!result.fully_closed());
        assert_eq!(result.status().refused, vec![Ticket(1)]);
        assert_eq!(hc.executor().close_calls.len(), 1);
    }

    #[test]
    fn test_hedge_offsets_net_exposure() {
        let mut venue = ScriptedVenue::default();
        venue.hedge_profit = dec!(-2.50);
        venue.closes.insert(Ticket(1), VecDeque::from([Ok(dec!(20))]));
        venue.closes.insert(Ticket(2), VecDeque::from([Ok(dec!(15))]));
        let mut hc = HedgeClose::new(venue, config(true));
        let mut b = basket(&[(1, OrderSide::Buy), (2, OrderSide::Buy)]);

        let result = hc.execute(&mut b);
        assert_eq!(hc.executor().opened, vec![(OrderSide::Sell, dec!(0.20))]);
        assert_eq!(result.status().hedge_ticket, Some(Ticket(900)));
        assert_eq!(result.realized_amount(), dec!(32.50));
        assert!(b.is_empty());
    }

    #[test]
    fn test_balanced_basket_needs_no_hedge() {
        let mut venue = ScriptedVenue::default();
        venue.closes.insert(Ticket(1), VecDeque::from([Ok(dec!(1))]));
        venue.closes.insert(Ticket(2), VecDeque::from([Ok(dec!(1))]));
        let mut hc = HedgeClose::new(venue, config(true));
        let mut b = basket(&[(1, OrderSide::Buy), (2, OrderSide::Sell)]);

        let result = hc.execute(&mut b);
        assert!(hc.executor().opened.is_empty());
        assert_eq!(result.status().hedge_ticket, None);
    }

    #[test]
    fn test_failed_hedge_falls_back_to_direct_close() {
        let mut venue = ScriptedVenue::default();
        venue.hedge_fails = true;
        venue.closes.insert(Ticket(1), VecDeque::from([Ok(dec!(3))]));
        venue.closes.insert(Ticket(2), VecDeque::from([Ok(dec!(4))]));
        let mut hc = HedgeClose::new(venue, config(true));
        let mut b = basket(&[(1, OrderSide::Buy), (2, OrderSide::Buy)]);

        let result = hc.execute(&mut b);
        assert!(result.fully_closed());
        assert_eq!(result.realized_amount(), dec!(7));
    }

    #[test]
    fn test_empty_basket_is_noop() {
        let mut hc = HedgeClose::new(ScriptedVenue::default(), config(true));
        let mut b = basket(&[]);
        let result = hc.execute(&mut b);
        assert!(result.fully_closed());
        assert_eq!(result.realized_amount(), Decimal::ZERO);
        assert!(hc.executor().close_calls.is_empty());
    }
}
