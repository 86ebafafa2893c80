use crate::config::RiskConfig;
use crate::execution::hedge_close::HedgeClose;
use crate::execution::TradeExecutor;
use crate::models::account::AccountSnapshot;
use crate::models::basket::Basket;
use crate::models::to_decimal;
use crate::risk::basket_lifecycle::BasketLifecycle;
use crate::risk::recovery::RecoveryAccumulator;
use crate::telemetry::{CloseReport, CloseReporter};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// Why a basket is being closed. Conditions are mutually exclusive per tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CloseReason {
    Drawdown { drawdown_pct: Decimal, limit_pct: Decimal },
    TrailingStop { peak: Decimal, profit: Decimal },
    FixedTakeProfit { profit: Decimal, target: Decimal },
    StandaloneTakeProfit { profit: Decimal, target: Decimal },
}

impl CloseReason {
    /// Protective closes tell the caller to stop opening new baskets.
    pub fn is_protective(&self) -> bool {
        matches!(self, CloseReason::Drawdown { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            CloseReason::Drawdown { .. } => "drawdown",
            CloseReason::TrailingStop { .. } => "trailing-stop",
            CloseReason::FixedTakeProfit { .. } => "fixed-tp",
            CloseReason::StandaloneTakeProfit { .. } => "standalone-tp",
        }
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloseReason::Drawdown {
                drawdown_pct,
                limit_pct,
            } => write!(
                f,
                "Drawdown protection triggered: {:.2}% (limit: {:.1}%)",
                drawdown_pct.abs().round_dp(2),
                limit_pct.round_dp(1)
            ),
            CloseReason::TrailingStop { peak, profit } => write!(
                f,
                "Profit trailing stop triggered: peak={:.2} profit={:.2}",
                peak.round_dp(2),
                profit.round_dp(2)
            ),
            CloseReason::FixedTakeProfit { profit, .. } => {
                write!(f, "Fixed take-profit triggered: {:.2}", profit.round_dp(2))
            }
            CloseReason::StandaloneTakeProfit { profit, .. } => {
                write!(f, "Standalone take-profit triggered: {:.2}", profit.round_dp(2))
            }
        }
    }
}

/// Close conditions with thresholds converted to money space.
#[derive(Debug, Clone)]
pub struct CloseConditions {
    max_drawdown_pct: Decimal,
    enable_trailing: bool,
    fixed_take_profit: Decimal,
    standalone_mode: bool,
    standalone_take_profit: Decimal,
}

type Check = fn(&CloseConditions, &BasketLifecycle, &AccountSnapshot) -> Option<CloseReason>;

impl CloseConditions {
    /// Priority order; the first check that fires wins.
    const ORDER: [Check; 4] = [
        Self::check_drawdown,
        Self::check_trailing,
        Self::check_fixed_take_profit,
        Self::check_standalone_take_profit,
    ];

    pub fn from_config(config: &RiskConfig) -> Self {
        Self {
            max_drawdown_pct: to_decimal(config.max_drawdown_percent),
            enable_trailing: config.enable_trailing,
            fixed_take_profit: to_decimal(config.fixed_take_profit),
            standalone_mode: config.standalone_mode,
            standalone_take_profit: to_decimal(config.standalone_take_profit),
        }
    }

    pub fn trailing_enabled(&self) -> bool {
        self.enable_trailing
    }

    pub fn evaluate(
        &self,
        lifecycle: &BasketLifecycle,
        snapshot: &AccountSnapshot,
    ) -> Option<CloseReason> {
        Self::ORDER
            .iter()
            .find_map(|check| check(self, lifecycle, snapshot))
    }

    /// Always armed: a zero limit closes on any loss against the baseline.
    fn check_drawdown(&self, lc: &BasketLifecycle, snap: &AccountSnapshot) -> Option<CloseReason> {
        let drawdown_pct = lc.drawdown().drawdown_pct(snap.equity);
        (drawdown_pct < -self.max_drawdown_pct).then(|| CloseReason::Drawdown {
            drawdown_pct,
            limit_pct: self.max_drawdown_pct,
        })
    }

    fn check_trailing(&self, lc: &BasketLifecycle, snap: &AccountSnapshot) -> Option<CloseReason> {
        let trailing = lc.trailing();
        (self.enable_trailing && trailing.should_close()).then(|| CloseReason::TrailingStop {
            peak: trailing.peak(),
            profit: snap.floating_profit,
        })
    }

    fn check_fixed_take_profit(
        &self,
        _lc: &BasketLifecycle,
        snap: &AccountSnapshot,
    ) -> Option<CloseReason> {
        let target = self.fixed_take_profit;
        (target > Decimal::ZERO && snap.floating_profit >= target).then(|| {
            CloseReason::FixedTakeProfit {
                profit: snap.floating_profit,
                target,
            }
        })
    }

    fn check_standalone_take_profit(
        &self,
        _lc: &BasketLifecycle,
        snap: &AccountSnapshot,
    ) -> Option<CloseReason> {
        let target = self.standalone_take_profit;
        (self.standalone_mode && target > Decimal::ZERO && snap.floating_profit >= target).then(
            || CloseReason::StandaloneTakeProfit {
                profit: snap.floating_profit,
                target,
            },
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// No basket open.
    Idle,
    Hold {
        floating_profit: Decimal,
        drawdown_pct: Decimal,
    },
    Closed {
        reason: CloseReason,
        realized_profit: Decimal,
    },
    /// Some orders could not be closed; the close is retried next tick.
    PartiallyClosed {
        reason: CloseReason,
        realized_profit: Decimal,
        remaining: usize,
    },
}

impl TickOutcome {
    pub fn close_reason(&self) -> Option<&CloseReason> {
        match self {
            TickOutcome::Closed { reason, .. } | TickOutcome::PartiallyClosed { reason, .. } => {
                Some(reason)
            }
            _ => None,
        }
    }

    pub fn realized_profit(&self) -> Option<Decimal> {
        match self {
            TickOutcome::Closed {
                realized_profit, ..
            }
            | TickOutcome::PartiallyClosed {
                realized_profit, ..
            } => Some(*realized_profit),
            _ => None,
        }
    }

    pub fn is_protective(&self) -> bool {
        self.close_reason().is_some_and(CloseReason::is_protective)
    }

    /// False after a drawdown close: the enclosing loop should stop trading.
    pub fn allows_trading(&self) -> bool {
        !self.is_protective()
    }
}

/// Per-tick basket risk evaluator.
///
/// Owns the close path so that every close books exactly the realized profit
/// HedgeClose returned into the recovery accumulator and the reporters.
pub struct RiskController<E> {
    conditions: CloseConditions,
    hedge: HedgeClose<E>,
    recovery: RecoveryAccumulator,
    reporters: Vec<Box<dyn CloseReporter>>,
}

impl<E: TradeExecutor> RiskController<E> {
    pub fn new(config: &RiskConfig, hedge: HedgeClose<E>, recovery: RecoveryAccumulator) -> Self {
        Self {
            conditions: CloseConditions::from_config(config),
            hedge,
            recovery,
            reporters: Vec::new(),
        }
    }

    pub fn add_reporter(&mut self, reporter: impl CloseReporter + 'static) {
        self.reporters.push(Box::new(reporter));
    }

    pub fn recovery(&self) -> &RecoveryAccumulator {
        &self.recovery
    }

    pub fn recovery_mut(&mut self) -> &mut RecoveryAccumulator {
        &mut self.recovery
    }

    pub fn executor(&self) -> &E {
        self.hedge.executor()
    }

    pub fn executor_mut(&mut self) -> &mut E {
        self.hedge.executor_mut()
    }

    pub fn on_tick(
        &mut self,
        lifecycle: &mut BasketLifecycle,
        snapshot: &AccountSnapshot,
    ) -> TickOutcome {
        if !lifecycle.is_open() {
            return TickOutcome::Idle;
        }

        if let Some(reason) = lifecycle.pending_close().cloned() {
            warn!("Retrying unfinished {} close", reason.label());
            return self.close_basket(lifecycle, reason, snapshot);
        }

        lifecycle.drawdown_mut().observe(snapshot.equity);
        if self.conditions.trailing_enabled() {
            lifecycle.trailing_mut().update(snapshot.floating_profit);
        }

        match self.conditions.evaluate(lifecycle, snapshot) {
            Some(reason) => {
                if reason.is_protective() {
                    warn!("{reason}");
                } else {
                    info!("{reason}");
                }
                self.close_basket(lifecycle, reason, snapshot)
            }
            None => TickOutcome::Hold {
                floating_profit: snapshot.floating_profit,
                drawdown_pct: lifecycle.drawdown().drawdown_pct(snapshot.equity),
            },
        }
    }

    fn close_basket(
        &mut self,
        lifecycle: &mut BasketLifecycle,
        reason: CloseReason,
        snapshot: &AccountSnapshot,
    ) -> TickOutcome {
        let Some(basket) = lifecycle.basket_mut() else {
            return TickOutcome::Idle;
        };
        let (realized, status) = self.hedge.execute(basket).into_parts();

        // Refused members may already be gone at the venue; retrying them would never end.
        if !status.refused.is_empty() {
            let open = self.hedge.executor().open_tickets();
            let dropped = lifecycle.reconcile(&open);
            if dropped > 0 {
                warn!("Dropped {dropped} refused orders the venue no longer holds");
            }
        }

        let remaining = lifecycle.basket().map_or(0, Basket::len);
        let realized_profit = realized.amount();

        if status.closed.is_empty() {
            debug!("Close attempt flattened nothing ({}); nothing booked", reason.label());
        } else {
            self.recovery.add_profit(realized);
            let report = CloseReport {
                reason: reason.clone(),
                realized_profit,
                floating_at_trigger: snapshot.floating_profit,
                closed_at: snapshot.timestamp,
                price: snapshot.bid,
                fully_closed: remaining == 0,
                remaining_orders: remaining,
            };
            for reporter in &mut self.reporters {
                reporter.on_close(&report);
            }
        }

        if remaining == 0 {
            lifecycle.reset();
            TickOutcome::Closed {
                reason,
                realized_profit,
            }
        } else {
            warn!(
                "Basket close incomplete: {remaining} orders still open ({})",
                reason.label()
            );
            lifecycle.mark_closing(reason.clone());
            TickOutcome::PartiallyClosed {
                reason,
                realized_profit,
                remaining,
            }
        }
    }
}
