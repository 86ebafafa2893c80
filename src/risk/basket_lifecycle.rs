use crate::config::RiskConfig;
use crate::models::basket::Basket;
use crate::models::order::Ticket;
use crate::models::to_decimal;
use crate::risk::drawdown::DrawdownMonitor;
use crate::risk::risk_controller::CloseReason;
use crate::risk::trailing_stop::{ProfitTrailingStop, TrailingState};
use rust_decimal::Decimal;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("basket {0} is still open")]
    AlreadyOpen(Uuid),

    #[error("cannot open an empty basket")]
    EmptyBasket,
}

/// Owns the current basket and the per-cycle state that must not outlive it:
/// the trailing peak, the drawdown baseline and any unfinished close.
#[derive(Debug)]
pub struct BasketLifecycle {
    basket: Option<Basket>,
    trailing: ProfitTrailingStop,
    drawdown: DrawdownMonitor,
    pending_close: Option<CloseReason>,
    completed_cycles: u64,
}

impl BasketLifecycle {
    pub fn new(trailing: ProfitTrailingStop, drawdown: DrawdownMonitor) -> Self {
        Self {
            basket: None,
            trailing,
            drawdown,
            pending_close: None,
            completed_cycles: 0,
        }
    }

    pub fn from_config(config: &RiskConfig) -> Self {
        Self::new(
            ProfitTrailingStop::new(
                to_decimal(config.trailing_activation),
                to_decimal(config.trailing_margin),
            ),
            DrawdownMonitor::new(config.drawdown_from_peak),
        )
    }

    /// Start a cycle once grid construction has placed its orders.
    pub fn open(&mut self, basket: Basket, baseline_equity: Decimal) -> Result<(), LifecycleError> {
        if let Some(current) = &self.basket {
            return Err(LifecycleError::AlreadyOpen(current.cycle_id));
        }
        if basket.is_empty() {
            return Err(LifecycleError::EmptyBasket);
        }
        info!(
            "Basket {} opened: orders={} baseline={baseline_equity:.2}",
            basket.cycle_id,
            basket.len()
        );
        self.drawdown.set_baseline(baseline_equity);
        self.basket = Some(basket);
        Ok(())
    }

    pub fn is_open(&self) -> bool {
        self.basket.is_some()
    }

    pub fn basket(&self) -> Option<&Basket> {
        self.basket.as_ref()
    }

    pub fn basket_mut(&mut self) -> Option<&mut Basket> {
        self.basket.as_mut()
    }

    pub fn trailing(&self) -> &ProfitTrailingStop {
        &self.trailing
    }

    pub fn trailing_mut(&mut self) -> &mut ProfitTrailingStop {
        &mut self.trailing
    }

    pub fn drawdown(&self) -> &DrawdownMonitor {
        &self.drawdown
    }

    pub fn drawdown_mut(&mut self) -> &mut DrawdownMonitor {
        &mut self.drawdown
    }

    /// Close that fired but left orders open; retried on the next tick.
    pub fn pending_close(&self) -> Option<&CloseReason> {
        self.pending_close.as_ref()
    }

    pub(crate) fn mark_closing(&mut self, reason: CloseReason) {
        self.pending_close = Some(reason);
    }

    pub fn completed_cycles(&self) -> u64 {
        self.completed_cycles
    }

    /// Clear membership, the drawdown baseline and the trailing stop.
    /// Safe to call on an already-empty lifecycle.
    pub fn reset(&mut self) {
        if let Some(basket) = self.basket.take() {
            self.completed_cycles += 1;
            info!(
                "Basket {} reset (cycle #{})",
                basket.cycle_id, self.completed_cycles
            );
        }
        self.pending_close = None;
        self.drawdown.reset();
        self.trailing.reset();
    }

    /// Drop members the broker no longer reports as open (e.g. after a restart
    /// interrupted a close). Resets the cycle if nothing is left.
    pub fn reconcile(&mut self, open_tickets: &[Ticket]) -> usize {
        let Some(basket) = self.basket.as_mut() else {
            return 0;
        };
        let open: HashSet<Ticket> = open_tickets.iter().copied().collect();
        let dropped = basket.retain_tickets(|t| open.contains(&t));
        if dropped > 0 {
            warn!("Reconcile: {dropped} basket orders no longer open at broker");
        }
        if basket.is_empty() {
            self.reset();
        }
        dropped
    }

    /// Whether the lifecycle is in its freshly reset state.
    pub fn is_idle(&self) -> bool {
        self.basket.is_none()
            && self.pending_close.is_none()
            && self.drawdown.baseline().is_none()
            && self.trailing.state() == TrailingState::Idle
    }
}
