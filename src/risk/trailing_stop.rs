use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrailingState {
    /// Floating profit has not yet exceeded the activation threshold.
    Idle,
    /// Tracking the peak; a retrace of `margin` from it closes the basket.
    Armed,
}

/// Profit trailing stop over a basket's floating profit.
#[derive(Debug, Clone)]
pub struct ProfitTrailingStop {
    activation: Decimal,
    margin: Decimal,
    state: TrailingState,
    peak: Decimal,
    last_profit: Decimal,
}

impl ProfitTrailingStop {
    pub fn new(activation: Decimal, margin: Decimal) -> Self {
        Self {
            activation,
            margin,
            state: TrailingState::Idle,
            peak: Decimal::ZERO,
            last_profit: Decimal::ZERO,
        }
    }

    /// Feed the latest floating profit. Call once per tick before `should_close`.
    pub fn update(&mut self, floating_profit: Decimal) {
        self.last_profit = floating_profit;
        match self.state {
            TrailingState::Idle if floating_profit > self.activation => {
                self.state = TrailingState::Armed;
                self.peak = floating_profit;
            }
            TrailingState::Idle => {}
            TrailingState::Armed => self.peak = self.peak.max(floating_profit),
        }
    }

    pub fn should_close(&self) -> bool {
        self.state == TrailingState::Armed && self.peak - self.last_profit >= self.margin
    }

    pub fn reset(&mut self) {
        self.state = TrailingState::Idle;
        self.peak = Decimal::ZERO;
        self.last_profit = Decimal::ZERO;
    }

    pub fn state(&self) -> TrailingState {
        self.state
    }

    pub fn peak(&self) -> Decimal {
        self.peak
    }

    /// How far the last observed profit sits below the peak.
    pub fn retrace(&self) -> Decimal {
        match self.state {
            TrailingState::Armed => self.peak - self.last_profit,
            TrailingState::Idle => Decimal::ZERO,
        }
    }
}
