use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Broker-assigned order identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket(pub u64);

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn opposite(&self) -> Self {
        match self {
            OrderSide::Buy => OrderSide::Sell,
            OrderSide::Sell => OrderSide::Buy,
        }
    }

    /// +1 for long exposure, -1 for short.
    pub fn sign(&self) -> Decimal {
        match self {
            OrderSide::Buy => Decimal::ONE,
            OrderSide::Sell => Decimal::NEGATIVE_ONE,
        }
    }
}

/// Result of closing one order at the venue.
///
/// `profit` is the booked amount from the actual fill, net of commission and swap.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloseFill {
    pub ticket: Ticket,
    pub close_price: Decimal,
    pub gross_profit: Decimal,
    pub commission: Decimal,
    pub swap: Decimal,
    pub closed_at: DateTime<Utc>,
}

impl CloseFill {
    pub fn net_profit(&self) -> Decimal {
        self.gross_profit - self.commission + self.swap
    }
}
