use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::order::{OrderSide, Ticket};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GridOrder {
    pub ticket: Ticket,
    pub side: OrderSide,
    pub lots: Decimal,
    pub open_price: Decimal,
    pub opened_at: DateTime<Utc>,
    /// True for offsetting orders placed while closing the basket.
    pub hedge: bool,
}

impl GridOrder {
    pub fn signed_lots(&self) -> Decimal {
        self.lots * self.side.sign()
    }
}

/// Open grid orders of one trading cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Basket {
    pub cycle_id: Uuid,
    pub orders: Vec<GridOrder>,
    pub opened_at: DateTime<Utc>,
}

impl Basket {
    pub fn new(orders: Vec<GridOrder>, opened_at: DateTime<Utc>) -> Self {
        Self {
            cycle_id: Uuid::new_v4(),
            orders,
            opened_at,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn tickets(&self) -> Vec<Ticket> {
        self.orders.iter().map(|o| o.ticket).collect()
    }

    pub fn contains(&self, ticket: Ticket) -> bool {
        self.orders.iter().any(|o| o.ticket == ticket)
    }

    /// Net exposure in lots. Positive = net long.
    pub fn net_lots(&self) -> Decimal {
        self.orders.iter().map(GridOrder::signed_lots).sum()
    }

    pub fn count_side(&self, side: OrderSide) -> usize {
        self.orders.iter().filter(|o| o.side == side).count()
    }

    pub fn push(&mut self, order: GridOrder) {
        self.orders.push(order);
    }

    pub fn remove(&mut self, ticket: Ticket) -> Option<GridOrder> {
        let idx = self.orders.iter().position(|o| o.ticket == ticket)?;
        Some(self.orders.remove(idx))
    }

    /// Keep only orders whose ticket satisfies `keep`. Returns how many were dropped.
    pub fn retain_tickets(&mut self, mut keep: impl FnMut(Ticket) -> bool) -> usize {
        let before = self.orders.len();
        self.orders.retain(|o| keep(o.ticket));
        before - self.orders.len()
    }
}
