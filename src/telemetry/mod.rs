pub mod alerts;
pub mod panel;
pub mod pnl;

use crate::risk::risk_controller::CloseReason;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::cell::RefCell;
use std::rc::Rc;

/// What a reporting collaborator learns about one executed close.
#[derive(Debug, Clone, Serialize)]
pub struct CloseReport {
    pub reason: CloseReason,
    /// Booked result returned by the close itself.
    pub realized_profit: Decimal,
    /// Mark-to-market figure the trigger was evaluated on. Informational only.
    pub floating_at_trigger: Decimal,
    pub closed_at: DateTime<Utc>,
    pub price: Decimal,
    pub fully_closed: bool,
    pub remaining_orders: usize,
}

pub trait CloseReporter {
    fn on_close(&mut self, report: &CloseReport);
}

/// Lets the owner keep a handle to a reporter that the controller also drives.
impl<T: CloseReporter + ?Sized> CloseReporter for Rc<RefCell<T>> {
    fn on_close(&mut self, report: &CloseReport) {
        self.borrow_mut().on_close(report);
    }
}
