pub mod hedge_close;
pub mod paper;

use crate::models::account::AccountSnapshot;
use crate::models::basket::GridOrder;
use crate::models::order::{CloseFill, OrderSide, Ticket};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("requote on {0}")]
    Requote(Ticket),

    #[error("trade server busy")]
    ServerBusy,

    #[error("trade context busy")]
    ContextBusy,

    #[error("off quotes")]
    OffQuotes,

    #[error("request timed out")]
    Timeout,

    #[error("order rejected: {0}")]
    Rejected(String),

    #[error("unknown ticket {0}")]
    UnknownTicket(Ticket),

    #[error("market closed")]
    MarketClosed,
}

impl ExecutionError {
    /// Whether the same request may succeed if simply sent again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ExecutionError::Requote(_)
                | ExecutionError::ServerBusy
                | ExecutionError::ContextBusy
                | ExecutionError::OffQuotes
                | ExecutionError::Timeout
        )
    }
}

/// Blocking round-trips to the trade venue.
pub trait TradeExecutor {
    /// Open a market order. Used for hedge orders during a basket close.
    fn open_market(
        &mut self,
        side: OrderSide,
        lots: Decimal,
        comment: &str,
    ) -> Result<GridOrder, ExecutionError>;

    /// Close an order at market and report the booked result of the fill.
    fn close_order(&mut self, ticket: Ticket) -> Result<CloseFill, ExecutionError>;

    /// Tickets the venue currently reports as open.
    fn open_tickets(&self) -> Vec<Ticket>;
}

/// Read-only account and price figures.
pub trait AccountFeed {
    fn snapshot(&self) -> AccountSnapshot;
}

/// Run blocking venue work from async code without stalling the rest of the runtime.
///
/// On a multi-threaded tokio runtime the worker hands its queued tasks to another thread
/// first. Anywhere else `f` simply runs in place.
pub fn run_blocking<T>(f: impl FnOnce() -> T) -> T {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Duration;

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_blocking_work_leaves_runtime_running() {
        let (tx, rx) = mpsc::channel();
        tokio::spawn(async move {
            let _ = tx.send(());
        });
        let delivered = run_blocking(|| rx.recv_timeout(Duration::from_secs(5)).is_ok());
        assert!(delivered);
    }

    #[tokio::test]
    async fn test_blocking_work_on_current_thread_runtime() {
        assert_eq!(run_blocking(|| 7), 7);
    }

    #[test]
    fn test_blocking_work_outside_runtime() {
        assert_eq!(run_blocking(|| "done"), "done");
    }

    #[test]
    fn test_transient_classification() {
        assert!(ExecutionError::Requote(Ticket(1)).is_transient());
        assert!(ExecutionError::ServerBusy.is_transient());
        assert!(ExecutionError::Timeout.is_transient());
        assert!(!ExecutionError::Rejected("no money".into()).is_transient());
        assert!(!ExecutionError::UnknownTicket(Ticket(2)).is_transient());
        assert!(!ExecutionError::MarketClosed.is_transient());
    }
}
