use crate::telemetry::{CloseReport, CloseReporter};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use tracing::info;

/// Realized P&L per basket close, with the gap to the floating figure it fired on.
pub struct CycleLedger {
    records: Vec<CycleRecord>,
    cumulative: Decimal,
    reason_pnl: HashMap<&'static str, Decimal>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleRecord {
    pub closed_at: DateTime<Utc>,
    pub reason: String,
    pub realized_profit: Decimal,
    pub floating_at_trigger: Decimal,
    /// Floating minus realized: spread, slippage and commission paid on the way out.
    pub execution_cost: Decimal,
    pub cumulative_realized: Decimal,
    pub fully_closed: bool,
}

impl CycleLedger {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            cumulative: Decimal::ZERO,
            reason_pnl: HashMap::new(),
        }
    }

    pub fn records(&self) -> &[CycleRecord] {
        &self.records
    }

    pub fn cumulative(&self) -> Decimal {
        self.cumulative
    }

    pub fn reason_pnl(&self, label: &str) -> Decimal {
        self.reason_pnl.get(label).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total_execution_cost(&self) -> Decimal {
        self.records.iter().map(|r| r.execution_cost).sum()
    }

    /// Share of completed closes that booked a profit.
    pub fn win_rate(&self) -> f64 {
        let completed: Vec<_> = self.records.iter().filter(|r| r.fully_closed).collect();
        if completed.is_empty() {
            return 0.0;
        }
        let wins = completed
            .iter()
            .filter(|r| r.realized_profit > Decimal::ZERO)
            .count();
        wins as f64 / completed.len() as f64
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.records)
    }

    pub fn log_summary(&self) {
        info!(
            "=== CYCLE SUMMARY === closes={} realized={:.2} execution_cost={:.2} win_rate={:.1}%",
            self.records.len(),
            self.cumulative,
            self.total_execution_cost(),
            self.win_rate() * 100.0,
        );

        for (label, pnl) in &self.reason_pnl {
            info!("  {label}: P&L = {pnl:.2}");
        }
    }
}

impl Default for CycleLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl CloseReporter for CycleLedger {
    fn on_close(&mut self, report: &CloseReport) {
        let label = report.reason.label();
        self.cumulative += report.realized_profit;
        *self.reason_pnl.entry(label).or_insert(Decimal::ZERO) += report.realized_profit;

        self.records.push(CycleRecord {
            closed_at: report.closed_at,
            reason: label.to_string(),
            realized_profit: report.realized_profit,
            floating_at_trigger: report.floating_at_trigger,
            execution_cost: report.floating_at_trigger - report.realized_profit,
            cumulative_realized: self.cumulative,
            fully_closed: report.fully_closed,
        });
    }
}
