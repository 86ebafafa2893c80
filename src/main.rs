use basketguard::config::{Config, SimulationConfig};
use basketguard::execution::hedge_close::HedgeClose;
use basketguard::execution::paper::PaperBroker;
use basketguard::execution::{run_blocking, AccountFeed, TradeExecutor};
use basketguard::models::basket::Basket;
use basketguard::models::order::OrderSide;
use basketguard::models::to_decimal;
use basketguard::risk::basket_lifecycle::BasketLifecycle;
use basketguard::risk::recovery::RecoveryAccumulator;
use basketguard::risk::risk_controller::{RiskController, TickOutcome};
use basketguard::telemetry::alerts::AlertManager;
use basketguard::telemetry::panel::{PanelStats, PositionCounts};
use basketguard::telemetry::pnl::CycleLedger;

use chrono::Utc;
use rust_decimal::Decimal;
use std::cell::RefCell;
use std::rc::Rc;
use tracing::{debug, error, info, warn};

const SUMMARY_EVERY_TICKS: u64 = 120;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = Config::load_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.telemetry.log_level)),
        )
        .with_target(false)
        .init();

    info!("================================================");
    info!("  BASKETGUARD v0.1.0 (paper venue)");
    info!("  Basket risk control and realized-profit recovery");
    info!("================================================");

    config.validate()?;
    info!(
        "Risk: max_dd={:.1}% trailing={} (act={:.2} margin={:.2}) fixed_tp={:.2} standalone={} ({:.2})",
        config.risk.max_drawdown_percent,
        config.risk.enable_trailing,
        config.risk.trailing_activation,
        config.risk.trailing_margin,
        config.risk.fixed_take_profit,
        config.risk.standalone_mode,
        config.risk.standalone_take_profit,
    );

    // === Initialize components ===
    let broker = PaperBroker::new(&config.simulation);
    let hedge = HedgeClose::new(broker, config.hedge.clone());
    let mut controller = RiskController::new(&config.risk, hedge, RecoveryAccumulator::new());

    let ledger = Rc::new(RefCell::new(CycleLedger::new()));
    let panel = Rc::new(RefCell::new(PanelStats::new(&config.panel)));
    controller.add_reporter(ledger.clone());
    controller.add_reporter(panel.clone());

    let alert_mgr = AlertManager::new(config.telemetry.clone());
    if !alert_mgr.is_configured() {
        info!("No alert channel configured; close alerts go to the log only");
    }
    let (alert_reporter, alert_task) = alert_mgr.spawn();
    controller.add_reporter(alert_reporter);

    let mut lifecycle = BasketLifecycle::from_config(&config.risk);
    let mut seeder = GridSeeder::new(&config.simulation);

    // Nothing survives a restart on the paper venue, but run the same startup path a live venue would.
    let dropped = lifecycle.reconcile(&controller.executor().open_tickets());
    if dropped > 0 {
        warn!("Startup reconcile dropped {dropped} stale orders");
    }

    let mut interval =
        tokio::time::interval(tokio::time::Duration::from_millis(config.simulation.tick_ms));
    let mut trading_enabled = true;
    let mut ticks: u64 = 0;

    // Created once so a signal that lands while a tick is blocked in a close is not lost.
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!("Engine running. Press Ctrl+C to stop.");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                ticks += 1;
                controller.executor_mut().random_walk();
                let snapshot = controller.executor().snapshot();

                let outcome = run_blocking(|| controller.on_tick(&mut lifecycle, &snapshot));
                match &outcome {
                    TickOutcome::Idle => {
                        if trading_enabled {
                            seeder.open_basket(&mut controller, &mut lifecycle);
                        }
                    }
                    TickOutcome::Hold { floating_profit, drawdown_pct } => {
                        debug!(
                            "Hold: floating={:.2} drawdown={:.1}%",
                            floating_profit.round_dp(2),
                            drawdown_pct.round_dp(1)
                        );
                        seeder.extend_basket(&mut controller, &mut lifecycle);
                    }
                    TickOutcome::Closed { realized_profit, .. } => {
                        info!(
                            "Cycle closed: realized={:.2} recovered={:.2}",
                            realized_profit.round_dp(2),
                            controller.recovery().total().round_dp(2)
                        );
                    }
                    TickOutcome::PartiallyClosed { remaining, .. } => {
                        warn!("{remaining} orders left open; retrying next tick");
                    }
                }

                if !outcome.allows_trading() && trading_enabled {
                    error!("Drawdown protection engaged; no new baskets will be opened");
                    trading_enabled = false;
                }

                if ticks % SUMMARY_EVERY_TICKS == 0 {
                    let panel = panel.borrow();
                    info!("{}", panel.system_line(&snapshot));
                    info!("{}", panel.positions_line(PositionCounts::of(lifecycle.basket())));
                    ledger.borrow().log_summary();
                }
            }
            _ = &mut shutdown => {
                info!("Shutdown signal received. Cleaning up...");
                break;
            }
        }
    }

    ledger.borrow().log_summary();
    info!(
        "Recovered total: {:.2} over {} closes ({} cycles completed)",
        controller.recovery().total().round_dp(2),
        controller.recovery().close_count(),
        lifecycle.completed_cycles()
    );

    // Dropping the controller closes the alert channel so the task can drain and exit.
    drop(controller);
    if let Err(e) = alert_task.await {
        error!("Alert task failed: {e}");
    }

    info!("BASKETGUARD shut down cleanly.");
    Ok(())
}

/// Fixed ladder used to give the paper engine something to manage.
///
/// Opens a buy/sell pair, then adds one order against the move each time price travels
/// a grid step away from the last fill, up to `grid_levels` additions.
struct GridSeeder {
    lots: Decimal,
    step: Decimal,
    max_additions: u32,
    additions: u32,
    last_price: Decimal,
}

impl GridSeeder {
    fn new(config: &SimulationConfig) -> Self {
        Self {
            lots: to_decimal(config.lot_size),
            step: to_decimal(config.grid_step),
            max_additions: config.grid_levels,
            additions: 0,
            last_price: Decimal::ZERO,
        }
    }

    fn open_basket<E>(&mut self, controller: &mut RiskController<E>, lifecycle: &mut BasketLifecycle)
    where
        E: TradeExecutor + AccountFeed,
    {
        let baseline = controller.executor().snapshot().equity;
        let executor = controller.executor_mut();

        let mut orders = Vec::with_capacity(2);
        for side in [OrderSide::Buy, OrderSide::Sell] {
            match executor.open_market(side, self.lots, "grid seed") {
                Ok(order) => orders.push(order),
                Err(e) => warn!("Grid seed {side:?} failed: {e}"),
            }
        }
        let Some(first) = orders.first() else {
            return;
        };
        self.last_price = first.open_price;
        self.additions = 0;

        if let Err(e) = lifecycle.open(Basket::new(orders, Utc::now()), baseline) {
            error!("Could not open basket: {e}");
        }
    }

    fn extend_basket<E>(&mut self, controller: &mut RiskController<E>, lifecycle: &mut BasketLifecycle)
    where
        E: TradeExecutor + AccountFeed,
    {
        if self.additions >= self.max_additions || self.step <= Decimal::ZERO {
            return;
        }
        let Some(basket) = lifecycle.basket_mut() else {
            return;
        };

        let executor = controller.executor_mut();
        let current = executor.snapshot().bid;
        let moved = current - self.last_price;
        if moved.abs() < self.step {
            return;
        }
        // Average against the move.
        let side = if moved < Decimal::ZERO {
            OrderSide::Buy
        } else {
            OrderSide::Sell
        };
        match executor.open_market(side, self.lots, "grid level") {
            Ok(order) => {
                self.last_price = current;
                self.additions += 1;
                info!(
                    "Grid level {} added: {} {side:?} {} @ {}",
                    self.additions, order.ticket, order.lots, order.open_price
                );
                basket.push(order);
            }
            Err(e) => warn!("Grid level {side:?} failed: {e}"),
        }
    }
}
