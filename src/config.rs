use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    pub risk: RiskConfig,
    pub hedge: HedgeConfig,
    pub panel: PanelConfig,
    pub simulation: SimulationConfig,
    pub telemetry: TelemetryConfig,
}

/// Basket close conditions. Money thresholds are in account currency.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    pub max_drawdown_percent: f64,   // Hard stop when drawdown < -this (always armed)
    pub drawdown_from_peak: bool,    // Ratchet baseline up to peak equity during a cycle
    pub enable_trailing: bool,
    pub trailing_activation: f64,    // Floating profit that arms the trailing stop
    pub trailing_margin: f64,        // Retrace from peak that closes the basket
    pub fixed_take_profit: f64,      // 0 disables
    pub standalone_mode: bool,
    pub standalone_take_profit: f64, // 0 disables
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeConfig {
    pub use_hedge: bool,          // Lock net exposure with an offsetting order before closing
    pub max_close_attempts: u32,  // Per order, including the first try
    pub retry_delay_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PanelConfig {
    pub trade_mode: String,
    pub symbol: String,
}

/// Paper venue used by the binary. Grid seeding here is a fixed ladder, not a strategy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub starting_balance: f64,
    pub start_price: f64,
    pub spread: f64,
    pub contract_size: f64,
    pub commission_per_lot: f64,
    pub max_slippage: f64,        // Adverse price slippage on each close
    pub reject_probability: f64,  // Chance a close is requoted
    pub margin_per_lot: f64,
    pub volatility: f64,          // Max price step per tick
    pub grid_levels: u32,
    pub grid_step: f64,
    pub lot_size: f64,
    pub tick_ms: u64,
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub discord_webhook_url: Option<String>,
    pub alert_on_close: bool,
    pub alert_on_drawdown: bool,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_drawdown_percent: 8.0,
            drawdown_from_peak: false,
            enable_trailing: true,
            trailing_activation: 100.0,
            trailing_margin: 20.0,
            fixed_take_profit: 0.0,
            standalone_mode: false,
            standalone_take_profit: 0.0,
        }
    }
}

impl Default for HedgeConfig {
    fn default() -> Self {
        Self {
            use_hedge: true,
            max_close_attempts: 3,
            retry_delay_ms: 250,
        }
    }
}

impl Default for PanelConfig {
    fn default() -> Self {
        Self {
            trade_mode: String::new(),
            symbol: "EURUSD".into(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            starting_balance: 10_000.0,
            start_price: 1.10000,
            spread: 0.00010,
            contract_size: 100_000.0,
            commission_per_lot: 7.0,
            max_slippage: 0.00003,
            reject_probability: 0.05,
            margin_per_lot: 1_100.0,
            volatility: 0.00040,
            grid_levels: 4,
            grid_step: 0.00050,
            lot_size: 0.10,
            tick_ms: 500,
            seed: 42,
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
            telegram_bot_token: None,
            telegram_chat_id: None,
            discord_webhook_url: None,
            alert_on_close: true,
            alert_on_drawdown: true,
        }
    }
}

fn env_f64(name: &str) -> Option<f64> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    std::env::var(name)
        .ok()
        .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes"))
}

fn env_secret(name: &str, placeholder: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty() && v != placeholder)
}

impl Config {
    /// Load configuration from environment variables (.env file) with defaults.
    ///
    /// Risk options:
    ///   MAX_DRAWDOWN_PERCENT, DRAWDOWN_FROM_PEAK, ENABLE_TRAILING, TRAILING_MARGIN,
    ///   TRAILING_ACTIVATION, FIXED_TAKE_PROFIT, STANDALONE_MODE, STANDALONE_TAKE_PROFIT
    ///
    /// Close execution:
    ///   USE_HEDGE, MAX_CLOSE_ATTEMPTS, CLOSE_RETRY_DELAY_MS
    ///
    /// Other:
    ///   TRADE_MODE, SYMBOL, STARTING_BALANCE, SIM_SEED
    ///   TELEGRAM_BOT_TOKEN, TELEGRAM_CHAT_ID, DISCORD_WEBHOOK_URL, RUST_LOG
    pub fn load_or_default() -> Self {
        let _ = dotenv::dotenv();

        let mut config = Self::default();

        let risk = &mut config.risk;
        if let Some(v) = env_f64("MAX_DRAWDOWN_PERCENT") {
            risk.max_drawdown_percent = v;
        }
        if let Some(v) = env_bool("DRAWDOWN_FROM_PEAK") {
            risk.drawdown_from_peak = v;
        }
        if let Some(v) = env_bool("ENABLE_TRAILING") {
            risk.enable_trailing = v;
        }
        if let Some(v) = env_f64("TRAILING_MARGIN") {
            risk.trailing_margin = v;
        }
        if let Some(v) = env_f64("TRAILING_ACTIVATION") {
            risk.trailing_activation = v;
        }
        if let Some(v) = env_f64("FIXED_TAKE_PROFIT") {
            risk.fixed_take_profit = v;
        }
        if let Some(v) = env_bool("STANDALONE_MODE") {
            risk.standalone_mode = v;
        }
        if let Some(v) = env_f64("STANDALONE_TAKE_PROFIT") {
            risk.standalone_take_profit = v;
        }

        if let Some(v) = env_bool("USE_HEDGE") {
            config.hedge.use_hedge = v;
        }
        if let Ok(v) = std::env::var("MAX_CLOSE_ATTEMPTS") {
            config.hedge.max_close_attempts = v.trim().parse().unwrap_or(config.hedge.max_close_attempts);
        }
        if let Ok(v) = std::env::var("CLOSE_RETRY_DELAY_MS") {
            config.hedge.retry_delay_ms = v.trim().parse().unwrap_or(config.hedge.retry_delay_ms);
        }

        if let Ok(mode) = std::env::var("TRADE_MODE") {
            config.panel.trade_mode = mode;
        }
        if let Ok(symbol) = std::env::var("SYMBOL") {
            if !symbol.is_empty() {
                config.panel.symbol = symbol;
            }
        }

        if let Some(v) = env_f64("STARTING_BALANCE") {
            config.simulation.starting_balance = v;
        }
        if let Ok(v) = std::env::var("SIM_SEED") {
            config.simulation.seed = v.trim().parse().unwrap_or(config.simulation.seed);
        }

        config.telemetry.telegram_bot_token = env_secret("TELEGRAM_BOT_TOKEN", "your_bot_token");
        config.telemetry.telegram_chat_id = env_secret("TELEGRAM_CHAT_ID", "your_chat_id");
        config.telemetry.discord_webhook_url = env_secret("DISCORD_WEBHOOK_URL", "your_webhook_url");

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.telemetry.log_level = level;
        }

        config
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let risk = &self.risk;
        anyhow::ensure!(
            risk.max_drawdown_percent >= 0.0,
            "max_drawdown_percent must not be negative"
        );
        anyhow::ensure!(
            risk.fixed_take_profit >= 0.0 && risk.standalone_take_profit >= 0.0,
            "take-profit targets must not be negative (use 0 to disable)"
        );
        anyhow::ensure!(
            risk.trailing_activation >= 0.0,
            "trailing_activation must not be negative"
        );
        if risk.enable_trailing {
            anyhow::ensure!(
                risk.trailing_margin > 0.0,
                "trailing_margin must be positive when trailing is enabled"
            );
        }
        anyhow::ensure!(
            self.hedge.max_close_attempts >= 1,
            "max_close_attempts must be at least 1"
        );
        let sim = &self.simulation;
        anyhow::ensure!(
            (0.0..1.0).contains(&sim.reject_probability),
            "reject_probability must be in [0, 1)"
        );
        anyhow::ensure!(sim.starting_balance > 0.0, "starting_balance must be positive");
        anyhow::ensure!(sim.tick_ms > 0, "tick_ms must be positive");
        Ok(())
    }
}
