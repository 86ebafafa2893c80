use crate::config::TelemetryConfig;
use crate::telemetry::{CloseReport, CloseReporter};
use anyhow::Result;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Sends alerts via Telegram or Discord webhooks.
pub struct AlertManager {
    config: TelemetryConfig,
    http: reqwest::Client,
}

impl AlertManager {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    pub fn is_configured(&self) -> bool {
        let telegram = self.config.telegram_bot_token.is_some() && self.config.telegram_chat_id.is_some();
        telegram || self.config.discord_webhook_url.is_some()
    }

    /// Send an alert message.
    pub async fn send(&self, message: &str) {
        info!("ALERT: {message}");

        if let Err(e) = self.send_telegram(message).await {
            error!("Telegram alert failed: {e}");
        }

        if let Err(e) = self.send_discord(message).await {
            error!("Discord alert failed: {e}");
        }
    }

    async fn send_telegram(&self, message: &str) -> Result<()> {
        let (Some(token), Some(chat_id)) = (&self.config.telegram_bot_token, &self.config.telegram_chat_id) else {
            return Ok(());
        };

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let body = serde_json::json!({
            "chat_id": chat_id,
            "text": format!("BASKETGUARD: {message}"),
        });

        self.http.post(&url).json(&body).send().await?.error_for_status()?;
        Ok(())
    }

    async fn send_discord(&self, message: &str) -> Result<()> {
        let Some(webhook_url) = &self.config.discord_webhook_url else {
            return Ok(());
        };

        let body = serde_json::json!({
            "content": format!("**BASKETGUARD**: {message}")
        });

        self.http.post(webhook_url).json(&body).send().await?.error_for_status()?;
        Ok(())
    }

    /// Move the manager onto a task and hand back a synchronous reporter feeding it.
    pub fn spawn(self) -> (AlertReporter, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        let reporter = AlertReporter {
            tx,
            alert_on_close: self.config.alert_on_close,
            alert_on_drawdown: self.config.alert_on_drawdown,
        };
        let handle = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                self.send(&message).await;
            }
        });
        (reporter, handle)
    }
}

/// Close reporter that queues alert text for the `AlertManager` task.
pub struct AlertReporter {
    tx: mpsc::UnboundedSender<String>,
    alert_on_close: bool,
    alert_on_drawdown: bool,
}

impl AlertReporter {
    fn message_for(&self, report: &CloseReport) -> Option<String> {
        let wanted = if report.reason.is_protective() {
            self.alert_on_drawdown
        } else {
            self.alert_on_close
        };
        if !wanted {
            return None;
        }
        let mut msg = format!(
            "{} | realized {:.2} (floating was {:.2})",
            report.reason,
            report.realized_profit.round_dp(2),
            report.floating_at_trigger.round_dp(2)
        );
        if !report.fully_closed {
            msg.push_str(&format!(" | {} orders still open", report.remaining_orders));
        }
        Some(msg)
    }
}

impl CloseReporter for AlertReporter {
    fn on_close(&mut self, report: &CloseReport) {
        if let Some(msg) = self.message_for(report) {
            if self.tx.send(msg).is_err() {
                warn!("Alert task stopped; dropping close alert");
            }
        }
    }
}
