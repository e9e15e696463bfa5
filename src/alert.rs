//! Operator notification and durable trade logging seams. Both are traits so
//! the scheduler and execution engine stay testable; production wires the
//! tracing-backed sink and an append-only JSONL log.

use chrono::Utc;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing::{error, info, warn};

use crate::types::TradeOutcome;

/// Fire-and-forget operator notifications. Implementations must never block
/// the trading path on delivery.
pub trait AlertSink: Send + Sync {
    fn trade_success(&self, outcome: &TradeOutcome);
    fn trade_failure(&self, outcome: &TradeOutcome, reason: &str);
    fn system(&self, message: &str);
}

/// Durable record of every consumed plan, success or failure.
pub trait TradeLog: Send + Sync {
    fn record(&self, outcome: &TradeOutcome);
}

/// Default sink: structured log events at the appropriate level.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
    fn trade_success(&self, outcome: &TradeOutcome) {
        info!(
            plan_id = %outcome.plan_id,
            strategy = %outcome.strategy,
            route = %outcome.route_label,
            tx_hash = ?outcome.tx_hash,
            "trade executed"
        );
    }

    fn trade_failure(&self, outcome: &TradeOutcome, reason: &str) {
        error!(
            plan_id = %outcome.plan_id,
            strategy = %outcome.strategy,
            route = %outcome.route_label,
            reason,
            "trade failed"
        );
    }

    fn system(&self, message: &str) {
        warn!("operator alert: {message}");
    }
}

/// Append-only JSONL trade log. One line per outcome; a write failure is
/// logged and swallowed so bookkeeping can never wedge execution.
#[derive(Debug)]
pub struct JsonlTradeLog {
    path: PathBuf,
    file: Mutex<()>,
}

impl JsonlTradeLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: Mutex::new(()),
        }
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let _guard = self.file.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{line}")
    }
}

impl TradeLog for JsonlTradeLog {
    fn record(&self, outcome: &TradeOutcome) {
        let entry = serde_json::json!({
            "ts": Utc::now().to_rfc3339(),
            "plan_id": outcome.plan_id.as_str(),
            "strategy": outcome.strategy,
            "route": outcome.route_label,
            "tx_hash": outcome.tx_hash.map(|h| format!("{h:#x}")),
            "success": outcome.success,
            "amount_in": outcome.amount_in.to_string(),
            "min_output": outcome.min_output.to_string(),
            "error": outcome.error.as_ref().map(|e| e.to_string()),
        });
        if let Err(e) = self.append(&entry.to_string()) {
            error!(path = %self.path.display(), error = %e, "trade log write failed");
        }
    }
}

/// No-op log for setups that only want alerts.
#[derive(Debug, Default)]
pub struct NullTradeLog;

impl TradeLog for NullTradeLog {
    fn record(&self, _outcome: &TradeOutcome) {}
}
