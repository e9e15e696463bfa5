//! Drives each strategy engine on its own tokio task at its configured poll
//! interval. Evaluation errors are logged and the loop continues; only
//! cancellation stops a strategy task.

use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::StrategyEngine;

pub struct StrategyScheduler {
    engines: Vec<Arc<StrategyEngine>>,
    shutdown: CancellationToken,
}

impl StrategyScheduler {
    pub fn new(engines: Vec<Arc<StrategyEngine>>, shutdown: CancellationToken) -> Self {
        Self { engines, shutdown }
    }

    pub fn engines(&self) -> &[Arc<StrategyEngine>] {
        &self.engines
    }

    /// Spawns one evaluation loop per strategy and returns the task handles.
    pub fn spawn(&self) -> Vec<JoinHandle<()>> {
        self.engines
            .iter()
            .map(|engine| {
                let engine = Arc::clone(engine);
                let shutdown = self.shutdown.clone();
                tokio::spawn(async move {
                    let period = Duration::from_secs(engine.poll_interval_secs().max(1));
                    let mut ticker = tokio::time::interval(period);
                    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
                    info!(strategy = %engine.id(), period_secs = period.as_secs(), "strategy loop started");
                    loop {
                        tokio::select! {
                            _ = shutdown.cancelled() => {
                                info!(strategy = %engine.id(), "strategy loop stopped");
                                break;
                            }
                            _ = ticker.tick() => {
                                match engine.evaluate().await {
                                    Ok(action) => {
                                        debug!(strategy = %engine.id(), ?action, "cycle complete");
                                    }
                                    Err(e) => {
                                        error!(strategy = %engine.id(), error = %e, "cycle failed");
                                    }
                                }
                            }
                        }
                    }
                })
            })
            .collect()
    }
}
