//! # Strategy Engine
//!
//! One engine per configured strategy, each owning an independent state
//! machine:
//!
//! ```text
//! Idle --trigger fires--> (trade) --success--> CooldownActive --expiry--> Idle
//! any --balance below floor--> Paused --balance restored--> Idle
//! ```
//!
//! Every evaluation cycle recomputes the mid price from scratch; a stale or
//! missing price skips the cycle without changing state. Disabling a strategy
//! stops evaluation only — in-flight plans and operator commands are untouched.

pub mod scheduler;

use async_trait::async_trait;
use ethers::types::Address;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::alert::AlertSink;
use crate::blockchain::BlockchainManager;
use crate::config::{Config, StrategySettings, TriggerRule};
use crate::decimals::from_wei;
use crate::errors::{PriceError, StrategyError};
use crate::execution::ExecutionEngine;
use crate::plan_store::Plan;
use crate::planner::Planner;
use crate::price_engine::ReferencePriceEngine;
use crate::types::{StrategyMode, TradeOutcome};

/// Stable-denominated balance lookups, abstracted so the state machine tests
/// without a chain.
#[async_trait]
pub trait BalanceProvider: Send + Sync {
    async fn stable_balance(&self, wallet: Address) -> Result<Decimal, StrategyError>;
}

/// Production balance provider reading the stable token's ERC-20 balance.
pub struct ChainBalanceProvider {
    chain: Arc<dyn BlockchainManager>,
    stable_address: Address,
    stable_decimals: u8,
}

impl ChainBalanceProvider {
    pub fn new(chain: Arc<dyn BlockchainManager>, config: &Config) -> Result<Self, StrategyError> {
        let stable = config.asset(&config.stable_symbol).map_err(|e| {
            StrategyError::BalanceCheck {
                strategy: "*".into(),
                reason: e.to_string(),
            }
        })?;
        Ok(Self {
            chain,
            stable_address: stable.address,
            stable_decimals: stable.decimals,
        })
    }
}

#[async_trait]
impl BalanceProvider for ChainBalanceProvider {
    async fn stable_balance(&self, wallet: Address) -> Result<Decimal, StrategyError> {
        let raw = self
            .chain
            .erc20_balance(self.stable_address, wallet)
            .await
            .map_err(|e| StrategyError::BalanceCheck {
                strategy: "*".into(),
                reason: e.to_string(),
            })?;
        from_wei(raw, self.stable_decimals).map_err(StrategyError::Price)
    }
}

/// Where a strategy currently sits in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyPhase {
    Idle,
    /// No trades until the given unix timestamp.
    CooldownActive { until: u64 },
    /// Funding fell below the floor; waiting for replenishment.
    Paused,
}

#[derive(Debug)]
struct StrategyState {
    enabled: bool,
    phase: StrategyPhase,
    /// Mid at the moment the last trade triggered; the dip trigger's anchor.
    last_trigger_price: Option<Decimal>,
}

/// What one evaluation cycle did, for logs and tests.
#[derive(Debug)]
pub enum CycleAction {
    Disabled,
    Paused { balance: Decimal, floor: Decimal },
    CoolingDown { until: u64 },
    PriceUnavailable(String),
    NotTriggered { mid: Decimal },
    SlippageTooHigh { pct: Decimal, bound: Decimal },
    Proposed(Plan),
    Executed(TradeOutcome),
}

pub struct StrategyEngine {
    settings: StrategySettings,
    prices: Arc<ReferencePriceEngine>,
    planner: Arc<Planner>,
    execution: Arc<ExecutionEngine>,
    balances: Arc<dyn BalanceProvider>,
    alerts: Arc<dyn AlertSink>,
    state: Mutex<StrategyState>,
}

impl StrategyEngine {
    pub fn new(
        settings: StrategySettings,
        prices: Arc<ReferencePriceEngine>,
        planner: Arc<Planner>,
        execution: Arc<ExecutionEngine>,
        balances: Arc<dyn BalanceProvider>,
        alerts: Arc<dyn AlertSink>,
    ) -> Self {
        let enabled = settings.enabled_at_start.unwrap_or(true);
        Self {
            settings,
            prices,
            planner,
            execution,
            balances,
            alerts,
            state: Mutex::new(StrategyState {
                enabled,
                phase: StrategyPhase::Idle,
                last_trigger_price: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.settings.id
    }

    pub fn poll_interval_secs(&self) -> u64 {
        self.settings.poll_interval_secs
    }

    pub async fn is_enabled(&self) -> bool {
        self.state.lock().await.enabled
    }

    pub async fn phase(&self) -> StrategyPhase {
        self.state.lock().await.phase
    }

    /// Enables evaluation. Does not clear cooldown or the dip anchor.
    pub async fn enable(&self) {
        let mut state = self.state.lock().await;
        state.enabled = true;
        info!(strategy = %self.settings.id, "strategy enabled");
    }

    /// Disables evaluation. Already-proposed plans stay executable.
    pub async fn disable(&self) {
        let mut state = self.state.lock().await;
        state.enabled = false;
        info!(strategy = %self.settings.id, "strategy disabled");
    }

    /// Operator override of the cooldown: forces the phase directly.
    pub async fn set_cooldown_until(&self, until: Option<u64>) {
        let mut state = self.state.lock().await;
        state.phase = match until {
            Some(until) => StrategyPhase::CooldownActive { until },
            None => StrategyPhase::Idle,
        };
        info!(strategy = %self.settings.id, ?until, "cooldown overridden");
    }

    pub async fn evaluate(&self) -> Result<CycleAction, StrategyError> {
        self.evaluate_at(crate::now_ts()).await
    }

    /// Runs one full evaluation cycle at the given clock reading.
    #[instrument(skip(self), fields(strategy = %self.settings.id))]
    pub async fn evaluate_at(&self, now: u64) -> Result<CycleAction, StrategyError> {
        {
            let state = self.state.lock().await;
            if !state.enabled {
                return Ok(CycleAction::Disabled);
            }
        }

        // Funding floor first: a paused strategy stays paused until the
        // stable balance is back above the floor, regardless of triggers.
        let balance = self
            .balances
            .stable_balance(self.settings.wallet)
            .await
            .map_err(|e| StrategyError::BalanceCheck {
                strategy: self.settings.id.clone(),
                reason: e.to_string(),
            })?;
        {
            let mut state = self.state.lock().await;
            if balance < self.settings.min_balance {
                if state.phase != StrategyPhase::Paused {
                    warn!(
                        strategy = %self.settings.id,
                        %balance,
                        floor = %self.settings.min_balance,
                        "pausing: stable balance below floor"
                    );
                    self.alerts.system(&format!(
                        "strategy {} paused: balance {} below floor {}",
                        self.settings.id, balance, self.settings.min_balance
                    ));
                    state.phase = StrategyPhase::Paused;
                }
                return Ok(CycleAction::Paused {
                    balance,
                    floor: self.settings.min_balance,
                });
            }
            if state.phase == StrategyPhase::Paused {
                info!(strategy = %self.settings.id, %balance, "balance restored, resuming");
                state.phase = StrategyPhase::Idle;
            }
            if let StrategyPhase::CooldownActive { until } = state.phase {
                if now < until {
                    return Ok(CycleAction::CoolingDown { until });
                }
                state.phase = StrategyPhase::Idle;
            }
        }

        let mid = match self.prices.mid_price(&self.settings.asset).await {
            Ok(reference) => reference.mid,
            Err(PriceError::StaleReference(s)) | Err(PriceError::NoLiquidity(s)) => {
                debug!(strategy = %self.settings.id, asset = %s, "price unavailable, skipping cycle");
                return Ok(CycleAction::PriceUnavailable(s));
            }
            Err(e) => return Err(e.into()),
        };

        let triggered = {
            let state = self.state.lock().await;
            self.trigger_fires(&state, mid)
        };
        if !triggered {
            return Ok(CycleAction::NotTriggered { mid });
        }

        let preview = self.planner.preview_at(&self.settings.id, None, now).await?;
        if preview.estimate.slippage_pct > self.settings.max_slippage_pct {
            debug!(
                strategy = %self.settings.id,
                slippage_pct = %preview.estimate.slippage_pct,
                bound = %self.settings.max_slippage_pct,
                "trigger fired but slippage exceeds bound"
            );
            return Ok(CycleAction::SlippageTooHigh {
                pct: preview.estimate.slippage_pct,
                bound: self.settings.max_slippage_pct,
            });
        }

        match self.settings.mode {
            StrategyMode::Interactive => {
                self.alerts.system(&format!(
                    "strategy {}: trigger fired at mid {}, plan {} awaiting approval ({} {} -> min {} out, est. slippage {}%)",
                    self.settings.id,
                    mid,
                    preview.plan.id,
                    preview.plan.input_amount,
                    preview.plan.input_symbol,
                    preview.plan.min_output,
                    preview.estimate.slippage_pct.round_dp(3),
                ));
                self.arm_cooldown(now, mid).await;
                Ok(CycleAction::Proposed(preview.plan))
            }
            StrategyMode::Unattended => {
                let outcome = self.execution.execute_at(&preview.plan.id, now).await?;
                if outcome.success {
                    self.arm_cooldown(now, mid).await;
                }
                Ok(CycleAction::Executed(outcome))
            }
        }
    }

    fn trigger_fires(&self, state: &StrategyState, mid: Decimal) -> bool {
        match &self.settings.trigger {
            TriggerRule::BuyBelow { price } => mid <= *price,
            TriggerRule::DipFromLast { pct } => match state.last_trigger_price {
                // First evaluation anchors unconditionally.
                None => true,
                Some(last) => {
                    let threshold = last * (Decimal::ONE_HUNDRED - *pct) / Decimal::ONE_HUNDRED;
                    mid <= threshold
                }
            },
            TriggerRule::Manual => false,
        }
    }

    async fn arm_cooldown(&self, now: u64, mid: Decimal) {
        let mut state = self.state.lock().await;
        state.last_trigger_price = Some(mid);
        state.phase = StrategyPhase::CooldownActive {
            until: now + self.settings.cooldown_secs,
        };
    }
}
