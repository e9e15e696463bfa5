//! # Execution Engine
//!
//! Consumes exactly one valid, unexpired plan and turns it into an on-chain
//! swap. The ordering is the whole safety story:
//!
//! 1. the plan is atomically marked consumed *before* anything touches the
//!    network, so a slow submission can never be doubled;
//! 2. the gas-cap guard runs next — a refusal still leaves the plan consumed
//!    and produces a failed outcome, it is not retried this cycle;
//! 3. submission retries transient RPC failures under the injected policy,
//!    then surfaces `SubmissionFailed` as an alert-worthy outcome.
//!
//! This path deliberately bypasses strategy cooldown and threshold checks:
//! a plan, once approved, is an operator-authorized override.

pub mod builder;

use ethers::types::{Address, H256};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::alert::{AlertSink, TradeLog};
use crate::blockchain::BlockchainManager;
use crate::config::Config;
use crate::errors::{ExecutionError, OutcomeError, PlanError};
use crate::gas_oracle::GasOracleProvider;
use crate::plan_store::{Plan, PlanId, PlanStore};
use crate::types::TradeOutcome;

/// Bounded retry policy for transient submission failures. Injected so the
/// scheduling model stays out of the engine.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl RetryPolicy {
    /// Backoff before the given zero-based retry, doubling up to the cap.
    fn backoff(&self, retry: u32) -> Duration {
        let mut delay = self.initial_backoff;
        for _ in 0..retry {
            delay = delay.saturating_mul(2);
            if delay >= self.max_backoff {
                return self.max_backoff;
            }
        }
        delay.min(self.max_backoff)
    }
}

pub struct ExecutionEngine {
    config: Arc<Config>,
    plans: Arc<PlanStore>,
    chain: Arc<dyn BlockchainManager>,
    gas: Arc<dyn GasOracleProvider>,
    retry: RetryPolicy,
    alerts: Arc<dyn AlertSink>,
    trade_log: Arc<dyn TradeLog>,
}

impl ExecutionEngine {
    pub fn new(
        config: Arc<Config>,
        plans: Arc<PlanStore>,
        chain: Arc<dyn BlockchainManager>,
        gas: Arc<dyn GasOracleProvider>,
        retry: RetryPolicy,
        alerts: Arc<dyn AlertSink>,
        trade_log: Arc<dyn TradeLog>,
    ) -> Self {
        Self {
            config,
            plans,
            chain,
            gas,
            retry,
            alerts,
            trade_log,
        }
    }

    /// Consumes and executes a plan. `PlanNotFound` / `PlanExpired` /
    /// `PlanAlreadyConsumed` are returned verbatim for the operator; every
    /// other path yields a `TradeOutcome`, successful or not.
    #[instrument(skip(self), fields(plan_id = %plan_id))]
    pub async fn execute(&self, plan_id: &PlanId) -> Result<TradeOutcome, PlanError> {
        let plan = self.plans.consume(plan_id)?;
        Ok(self.run_consumed(plan).await)
    }

    /// Clock-explicit variant used by tests and the scheduler.
    pub async fn execute_at(&self, plan_id: &PlanId, now: u64) -> Result<TradeOutcome, PlanError> {
        let plan = self.plans.consume_at(plan_id, now)?;
        Ok(self.run_consumed(plan).await)
    }

    async fn run_consumed(&self, plan: Plan) -> TradeOutcome {
        // No resolvable recipient means the swap would pay out to nowhere;
        // fail the outcome instead of ever submitting such a transaction.
        let result = match self.recipient_for(&plan) {
            Some(recipient) => self.submit_with_retry(&plan, recipient).await,
            None => Err(ExecutionError::SubmissionFailed(format!(
                "no recipient wallet resolvable for strategy {}",
                plan.strategy
            ))),
        };

        match result {
            Ok(tx_hash) => {
                let outcome = TradeOutcome {
                    plan_id: plan.id.clone(),
                    strategy: plan.strategy.clone(),
                    route_label: plan.route.label(),
                    tx_hash: Some(tx_hash),
                    success: true,
                    amount_in: plan.input_amount,
                    min_output: plan.min_output,
                    error: None,
                };
                info!(plan_id = %plan.id, %tx_hash, "trade submitted");
                self.alerts.trade_success(&outcome);
                self.trade_log.record(&outcome);
                outcome
            }
            Err(error) => {
                let classification = match &error {
                    ExecutionError::GasCapExceeded { current, cap } => OutcomeError::GasCapExceeded {
                        current: *current,
                        cap: *cap,
                    },
                    other => OutcomeError::SubmissionFailed(other.to_string()),
                };
                let outcome = TradeOutcome {
                    plan_id: plan.id.clone(),
                    strategy: plan.strategy.clone(),
                    route_label: plan.route.label(),
                    tx_hash: None,
                    success: false,
                    amount_in: plan.input_amount,
                    min_output: plan.min_output,
                    error: Some(classification),
                };
                warn!(
                    plan_id = %plan.id,
                    route = %outcome.route_label,
                    amount_in = %plan.input_amount,
                    error = %error,
                    "trade failed"
                );
                self.alerts.trade_failure(&outcome, &error.to_string());
                self.trade_log.record(&outcome);
                outcome
            }
        }
    }

    /// Strategy wallet first, the desk's own signer as fallback.
    fn recipient_for(&self, plan: &Plan) -> Option<Address> {
        self.config
            .strategy(&plan.strategy)
            .map(|s| s.wallet)
            .or_else(|| self.chain.signer_address())
    }

    /// One full submission attempt: gas guard, allowance preflight, calldata,
    /// raw submission. The gas-cap refusal is non-retriable by construction.
    async fn attempt_submission(
        &self,
        plan: &Plan,
        recipient: Address,
    ) -> Result<H256, ExecutionError> {
        let gas_price = self.gas.gas_price().await?;
        let cap = self.config.gas_cap_wei();
        if gas_price > cap {
            return Err(ExecutionError::GasCapExceeded {
                current: gas_price,
                cap,
            });
        }

        self.preflight_allowance(plan, recipient).await;

        let calldata = builder::build_exact_input_calldata(
            plan.route.encode_path(),
            recipient,
            plan.input_amount,
            plan.min_output,
        )?;

        self.chain
            .submit_transaction(self.config.router, calldata, gas_price)
            .await
            .map_err(|e| ExecutionError::SubmissionFailed(e.to_string()))
    }

    async fn submit_with_retry(&self, plan: &Plan, recipient: Address) -> Result<H256, ExecutionError> {
        let mut last_error = None;
        for attempt in 0..self.retry.max_attempts {
            if attempt > 0 {
                let delay = self.retry.backoff(attempt - 1);
                warn!(
                    plan_id = %plan.id,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retrying submission"
                );
                sleep(delay).await;
            }
            match self.attempt_submission(plan, recipient).await {
                Ok(tx_hash) => return Ok(tx_hash),
                Err(e) if e.is_retriable() => last_error = Some(e),
                Err(e) => return Err(e),
            }
        }
        Err(last_error.unwrap_or_else(|| {
            ExecutionError::SubmissionFailed("no submission attempt made".to_string())
        }))
    }

    /// Reports (but does not fix) an allowance shortfall before submission;
    /// the swap itself will surface the revert.
    async fn preflight_allowance(&self, plan: &Plan, owner: Address) {
        let token_in = plan.route.token_in();
        match self.chain.allowance(token_in, owner, self.config.router).await {
            Ok(allowance) if allowance < plan.input_amount => {
                self.alerts.system(&format!(
                    "plan {}: allowance {} below input {} for {}",
                    plan.id, allowance, plan.input_amount, plan.input_symbol
                ));
            }
            Ok(_) => {}
            Err(e) => {
                warn!(plan_id = %plan.id, error = %e, "allowance preflight failed");
            }
        }
    }
}
