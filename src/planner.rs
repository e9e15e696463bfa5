//! Bridges a slippage preview into a stored, executable plan. Both the
//! trigger loop and the operator facade go through here, so a plan always
//! carries the same estimate it was previewed with.

use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::Config;
use crate::decimals::to_wei;
use crate::errors::{PriceError, StrategyError};
use crate::plan_store::{Plan, PlanStore};
use crate::slippage::{SlippageEstimate, SlippageEstimator};

/// A stored plan together with the estimate that produced it.
#[derive(Debug, Clone)]
pub struct PlanPreview {
    pub plan: Plan,
    pub estimate: SlippageEstimate,
}

pub struct Planner {
    config: Arc<Config>,
    slippage: Arc<SlippageEstimator>,
    plans: Arc<PlanStore>,
}

impl Planner {
    pub fn new(
        config: Arc<Config>,
        slippage: Arc<SlippageEstimator>,
        plans: Arc<PlanStore>,
    ) -> Self {
        Self {
            config,
            slippage,
            plans,
        }
    }

    /// Previews a buy for `strategy_id` and stores the resulting plan. The
    /// plan's route is the estimate's route walked stable-first, and its
    /// minimum output embeds the strategy's slippage bound; execution re-derives
    /// nothing. `notional` overrides the configured per-trade size.
    pub async fn preview(
        &self,
        strategy_id: &str,
        notional: Option<Decimal>,
    ) -> Result<PlanPreview, StrategyError> {
        self.preview_at(strategy_id, notional, crate::now_ts()).await
    }

    pub async fn preview_at(
        &self,
        strategy_id: &str,
        notional: Option<Decimal>,
        now: u64,
    ) -> Result<PlanPreview, StrategyError> {
        let settings = self
            .config
            .strategy(strategy_id)
            .ok_or_else(|| StrategyError::Unknown(strategy_id.to_string()))?;
        let target = notional.unwrap_or(settings.trade_notional);

        let estimate = self.slippage.estimate(&settings.asset, target).await?;

        let asset = self
            .config
            .asset(&settings.asset)
            .map_err(|e| PriceError::Math(e.to_string()))?;
        let stable = self
            .config
            .asset(&self.config.stable_symbol)
            .map_err(|e| PriceError::Math(e.to_string()))?;

        let input_amount = to_wei(target, stable.decimals).map_err(StrategyError::Price)?;
        let expected_output =
            to_wei(estimate.realized_output, asset.decimals).map_err(StrategyError::Price)?;

        let plan = self.plans.propose_at(
            strategy_id,
            estimate.route.reversed(),
            &stable.symbol,
            input_amount,
            expected_output,
            settings.max_slippage_pct,
            estimate.effective_price,
            self.config.plan_ttl_secs,
            now,
        );

        Ok(PlanPreview { plan, estimate })
    }
}
