//! # Operator Facade
//!
//! The single entry point for human commands: previewing and executing plans,
//! reading prices and slippage curves, and flipping strategy state. Operator
//! execution deliberately skips trigger and cooldown checks — an approved plan
//! is an explicit override — but the plan's TTL and single-use guarantee still
//! hold.

use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::Config;
use crate::errors::{PlanError, PriceError, StrategyError};
use crate::execution::ExecutionEngine;
use crate::plan_store::{Plan, PlanId, PlanStore};
use crate::planner::{PlanPreview, Planner};
use crate::price_engine::ReferencePriceEngine;
use crate::quote_source::SpotPriceFeed;
use crate::slippage::{SlippageEstimate, SlippageEstimator};
use crate::strategy::StrategyEngine;
use crate::types::{ReferencePrice, TradeOutcome};

/// A reference price paired with the optional off-chain spot observation.
#[derive(Debug, Clone)]
pub struct PriceReport {
    pub reference: ReferencePrice,
    /// Advisory spot quote for externally-traded assets, with the deviation
    /// of on-chain mid from spot in percent. `None` when no feed is
    /// configured for the asset or the fetch failed.
    pub spot_usd: Option<Decimal>,
    pub spot_deviation_pct: Option<Decimal>,
}

pub struct OperatorDesk {
    config: Arc<Config>,
    planner: Arc<Planner>,
    execution: Arc<ExecutionEngine>,
    prices: Arc<ReferencePriceEngine>,
    slippage: Arc<SlippageEstimator>,
    plans: Arc<PlanStore>,
    strategies: HashMap<String, Arc<StrategyEngine>>,
    spot: Option<SpotPriceFeed>,
}

impl OperatorDesk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: Arc<Config>,
        planner: Arc<Planner>,
        execution: Arc<ExecutionEngine>,
        prices: Arc<ReferencePriceEngine>,
        slippage: Arc<SlippageEstimator>,
        plans: Arc<PlanStore>,
        strategies: Vec<Arc<StrategyEngine>>,
        spot: Option<SpotPriceFeed>,
    ) -> Self {
        let strategies = strategies
            .into_iter()
            .map(|e| (e.id().to_string(), e))
            .collect();
        Self {
            config,
            planner,
            execution,
            prices,
            slippage,
            plans,
            strategies,
            spot,
        }
    }

    /// Previews a trade for a strategy and stores the single-use plan. The
    /// returned preview carries the plan id the operator quotes back to
    /// `execute`.
    pub async fn plan(
        &self,
        strategy_id: &str,
        notional: Option<Decimal>,
    ) -> Result<PlanPreview, StrategyError> {
        let preview = self.planner.preview(strategy_id, notional).await?;
        info!(
            strategy = strategy_id,
            plan_id = %preview.plan.id,
            route = %preview.plan.route.label(),
            slippage_pct = %preview.estimate.slippage_pct.round_dp(3),
            "plan previewed"
        );
        Ok(preview)
    }

    /// Executes a previously previewed plan by id.
    pub async fn execute(&self, plan_id: &str) -> Result<TradeOutcome, PlanError> {
        self.execution.execute(&PlanId::from(plan_id)).await
    }

    /// Read-only plan lookup for display.
    pub fn plan_status(&self, plan_id: &str) -> Option<Plan> {
        self.plans.get(&PlanId::from(plan_id))
    }

    /// Current reference price for one asset, with the advisory spot
    /// cross-check when a feed is configured for it.
    pub async fn price(&self, symbol: &str) -> Result<PriceReport, PriceError> {
        let reference = self.prices.mid_price(symbol).await?;

        let mut spot_usd = None;
        let mut spot_deviation_pct = None;
        if let Some(feed) = self.spot_feed_for(&reference.symbol) {
            match feed.spot_usd().await {
                Ok(spot) if spot > Decimal::ZERO => {
                    spot_deviation_pct = Some((reference.mid - spot) / spot * Decimal::ONE_HUNDRED);
                    spot_usd = Some(spot);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(symbol = %reference.symbol, error = %e, "spot cross-check unavailable");
                }
            }
        }

        Ok(PriceReport {
            reference,
            spot_usd,
            spot_deviation_pct,
        })
    }

    /// Reference prices for every configured asset with at least one route.
    /// Assets that fail to price are skipped, not fatal.
    pub async fn prices(&self) -> Vec<PriceReport> {
        let mut reports = Vec::new();
        for asset in &self.config.assets {
            if self.config.route_set(&asset.symbol).is_err() {
                continue;
            }
            match self.price(&asset.symbol).await {
                Ok(report) => reports.push(report),
                Err(e) => {
                    warn!(symbol = %asset.symbol, error = %e, "price unavailable");
                }
            }
        }
        reports
    }

    /// Slippage estimates for an asset across a ladder of target notionals.
    pub async fn slippage_curve(
        &self,
        symbol: &str,
        targets: &[Decimal],
    ) -> Result<Vec<SlippageEstimate>, PriceError> {
        self.slippage.slippage_curve(symbol, targets).await
    }

    pub async fn enable(&self, strategy_id: &str) -> Result<(), StrategyError> {
        self.strategy(strategy_id)?.enable().await;
        Ok(())
    }

    pub async fn disable(&self, strategy_id: &str) -> Result<(), StrategyError> {
        self.strategy(strategy_id)?.disable().await;
        Ok(())
    }

    pub async fn enable_all(&self) {
        for engine in self.strategies.values() {
            engine.enable().await;
        }
    }

    pub async fn disable_all(&self) {
        for engine in self.strategies.values() {
            engine.disable().await;
        }
    }

    /// Overrides a strategy's cooldown: `Some(secs)` starts a fresh cooldown
    /// of that length, `None` clears it.
    pub async fn set_cooldown(
        &self,
        strategy_id: &str,
        secs: Option<u64>,
    ) -> Result<(), StrategyError> {
        let engine = self.strategy(strategy_id)?;
        engine
            .set_cooldown_until(secs.map(|s| crate::now_ts() + s))
            .await;
        Ok(())
    }

    fn strategy(&self, id: &str) -> Result<&Arc<StrategyEngine>, StrategyError> {
        self.strategies
            .get(id)
            .ok_or_else(|| StrategyError::Unknown(id.to_string()))
    }

    /// The spot feed applies only to the asset its product tracks, matched by
    /// the product's base symbol suffix (e.g. "ETH-USD" covers "1ETH").
    fn spot_feed_for(&self, symbol: &str) -> Option<&SpotPriceFeed> {
        let feed = self.spot.as_ref()?;
        let base = feed.product().split('-').next()?;
        let canon = self.config.canonical_symbol(symbol);
        if canon.to_uppercase().contains(&base.to_uppercase()) {
            Some(feed)
        } else {
            None
        }
    }
}
