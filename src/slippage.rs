//! # Slippage Estimator
//!
//! Turns a target stable notional into a concrete size estimate and the
//! realized deviation from mid. The re-quote walks the best route in reverse
//! (stable in, asset out) so the effective price is what a buyer of the asset
//! would actually pay; on finite one-sided liquidity it can only rise with
//! size, which the tests assert.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::config::Config;
use crate::decimals::{from_wei, quantize_down, to_wei};
use crate::errors::{PriceError, QuoteError};
use crate::price_engine::ReferencePriceEngine;
use crate::router::RouteResolver;
use crate::types::Route;

/// One slippage observation at a target notional.
#[derive(Debug, Clone)]
pub struct SlippageEstimate {
    /// Target size in stable units.
    pub target_notional: Decimal,
    /// Estimated asset quantity the trade moves (`target / mid`), quantized
    /// to the asset's minimum increment.
    pub input_estimate: Decimal,
    /// Asset units the reverse re-quote actually returned.
    pub realized_output: Decimal,
    /// Stable units paid per asset unit at this size.
    pub effective_price: Decimal,
    /// Mid the estimate was computed against.
    pub mid: Decimal,
    /// `(effective - mid) / mid * 100`.
    pub slippage_pct: Decimal,
    /// Route the estimate re-quoted (forward orientation).
    pub route: Route,
}

#[derive(Debug)]
pub struct SlippageEstimator {
    config: Arc<Config>,
    resolver: Arc<RouteResolver>,
    prices: Arc<ReferencePriceEngine>,
}

impl SlippageEstimator {
    pub fn new(
        config: Arc<Config>,
        resolver: Arc<RouteResolver>,
        prices: Arc<ReferencePriceEngine>,
    ) -> Self {
        Self {
            config,
            resolver,
            prices,
        }
    }

    /// Estimates the cost of moving `target_notional` stable units into
    /// `symbol`. Fails with `StaleReference` when mid is unavailable or zero
    /// rather than emitting a meaningless ratio.
    #[instrument(skip(self))]
    pub async fn estimate(
        &self,
        symbol: &str,
        target_notional: Decimal,
    ) -> Result<SlippageEstimate, PriceError> {
        if target_notional <= Decimal::ZERO {
            return Err(PriceError::Math(format!(
                "target notional must be positive, got {target_notional}"
            )));
        }

        let canon = self.config.canonical_symbol(symbol);
        let asset = self
            .config
            .asset(&canon)
            .map_err(|e| PriceError::Math(e.to_string()))?;
        let stable = self
            .config
            .asset(&self.config.stable_symbol)
            .map_err(|e| PriceError::Math(e.to_string()))?;

        let reference = self.prices.mid_price(&canon).await?;
        let mid = reference.mid;
        if mid <= Decimal::ZERO {
            return Err(PriceError::StaleReference(canon));
        }

        let input_estimate = quantize_down(target_notional / mid, asset.min_increment);
        if input_estimate <= Decimal::ZERO {
            return Err(PriceError::Math(format!(
                "target {target_notional} quantizes to zero at mid {mid}"
            )));
        }

        let best = match self.resolver.best_route(&canon).await {
            Ok(best) => best,
            Err(QuoteError::NoLiquidity(s)) => return Err(PriceError::NoLiquidity(s)),
            Err(e) => return Err(e.into()),
        };
        let reverse = best.route.reversed();

        let stable_in = to_wei(target_notional, stable.decimals)?;
        let out = self
            .resolver
            .quote_route(&reverse, stable_in)
            .await
            .map_err(PriceError::from)?;
        let realized_output = from_wei(out, asset.decimals)?;
        if realized_output <= Decimal::ZERO {
            return Err(PriceError::NoLiquidity(canon));
        }

        let effective_price = target_notional / realized_output;
        let slippage_pct = (effective_price - mid) / mid * Decimal::from(100);

        debug!(
            symbol = %canon,
            %target_notional,
            %effective_price,
            %slippage_pct,
            "slippage estimate"
        );

        Ok(SlippageEstimate {
            target_notional,
            input_estimate,
            realized_output,
            effective_price,
            mid,
            slippage_pct,
            route: best.route,
        })
    }

    /// Estimates across a ladder of target notionals, for operator preview.
    /// Rungs that fail to quote are skipped rather than failing the curve.
    pub async fn slippage_curve(
        &self,
        symbol: &str,
        targets: &[Decimal],
    ) -> Result<Vec<SlippageEstimate>, PriceError> {
        let mut rows = Vec::with_capacity(targets.len());
        for target in targets {
            match self.estimate(symbol, *target).await {
                Ok(row) => rows.push(row),
                Err(PriceError::StaleReference(s)) => return Err(PriceError::StaleReference(s)),
                Err(e) => {
                    debug!(symbol, %target, error = %e, "curve rung skipped");
                }
            }
        }
        if rows.is_empty() {
            return Err(PriceError::NoLiquidity(symbol.to_string()));
        }
        Ok(rows)
    }
}
