//! # Reference Price Engine
//!
//! Derives a stable per-unit "mid" price for every configured asset, in
//! stable-anchor units:
//!
//! - Volatile bridged assets (configured in `reverse_probe_assets`) use the
//!   reverse tiny-probe: a ladder of small stable-asset inputs is quoted
//!   through the reverse route, each rung implies `input / output`, and the
//!   minimum rung — the most favorable to a buyer — is the mid. Forward quotes
//!   at realistic sizes are skewed by one-sided pool liquidity; small reverse
//!   probes track the two-sided market.
//! - The native gas asset has no pool of its own and is priced via its
//!   wrapped representation.
//! - Everything else is the best-of-route quote for one basis amount,
//!   normalized to per-unit by dividing by the basis.
//!
//! Prices are recomputed on every call and never cached across cycles.

use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

use crate::config::Config;
use crate::decimals::{from_wei, to_wei};
use crate::errors::{PriceError, QuoteError};
use crate::router::RouteResolver;
use crate::types::ReferencePrice;

#[derive(Debug)]
pub struct ReferencePriceEngine {
    config: Arc<Config>,
    resolver: Arc<RouteResolver>,
}

impl ReferencePriceEngine {
    pub fn new(config: Arc<Config>, resolver: Arc<RouteResolver>) -> Self {
        Self { config, resolver }
    }

    /// Computes the current mid price of `symbol` in stable units per unit.
    #[instrument(skip(self))]
    pub async fn mid_price(&self, symbol: &str) -> Result<ReferencePrice, PriceError> {
        let canon = self.config.canonical_symbol(symbol);
        let stable = self.config.canonical_symbol(&self.config.stable_symbol);

        if canon == stable {
            return Ok(ReferencePrice {
                symbol: canon,
                mid: Decimal::ONE,
                basis_used: 1,
                computed_at: crate::now_ts(),
            });
        }

        let mid = if self
            .config
            .reverse_probe_assets
            .iter()
            .any(|s| self.config.canonical_symbol(s) == canon)
        {
            self.reverse_probe_mid(&canon).await?
        } else {
            self.forward_unit_mid(&canon).await?
        };

        if mid <= Decimal::ZERO {
            return Err(PriceError::StaleReference(canon));
        }

        let basis_used = self
            .config
            .asset(&canon)
            .map(|a| a.basis)
            .unwrap_or(1);
        debug!(symbol = %canon, %mid, basis_used, "computed reference price");
        Ok(ReferencePrice {
            symbol: canon,
            mid,
            basis_used,
            computed_at: crate::now_ts(),
        })
    }

    /// Best-of-route quote for one basis amount, normalized to per-unit.
    /// Whenever the basis exceeds one the division is mandatory; omitting it
    /// would overstate the price by a factor of the basis.
    async fn forward_unit_mid(&self, symbol: &str) -> Result<Decimal, PriceError> {
        let asset = self.config.asset(symbol).map_err(config_to_price)?;
        let stable = self.config.asset(&self.config.stable_symbol).map_err(config_to_price)?;

        let best = match self.resolver.best_route(symbol).await {
            Ok(best) => best,
            Err(QuoteError::NoLiquidity(s)) => return Err(PriceError::NoLiquidity(s)),
            Err(e) => return Err(e.into()),
        };

        let out_units = from_wei(best.quote.amount_out, stable.decimals)?;
        let basis = Decimal::from(asset.basis);
        Ok(out_units / basis)
    }

    /// Reverse tiny-probe: quote the configured ladder of stable inputs
    /// through the reverse route and take the minimum implied price.
    async fn reverse_probe_mid(&self, symbol: &str) -> Result<Decimal, PriceError> {
        let asset = self.config.asset(symbol).map_err(config_to_price)?;
        let stable = self.config.asset(&self.config.stable_symbol).map_err(config_to_price)?;

        let best = match self.resolver.best_route(symbol).await {
            Ok(best) => best,
            Err(QuoteError::NoLiquidity(s)) => return Err(PriceError::NoLiquidity(s)),
            Err(e) => return Err(e.into()),
        };
        let reverse = best.route.reversed();

        let mut mid: Option<Decimal> = None;
        for rung in &self.config.probe_ladder {
            let stable_in = to_wei(*rung, stable.decimals)?;
            let out = match self.resolver.quote_route(&reverse, stable_in).await {
                Ok(out) if !out.is_zero() => out,
                Ok(_) => continue,
                Err(e) => {
                    warn!(symbol, %rung, error = %e, "probe rung failed");
                    continue;
                }
            };
            let out_units = from_wei(out, asset.decimals)?;
            if out_units <= Decimal::ZERO {
                continue;
            }
            let implied = *rung / out_units;
            mid = Some(match mid {
                Some(current) => current.min(implied),
                None => implied,
            });
        }

        mid.ok_or_else(|| PriceError::StaleReference(symbol.to_string()))
    }
}

fn config_to_price(e: crate::errors::ConfigError) -> PriceError {
    PriceError::Math(e.to_string())
}
