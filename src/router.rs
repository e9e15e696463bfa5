//! # Route Resolver
//!
//! Picks the economically best of an asset's configured routes by issuing one
//! competing quote per route at the asset's basis amount. Selection is
//! deterministic: maximal output wins, ties break to the lowest route index
//! (declaration order).

use ethers::types::U256;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::config::Config;
use crate::decimals::to_wei;
use crate::errors::QuoteError;
use crate::quote_source::QuoteSource;
use crate::types::{Quote, Route};

/// The winning route for an asset together with the quote that selected it.
#[derive(Debug, Clone)]
pub struct BestRoute {
    pub index: usize,
    pub route: Route,
    pub quote: Quote,
}

#[derive(Debug)]
pub struct RouteResolver {
    config: Arc<Config>,
    quotes: Arc<dyn QuoteSource>,
}

impl RouteResolver {
    pub fn new(config: Arc<Config>, quotes: Arc<dyn QuoteSource>) -> Self {
        Self { config, quotes }
    }

    /// Quotes every configured route for `symbol` at its basis amount and
    /// returns the best one. `NoLiquidity` when every route reverts or
    /// returns zero; callers treat that as "currently unpriceable", not
    /// as a fatal error.
    pub async fn best_route(&self, symbol: &str) -> Result<BestRoute, QuoteError> {
        let asset = self
            .config
            .asset(symbol)
            .map_err(|e| QuoteError::Provider(e.to_string()))?;
        let amount_in = to_wei(Decimal::from(asset.basis), asset.decimals)
            .map_err(|e| QuoteError::Provider(e.to_string()))?;
        self.best_route_for_amount(symbol, amount_in).await
    }

    /// Like `best_route` but probing each route at an explicit input amount.
    pub async fn best_route_for_amount(
        &self,
        symbol: &str,
        amount_in: U256,
    ) -> Result<BestRoute, QuoteError> {
        let routes = self
            .config
            .route_set(symbol)
            .map_err(|e| QuoteError::Provider(e.to_string()))?;

        let mut best: Option<BestRoute> = None;
        for (index, route) in routes.iter().enumerate() {
            let amount_out = match self
                .quotes
                .quote_exact_input(route.encode_path(), amount_in)
                .await
            {
                Ok(out) => out,
                Err(e) => {
                    trace!(symbol, index, error = %e, "route quote failed");
                    continue;
                }
            };
            if amount_out.is_zero() {
                trace!(symbol, index, "route quoted zero output");
                continue;
            }
            // Strict comparison keeps the lowest index on ties.
            let better = match &best {
                Some(current) => amount_out > current.quote.amount_out,
                None => true,
            };
            if better {
                best = Some(BestRoute {
                    index,
                    route: route.clone(),
                    quote: Quote {
                        route_index: Some(index),
                        amount_in,
                        amount_out,
                        timestamp: crate::now_ts(),
                    },
                });
            }
        }

        match best {
            Some(found) => {
                debug!(
                    symbol,
                    index = found.index,
                    route = %found.route.label(),
                    amount_out = %found.quote.amount_out,
                    "selected best route"
                );
                Ok(found)
            }
            None => Err(QuoteError::NoLiquidity(symbol.to_string())),
        }
    }

    /// Re-quotes one specific route at an arbitrary amount.
    pub async fn quote_route(&self, route: &Route, amount_in: U256) -> Result<U256, QuoteError> {
        self.quotes
            .quote_exact_input(route.encode_path(), amount_in)
            .await
    }
}
