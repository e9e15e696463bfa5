//! # Configuration
//!
//! All runtime parameters load from a single JSON file into `Config`, the one
//! source of truth passed by `Arc` to every component. Validation happens
//! entirely at load time: unknown symbols in routes, hop/fee arity mismatches
//! and duplicate assets are fatal here, never at runtime. Native-asset display
//! aliases are likewise resolved once at load into canonical symbols.

use ethers::types::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

use crate::errors::ConfigError;
use crate::types::{Asset, Route, StrategyMode};

fn default_basis() -> u32 {
    1
}

fn default_min_increment() -> Decimal {
    Decimal::new(1, 6) // 0.000001
}

fn default_gas_cap_gwei() -> u64 {
    150
}

fn default_call_timeout_secs() -> u64 {
    10
}

fn default_plan_ttl_secs() -> u64 {
    60
}

fn default_probe_ladder() -> Vec<Decimal> {
    vec![
        Decimal::from(25),
        Decimal::from(50),
        Decimal::from(100),
        Decimal::from(250),
    ]
}

fn default_max_slippage_pct() -> Decimal {
    Decimal::ONE // 1%
}

fn default_poll_interval_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize)]
pub struct AssetConfig {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    #[serde(default = "default_basis")]
    pub basis: u32,
    #[serde(default = "default_min_increment")]
    pub min_increment: Decimal,
}

/// A route declared as symbols plus fee tiers; resolved to addresses at load.
#[derive(Debug, Clone, Deserialize)]
pub struct RouteConfig {
    pub tokens: Vec<String>,
    pub fees: Vec<u32>,
}

/// Condition under which a strategy requests a trade.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TriggerRule {
    /// Buy when the asset's mid price is at or below a fixed level.
    BuyBelow { price: Decimal },
    /// Buy when mid has fallen by at least `pct` percent since the last
    /// triggered trade (or unconditionally on the first evaluation).
    DipFromLast { pct: Decimal },
    /// Never trigger automatically; the strategy only trades via operator
    /// preview/execute.
    Manual,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StrategySettings {
    pub id: String,
    /// Wallet holding this strategy's funds.
    pub wallet: Address,
    /// Asset the strategy accumulates.
    pub asset: String,
    /// Per-trade size, denominated in the stable anchor.
    pub trade_notional: Decimal,
    pub trigger: TriggerRule,
    /// Stable balance below which the strategy will not trade, and under
    /// which the withdrawal guard keeps it paused.
    pub min_balance: Decimal,
    pub cooldown_secs: u64,
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    pub mode: StrategyMode,
    #[serde(default = "default_max_slippage_pct")]
    pub max_slippage_pct: Decimal,
    #[serde(default)]
    pub enabled_at_start: Option<bool>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub rpc_url: String,
    pub chain_id: u64,
    /// On-chain quoter contract (quoteExactInput).
    pub quoter: Address,
    /// Swap router (exactInput).
    pub router: Address,
    #[serde(default = "default_gas_cap_gwei")]
    pub gas_cap_gwei: u64,
    #[serde(default = "default_call_timeout_secs")]
    pub call_timeout_secs: u64,
    #[serde(default = "default_plan_ttl_secs")]
    pub plan_ttl_secs: u64,

    /// USD anchor asset; all reference prices are stable units per asset unit.
    pub stable_symbol: String,
    /// Display symbol of the native gas asset (has no pool of its own).
    pub native_symbol: String,
    /// Ordered aliases under which callers may refer to the native asset.
    #[serde(default)]
    pub native_aliases: Vec<String>,
    /// Wrapped representation actually priced and traded.
    pub wrapped_native_symbol: String,
    /// Assets whose mid comes from the reverse tiny-probe ladder rather than
    /// a forward unit quote.
    #[serde(default)]
    pub reverse_probe_assets: Vec<String>,
    /// Stable-asset input sizes for the reverse tiny-probe.
    #[serde(default = "default_probe_ladder")]
    pub probe_ladder: Vec<Decimal>,
    /// Off-chain spot product id for the advisory cross-check, e.g. "ETH-USD".
    #[serde(default)]
    pub spot_product: Option<String>,

    pub assets: Vec<AssetConfig>,
    /// Per-asset alternative routes to the stable anchor, in declaration
    /// order. Declaration order is the tie-break for route selection.
    pub routes: HashMap<String, Vec<RouteConfig>>,
    pub strategies: Vec<StrategySettings>,

    #[serde(skip)]
    asset_index: HashMap<String, Asset>,
    #[serde(skip)]
    resolved_routes: HashMap<String, Vec<Route>>,
    #[serde(skip)]
    alias_index: HashMap<String, String>,
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config: Config = serde_json::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses an in-memory JSON document. Used by tests and by `load`.
    pub fn from_json(raw: &str) -> Result<Config, ConfigError> {
        let mut config: Config = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the derived indexes and rejects any inconsistency. Fatal at
    /// startup by design; nothing here is recoverable at runtime.
    fn validate(&mut self) -> Result<(), ConfigError> {
        self.asset_index.clear();
        for asset in &self.assets {
            let symbol = asset.symbol.to_uppercase();
            if self.asset_index.contains_key(&symbol) {
                return Err(ConfigError::DuplicateAsset(symbol));
            }
            if asset.basis == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("assets.{symbol}.basis"),
                    reason: "basis must be at least 1".into(),
                });
            }
            self.asset_index.insert(
                symbol.clone(),
                Asset {
                    symbol,
                    address: asset.address,
                    decimals: asset.decimals,
                    basis: asset.basis,
                    min_increment: asset.min_increment,
                },
            );
        }

        for symbol in [&self.stable_symbol, &self.wrapped_native_symbol] {
            if !self.asset_index.contains_key(&symbol.to_uppercase()) {
                return Err(ConfigError::UnknownAsset(symbol.clone()));
            }
        }
        for symbol in &self.reverse_probe_assets {
            if !self.asset_index.contains_key(&symbol.to_uppercase()) {
                return Err(ConfigError::UnknownAsset(symbol.clone()));
            }
        }

        // Resolve native aliases once; callers use `canonical_symbol` and the
        // map is never re-derived per lookup.
        self.alias_index.clear();
        let wrapped = self.wrapped_native_symbol.to_uppercase();
        self.alias_index
            .insert(self.native_symbol.to_uppercase(), wrapped.clone());
        for alias in &self.native_aliases {
            self.alias_index.insert(alias.to_uppercase(), wrapped.clone());
        }

        self.resolved_routes.clear();
        for (symbol, route_configs) in &self.routes {
            let symbol = symbol.to_uppercase();
            if !self.asset_index.contains_key(&symbol) {
                return Err(ConfigError::UnknownAsset(symbol));
            }
            let mut resolved = Vec::with_capacity(route_configs.len());
            for rc in route_configs {
                if rc.tokens.len() < 2 {
                    return Err(ConfigError::MalformedRoute {
                        symbol,
                        reason: "route needs at least two tokens".into(),
                    });
                }
                if rc.fees.len() != rc.tokens.len() - 1 {
                    return Err(ConfigError::MalformedRoute {
                        symbol,
                        reason: format!(
                            "{} tokens require {} fees, got {}",
                            rc.tokens.len(),
                            rc.tokens.len() - 1,
                            rc.fees.len()
                        ),
                    });
                }
                let mut tokens = Vec::with_capacity(rc.tokens.len());
                let mut symbols = Vec::with_capacity(rc.tokens.len());
                for token in &rc.tokens {
                    let canon = self.canonical_lookup(token);
                    let asset = self
                        .asset_index
                        .get(&canon)
                        .ok_or_else(|| ConfigError::UnknownAsset(token.clone()))?;
                    tokens.push(asset.address);
                    symbols.push(asset.symbol.clone());
                }
                resolved.push(Route {
                    tokens,
                    symbols,
                    fees: rc.fees.clone(),
                });
            }
            self.resolved_routes.insert(symbol, resolved);
        }

        for strategy in &self.strategies {
            let canon = self.canonical_lookup(&strategy.asset);
            if !self.asset_index.contains_key(&canon) {
                return Err(ConfigError::UnknownAsset(strategy.asset.clone()));
            }
            if !self.resolved_routes.contains_key(&canon) {
                return Err(ConfigError::MalformedRoute {
                    symbol: canon,
                    reason: format!("strategy {} references an asset with no routes", strategy.id),
                });
            }
            if strategy.trade_notional <= Decimal::ZERO {
                return Err(ConfigError::InvalidValue {
                    field: format!("strategies.{}.trade_notional", strategy.id),
                    reason: "must be positive".into(),
                });
            }
        }

        Ok(())
    }

    fn canonical_lookup(&self, symbol: &str) -> String {
        let upper = symbol.to_uppercase();
        self.alias_index.get(&upper).cloned().unwrap_or(upper)
    }

    /// Resolves a possibly-aliased symbol (native display name included) to
    /// its canonical configured form.
    pub fn canonical_symbol(&self, symbol: &str) -> String {
        self.canonical_lookup(symbol)
    }

    pub fn asset(&self, symbol: &str) -> Result<&Asset, ConfigError> {
        let canon = self.canonical_lookup(symbol);
        self.asset_index
            .get(&canon)
            .ok_or_else(|| ConfigError::UnknownAsset(symbol.to_string()))
    }

    /// Alternative routes for an asset, in declaration order.
    pub fn route_set(&self, symbol: &str) -> Result<&[Route], ConfigError> {
        let canon = self.canonical_lookup(symbol);
        self.resolved_routes
            .get(&canon)
            .map(|r| r.as_slice())
            .ok_or_else(|| ConfigError::UnknownAsset(symbol.to_string()))
    }

    pub fn strategy(&self, id: &str) -> Option<&StrategySettings> {
        self.strategies.iter().find(|s| s.id == id)
    }

    pub fn gas_cap_wei(&self) -> ethers::types::U256 {
        ethers::types::U256::from(self.gas_cap_gwei) * ethers::types::U256::exp10(9)
    }
}
