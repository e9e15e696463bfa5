//! Core domain types shared across the pricing, planning and execution layers.

use ethers::types::{Address, Bytes, H256, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::errors::OutcomeError;
use crate::plan_store::PlanId;

/// An asset the desk can price and trade. Immutable once configured; looked up
/// by symbol everywhere else.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    pub symbol: String,
    pub address: Address,
    pub decimals: u8,
    /// Unit size a venue needs for an accurate quote (e.g. price per 100
    /// units). Quotes at this size must be divided back down to per-unit.
    pub basis: u32,
    /// Smallest tradable increment, in whole-asset units.
    pub min_increment: Decimal,
}

/// A concrete multi-hop swap path. Immutable configuration, not runtime state:
/// hop order is declaration order and is never re-sorted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Token addresses in hop order, length >= 2.
    pub tokens: Vec<Address>,
    /// Symbols matching `tokens`, for labels and logs.
    pub symbols: Vec<String>,
    /// Pool fee tiers between consecutive tokens, length = tokens.len() - 1.
    pub fees: Vec<u32>,
}

impl Route {
    /// Encodes the route as Uniswap V3 path bytes: each hop contributes the
    /// 20-byte token address followed by the 3-byte big-endian fee, terminated
    /// by the final token address. Direction follows the declared hop order.
    pub fn encode_path(&self) -> Bytes {
        let mut buf = Vec::with_capacity(self.tokens.len() * 23);
        for (i, token) in self.tokens.iter().enumerate() {
            buf.extend_from_slice(token.as_bytes());
            if i < self.fees.len() {
                buf.extend_from_slice(&self.fees[i].to_be_bytes()[1..]);
            }
        }
        Bytes::from(buf)
    }

    /// The same route walked in the opposite direction.
    pub fn reversed(&self) -> Route {
        Route {
            tokens: self.tokens.iter().rev().cloned().collect(),
            symbols: self.symbols.iter().rev().cloned().collect(),
            fees: self.fees.iter().rev().cloned().collect(),
        }
    }

    pub fn token_in(&self) -> Address {
        self.tokens[0]
    }

    pub fn token_out(&self) -> Address {
        self.tokens[self.tokens.len() - 1]
    }

    /// Human-readable label, e.g. `1USDC -> WONE@500 -> 1sDAI`.
    pub fn label(&self) -> String {
        let mut out = self.symbols[0].clone();
        for (sym, fee) in self.symbols.iter().skip(1).zip(self.fees.iter()) {
            out.push_str(&format!(" -> {sym}@{fee}"));
        }
        out
    }
}

/// A single quote observation. Ephemeral: never persisted beyond the
/// computation that produced it.
#[derive(Debug, Clone)]
pub struct Quote {
    /// Index of the route that produced this quote, or `None` for an
    /// off-chain oracle observation.
    pub route_index: Option<usize>,
    pub amount_in: U256,
    pub amount_out: U256,
    pub timestamp: u64,
}

/// A stable per-unit reference price, recomputed on every evaluation cycle.
#[derive(Debug, Clone)]
pub struct ReferencePrice {
    pub symbol: String,
    /// Stable units per one whole unit of the asset.
    pub mid: Decimal,
    /// Basis amount the underlying quote used (1 unless the asset configures
    /// a larger quoting basis).
    pub basis_used: u32,
    pub computed_at: u64,
}

/// Structured result of consuming a plan, successful or not. Handed to the
/// trade log and alert collaborators; not retained in memory.
#[derive(Debug, Clone)]
pub struct TradeOutcome {
    pub plan_id: PlanId,
    pub strategy: String,
    pub route_label: String,
    pub tx_hash: Option<H256>,
    pub success: bool,
    pub amount_in: U256,
    pub min_output: U256,
    pub error: Option<OutcomeError>,
}

/// How a strategy disposes of the plans it generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyMode {
    /// Propose and immediately execute.
    Unattended,
    /// Propose and surface the plan for operator approval.
    Interactive,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn addr(byte: u8) -> Address {
        let mut b = [0u8; 20];
        b[19] = byte;
        Address::from(b)
    }

    #[test]
    fn encode_path_single_hop() {
        let route = Route {
            tokens: vec![addr(1), addr(2)],
            symbols: vec!["A".into(), "B".into()],
            fees: vec![3000],
        };
        let path = route.encode_path();
        assert_eq!(path.len(), 20 + 3 + 20);
        assert_eq!(&path[0..20], addr(1).as_bytes());
        // 3000 = 0x000bb8 big-endian
        assert_eq!(&path[20..23], &[0x00, 0x0b, 0xb8]);
        assert_eq!(&path[23..43], addr(2).as_bytes());
    }

    #[test]
    fn encode_path_two_hops() {
        let route = Route {
            tokens: vec![addr(1), addr(2), addr(3)],
            symbols: vec!["A".into(), "B".into(), "C".into()],
            fees: vec![500, 10000],
        };
        let path = route.encode_path();
        assert_eq!(path.len(), 20 + 3 + 20 + 3 + 20);
        assert_eq!(&path[20..23], &[0x00, 0x01, 0xf4]);
        assert_eq!(&path[43..46], &[0x00, 0x27, 0x10]);
    }

    #[test]
    fn encode_path_preserves_declared_order() {
        // Addresses deliberately out of numeric order; encoding must not sort.
        let hi = Address::from_str("0xffffffffffffffffffffffffffffffffffffffff").unwrap();
        let lo = addr(1);
        let route = Route {
            tokens: vec![hi, lo],
            symbols: vec!["HI".into(), "LO".into()],
            fees: vec![500],
        };
        let path = route.encode_path();
        assert_eq!(&path[0..20], hi.as_bytes());
        assert_eq!(&path[23..43], lo.as_bytes());
    }

    #[test]
    fn reversed_flips_tokens_and_fees() {
        let route = Route {
            tokens: vec![addr(1), addr(2), addr(3)],
            symbols: vec!["A".into(), "B".into(), "C".into()],
            fees: vec![500, 10000],
        };
        let rev = route.reversed();
        assert_eq!(rev.tokens, vec![addr(3), addr(2), addr(1)]);
        assert_eq!(rev.fees, vec![10000, 500]);
        assert_eq!(rev.reversed(), route);
    }

    #[test]
    fn route_label_includes_fees() {
        let route = Route {
            tokens: vec![addr(1), addr(2), addr(3)],
            symbols: vec!["1USDC".into(), "WONE".into(), "1sDAI".into()],
            fees: vec![500, 500],
        };
        assert_eq!(route.label(), "1USDC -> WONE@500 -> 1sDAI@500");
    }
}
