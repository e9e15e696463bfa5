//! Price discovery, trade planning and exactly-once execution for a
//! single-venue DEX trading desk.
//!
//! The crate splits into three layers:
//!
//! - **pricing**: [`quote_source`], [`router`], [`price_engine`] and
//!   [`slippage`] turn configured routes into per-unit reference prices and
//!   size-aware cost estimates;
//! - **planning**: [`planner`] and [`plan_store`] freeze an estimate into a
//!   single-use, TTL-bounded plan;
//! - **execution**: [`execution`] consumes a plan exactly once and submits it
//!   under the gas cap, while [`strategy`] drives the automated trigger loops
//!   and [`operator`] exposes the human command surface.

pub mod alert;
pub mod blockchain;
pub mod config;
pub mod decimals;
pub mod errors;
pub mod execution;
pub mod gas_oracle;
pub mod operator;
pub mod plan_store;
pub mod planner;
pub mod price_engine;
pub mod quote_source;
pub mod router;
pub mod slippage;
pub mod strategy;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

/// Current unix timestamp in seconds. All plan TTLs, cooldowns and quote
/// timestamps read this one clock; components also expose `*_at` variants
/// taking an explicit reading so time-dependent behavior stays testable.
pub fn now_ts() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
