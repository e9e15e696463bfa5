//! # Plan Store
//!
//! Short-lived, single-use registry of proposed trades. A plan is created by
//! a preview, keyed by an opaque unguessable id, and consumed at most once;
//! consumption and expiry are checked atomically under the owning map shard's
//! lock, so two concurrent executions of the same id cannot both win and
//! unrelated plans never serialize on a global lock. Expiry is lazy: an
//! expired, unconsumed plan is garbage and is evicted opportunistically when
//! new plans are proposed.

use dashmap::DashMap;
use ethers::types::U256;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::PlanError;
use crate::types::Route;

pub const DEFAULT_PLAN_TTL_SECS: u64 = 60;

/// Opaque, unguessable plan identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PlanId(String);

impl PlanId {
    fn generate() -> Self {
        PlanId(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        PlanId(s.to_string())
    }
}

/// A time-bounded, single-use trade proposal. Execution honors the stored
/// route and amounts exactly; nothing is re-derived at submission time.
/// Never mutated after creation except the `consumed` flag.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    pub id: PlanId,
    pub strategy: String,
    pub route: Route,
    pub input_symbol: String,
    pub input_amount: U256,
    /// Slippage-bounded minimum acceptable output, fixed at proposal time.
    pub min_output: U256,
    /// Effective price the preview estimated, for reporting.
    pub effective_price: Decimal,
    pub created_at: u64,
    pub expires_at: u64,
    pub consumed: bool,
}

impl Plan {
    pub fn is_expired(&self, now: u64) -> bool {
        now > self.expires_at
    }
}

#[derive(Debug, Default)]
pub struct PlanStore {
    plans: DashMap<PlanId, Plan>,
}

impl PlanStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new plan. `min_output` is derived by the caller from the
    /// previewed output and the strategy's slippage bound; the store itself
    /// only owns identity and lifetime.
    #[allow(clippy::too_many_arguments)]
    pub fn propose(
        &self,
        strategy: &str,
        route: Route,
        input_symbol: &str,
        input_amount: U256,
        expected_output: U256,
        max_slippage_pct: Decimal,
        effective_price: Decimal,
        ttl_secs: u64,
    ) -> Plan {
        self.propose_at(
            strategy,
            route,
            input_symbol,
            input_amount,
            expected_output,
            max_slippage_pct,
            effective_price,
            ttl_secs,
            crate::now_ts(),
        )
    }

    /// Clock-explicit variant of `propose`; the public wrapper reads the
    /// system clock.
    #[allow(clippy::too_many_arguments)]
    pub fn propose_at(
        &self,
        strategy: &str,
        route: Route,
        input_symbol: &str,
        input_amount: U256,
        expected_output: U256,
        max_slippage_pct: Decimal,
        effective_price: Decimal,
        ttl_secs: u64,
        now: u64,
    ) -> Plan {
        self.evict_expired(now);

        let min_output = slippage_bounded_minimum(expected_output, max_slippage_pct);
        let plan = Plan {
            id: PlanId::generate(),
            strategy: strategy.to_string(),
            route,
            input_symbol: input_symbol.to_string(),
            input_amount,
            min_output,
            effective_price,
            created_at: now,
            expires_at: now + ttl_secs,
            consumed: false,
        };
        debug!(
            plan_id = %plan.id,
            strategy,
            route = %plan.route.label(),
            %min_output,
            expires_at = plan.expires_at,
            "plan proposed"
        );
        self.plans.insert(plan.id.clone(), plan.clone());
        plan
    }

    /// Atomically looks up a plan and marks it consumed. Exactly one caller
    /// can ever receive `Ok` for a given id. A consumed plan reports
    /// `AlreadyConsumed` even after its expiry has passed; consumption is
    /// terminal.
    pub fn consume(&self, id: &PlanId) -> Result<Plan, PlanError> {
        self.consume_at(id, crate::now_ts())
    }

    pub fn consume_at(&self, id: &PlanId, now: u64) -> Result<Plan, PlanError> {
        // get_mut holds the shard lock for the whole check-and-set.
        let mut entry = self
            .plans
            .get_mut(id)
            .ok_or_else(|| PlanError::NotFound(id.clone()))?;
        if entry.consumed {
            return Err(PlanError::AlreadyConsumed(id.clone()));
        }
        if entry.is_expired(now) {
            return Err(PlanError::Expired(id.clone()));
        }
        entry.consumed = true;
        Ok(entry.clone())
    }

    /// Read-only lookup for operator display. Expiry is reported, not acted
    /// upon.
    pub fn get(&self, id: &PlanId) -> Option<Plan> {
        self.plans.get(id).map(|p| p.clone())
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }

    fn evict_expired(&self, now: u64) {
        self.plans.retain(|_, plan| !plan.is_expired(now));
    }
}

/// `expected * (1 - pct/100)`, floored to at least one raw unit so a rounding
/// artifact can never produce an unbounded swap.
fn slippage_bounded_minimum(expected_output: U256, max_slippage_pct: Decimal) -> U256 {
    use rust_decimal::prelude::ToPrimitive;
    let pct_bps = (max_slippage_pct * Decimal::from(100)).trunc();
    let bps: i64 = pct_bps.to_i64().unwrap_or(10_000).clamp(0, 10_000);
    let kept = U256::from(10_000u64 - bps as u64);
    let min = expected_output * kept / U256::from(10_000u64);
    min.max(U256::one())
}
