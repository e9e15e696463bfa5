//! # Centralized Error Handling
//!
//! Hierarchical, typed errors for the whole trading core. Every component owns
//! its error enum; the binary boundary folds them into `eyre`. Operator-facing
//! plan errors (`PlanError`) are reported verbatim and never retried; quoting
//! failures degrade to "not ready this cycle".

use ethers::types::U256;
use thiserror::Error;

use crate::plan_store::PlanId;

/// Configuration problems. These are fatal at startup, never at runtime.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Unknown asset symbol: {0}")]
    UnknownAsset(String),
    #[error("Malformed route for {symbol}: {reason}")]
    MalformedRoute { symbol: String, reason: String },
    #[error("Duplicate asset symbol: {0}")]
    DuplicateAsset(String),
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Failures of the raw chain-access layer.
#[derive(Error, Debug)]
pub enum BlockchainError {
    #[error("Provider error: {0}")]
    Provider(String),
    #[error("RPC call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("No signer configured; cannot submit transactions")]
    NoSigner,
    #[error("ABI error: {0}")]
    Abi(String),
    #[error("Invalid RPC URL: {0}")]
    InvalidUrl(String),
}

/// Failures while fetching quotes.
#[derive(Error, Debug)]
pub enum QuoteError {
    /// Every configured route reverted or returned zero: the asset is
    /// currently unpriceable. Callers skip the cycle; this is not an alert.
    #[error("No liquidity: no route priceable for {0}")]
    NoLiquidity(String),
    #[error("Quoter call failed: {0}")]
    Provider(String),
    #[error("Quote call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
}

/// Failures of the reference price engine and slippage estimator.
#[derive(Error, Debug)]
pub enum PriceError {
    /// Mid price unavailable or zero. Estimates against it would be
    /// meaningless; the caller skips the cycle.
    #[error("Stale reference price for {0}")]
    StaleReference(String),
    #[error("No liquidity for {0}")]
    NoLiquidity(String),
    #[error("Math error: {0}")]
    Math(String),
    #[error(transparent)]
    Quote(#[from] QuoteError),
}

/// Operator-facing plan lifecycle errors. Reported verbatim, never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PlanError {
    #[error("Plan not found: {0}")]
    NotFound(PlanId),
    #[error("Plan expired: {0}")]
    Expired(PlanId),
    #[error("Plan already consumed: {0}")]
    AlreadyConsumed(PlanId),
}

/// Failures while turning a consumed plan into an on-chain transaction.
#[derive(Error, Debug)]
pub enum ExecutionError {
    /// Current network gas price exceeds the configured cap. The plan stays
    /// consumed; nothing is submitted and nothing is retried this cycle.
    #[error("Gas cap exceeded: current {current} wei > cap {cap} wei")]
    GasCapExceeded { current: U256, cap: U256 },
    /// Transient submission/RPC failure. Retried up to the policy bound,
    /// then surfaced as an alert-worthy failure.
    #[error("Submission failed: {0}")]
    SubmissionFailed(String),
    #[error("Calldata encoding failed: {0}")]
    Calldata(String),
    #[error(transparent)]
    Gas(#[from] GasError),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
}

impl ExecutionError {
    /// Only transient submission-path failures are retriable. A gas-cap
    /// refusal or a calldata bug must fail immediately.
    pub fn is_retriable(&self) -> bool {
        matches!(
            self,
            ExecutionError::SubmissionFailed(_)
                | ExecutionError::Gas(_)
                | ExecutionError::Blockchain(_)
        )
    }
}

#[derive(Error, Debug)]
pub enum GasError {
    #[error("Gas price fetch failed: {0}")]
    FetchFailed(String),
    #[error(transparent)]
    Blockchain(#[from] BlockchainError),
}

#[derive(Error, Debug)]
pub enum StrategyError {
    #[error("Unknown strategy: {0}")]
    Unknown(String),
    #[error("Balance check failed for {strategy}: {reason}")]
    BalanceCheck { strategy: String, reason: String },
    #[error(transparent)]
    Price(#[from] PriceError),
    #[error(transparent)]
    Plan(#[from] PlanError),
}

/// Classification attached to a failed `TradeOutcome`. Unlike `ExecutionError`
/// this is a terminal verdict: the plan was consumed and will not run again.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutcomeError {
    GasCapExceeded { current: U256, cap: U256 },
    SubmissionFailed(String),
}

impl std::fmt::Display for OutcomeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeError::GasCapExceeded { current, cap } => {
                write!(f, "gas cap exceeded ({current} > {cap})")
            }
            OutcomeError::SubmissionFailed(reason) => write!(f, "submission failed: {reason}"),
        }
    }
}
