//! Shared simulation harness for the integration tests: a scripted quote
//! source, a recording in-memory chain, and collecting alert/log sinks.

#![allow(dead_code)]

use async_trait::async_trait;
use ethers::types::{Address, Bytes, H256, U256};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use swapdesk::alert::{AlertSink, TradeLog};
use swapdesk::blockchain::BlockchainManager;
use swapdesk::config::Config;
use swapdesk::errors::{BlockchainError, QuoteError, StrategyError};
use swapdesk::execution::{ExecutionEngine, RetryPolicy};
use swapdesk::gas_oracle::LiveGasProvider;
use swapdesk::plan_store::PlanStore;
use swapdesk::planner::Planner;
use swapdesk::price_engine::ReferencePriceEngine;
use swapdesk::quote_source::QuoteSource;
use swapdesk::router::RouteResolver;
use swapdesk::slippage::SlippageEstimator;
use swapdesk::strategy::BalanceProvider;
use swapdesk::types::TradeOutcome;

pub fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Quote source answering only the exact (path, amount) pairs scripted into
/// it. Anything else is a revert, which the resolver treats as an unpriceable
/// route.
#[derive(Debug, Default)]
pub struct ScriptedQuoteSource {
    replies: Mutex<HashMap<(Vec<u8>, U256), U256>>,
}

impl ScriptedQuoteSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(&self, path: &Bytes, amount_in: U256, amount_out: U256) {
        self.replies
            .lock()
            .unwrap()
            .insert((path.to_vec(), amount_in), amount_out);
    }
}

#[async_trait]
impl QuoteSource for ScriptedQuoteSource {
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, QuoteError> {
        self.replies
            .lock()
            .unwrap()
            .get(&(path.to_vec(), amount_in))
            .copied()
            .ok_or_else(|| QuoteError::Provider("unscripted quote".into()))
    }
}

/// In-memory chain: programmable gas price, programmable submission failures,
/// and a record of every submitted transaction.
#[derive(Debug)]
pub struct SimChain {
    pub gas_price: Mutex<U256>,
    pub submissions: Mutex<Vec<(Address, Bytes, U256)>>,
    /// Number of upcoming submissions that will fail with a provider error.
    pub failures_remaining: AtomicU32,
    pub allowance: Mutex<U256>,
    pub signer: Mutex<Option<Address>>,
}

impl Default for SimChain {
    fn default() -> Self {
        Self {
            gas_price: Mutex::new(U256::from(50u64) * U256::exp10(9)),
            submissions: Mutex::new(Vec::new()),
            failures_remaining: AtomicU32::new(0),
            allowance: Mutex::new(U256::MAX),
            signer: Mutex::new(Some(Address::repeat_byte(0xee))),
        }
    }
}

impl SimChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_gas_price_gwei(&self, gwei: u64) {
        *self.gas_price.lock().unwrap() = U256::from(gwei) * U256::exp10(9);
    }

    pub fn fail_next_submissions(&self, count: u32) {
        self.failures_remaining.store(count, Ordering::SeqCst);
    }

    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn set_allowance(&self, allowance: U256) {
        *self.allowance.lock().unwrap() = allowance;
    }

    pub fn clear_signer(&self) {
        *self.signer.lock().unwrap() = None;
    }
}

#[async_trait]
impl BlockchainManager for SimChain {
    async fn call(&self, _to: Address, _data: Bytes) -> Result<Bytes, BlockchainError> {
        Err(BlockchainError::Provider("sim chain has no call support".into()))
    }

    async fn gas_price(&self) -> Result<U256, BlockchainError> {
        Ok(*self.gas_price.lock().unwrap())
    }

    async fn erc20_balance(&self, _token: Address, _owner: Address) -> Result<U256, BlockchainError> {
        Ok(U256::zero())
    }

    async fn allowance(
        &self,
        _token: Address,
        _owner: Address,
        _spender: Address,
    ) -> Result<U256, BlockchainError> {
        Ok(*self.allowance.lock().unwrap())
    }

    async fn submit_transaction(
        &self,
        to: Address,
        data: Bytes,
        gas_price: U256,
    ) -> Result<H256, BlockchainError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(BlockchainError::Provider("simulated rpc outage".into()));
        }
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push((to, data, gas_price));
        Ok(H256::from_low_u64_be(submissions.len() as u64))
    }

    fn signer_address(&self) -> Option<Address> {
        *self.signer.lock().unwrap()
    }
}

/// Balance provider returning one programmable stable balance for any wallet.
#[derive(Debug)]
pub struct SimBalances {
    balance: Mutex<Decimal>,
}

impl SimBalances {
    pub fn new(balance: Decimal) -> Self {
        Self {
            balance: Mutex::new(balance),
        }
    }

    pub fn set(&self, balance: Decimal) {
        *self.balance.lock().unwrap() = balance;
    }
}

#[async_trait]
impl BalanceProvider for SimBalances {
    async fn stable_balance(&self, _wallet: Address) -> Result<Decimal, StrategyError> {
        Ok(*self.balance.lock().unwrap())
    }
}

#[derive(Debug, Default)]
pub struct CollectingAlerts {
    pub messages: Mutex<Vec<String>>,
}

impl CollectingAlerts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.messages.lock().unwrap().len()
    }
}

impl AlertSink for CollectingAlerts {
    fn trade_success(&self, outcome: &TradeOutcome) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("success {}", outcome.plan_id));
    }

    fn trade_failure(&self, outcome: &TradeOutcome, reason: &str) {
        self.messages
            .lock()
            .unwrap()
            .push(format!("failure {}: {reason}", outcome.plan_id));
    }

    fn system(&self, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

#[derive(Debug, Default)]
pub struct RecordingTradeLog {
    pub outcomes: Mutex<Vec<TradeOutcome>>,
}

impl RecordingTradeLog {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TradeLog for RecordingTradeLog {
    fn record(&self, outcome: &TradeOutcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }
}

pub fn test_config() -> Arc<Config> {
    let raw = r#"{
        "rpc_url": "http://localhost:8545",
        "chain_id": 1666600000,
        "quoter": "0x314456e8f5efaa3dd1f036ed5900508da8a3b382",
        "router": "0x85495f44768ccbb584d9380cc29149fdaa445f69",
        "gas_cap_gwei": 150,
        "plan_ttl_secs": 60,
        "stable_symbol": "1USDC",
        "native_symbol": "ONE",
        "native_aliases": ["ONE(native)"],
        "wrapped_native_symbol": "WONE",
        "reverse_probe_assets": ["1ETH"],
        "probe_ladder": ["25", "50", "100", "250"],
        "assets": [
            {"symbol": "1USDC", "address": "0x985458e523db3d53125813ed68c274899e9dfab4", "decimals": 6},
            {"symbol": "WONE", "address": "0xcf664087a5bb0237a0bad6742852ec6c8d69a27a", "decimals": 18},
            {"symbol": "1ETH", "address": "0x4cc435d7b9557d54d6ef02d69bbf72634905bf11", "decimals": 18},
            {"symbol": "1SDAI", "address": "0xd9a342b49e38e4cf11d3ac4e8c4e1d9e2b2f7b3c", "decimals": 18, "basis": 100}
        ],
        "routes": {
            "WONE": [{"tokens": ["WONE", "1USDC"], "fees": [3000]}],
            "1SDAI": [{"tokens": ["1SDAI", "1USDC"], "fees": [500]}],
            "1ETH": [
                {"tokens": ["1ETH", "1USDC"], "fees": [3000]},
                {"tokens": ["1ETH", "WONE", "1USDC"], "fees": [3000, 3000]}
            ]
        },
        "strategies": [
            {
                "id": "eth-dip",
                "wallet": "0x44d60e08bf66cbbbc7b96a0de6c01085ec2e8d07",
                "asset": "1ETH",
                "trade_notional": "250",
                "trigger": {"kind": "dip_from_last", "pct": "2"},
                "min_balance": "100",
                "cooldown_secs": 300,
                "mode": "unattended",
                "max_slippage_pct": "1"
            },
            {
                "id": "one-accumulate",
                "wallet": "0x44d60e08bf66cbbbc7b96a0de6c01085ec2e8d07",
                "asset": "WONE",
                "trade_notional": "50",
                "trigger": {"kind": "buy_below", "price": "0.02"},
                "min_balance": "100",
                "cooldown_secs": 120,
                "mode": "unattended",
                "max_slippage_pct": "1"
            },
            {
                "id": "one-manual",
                "wallet": "0x44d60e08bf66cbbbc7b96a0de6c01085ec2e8d07",
                "asset": "WONE",
                "trade_notional": "50",
                "trigger": {"kind": "manual"},
                "min_balance": "100",
                "cooldown_secs": 120,
                "mode": "unattended"
            },
            {
                "id": "one-watch",
                "wallet": "0x44d60e08bf66cbbbc7b96a0de6c01085ec2e8d07",
                "asset": "WONE",
                "trade_notional": "50",
                "trigger": {"kind": "buy_below", "price": "0.02"},
                "min_balance": "100",
                "cooldown_secs": 120,
                "mode": "interactive",
                "max_slippage_pct": "1"
            }
        ]
    }"#;
    Arc::new(Config::from_json(raw).unwrap())
}

/// Encoded path of the asset's n-th configured route, walked as declared
/// (asset towards stable).
pub fn forward_path(config: &Config, symbol: &str, index: usize) -> Bytes {
    config.route_set(symbol).unwrap()[index].encode_path()
}

/// Encoded path of the same route walked stable towards asset.
pub fn reverse_path(config: &Config, symbol: &str, index: usize) -> Bytes {
    config.route_set(symbol).unwrap()[index].reversed().encode_path()
}

/// Everything the integration tests wire together, built around a scripted
/// quote source and the simulated chain.
pub struct Harness {
    pub config: Arc<Config>,
    pub quotes: Arc<ScriptedQuoteSource>,
    pub chain: Arc<SimChain>,
    pub resolver: Arc<RouteResolver>,
    pub prices: Arc<ReferencePriceEngine>,
    pub slippage: Arc<SlippageEstimator>,
    pub plans: Arc<PlanStore>,
    pub planner: Arc<Planner>,
    pub execution: Arc<ExecutionEngine>,
    pub alerts: Arc<CollectingAlerts>,
    pub trade_log: Arc<RecordingTradeLog>,
}

impl Harness {
    pub fn new() -> Self {
        let config = test_config();
        let quotes = Arc::new(ScriptedQuoteSource::new());
        let chain = Arc::new(SimChain::new());
        let resolver = Arc::new(RouteResolver::new(
            Arc::clone(&config),
            Arc::clone(&quotes) as Arc<dyn QuoteSource>,
        ));
        let prices = Arc::new(ReferencePriceEngine::new(
            Arc::clone(&config),
            Arc::clone(&resolver),
        ));
        let slippage = Arc::new(SlippageEstimator::new(
            Arc::clone(&config),
            Arc::clone(&resolver),
            Arc::clone(&prices),
        ));
        let plans = Arc::new(PlanStore::new());
        let planner = Arc::new(Planner::new(
            Arc::clone(&config),
            Arc::clone(&slippage),
            Arc::clone(&plans),
        ));
        let alerts = Arc::new(CollectingAlerts::new());
        let trade_log = Arc::new(RecordingTradeLog::new());
        let gas = Arc::new(LiveGasProvider::new(
            Arc::clone(&chain) as Arc<dyn BlockchainManager>
        ));
        let retry = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(2),
        };
        let execution = Arc::new(ExecutionEngine::new(
            Arc::clone(&config),
            Arc::clone(&plans),
            Arc::clone(&chain) as Arc<dyn BlockchainManager>,
            gas,
            retry,
            Arc::clone(&alerts) as Arc<dyn AlertSink>,
            Arc::clone(&trade_log) as Arc<dyn TradeLog>,
        ));
        Self {
            config,
            quotes,
            chain,
            resolver,
            prices,
            slippage,
            plans,
            planner,
            execution,
            alerts,
            trade_log,
        }
    }
}
