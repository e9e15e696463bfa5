use clap::{Parser, Subcommand};
use ethers::signers::LocalWallet;
use eyre::WrapErr;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use swapdesk::alert::{AlertSink, JsonlTradeLog, NullTradeLog, TracingAlertSink, TradeLog};
use swapdesk::blockchain::{BlockchainManager, EthBlockchainManager};
use swapdesk::config::Config;
use swapdesk::execution::{ExecutionEngine, RetryPolicy};
use swapdesk::gas_oracle::LiveGasProvider;
use swapdesk::operator::OperatorDesk;
use swapdesk::plan_store::PlanStore;
use swapdesk::planner::Planner;
use swapdesk::price_engine::ReferencePriceEngine;
use swapdesk::quote_source::{OnChainQuoteSource, SpotPriceFeed};
use swapdesk::router::RouteResolver;
use swapdesk::slippage::SlippageEstimator;
use swapdesk::strategy::scheduler::StrategyScheduler;
use swapdesk::strategy::{ChainBalanceProvider, StrategyEngine};

const PRIVATE_KEY_ENV: &str = "SWAPDESK_PRIVATE_KEY";

#[derive(Parser)]
#[command(name = "swapdesk", about = "DEX price discovery, planning and execution desk")]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(long, default_value = "config.json")]
    config: String,

    /// Append trade outcomes to this JSONL file.
    #[arg(long)]
    trade_log: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the strategy loops until interrupted.
    Run,
    /// Print current reference prices for all routed assets.
    Prices,
    /// Print the slippage curve for one asset.
    Slippage {
        symbol: String,
        /// Target notionals in stable units.
        #[arg(default_values_t = [Decimal::from(100), Decimal::from(250), Decimal::from(500), Decimal::from(1000)])]
        targets: Vec<Decimal>,
    },
    /// Preview a trade for a strategy without executing it.
    Plan {
        strategy: String,
        /// Override the strategy's configured notional.
        #[arg(long)]
        notional: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ethers_providers=warn,hyper=warn")),
        )
        .init();

    let cli = Cli::parse();
    let config = Arc::new(Config::load(&cli.config).wrap_err("loading configuration")?);
    let desk = build_desk(Arc::clone(&config), cli.trade_log.as_deref())?;

    match cli.command {
        Command::Run => run_loops(desk).await,
        Command::Prices => {
            for report in desk.operator.prices().await {
                match (report.spot_usd, report.spot_deviation_pct) {
                    (Some(spot), Some(dev)) => println!(
                        "{:>8}  mid {}  spot {}  dev {}%",
                        report.reference.symbol,
                        report.reference.mid.round_dp(6),
                        spot,
                        dev.round_dp(3)
                    ),
                    _ => println!(
                        "{:>8}  mid {}",
                        report.reference.symbol,
                        report.reference.mid.round_dp(6)
                    ),
                }
            }
            Ok(())
        }
        Command::Slippage { symbol, targets } => {
            let curve = desk.operator.slippage_curve(&symbol, &targets).await?;
            for row in curve {
                println!(
                    "{:>10} -> eff {}  mid {}  slippage {}%",
                    row.target_notional,
                    row.effective_price.round_dp(6),
                    row.mid.round_dp(6),
                    row.slippage_pct.round_dp(4)
                );
            }
            Ok(())
        }
        Command::Plan { strategy, notional } => {
            let preview = desk.operator.plan(&strategy, notional).await?;
            println!("plan {}", preview.plan.id);
            println!("  route      {}", preview.plan.route.label());
            println!(
                "  input      {} {}",
                preview.plan.input_amount, preview.plan.input_symbol
            );
            println!("  min output {}", preview.plan.min_output);
            println!(
                "  est. slippage {}%",
                preview.estimate.slippage_pct.round_dp(4)
            );
            println!("  expires at {}", preview.plan.expires_at);
            warn!("plan previews are held in memory; execution requires the running desk");
            Ok(())
        }
    }
}

struct Desk {
    operator: OperatorDesk,
    scheduler: StrategyScheduler,
    shutdown: CancellationToken,
}

fn build_desk(config: Arc<Config>, trade_log_path: Option<&str>) -> eyre::Result<Desk> {
    let wallet = match std::env::var(PRIVATE_KEY_ENV) {
        Ok(key) => Some(
            key.parse::<LocalWallet>()
                .wrap_err_with(|| format!("parsing {PRIVATE_KEY_ENV}"))?,
        ),
        Err(_) => {
            warn!("no {PRIVATE_KEY_ENV} set; running read-only, submissions will fail");
            None
        }
    };

    let chain: Arc<dyn BlockchainManager> = Arc::new(EthBlockchainManager::new(
        &config.rpc_url,
        config.chain_id,
        wallet,
        Duration::from_secs(config.call_timeout_secs),
    )?);

    let quotes = Arc::new(OnChainQuoteSource::new(Arc::clone(&chain), config.quoter));
    let resolver = Arc::new(RouteResolver::new(Arc::clone(&config), quotes));
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

    let alerts: Arc<dyn AlertSink> = Arc::new(TracingAlertSink);
    let trade_log: Arc<dyn TradeLog> = match trade_log_path {
        Some(path) => Arc::new(JsonlTradeLog::new(path)),
        None => Arc::new(NullTradeLog),
    };

    let gas = Arc::new(LiveGasProvider::new(Arc::clone(&chain)));
    let execution = Arc::new(ExecutionEngine::new(
        Arc::clone(&config),
        Arc::clone(&plans),
        Arc::clone(&chain),
        gas,
        RetryPolicy::default(),
        Arc::clone(&alerts),
        trade_log,
    ));

    let balances: Arc<dyn swapdesk::strategy::BalanceProvider> =
        Arc::new(ChainBalanceProvider::new(Arc::clone(&chain), &config)?);
    let engines: Vec<Arc<StrategyEngine>> = config
        .strategies
        .iter()
        .map(|settings| {
            Arc::new(StrategyEngine::new(
                settings.clone(),
                Arc::clone(&prices),
                Arc::clone(&planner),
                Arc::clone(&execution),
                Arc::clone(&balances),
                Arc::clone(&alerts),
            ))
        })
        .collect();

    let spot = match &config.spot_product {
        Some(product) => Some(SpotPriceFeed::new(product.clone())?),
        None => None,
    };

    let shutdown = CancellationToken::new();
    let scheduler = StrategyScheduler::new(engines.clone(), shutdown.clone());
    let operator = OperatorDesk::new(
        config,
        planner,
        execution,
        prices,
        slippage,
        plans,
        engines,
        spot,
    );

    Ok(Desk {
        operator,
        scheduler,
        shutdown,
    })
}

async fn run_loops(desk: Desk) -> eyre::Result<()> {
    let handles = desk.scheduler.spawn();
    info!(strategies = handles.len(), "desk running");

    tokio::signal::ctrl_c()
        .await
        .wrap_err("waiting for shutdown signal")?;
    info!("shutdown requested");
    desk.shutdown.cancel();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "strategy task panicked");
        }
    }
    info!("desk stopped");
    Ok(())
}
