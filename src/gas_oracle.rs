//! Gas price lookup behind a trait so the execution engine can be driven by a
//! simulated oracle in tests.

use async_trait::async_trait;
use ethers::types::U256;
use std::fmt;
use std::sync::Arc;

use crate::blockchain::BlockchainManager;
use crate::errors::GasError;

#[async_trait]
pub trait GasOracleProvider: Send + Sync + fmt::Debug {
    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<U256, GasError>;
}

/// Live oracle delegating to the chain's `eth_gasPrice`.
#[derive(Debug)]
pub struct LiveGasProvider {
    chain: Arc<dyn BlockchainManager>,
}

impl LiveGasProvider {
    pub fn new(chain: Arc<dyn BlockchainManager>) -> Self {
        Self { chain }
    }
}

#[async_trait]
impl GasOracleProvider for LiveGasProvider {
    async fn gas_price(&self) -> Result<U256, GasError> {
        Ok(self.chain.gas_price().await?)
    }
}
