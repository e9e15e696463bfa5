//! # Chain Access
//!
//! Thin trait over the JSON-RPC surface the desk actually needs: read-only
//! calls, gas price, balances, allowance, and raw transaction submission.
//! The trait seam exists so tests and simulations inject their own chain.

use async_trait::async_trait;
use ethers::abi::{HumanReadableParser, Token};
use ethers::middleware::SignerMiddleware;
use ethers::providers::{Http, Middleware, Provider};
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Bytes, TransactionRequest, H256, U256};
use std::fmt;
use std::time::Duration;
use tracing::debug;

use crate::errors::BlockchainError;

#[async_trait]
pub trait BlockchainManager: Send + Sync + fmt::Debug {
    /// Read-only contract call.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BlockchainError>;

    /// Current network gas price in wei.
    async fn gas_price(&self) -> Result<U256, BlockchainError>;

    /// ERC-20 balance of `owner` for `token`.
    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, BlockchainError>;

    /// ERC-20 allowance granted by `owner` to `spender`.
    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BlockchainError>;

    /// Signs and submits a transaction, returning its hash. Does not wait for
    /// inclusion.
    async fn submit_transaction(
        &self,
        to: Address,
        data: Bytes,
        gas_price: U256,
    ) -> Result<H256, BlockchainError>;

    /// Address of the configured signer, if any.
    fn signer_address(&self) -> Option<Address>;
}

/// Production implementation over an HTTP provider with an optional local
/// signer. Every RPC round-trip runs under `call_timeout`.
pub struct EthBlockchainManager {
    provider: Provider<Http>,
    signer: Option<SignerMiddleware<Provider<Http>, LocalWallet>>,
    chain_id: u64,
    call_timeout: Duration,
}

impl fmt::Debug for EthBlockchainManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EthBlockchainManager")
            .field("chain_id", &self.chain_id)
            .field("signer", &self.signer.as_ref().map(|s| s.address()))
            .finish()
    }
}

impl EthBlockchainManager {
    pub fn new(
        rpc_url: &str,
        chain_id: u64,
        wallet: Option<LocalWallet>,
        call_timeout: Duration,
    ) -> Result<Self, BlockchainError> {
        let provider = Provider::<Http>::try_from(rpc_url)
            .map_err(|e| BlockchainError::InvalidUrl(format!("{rpc_url}: {e}")))?;
        let signer = wallet.map(|w| {
            SignerMiddleware::new(provider.clone(), w.with_chain_id(chain_id))
        });
        Ok(Self {
            provider,
            signer,
            chain_id,
            call_timeout,
        })
    }

    async fn with_timeout<T, F>(&self, fut: F) -> Result<T, BlockchainError>
    where
        F: std::future::Future<Output = Result<T, BlockchainError>>,
    {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| BlockchainError::Timeout(self.call_timeout))?
    }

    fn erc20_view(
        signature: &str,
        args: &[Token],
    ) -> Result<(ethers::abi::Function, Bytes), BlockchainError> {
        let function = HumanReadableParser::parse_function(signature)
            .map_err(|e| BlockchainError::Abi(e.to_string()))?;
        let data = function
            .encode_input(args)
            .map_err(|e| BlockchainError::Abi(e.to_string()))?;
        Ok((function, Bytes::from(data)))
    }

    fn decode_uint(function: &ethers::abi::Function, raw: &[u8]) -> Result<U256, BlockchainError> {
        let mut tokens = function
            .decode_output(raw)
            .map_err(|e| BlockchainError::Abi(e.to_string()))?;
        match tokens.pop() {
            Some(Token::Uint(v)) => Ok(v),
            other => Err(BlockchainError::Abi(format!("expected uint, got {other:?}"))),
        }
    }
}

#[async_trait]
impl BlockchainManager for EthBlockchainManager {
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, BlockchainError> {
        let tx = TransactionRequest::new().to(to).data(data);
        self.with_timeout(async {
            self.provider
                .call(&tx.into(), None)
                .await
                .map_err(|e| BlockchainError::Provider(e.to_string()))
        })
        .await
    }

    async fn gas_price(&self) -> Result<U256, BlockchainError> {
        self.with_timeout(async {
            self.provider
                .get_gas_price()
                .await
                .map_err(|e| BlockchainError::Provider(e.to_string()))
        })
        .await
    }

    async fn erc20_balance(&self, token: Address, owner: Address) -> Result<U256, BlockchainError> {
        let (function, data) = Self::erc20_view(
            "function balanceOf(address owner) view returns (uint256)",
            &[Token::Address(owner)],
        )?;
        let raw = self.call(token, data).await?;
        Self::decode_uint(&function, raw.as_ref())
    }

    async fn allowance(
        &self,
        token: Address,
        owner: Address,
        spender: Address,
    ) -> Result<U256, BlockchainError> {
        let (function, data) = Self::erc20_view(
            "function allowance(address owner, address spender) view returns (uint256)",
            &[Token::Address(owner), Token::Address(spender)],
        )?;
        let raw = self.call(token, data).await?;
        Self::decode_uint(&function, raw.as_ref())
    }

    async fn submit_transaction(
        &self,
        to: Address,
        data: Bytes,
        gas_price: U256,
    ) -> Result<H256, BlockchainError> {
        let signer = self.signer.as_ref().ok_or(BlockchainError::NoSigner)?;
        let tx = TransactionRequest::new()
            .to(to)
            .data(data)
            .gas_price(gas_price)
            .chain_id(self.chain_id);
        let pending = self
            .with_timeout(async {
                signer
                    .send_transaction(tx, None)
                    .await
                    .map_err(|e| BlockchainError::Provider(e.to_string()))
            })
            .await?;
        let tx_hash = pending.tx_hash();
        debug!(%tx_hash, "transaction submitted");
        Ok(tx_hash)
    }

    fn signer_address(&self) -> Option<Address> {
        self.signer.as_ref().map(|s| s.address())
    }
}
