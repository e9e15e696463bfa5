//! # Quote Sources
//!
//! Read-only quoting against the on-chain router quoter, plus the off-chain
//! spot feed used as an advisory cross-check. Every network call runs under
//! its own timeout so a stalled upstream degrades only the requesting cycle.

use async_trait::async_trait;
use ethers::abi::{HumanReadableParser, Token};
use ethers::types::{Bytes, U256};
use reqwest::Client;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::blockchain::BlockchainManager;
use crate::errors::QuoteError;

const SPOT_HTTP_TIMEOUT: Duration = Duration::from_secs(3);

/// A standardized interface for multi-hop exact-input quoting. Implementations
/// never mutate chain state.
#[async_trait]
pub trait QuoteSource: Send + Sync + fmt::Debug {
    /// Quotes `amount_in` through the encoded path, returning the raw output
    /// amount in the terminal token's precision.
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, QuoteError>;
}

/// Quotes through the on-chain quoter contract (`quoteExactInput(bytes,uint256)`).
#[derive(Debug)]
pub struct OnChainQuoteSource {
    chain: Arc<dyn BlockchainManager>,
    quoter: ethers::types::Address,
}

impl OnChainQuoteSource {
    pub fn new(chain: Arc<dyn BlockchainManager>, quoter: ethers::types::Address) -> Self {
        Self { chain, quoter }
    }
}

#[async_trait]
impl QuoteSource for OnChainQuoteSource {
    async fn quote_exact_input(&self, path: Bytes, amount_in: U256) -> Result<U256, QuoteError> {
        let function = HumanReadableParser::parse_function(
            "function quoteExactInput(bytes path, uint256 amountIn) returns (uint256 amountOut)",
        )
        .map_err(|e| QuoteError::Provider(format!("quoter ABI: {e}")))?;
        let calldata = function
            .encode_input(&[Token::Bytes(path.to_vec()), Token::Uint(amount_in)])
            .map_err(|e| QuoteError::Provider(format!("quoter encode: {e}")))?;

        let raw = self.chain.call(self.quoter, Bytes::from(calldata)).await?;

        let mut tokens = function
            .decode_output(raw.as_ref())
            .map_err(|e| QuoteError::Provider(format!("quoter decode: {e}")))?;
        match tokens.pop() {
            Some(Token::Uint(amount_out)) => Ok(amount_out),
            other => Err(QuoteError::Provider(format!(
                "quoter returned unexpected output: {other:?}"
            ))),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SpotReply {
    data: SpotData,
}

#[derive(Debug, Deserialize)]
struct SpotData {
    amount: String,
}

/// Off-chain spot price lookup for one externally-traded asset. Advisory
/// cross-check only, never authoritative for trading decisions.
#[derive(Debug, Clone)]
pub struct SpotPriceFeed {
    client: Client,
    product: String,
}

impl SpotPriceFeed {
    pub fn new(product: String) -> Result<Self, QuoteError> {
        let client = Client::builder()
            .timeout(SPOT_HTTP_TIMEOUT)
            .user_agent("swapdesk/0.3")
            .build()
            .map_err(|e| QuoteError::Provider(format!("spot client: {e}")))?;
        Ok(Self { client, product })
    }

    /// Fetches the current spot price in USD.
    pub async fn spot_usd(&self) -> Result<rust_decimal::Decimal, QuoteError> {
        let url = format!("https://api.coinbase.com/v2/prices/{}/spot", self.product);
        let reply: SpotReply = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| QuoteError::Provider(format!("spot request: {e}")))?
            .error_for_status()
            .map_err(|e| QuoteError::Provider(format!("spot status: {e}")))?
            .json()
            .await
            .map_err(|e| QuoteError::Provider(format!("spot body: {e}")))?;
        reply
            .data
            .amount
            .parse()
            .map_err(|e| QuoteError::Provider(format!("spot parse '{}': {e}", reply.data.amount)))
    }

    pub fn product(&self) -> &str {
        &self.product
    }
}
