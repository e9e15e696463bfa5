//! Calldata construction for plan execution. This is the only place in the
//! crate that encodes swap calldata; the path bytes, input amount and minimum
//! output come straight from the stored plan.

use ethers::abi::{HumanReadableParser, Token};
use ethers::types::{Address, Bytes, U256};

use crate::errors::ExecutionError;

/// Encodes `exactInput((bytes path, address recipient, uint256 amountIn,
/// uint256 amountOutMinimum))`. The minimum output is the plan's slippage
/// bound, never a fresh quote.
pub fn build_exact_input_calldata(
    path: Bytes,
    recipient: Address,
    amount_in: U256,
    amount_out_minimum: U256,
) -> Result<Bytes, ExecutionError> {
    let function = HumanReadableParser::parse_function(
        "function exactInput((bytes,address,uint256,uint256) params) returns (uint256 amountOut)",
    )
    .map_err(|e| ExecutionError::Calldata(format!("router ABI: {e}")))?;
    let params = Token::Tuple(vec![
        Token::Bytes(path.to_vec()),
        Token::Address(recipient),
        Token::Uint(amount_in),
        Token::Uint(amount_out_minimum),
    ]);
    let data = function
        .encode_input(&[params])
        .map_err(|e| ExecutionError::Calldata(format!("router encode: {e}")))?;
    Ok(Bytes::from(data))
}
