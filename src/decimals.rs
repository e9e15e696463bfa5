//! Conversions between on-chain integer amounts and whole-asset `Decimal`
//! amounts, plus quantization to an asset's minimum tradable increment.

use ethers::types::U256;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::errors::PriceError;

/// Converts a whole-asset amount into its integer on-chain representation,
/// truncating any fraction below the token's precision.
pub fn to_wei(amount: Decimal, decimals: u8) -> Result<U256, PriceError> {
    if amount.is_sign_negative() {
        return Err(PriceError::Math(format!("negative amount: {amount}")));
    }
    let scale = pow10(decimals)?;
    let scaled = amount
        .checked_mul(scale)
        .ok_or_else(|| PriceError::Math(format!("amount overflow: {amount} * 10^{decimals}")))?
        .trunc();
    let raw = scaled
        .to_u128()
        .ok_or_else(|| PriceError::Math(format!("amount does not fit u128: {scaled}")))?;
    Ok(U256::from(raw))
}

/// Converts an integer on-chain amount back into whole-asset units.
pub fn from_wei(wei: U256, decimals: u8) -> Result<Decimal, PriceError> {
    if wei > U256::from(u128::MAX) {
        return Err(PriceError::Math(format!("wei amount does not fit u128: {wei}")));
    }
    let raw = wei.as_u128();
    if raw > i128::MAX as u128 {
        return Err(PriceError::Math(format!("wei amount does not fit i128: {wei}")));
    }
    Decimal::try_from_i128_with_scale(raw as i128, decimals as u32)
        .map(|d| d.normalize())
        .map_err(|e| PriceError::Math(format!("from_wei({wei}, {decimals}): {e}")))
}

/// Rounds `amount` down to a whole multiple of `increment`. An increment of
/// zero leaves the amount untouched.
pub fn quantize_down(amount: Decimal, increment: Decimal) -> Decimal {
    if increment.is_zero() || increment.is_sign_negative() {
        return amount;
    }
    let steps = (amount / increment).trunc();
    (steps * increment).normalize()
}

fn pow10(decimals: u8) -> Result<Decimal, PriceError> {
    // Decimal carries 28-29 significant digits; token precisions beyond that
    // cannot be represented exactly.
    if decimals > 28 {
        return Err(PriceError::Math(format!("unsupported token precision: {decimals}")));
    }
    Ok(Decimal::from_i128_with_scale(10i128.pow(decimals as u32), 0))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn to_wei_and_back() {
        let amount = d("1.5");
        let wei = to_wei(amount, 18).unwrap();
        assert_eq!(wei, U256::from(1_500_000_000_000_000_000u128));
        assert_eq!(from_wei(wei, 18).unwrap(), amount);
    }

    #[test]
    fn to_wei_truncates_subprecision_dust() {
        // 6-decimal token cannot represent the 7th decimal place.
        let wei = to_wei(d("0.1234567"), 6).unwrap();
        assert_eq!(wei, U256::from(123_456u64));
    }

    #[test]
    fn to_wei_rejects_negative() {
        assert!(to_wei(d("-1"), 18).is_err());
    }

    #[test]
    fn quantize_down_to_increment() {
        assert_eq!(quantize_down(d("1.2349"), d("0.001")), d("1.234"));
        assert_eq!(quantize_down(d("5"), d("0.5")), d("5"));
        // Zero increment leaves the amount alone.
        assert_eq!(quantize_down(d("1.2349"), Decimal::ZERO), d("1.2349"));
    }
}
