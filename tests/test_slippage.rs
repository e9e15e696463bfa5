//! Slippage estimation against the scripted quote source: sizing, the
//! effective-price formula, and monotonicity of the curve.

mod common;

use common::{d, forward_path, reverse_path, Harness};
use ethers::types::U256;
use rust_decimal::Decimal;
use swapdesk::decimals::to_wei;
use swapdesk::errors::PriceError;

fn usdc(units: &str) -> U256 {
    to_wei(d(units), 6).unwrap()
}

fn wei18(units: Decimal) -> U256 {
    to_wei(units, 18).unwrap()
}

/// Mid at 0.018 with reverse fills at the given effective prices per target.
fn script_wone(h: &Harness, fills: &[(&str, &str)]) {
    h.quotes
        .script(&forward_path(&h.config, "WONE", 0), wei18(d("1")), usdc("0.018"));
    let reverse = reverse_path(&h.config, "WONE", 0);
    for (target, effective) in fills {
        h.quotes
            .script(&reverse, usdc(target), wei18(d(target) / d(effective)));
    }
}

#[tokio::test]
async fn estimate_reports_effective_price_against_mid() {
    let h = Harness::new();
    script_wone(&h, &[("50", "0.01805")]);

    let estimate = h.slippage.estimate("WONE", d("50")).await.unwrap();
    assert_eq!(estimate.mid, d("0.018"));
    // effective = target / realized output
    let diff = (estimate.effective_price - d("0.01805")).abs();
    assert!(diff < d("0.0000001"), "effective {}", estimate.effective_price);
    // (0.01805 - 0.018) / 0.018 * 100 = 0.2777..%
    assert!(estimate.slippage_pct > d("0.27") && estimate.slippage_pct < d("0.29"));
    // input estimate is target/mid quantized to the asset increment
    assert_eq!(
        estimate.input_estimate,
        d("2777.777777")
    );
}

#[tokio::test]
async fn slippage_is_monotone_in_size() {
    let h = Harness::new();
    script_wone(
        &h,
        &[("50", "0.01805"), ("100", "0.01812"), ("200", "0.01831")],
    );

    let curve = h
        .slippage
        .slippage_curve("WONE", &[d("50"), d("100"), d("200")])
        .await
        .unwrap();
    assert_eq!(curve.len(), 3);
    for pair in curve.windows(2) {
        assert!(
            pair[1].slippage_pct >= pair[0].slippage_pct,
            "slippage fell with size: {} then {}",
            pair[0].slippage_pct,
            pair[1].slippage_pct
        );
    }
    assert!(curve[0].slippage_pct > Decimal::ZERO);
}

#[tokio::test]
async fn curve_skips_unquotable_rungs() {
    let h = Harness::new();
    script_wone(&h, &[("50", "0.01805"), ("200", "0.01831")]);

    let curve = h
        .slippage
        .slippage_curve("WONE", &[d("50"), d("100"), d("200")])
        .await
        .unwrap();
    assert_eq!(curve.len(), 2);
    assert_eq!(curve[0].target_notional, d("50"));
    assert_eq!(curve[1].target_notional, d("200"));
}

#[tokio::test]
async fn estimate_without_reference_price_fails() {
    let h = Harness::new();
    // No forward quote scripted: mid is unavailable, so no estimate.
    let err = h.slippage.estimate("WONE", d("50")).await.unwrap_err();
    assert!(matches!(err, PriceError::NoLiquidity(_)));
}

#[tokio::test]
async fn non_positive_target_is_rejected() {
    let h = Harness::new();
    script_wone(&h, &[("50", "0.01805")]);
    assert!(h.slippage.estimate("WONE", Decimal::ZERO).await.is_err());
    assert!(h.slippage.estimate("WONE", d("-10")).await.is_err());
}
