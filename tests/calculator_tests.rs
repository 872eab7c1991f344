use polaris_bot::calculator;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn assert_close(a: Decimal, b: Decimal, tol: &str) {
    let diff = (a - b).abs();
    assert!(diff <= d(tol), "expected {a} ~= {b} (diff {diff})");
}

#[test]
fn pt_values_satisfy_base_and_quote_neutrality() {
    let mp = d("45000");
    let net_amount = d("0.00002");
    let s1_qty = d("0.012");
    let buy_fee = d("0.0008");
    let sell_fee = d("0.0008");

    let v = calculator::pt_values(mp, net_amount, s1_qty, buy_fee, sell_fee).unwrap();
    let abf = Decimal::ONE - buy_fee;
    let asf = Decimal::ONE - sell_fee;

    // executing both legs nets exactly net_amount base
    assert_close(abf * v.b1_qty - s1_qty, net_amount, "0.0000001");
    // and zero quote
    assert_close(asf * v.s1_price * s1_qty, v.b1_price * v.b1_qty, "0.000001");

    // the legs straddle the market price symmetrically
    assert_close(v.s1_price - mp, v.gap, "0.0000001");
    assert_close(mp - v.b1_price, v.gap, "0.0000001");
    assert!(v.gap > Decimal::ZERO);
}

#[test]
fn pt_values_with_degenerate_inputs_is_none() {
    assert!(calculator::pt_values(d("45000"), Decimal::ZERO, Decimal::ZERO, d("0.0008"), d("0.0008")).is_none());
}

#[test]
fn compensation_pair_reproduces_the_imbalance() {
    let cmp = d("47600");
    let gap = d("150");
    // leftover of a stale buy: +0.01 base for -470 quote
    let qty_balance = d("0.01");
    let price_balance = d("-470");
    let buy_fee = d("0.0008");
    let sell_fee = d("0.0008");

    let v = calculator::compensation(cmp, gap, qty_balance, price_balance, buy_fee, sell_fee).unwrap();
    let abf = Decimal::ONE - buy_fee;
    let asf = Decimal::ONE - sell_fee;

    assert_eq!(v.b1_price, cmp - gap);
    assert_eq!(v.s1_price, cmp + gap);
    // executing the pair nets the same base and quote as the imbalance
    assert_close(abf * v.b1_qty - v.s1_qty, qty_balance, "0.0000001");
    assert_close(asf * v.s1_price * v.s1_qty - v.b1_price * v.b1_qty, price_balance, "0.0001");
    assert!(v.b1_qty > Decimal::ZERO);
    assert!(v.s1_qty > Decimal::ZERO);
}

#[test]
fn compensation_handles_sell_side_imbalance() {
    let cmp = d("47600");
    let gap = d("150");
    // leftover of a stale sell: -0.01 base for +480 quote
    let qty_balance = d("-0.01");
    let price_balance = d("480");
    let buy_fee = d("0.0008");
    let sell_fee = d("0.0008");

    let v = calculator::compensation(cmp, gap, qty_balance, price_balance, buy_fee, sell_fee).unwrap();
    let abf = Decimal::ONE - buy_fee;
    let asf = Decimal::ONE - sell_fee;

    assert_close(abf * v.b1_qty - v.s1_qty, qty_balance, "0.0000001");
    assert_close(asf * v.s1_price * v.s1_qty - v.b1_price * v.b1_qty, price_balance, "0.0001");
}
