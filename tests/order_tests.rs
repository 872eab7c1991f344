use polaris_bot::market::SymbolFilters;
use polaris_bot::order::{Order, OrderStatus};
use polaris_bot::types::Side;
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn filters() -> SymbolFilters {
    SymbolFilters {
        symbol: "BTCEUR".into(),
        min_qty: d("0.000001"),
        max_qty: d("9000"),
        min_price: d("0.01"),
        max_price: d("1000000"),
        min_notional: d("10"),
    }
}

#[test]
fn distance_shrinks_toward_trigger_side() {
    let buy = Order::new("S_1", "PT_000001", Side::Buy, d("47300"), d("0.01"));
    let sell = Order::new("S_1", "PT_000001", Side::Sell, d("47900"), d("0.012"));

    let cmp = d("47600");
    assert_eq!(buy.distance(cmp), d("300"));
    assert_eq!(sell.distance(cmp), d("300"));
    assert!(!buy.is_ready_for_placement(cmp, d("35")));
    assert!(!sell.is_ready_for_placement(cmp, d("35")));

    // the market drops toward the buy order
    let cmp = d("47280");
    assert_eq!(buy.distance(cmp), d("-20"));
    assert!(buy.is_ready_for_placement(cmp, d("35")));
    assert_eq!(sell.distance(cmp), d("620"));
    assert!(!sell.is_ready_for_placement(cmp, d("35")));
}

#[test]
fn signed_amount_and_total_follow_side_conventions() {
    let buy = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    assert_eq!(buy.signed_amount(), d("0.01"));
    assert_eq!(buy.signed_total(), d("-470.00"));
    assert_eq!(buy.total(), d("470.00"));

    let sell = Order::new("S_1", "PT_000001", Side::Sell, d("47000"), d("0.01"));
    assert_eq!(sell.signed_amount(), d("-0.01"));
    assert_eq!(sell.signed_total(), d("470.00"));
}

#[test]
fn isolation_requires_distance_beyond_maximum() {
    let buy = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    assert!(!buy.is_isolated(d("47400"), d("500")));
    assert!(buy.is_isolated(d("47600"), d("500")));
}

#[test]
fn filter_validation_rejects_bad_orders() {
    let f = filters();

    let ok = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    assert!(ok.is_filter_passed(&f));

    let tiny_qty = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.0000001"));
    assert!(!tiny_qty.is_filter_passed(&f));

    let low_notional = Order::new("S_1", "PT_000001", Side::Buy, d("100"), d("0.01"));
    assert!(!low_notional.is_filter_passed(&f));

    let bad_price = Order::new("S_1", "PT_000001", Side::Sell, d("2000000"), d("0.01"));
    assert!(!bad_price.is_filter_passed(&f));
}

#[test]
fn new_orders_start_in_monitor_with_fresh_uid() {
    let a = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    let b = Order::new("S_1", "PT_000001", Side::Sell, d("47100"), d("0.01"));
    assert_eq!(a.status, OrderStatus::Monitor);
    assert_ne!(a.uid, b.uid);
    assert!(!a.status.is_terminal());
    assert!(OrderStatus::Traded.is_terminal());
    assert!(OrderStatus::Canceled.is_terminal());
}
