use polaris_bot::balance::BalanceManager;
use polaris_bot::order::Order;
use polaris_bot::types::{AccountBalance, AssetBalance, Side};
use rust_decimal::Decimal;
use std::str::FromStr;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn account(base_free: &str, quote_free: &str) -> AccountBalance {
    AccountBalance {
        base: AssetBalance {
            asset: "BTC".into(),
            free: d(base_free),
            locked: Decimal::ZERO,
        },
        quote: AssetBalance {
            asset: "EUR".into(),
            free: d(quote_free),
            locked: Decimal::ZERO,
        },
        fee: AssetBalance {
            asset: "BNB".into(),
            free: d("50"),
            locked: Decimal::ZERO,
        },
    }
}

#[test]
fn buy_reservation_must_leave_the_quote_buffer_free() {
    let manager = BalanceManager::new(account("0.2", "6500"), d("2000"), d("0.04"));

    // costs 5000: only 1500 would remain, below the 2000 buffer
    let too_big = Order::new("S_1", "PT_000001", Side::Buy, d("50000"), d("0.1"));
    let (ok, needed) = manager.is_balance_enough(&too_big);
    assert!(!ok);
    assert_eq!(needed, d("5000.0"));

    // costs 4000: 2500 remains
    let fits = Order::new("S_1", "PT_000001", Side::Buy, d("50000"), d("0.08"));
    let (ok, needed) = manager.is_balance_enough(&fits);
    assert!(ok);
    assert_eq!(needed, d("4000.00"));
}

#[test]
fn sell_reservation_must_leave_the_base_buffer_free() {
    let manager = BalanceManager::new(account("0.1", "10000"), d("2000"), d("0.04"));

    let too_big = Order::new("S_1", "PT_000001", Side::Sell, d("50000"), d("0.08"));
    assert!(!manager.is_balance_enough(&too_big).0);

    let fits = Order::new("S_1", "PT_000001", Side::Sell, d("50000"), d("0.05"));
    assert!(manager.is_balance_enough(&fits).0);
}

#[test]
fn net_is_current_minus_initial() {
    let mut manager = BalanceManager::new(account("0.2", "10000"), d("2000"), d("0.04"));
    assert_eq!(manager.net().base.free, Decimal::ZERO);

    manager.update_current(account("0.25", "7500"));
    let net = manager.net();
    assert_eq!(net.base.free, d("0.05"));
    assert_eq!(net.quote.free, d("-2500"));
}
