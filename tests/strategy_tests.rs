use polaris_bot::book::PendingOrdersBook;
use polaris_bot::order::Order;
use polaris_bot::persistence::SqliteStore;
use polaris_bot::strategy::{StrategyManager, StrategyParams};
use polaris_bot::types::Side;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn params() -> StrategyParams {
    StrategyParams {
        min_cycles_for_first_split: 100,
        distance_for_first_children: d("150"),
        inter_distance_children: d("50"),
        child_count: 2,
        compensation_enabled: false,
        distance_for_compensation: d("200"),
        compensation_gap: d("50"),
        side_balance_distance: d("150"),
        concentration_gap: d("50"),
        max_compensation_qty: d("0.07"),
        buy_fee: d("0.0008"),
        sell_fee: d("0.0008"),
    }
}

async fn empty_book() -> PendingOrdersBook {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    store.init_schema().await.unwrap();
    PendingOrdersBook::new(Vec::new(), store)
}

#[tokio::test]
async fn old_and_distant_orders_get_split() {
    let manager = StrategyManager::new(params());
    let mut book = empty_book().await;

    let mut order = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    order.cycles_count = 150;
    let uid = order.uid.clone();
    book.add_order(order).await;

    // distance 200 > 150 and age above the threshold
    let delta = manager.assess_strategy_actions(&mut book, d("47600")).await;
    assert_eq!(delta, -1);
    assert_eq!(book.monitor.len(), 2);
    assert!(book.get_monitor_order(&uid).is_none());
}

#[tokio::test]
async fn young_orders_are_left_alone() {
    let manager = StrategyManager::new(params());
    let mut book = empty_book().await;

    let mut order = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    order.cycles_count = 10;
    book.add_order(order).await;

    let delta = manager.assess_strategy_actions(&mut book, d("47600")).await;
    assert_eq!(delta, 0);
    assert_eq!(book.monitor.len(), 1);
}

#[tokio::test]
async fn close_orders_are_not_split() {
    let manager = StrategyManager::new(params());
    let mut book = empty_book().await;

    let mut order = Order::new("S_1", "PT_000001", Side::Buy, d("47550"), d("0.01"));
    order.cycles_count = 150;
    book.add_order(order).await;

    // distance 50 < 150
    let delta = manager.assess_strategy_actions(&mut book, d("47600")).await;
    assert_eq!(delta, 0);
    assert_eq!(book.monitor.len(), 1);
}

#[tokio::test]
async fn already_split_orders_are_not_split_again() {
    let manager = StrategyManager::new(params());
    let mut book = empty_book().await;

    let mut order = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    order.cycles_count = 150;
    order.split_count = 1;
    book.add_order(order).await;

    let delta = manager.assess_strategy_actions(&mut book, d("47600")).await;
    assert_eq!(delta, 0);
    assert_eq!(book.monitor.len(), 1);
}

#[test]
fn one_sided_distant_monitor_triggers_concentration() {
    let manager = StrategyManager::new(params());
    let cmp = d("47600");

    let monitor: Vec<Order> = ["47400", "47350", "47300"]
        .iter()
        .map(|p| Order::new("S_1", "PT_000001", Side::Buy, d(p), d("0.01")))
        .collect();

    let candidates = manager.assess_side_balance(&monitor, cmp);
    assert_eq!(candidates.len(), 3);
}

#[test]
fn a_single_opposite_order_blocks_concentration() {
    let manager = StrategyManager::new(params());
    let cmp = d("47600");

    let mut monitor: Vec<Order> = ["47400", "47350", "47300"]
        .iter()
        .map(|p| Order::new("S_1", "PT_000001", Side::Buy, d(p), d("0.01")))
        .collect();
    monitor.push(Order::new("S_1", "PT_000002", Side::Sell, d("47700"), d("0.01")));

    assert!(manager.assess_side_balance(&monitor, cmp).is_empty());
}

#[test]
fn two_distant_orders_are_not_enough_to_concentrate() {
    let manager = StrategyManager::new(params());
    let cmp = d("47600");

    let monitor: Vec<Order> = ["47400", "47350"]
        .iter()
        .map(|p| Order::new("S_1", "PT_000001", Side::Buy, d(p), d("0.01")))
        .collect();

    assert!(manager.assess_side_balance(&monitor, cmp).is_empty());
}
