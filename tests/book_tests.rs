use polaris_bot::book::{PendingOrdersBook, TradedOrdersBook};
use polaris_bot::order::{Order, OrderStatus};
use polaris_bot::persistence::{SqliteStore, PENDING_TABLE};
use polaris_bot::types::Side;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;

fn d(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

async fn empty_book() -> PendingOrdersBook {
    let store = Arc::new(SqliteStore::new(":memory:").await.unwrap());
    store.init_schema().await.unwrap();
    PendingOrdersBook::new(Vec::new(), store)
}

#[tokio::test]
async fn split_replaces_parent_with_equal_children() {
    let mut book = empty_book().await;
    let parent = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    let uid = parent.uid.clone();
    book.add_order(parent).await;

    assert!(book.split_order(&uid, d("50"), 2).await);

    assert_eq!(book.monitor.len(), 2);
    assert!(book.get_monitor_order(&uid).is_none());

    let total: Decimal = book.monitor.iter().map(|o| o.amount).sum();
    assert_eq!(total, d("0.01"));
    let prices: Vec<Decimal> = book.monitor.iter().map(|o| o.price).collect();
    assert!(prices.contains(&d("47350.00")));
    assert!(prices.contains(&d("47450.00")));
    for child in &book.monitor {
        assert_eq!(child.pt_id, "PT_000001");
        assert_eq!(child.split_count, 1);
        assert_eq!(child.side, Side::Buy);
        assert_eq!(child.status, OrderStatus::Monitor);
    }
}

#[tokio::test]
async fn three_way_split_preserves_the_exact_amount() {
    let mut book = empty_book().await;
    // 0.01 does not divide evenly by 3 at six decimals
    let parent = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    let uid = parent.uid.clone();
    book.add_order(parent).await;

    assert!(book.split_order(&uid, d("50"), 3).await);

    assert_eq!(book.monitor.len(), 3);
    let total: Decimal = book.monitor.iter().map(|o| o.amount).sum();
    assert_eq!(total, d("0.01"));
    let prices: Vec<Decimal> = book.monitor.iter().map(|o| o.price).collect();
    assert!(prices.contains(&d("47350.00")));
    assert!(prices.contains(&d("47400.00")));
    assert!(prices.contains(&d("47450.00")));
}

#[tokio::test]
async fn split_rejects_unsupported_child_count() {
    let mut book = empty_book().await;
    let parent = Order::new("S_1", "PT_000001", Side::Buy, d("47400"), d("0.01"));
    let uid = parent.uid.clone();
    book.add_order(parent).await;

    assert!(!book.split_order(&uid, d("50"), 5).await);
    assert_eq!(book.monitor.len(), 1);
}

#[tokio::test]
async fn compensation_replaces_stale_order_with_straddling_pair() {
    let mut book = empty_book().await;
    // a buy left far below the market
    let stale = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    let uid = stale.uid.clone();
    book.add_order(stale).await;

    let ok = book
        .compensate_order(&uid, d("47600"), d("150"), d("0.0008"), d("0.0008"), d("0.07"))
        .await;
    assert!(ok);

    assert_eq!(book.monitor.len(), 2);
    assert!(book.get_monitor_order(&uid).is_none());
    let buy = book.monitor.iter().find(|o| o.side == Side::Buy).unwrap();
    let sell = book.monitor.iter().find(|o| o.side == Side::Sell).unwrap();
    assert_eq!(buy.price, d("47450"));
    assert_eq!(sell.price, d("47750"));
    assert!(buy.amount > Decimal::ZERO);
    assert!(sell.amount > Decimal::ZERO);
    assert_eq!(buy.pt_id, "PT_000001");
    assert_eq!(sell.pt_id, "PT_000001");
    assert_eq!(buy.compensation_count, 1);
    assert_eq!(sell.compensation_count, 1);
}

#[tokio::test]
async fn compensation_over_the_qty_ceiling_leaves_the_book_unchanged() {
    let mut book = empty_book().await;
    let stale = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    let uid = stale.uid.clone();
    book.add_order(stale).await;

    // the computed replacement quantities exceed a tiny ceiling
    let ok = book
        .compensate_order(&uid, d("47600"), d("150"), d("0.0008"), d("0.0008"), d("0.001"))
        .await;
    assert!(!ok);

    assert_eq!(book.monitor.len(), 1);
    let order = book.get_monitor_order(&uid).unwrap();
    assert_eq!(order.status, OrderStatus::Monitor);
    assert_eq!(order.compensation_count, 0);
    assert_eq!(book.store().count_orders(PENDING_TABLE).await.unwrap(), 1);
}

#[tokio::test]
async fn concentration_collapses_one_sided_orders_into_a_pair() {
    let mut book = empty_book().await;
    let mut traded = TradedOrdersBook::new();

    let mut uids = Vec::new();
    for (pt, price) in [("PT_000001", "47500"), ("PT_000002", "47450"), ("PT_000003", "47400")] {
        let order = Order::new("S_1", pt, Side::Buy, d(price), d("0.01"));
        uids.push(order.uid.clone());
        book.add_order(order).await;
    }

    // a filled sibling of PT_000001 waits in the traded history
    let mut filled = Order::new("S_1", "PT_000001", Side::Sell, d("47650"), d("0.01"));
    filled.status = OrderStatus::Traded;
    traded.add(filled, true);

    let ok = book
        .concentrate_orders(
            &uids,
            d("47600"),
            d("150"),
            d("0.0008"),
            d("0.0008"),
            d("0.07"),
            "CON_000004",
            &mut traded,
        )
        .await;
    assert!(ok);

    assert_eq!(book.monitor.len(), 2);
    for uid in &uids {
        assert!(book.get_monitor_order(uid).is_none());
    }
    let buy = book.monitor.iter().find(|o| o.side == Side::Buy).unwrap();
    let sell = book.monitor.iter().find(|o| o.side == Side::Sell).unwrap();
    assert_eq!(buy.pt_id, "CON_000004");
    assert_eq!(sell.pt_id, "CON_000004");
    assert_eq!(buy.concentration_count, 1);
    assert_eq!(sell.concentration_count, 1);

    // traded history sharing an input pt_id follows the new label
    assert_eq!(traded.pending.len() + traded.completed.len(), 1);
    let relabeled = traded.iter_all().next().unwrap();
    assert_eq!(relabeled.pt_id, "CON_000004");
}

#[tokio::test]
async fn place_and_place_back_move_orders_between_lists() {
    let mut book = empty_book().await;
    let order = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    let uid = order.uid.clone();
    book.add_order(order).await;

    let placed = book.place_order(&uid).unwrap();
    assert_eq!(placed.status, OrderStatus::ToBePlaced);
    assert!(book.monitor.is_empty());
    assert_eq!(book.placed.len(), 1);

    book.set_placement_confirmed(&uid, 42);
    let confirmed = book.get_placed_order(&uid).unwrap();
    assert_eq!(confirmed.status, OrderStatus::Placed);
    assert_eq!(confirmed.exchange_order_id, Some(42));

    assert!(book.place_back_order(&uid));
    assert_eq!(book.monitor.len(), 1);
    assert_eq!(book.get_monitor_order(&uid).unwrap().status, OrderStatus::Monitor);
}

#[tokio::test]
async fn take_traded_removes_from_placed_and_store() {
    let mut book = empty_book().await;
    let order = Order::new("S_1", "PT_000001", Side::Buy, d("47000"), d("0.01"));
    let uid = order.uid.clone();
    book.add_order(order).await;
    book.place_order(&uid).unwrap();

    let taken = book.take_traded(&uid).await.unwrap();
    assert_eq!(taken.uid, uid);
    assert!(book.placed.is_empty());
    assert_eq!(book.store().count_orders(PENDING_TABLE).await.unwrap(), 0);
}
