use crate::book::TradedOrdersBook;
use crate::calculator;
use crate::order::{Order, OrderStatus};
use crate::persistence::{SqliteStore, PENDING_TABLE, TRADED_TABLE};
use crate::types::Side;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

/// Gap values used for the display-only KPI table.
const KPI_GAPS: [i64; 5] = [100, 200, 300, 400, 500];

#[derive(Debug, Clone, Serialize)]
pub struct KpiRow {
    pub gap: Decimal,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub buy_qty: Decimal,
    pub sell_qty: Decimal,
}

fn log_db_error(operation: &str, result: anyhow::Result<()>) {
    if let Err(e) = result {
        // durability failures do not abort the in-memory operation
        tracing::error!(operation, error=?e, "orders table write failed");
    }
}

/// Owns the monitor (awaiting placement) and placed (live on the exchange)
/// collections. An order is in exactly one of them; moving between them
/// goes through `place_order`/`place_back_order` only.
pub struct PendingOrdersBook {
    pub monitor: Vec<Order>,
    pub placed: Vec<Order>,
    store: Arc<SqliteStore>,
}

impl PendingOrdersBook {
    pub fn new(orders: Vec<Order>, store: Arc<SqliteStore>) -> Self {
        let mut monitor = orders;
        for order in &mut monitor {
            order.status = OrderStatus::Monitor;
        }
        Self {
            monitor,
            placed: Vec::new(),
            store,
        }
    }

    pub fn store(&self) -> &Arc<SqliteStore> {
        &self.store
    }

    pub async fn add_order(&mut self, order: Order) {
        log_db_error("add_order", self.store.add_order(PENDING_TABLE, &order).await);
        self.monitor.push(order);
    }

    pub fn get_monitor_order(&self, uid: &str) -> Option<&Order> {
        self.monitor.iter().find(|o| o.uid == uid)
    }

    pub fn get_placed_order(&self, uid: &str) -> Option<&Order> {
        self.placed.iter().find(|o| o.uid == uid)
    }

    pub fn count(&self) -> usize {
        self.monitor.len() + self.placed.len()
    }

    pub fn side_count(&self, side: Side) -> usize {
        self.monitor
            .iter()
            .chain(self.placed.iter())
            .filter(|o| o.side == side)
            .count()
    }

    pub fn has_pt_id(&self, pt_id: &str) -> bool {
        self.monitor
            .iter()
            .chain(self.placed.iter())
            .any(|o| o.pt_id == pt_id)
    }

    /// One tick survived for every monitored order.
    pub fn bump_cycles(&mut self) {
        for order in &mut self.monitor {
            order.cycles_count += 1;
        }
    }

    pub fn all_orders(&self) -> impl Iterator<Item = &Order> {
        self.monitor.iter().chain(self.placed.iter())
    }

    /// Moves a monitor order to the placed list with status TO_BE_PLACED;
    /// the session upgrades it to PLACED once the exchange confirms.
    pub fn place_order(&mut self, uid: &str) -> Option<Order> {
        let Some(pos) = self.monitor.iter().position(|o| o.uid == uid) else {
            tracing::error!(uid, "trying to place an order not found in the monitor list");
            return None;
        };
        let mut order = self.monitor.remove(pos);
        order.set_status(OrderStatus::ToBePlaced);
        self.placed.push(order.clone());
        Some(order)
    }

    /// Returns a placed order to the monitor list; used when the order became
    /// isolated while live or when exchange placement failed.
    pub fn place_back_order(&mut self, uid: &str) -> bool {
        let Some(pos) = self.placed.iter().position(|o| o.uid == uid) else {
            tracing::error!(uid, "trying to place back an order not found in the placed list");
            return false;
        };
        let mut order = self.placed.remove(pos);
        order.set_status(OrderStatus::Monitor);
        self.monitor.push(order);
        true
    }

    pub fn set_placement_confirmed(&mut self, uid: &str, exchange_order_id: i64) {
        if let Some(order) = self.placed.iter_mut().find(|o| o.uid == uid) {
            order.set_exchange_order_id(exchange_order_id);
            order.set_status(OrderStatus::Placed);
        }
    }

    /// Removes a filled order from the placed list and from the pending
    /// table; the caller moves it into the traded history.
    pub async fn take_traded(&mut self, uid: &str) -> Option<Order> {
        let pos = self.placed.iter().position(|o| o.uid == uid)?;
        let order = self.placed.remove(pos);
        log_db_error(
            "take_traded",
            self.store.delete_order(PENDING_TABLE, &order.uid).await,
        );
        Some(order)
    }

    /// Replaces one monitor order with `child_count` siblings of equal
    /// amount at prices staggered `inter_distance` apart, symmetrically
    /// around the parent price. Aggregate amount is preserved.
    pub async fn split_order(&mut self, uid: &str, inter_distance: Decimal, child_count: u32) -> bool {
        let Some(pos) = self.monitor.iter().position(|o| o.uid == uid) else {
            tracing::error!(uid, "trying to split an order not found in the monitor list");
            return false;
        };
        if !(2..=3).contains(&child_count) {
            tracing::error!(uid, child_count, "unsupported split child count");
            return false;
        }

        let mut parent = self.monitor.remove(pos);
        let child_amount = (parent.amount / Decimal::from(child_count)).round_dp(6);
        // the last child absorbs the rounding remainder so the aggregate
        // amount is preserved exactly
        let last_amount = parent.amount - child_amount * Decimal::from(child_count - 1);

        // odd counts include position 0; even counts skip it
        let half = (child_count / 2) as i64;
        let positions: Vec<i64> = (-half..=half)
            .filter(|p| *p != 0 || child_count % 2 == 1)
            .collect();

        let mut children = Vec::with_capacity(child_count as usize);
        for (i, position) in positions.into_iter().enumerate() {
            let amount = if i + 1 == child_count as usize {
                last_amount
            } else {
                child_amount
            };
            let price = (parent.price + inter_distance * Decimal::from(position)).round_dp(2);
            let mut child = Order::new(&parent.session_id, &parent.pt_id, parent.side, price, amount);
            child.split_count = parent.split_count + 1;
            child.compensation_count = parent.compensation_count;
            child.concentration_count = parent.concentration_count;
            children.push(child);
        }

        parent.set_status(OrderStatus::Canceled);
        log_db_error(
            "split_order.delete",
            self.store.delete_order(PENDING_TABLE, &parent.uid).await,
        );
        for child in children {
            log_db_error(
                "split_order.add",
                self.store.add_order(PENDING_TABLE, &child).await,
            );
            self.monitor.push(child);
        }
        tracing::info!(parent=%parent.uid, pt_id=%parent.pt_id, child_count, "order split");
        true
    }

    /// Replaces one monitor order with a buy/sell pair carrying the same
    /// signed exposure. Either both replacement orders are created and the
    /// original removed, or the book is left completely unchanged and false
    /// is returned.
    pub async fn compensate_order(
        &mut self,
        uid: &str,
        ref_market_price: Decimal,
        ref_gap: Decimal,
        buy_fee: Decimal,
        sell_fee: Decimal,
        max_qty: Decimal,
    ) -> bool {
        let Some(pos) = self.monitor.iter().position(|o| o.uid == uid) else {
            tracing::error!(uid, "trying to compensate an order not found in the monitor list");
            return false;
        };
        let order = self.monitor[pos].clone();

        let Some(pair) = Self::checked_compensation(
            ref_market_price,
            ref_gap,
            order.signed_amount(),
            order.signed_total(),
            buy_fee,
            sell_fee,
            max_qty,
        ) else {
            return false;
        };

        let mut b1 = Order::new(
            &order.session_id,
            &order.pt_id,
            Side::Buy,
            pair.b1_price.round_dp(2),
            pair.b1_qty.round_dp(6),
        );
        let mut s1 = Order::new(
            &order.session_id,
            &order.pt_id,
            Side::Sell,
            pair.s1_price.round_dp(2),
            pair.s1_qty.round_dp(6),
        );
        for child in [&mut b1, &mut s1] {
            child.compensation_count = order.compensation_count + 1;
            child.split_count = order.split_count;
            child.concentration_count = order.concentration_count;
        }

        let mut parent = self.monitor.remove(pos);
        parent.set_status(OrderStatus::Canceled);
        log_db_error(
            "compensate_order.delete",
            self.store.delete_order(PENDING_TABLE, &parent.uid).await,
        );
        for child in [b1, s1] {
            log_db_error(
                "compensate_order.add",
                self.store.add_order(PENDING_TABLE, &child).await,
            );
            self.monitor.push(child);
        }
        tracing::info!(parent=%parent.uid, pt_id=%parent.pt_id, "order compensated");
        true
    }

    /// Collapses a list of stale same-side monitor orders into one
    /// equivalent buy/sell pair under a fresh synthetic pt_id, relabeling
    /// every order sharing any of the input pt_ids across the monitor,
    /// placed and traded collections (and both tables).
    pub async fn concentrate_orders(
        &mut self,
        uids: &[String],
        ref_market_price: Decimal,
        ref_gap: Decimal,
        buy_fee: Decimal,
        sell_fee: Decimal,
        max_qty: Decimal,
        new_pt_id: &str,
        traded: &mut TradedOrdersBook,
    ) -> bool {
        let mut inputs = Vec::with_capacity(uids.len());
        for uid in uids {
            match self.get_monitor_order(uid) {
                Some(order) => inputs.push(order.clone()),
                None => {
                    tracing::error!(uid, "trying to concentrate an order not found in the monitor list");
                    return false;
                }
            }
        }
        if inputs.is_empty() {
            return false;
        }

        let qty_balance: Decimal = inputs.iter().map(|o| o.signed_amount()).sum();
        let price_balance: Decimal = inputs.iter().map(|o| o.signed_total()).sum();

        let Some(pair) = Self::checked_compensation(
            ref_market_price,
            ref_gap,
            qty_balance,
            price_balance,
            buy_fee,
            sell_fee,
            max_qty,
        ) else {
            return false;
        };

        let session_id = inputs[0].session_id.clone();
        let max_concentration = inputs.iter().map(|o| o.concentration_count).max().unwrap_or(0);

        let mut old_pt_ids: Vec<String> = inputs.iter().map(|o| o.pt_id.clone()).collect();
        old_pt_ids.sort();
        old_pt_ids.dedup();

        // relabel siblings left behind in the pending collections
        let input_uids: Vec<&String> = inputs.iter().map(|o| &o.uid).collect();
        let mut relabeled_pending = Vec::new();
        for order in self.monitor.iter_mut().chain(self.placed.iter_mut()) {
            if old_pt_ids.contains(&order.pt_id) && !input_uids.contains(&&order.uid) {
                order.pt_id = new_pt_id.to_string();
                relabeled_pending.push(order.uid.clone());
            }
        }
        for uid in &relabeled_pending {
            log_db_error(
                "concentrate_orders.relabel_pending",
                self.store.update_pt_id(PENDING_TABLE, uid, new_pt_id).await,
            );
        }

        // and in the traded history
        for uid in traded.relabel_pt_ids(&old_pt_ids, new_pt_id) {
            log_db_error(
                "concentrate_orders.relabel_traded",
                self.store.update_pt_id(TRADED_TABLE, &uid, new_pt_id).await,
            );
        }

        for input in &inputs {
            if let Some(pos) = self.monitor.iter().position(|o| o.uid == input.uid) {
                let mut removed = self.monitor.remove(pos);
                removed.set_status(OrderStatus::Canceled);
                log_db_error(
                    "concentrate_orders.delete",
                    self.store.delete_order(PENDING_TABLE, &removed.uid).await,
                );
            }
        }

        let mut b1 = Order::new(
            &session_id,
            new_pt_id,
            Side::Buy,
            pair.b1_price.round_dp(2),
            pair.b1_qty.round_dp(6),
        );
        let mut s1 = Order::new(
            &session_id,
            new_pt_id,
            Side::Sell,
            pair.s1_price.round_dp(2),
            pair.s1_qty.round_dp(6),
        );
        b1.concentration_count = max_concentration + 1;
        s1.concentration_count = max_concentration + 1;
        for child in [b1, s1] {
            log_db_error(
                "concentrate_orders.add",
                self.store.add_order(PENDING_TABLE, &child).await,
            );
            self.monitor.push(child);
        }
        tracing::info!(inputs = inputs.len(), new_pt_id, "orders concentrated");
        true
    }

    /// What the compensated pair of the whole monitor list would look like
    /// at a fixed set of gaps. Display only, never used in decisions.
    pub fn pending_orders_kpi(&self, cmp: Decimal, buy_fee: Decimal, sell_fee: Decimal) -> Vec<KpiRow> {
        let qty_balance: Decimal = self.monitor.iter().map(|o| o.signed_amount()).sum();
        let price_balance: Decimal = self.monitor.iter().map(|o| o.signed_total()).sum();

        KPI_GAPS
            .iter()
            .filter_map(|gap| {
                let gap = Decimal::from(*gap);
                calculator::compensation(cmp, gap, qty_balance, price_balance, buy_fee, sell_fee).map(
                    |pair| KpiRow {
                        gap,
                        buy_price: pair.b1_price.round_dp(2),
                        sell_price: pair.s1_price.round_dp(2),
                        buy_qty: pair.b1_qty.round_dp(6),
                        sell_qty: pair.s1_qty.round_dp(6),
                    },
                )
            })
            .collect()
    }

    /// Shared validation for compensation/concentration outputs: all four
    /// values non-negative and quantities under the configured ceiling.
    fn checked_compensation(
        ref_market_price: Decimal,
        ref_gap: Decimal,
        qty_balance: Decimal,
        price_balance: Decimal,
        buy_fee: Decimal,
        sell_fee: Decimal,
        max_qty: Decimal,
    ) -> Option<calculator::CompensationValues> {
        let Some(pair) = calculator::compensation(
            ref_market_price,
            ref_gap,
            qty_balance,
            price_balance,
            buy_fee,
            sell_fee,
        ) else {
            tracing::error!(%ref_market_price, %ref_gap, "degenerate compensation inputs");
            return None;
        };

        if pair.s1_price < Decimal::ZERO
            || pair.b1_price < Decimal::ZERO
            || pair.s1_qty < Decimal::ZERO
            || pair.b1_qty < Decimal::ZERO
        {
            tracing::error!(b1_price=%pair.b1_price, b1_qty=%pair.b1_qty,
                s1_price=%pair.s1_price, s1_qty=%pair.s1_qty,
                "negative value(s) after compensation");
            return None;
        }
        if pair.s1_qty > max_qty || pair.b1_qty > max_qty {
            tracing::error!(b1_qty=%pair.b1_qty, s1_qty=%pair.s1_qty, %max_qty,
                "compensation exceeded max qty");
            return None;
        }
        Some(pair)
    }
}
