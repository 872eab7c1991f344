use crate::market::SymbolFilters;
use crate::types::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};
use uuid::Uuid;

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Lifecycle of a single order.
///
/// `Monitor -> ToBePlaced -> Placed -> Traded` is the happy path; a placed
/// order that drifts too far from the market is sent back to `Monitor`, and
/// a monitored order replaced by split/compensation/concentration children
/// ends in `Canceled`. `Traded` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Monitor,
    ToBePlaced,
    Placed,
    Traded,
    Canceled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Monitor => "MONITOR",
            OrderStatus::ToBePlaced => "TO_BE_PLACED",
            OrderStatus::Placed => "PLACED",
            OrderStatus::Traded => "TRADED",
            OrderStatus::Canceled => "CANCELED",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "MONITOR" => Some(OrderStatus::Monitor),
            "TO_BE_PLACED" => Some(OrderStatus::ToBePlaced),
            "PLACED" => Some(OrderStatus::Placed),
            "TRADED" => Some(OrderStatus::Traded),
            "CANCELED" => Some(OrderStatus::Canceled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Traded | OrderStatus::Canceled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub uid: String,
    pub session_id: String,
    /// Groups this order with the sibling(s) created in the same pt or
    /// order-surgery operation.
    pub pt_id: String,
    pub side: Side,
    pub price: Decimal,
    pub amount: Decimal,
    pub status: OrderStatus,
    pub created_ts_ms: i64,
    pub fee_commission: Decimal,
    pub exchange_order_id: Option<i64>,
    pub compensation_count: u32,
    pub split_count: u32,
    pub concentration_count: u32,
    /// Ticks survived in the monitor list.
    pub cycles_count: u64,
}

impl Order {
    pub fn new(session_id: &str, pt_id: &str, side: Side, price: Decimal, amount: Decimal) -> Self {
        let order = Self {
            uid: Uuid::new_v4().simple().to_string(),
            session_id: session_id.to_string(),
            pt_id: pt_id.to_string(),
            side,
            price,
            amount,
            status: OrderStatus::Monitor,
            created_ts_ms: now_ms(),
            fee_commission: Decimal::ZERO,
            exchange_order_id: None,
            compensation_count: 0,
            split_count: 0,
            concentration_count: 0,
            cycles_count: 0,
        };
        tracing::info!(uid=%order.uid, pt_id=%order.pt_id, side=%order.side.as_str(),
            price=%order.price, amount=%order.amount, "order created");
        order
    }

    pub fn total(&self) -> Decimal {
        self.price * self.amount
    }

    /// +amount for a BUY, -amount for a SELL.
    pub fn signed_amount(&self) -> Decimal {
        match self.side {
            Side::Buy => self.amount,
            Side::Sell => -self.amount,
        }
    }

    /// Net cash flow of the order: negative quote outlay for buys, positive
    /// quote inflow for sells.
    pub fn signed_total(&self) -> Decimal {
        -(self.price * self.signed_amount())
    }

    /// Shrinks toward zero as the market approaches the order's trigger side.
    pub fn distance(&self, cmp: Decimal) -> Decimal {
        match self.side {
            Side::Buy => cmp - self.price,
            Side::Sell => self.price - cmp,
        }
    }

    pub fn is_ready_for_placement(&self, cmp: Decimal, min_distance: Decimal) -> bool {
        self.distance(cmp) < min_distance
    }

    /// A placed order that drifted too far from the market without trading.
    pub fn is_isolated(&self, cmp: Decimal, max_distance: Decimal) -> bool {
        self.distance(cmp) > max_distance
    }

    /// Validates quantity, price and notional against the exchange filters.
    /// Logs and returns false on violation, never errors.
    pub fn is_filter_passed(&self, filters: &SymbolFilters) -> bool {
        if self.amount < filters.min_qty {
            tracing::warn!(uid=%self.uid, qty=%self.amount, min_qty=%filters.min_qty, "qty below minQty");
            return false;
        }
        if self.amount > filters.max_qty {
            tracing::warn!(uid=%self.uid, qty=%self.amount, max_qty=%filters.max_qty, "qty above maxQty");
            return false;
        }
        if self.price < filters.min_price {
            tracing::warn!(uid=%self.uid, price=%self.price, min_price=%filters.min_price, "price below minPrice");
            return false;
        }
        if self.price > filters.max_price {
            tracing::warn!(uid=%self.uid, price=%self.price, max_price=%filters.max_price, "price above maxPrice");
            return false;
        }
        if self.total() < filters.min_notional {
            tracing::warn!(uid=%self.uid, notional=%self.total(), min_notional=%filters.min_notional,
                "notional below minNotional");
            return false;
        }
        true
    }

    /// Records the old -> new transition for audit purposes; no side effects
    /// beyond the record.
    pub fn set_status(&mut self, status: OrderStatus) {
        tracing::info!(uid=%self.uid, pt_id=%self.pt_id, old=%self.status.as_str(),
            new=%status.as_str(), "order status transition");
        self.status = status;
    }

    pub fn set_exchange_order_id(&mut self, id: i64) {
        self.exchange_order_id = Some(id);
    }

    pub fn set_fill(&mut self, price: Decimal, commission: Decimal) {
        self.price = price;
        self.fee_commission = commission;
    }
}
