pub mod sim;

use crate::order::Order;
use crate::types::{AccountBalance, AssetBalance};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Exchange trading rules for one symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SymbolFilters {
    pub symbol: String,
    pub min_qty: Decimal,
    pub max_qty: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub min_notional: Decimal,
}

/// Exchange acknowledgement of a placement request.
#[derive(Debug, Clone)]
pub struct PlacementReceipt {
    pub exchange_order_id: i64,
    pub status: String,
}

/// Events emitted by the market feed, decoded once at the boundary.
#[derive(Debug, Clone)]
pub enum MarketEvent {
    PriceTick {
        cmp: Decimal,
    },
    OrderTraded {
        uid: String,
        price: Decimal,
        commission: Decimal,
    },
    BalanceUpdate(AccountBalance),
}

/// The exchange collaborator the session talks to. Notifications flow back
/// through the `MarketEvent` channel handed to the implementation.
#[async_trait]
pub trait Market: Send + Sync {
    /// Returns `None` when the exchange rejects the order.
    async fn place_order(&self, order: &Order) -> Result<Option<PlacementReceipt>>;

    async fn cancel_orders(&self, orders: &[Order]) -> Result<()>;

    async fn get_asset_balance(&self, asset: &str) -> Result<AssetBalance>;

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters>;

    /// Stops the event feed; called last during shutdown.
    async fn stop(&self);
}
