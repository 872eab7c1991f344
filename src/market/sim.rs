use super::{Market, MarketEvent, PlacementReceipt, SymbolFilters};
use crate::order::Order;
use crate::types::{AccountBalance, AssetBalance, Side};
use anyhow::Result;
use async_trait::async_trait;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

#[derive(Debug, Clone)]
struct SimOrder {
    uid: String,
    side: Side,
    price: Decimal,
    qty: Decimal,
}

impl SimOrder {
    fn total(&self) -> Decimal {
        self.price * self.qty
    }
}

struct Inner {
    cmp: Decimal,
    placed: Vec<SimOrder>,
    balance: AccountBalance,
    placed_count: i64,
}

/// In-memory exchange simulator: locks funds on placement, swaps balances on
/// fill, fills a placed order as soon as the market price crosses it.
pub struct SimMarket {
    symbol: String,
    fee_rate: Decimal,
    /// Price of the fee asset in quote units, used to express commissions in
    /// fee-asset terms.
    fee_asset_price: Decimal,
    inner: Mutex<Inner>,
    // unbounded: the session awaits placement calls that emit here, so a
    // bounded channel would close a blocking cycle through the forwarder
    tx: mpsc::UnboundedSender<MarketEvent>,
    running: AtomicBool,
}

impl SimMarket {
    pub fn new(
        symbol: &str,
        initial: AccountBalance,
        initial_cmp: Decimal,
        fee_rate: Decimal,
        fee_asset_price: Decimal,
        tx: mpsc::UnboundedSender<MarketEvent>,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            fee_rate,
            fee_asset_price,
            inner: Mutex::new(Inner {
                cmp: initial_cmp,
                placed: Vec::new(),
                balance: initial,
                placed_count: 0,
            }),
            tx,
            running: AtomicBool::new(true),
        }
    }

    pub fn cmp(&self) -> Decimal {
        self.inner.lock().unwrap().cmp
    }

    /// Moves the simulated market price and fills any crossed placed order.
    pub fn set_cmp(&self, cmp: Decimal) {
        let events = {
            let mut inner = self.inner.lock().unwrap();
            inner.cmp = cmp;
            let mut events = Self::fill_crossed(&mut inner, self.fee_rate, self.fee_asset_price);
            events.push(MarketEvent::PriceTick { cmp });
            events
        };
        self.emit(events);
    }

    pub fn step_cmp(&self, step: Decimal) {
        self.set_cmp(self.cmp() + step);
    }

    /// Random-walk price generator, one step per interval. Runs until the
    /// market is stopped.
    pub fn start_generator(self: Arc<Self>, update_ms: u64) {
        tokio::spawn(async move {
            let steps: [i64; 7] = [-20, -10, -5, 0, 5, 10, 20];
            while self.running.load(Ordering::Relaxed) {
                tokio::time::sleep(std::time::Duration::from_millis(update_ms)).await;
                let step = {
                    use rand::seq::SliceRandom;
                    let mut rng = rand::thread_rng();
                    Decimal::from(*steps.choose(&mut rng).unwrap_or(&0))
                };
                self.step_cmp(step);
            }
        });
    }

    fn fill_crossed(inner: &mut Inner, fee_rate: Decimal, fee_asset_price: Decimal) -> Vec<MarketEvent> {
        let crossed: Vec<SimOrder> = inner
            .placed
            .iter()
            .filter(|o| match o.side {
                Side::Buy => inner.cmp <= o.price,
                Side::Sell => inner.cmp >= o.price,
            })
            .cloned()
            .collect();

        let mut events = Vec::new();
        for order in crossed {
            events.extend(Self::fill_order(inner, &order, fee_rate, fee_asset_price));
        }
        events
    }

    fn fill_order(
        inner: &mut Inner,
        order: &SimOrder,
        fee_rate: Decimal,
        fee_asset_price: Decimal,
    ) -> Vec<MarketEvent> {
        inner.placed.retain(|o| o.uid != order.uid);
        match order.side {
            Side::Buy => {
                inner.balance.quote.locked -= order.total();
                inner.balance.base.free += order.qty;
            }
            Side::Sell => {
                inner.balance.base.locked -= order.qty;
                inner.balance.quote.free += order.total();
            }
        }
        let commission = order.total() * fee_rate / fee_asset_price;
        inner.balance.fee.free -= commission;

        vec![
            MarketEvent::OrderTraded {
                uid: order.uid.clone(),
                price: order.price,
                commission,
            },
            MarketEvent::BalanceUpdate(inner.balance.clone()),
        ]
    }

    fn emit(&self, events: Vec<MarketEvent>) {
        for event in events {
            if self.tx.send(event).is_err() {
                tracing::warn!("market event channel closed");
                return;
            }
        }
    }
}

#[async_trait]
impl Market for SimMarket {
    async fn place_order(&self, order: &Order) -> Result<Option<PlacementReceipt>> {
        let (receipt, events) = {
            let mut inner = self.inner.lock().unwrap();

            if inner.placed.iter().any(|o| o.uid == order.uid) {
                tracing::error!(uid=%order.uid, "order has already been placed");
                return Ok(None);
            }

            let sim = SimOrder {
                uid: order.uid.clone(),
                side: order.side,
                price: order.price,
                qty: order.amount,
            };

            // reject on insufficient free balance, like the exchange would
            match sim.side {
                Side::Buy => {
                    if inner.balance.quote.free < sim.total() {
                        tracing::error!(uid=%order.uid, "not enough quote balance to place the order");
                        return Ok(None);
                    }
                    inner.balance.quote.free -= sim.total();
                    inner.balance.quote.locked += sim.total();
                }
                Side::Sell => {
                    if inner.balance.base.free < sim.qty {
                        tracing::error!(uid=%order.uid, "not enough base amount to place the order");
                        return Ok(None);
                    }
                    inner.balance.base.free -= sim.qty;
                    inner.balance.base.locked += sim.qty;
                }
            }

            inner.placed_count += 1;
            let exchange_order_id = inner.placed_count;
            inner.placed.push(sim.clone());

            let mut events = vec![MarketEvent::BalanceUpdate(inner.balance.clone())];

            // a crossed limit order fills immediately
            let filled = match sim.side {
                Side::Buy => inner.cmp < sim.price,
                Side::Sell => inner.cmp > sim.price,
            };
            let status = if filled {
                events.extend(Self::fill_order(
                    &mut inner,
                    &sim,
                    self.fee_rate,
                    self.fee_asset_price,
                ));
                "FILLED"
            } else {
                "NEW"
            };

            (
                PlacementReceipt {
                    exchange_order_id,
                    status: status.to_string(),
                },
                events,
            )
        };
        self.emit(events);
        Ok(Some(receipt))
    }

    async fn cancel_orders(&self, orders: &[Order]) -> Result<()> {
        let events = {
            let mut inner = self.inner.lock().unwrap();
            let mut changed = false;
            for order in orders {
                let Some(pos) = inner.placed.iter().position(|o| o.uid == order.uid) else {
                    tracing::error!(uid=%order.uid, "trying to cancel an order not placed");
                    continue;
                };
                let sim = inner.placed.remove(pos);
                match sim.side {
                    Side::Buy => {
                        inner.balance.quote.free += sim.total();
                        inner.balance.quote.locked -= sim.total();
                    }
                    Side::Sell => {
                        inner.balance.base.free += sim.qty;
                        inner.balance.base.locked -= sim.qty;
                    }
                }
                changed = true;
            }
            if changed {
                vec![MarketEvent::BalanceUpdate(inner.balance.clone())]
            } else {
                Vec::new()
            }
        };
        self.emit(events);
        Ok(())
    }

    async fn get_asset_balance(&self, asset: &str) -> Result<AssetBalance> {
        let inner = self.inner.lock().unwrap();
        let balance = [&inner.balance.base, &inner.balance.quote, &inner.balance.fee]
            .into_iter()
            .find(|b| b.asset == asset)
            .cloned();
        balance.ok_or_else(|| anyhow::anyhow!("unknown asset {asset}"))
    }

    async fn get_symbol_filters(&self, symbol: &str) -> Result<SymbolFilters> {
        if symbol != self.symbol {
            anyhow::bail!("unknown symbol {symbol}");
        }
        Ok(SymbolFilters {
            symbol: symbol.to_string(),
            min_qty: Decimal::from_str("0.000001")?,
            max_qty: Decimal::from_str("9000.0")?,
            min_price: Decimal::from_str("0.01")?,
            max_price: Decimal::from_str("1000000.0")?,
            min_notional: Decimal::from_str("10.0")?,
        })
    }

    async fn stop(&self) {
        self.running.store(false, Ordering::Relaxed);
    }
}
