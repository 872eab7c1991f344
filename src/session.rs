use crate::balance::BalanceManager;
use crate::book::pending::KpiRow;
use crate::book::{PendingOrdersBook, TradedOrdersBook};
use crate::calculator;
use crate::config::{AppConfig, SessionCfg, StrategyCfg, SymbolCfg};
use crate::market::{Market, MarketEvent, SymbolFilters};
use crate::order::{Order, OrderStatus};
use crate::persistence::{SqliteStore, PENDING_TABLE, TRADED_TABLE};
use crate::strategy::{StrategyManager, StrategyParams};
use crate::types::{AccountBalance, Side};
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};

fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Initializing,
    Running,
    Quitting,
    Stopped,
}

#[derive(Debug, Clone, Copy)]
pub enum QuitMode {
    /// Cancel every live order; orderly stop.
    CancelAllPlaced,
    /// Force-place every monitored order before stopping, committing
    /// maximum exposure to the market.
    PlaceAllPending,
}

/// Everything the session loop reacts to: market notifications plus the two
/// write paths the admin surface exposes.
#[derive(Debug)]
pub enum SessionEvent {
    Market(MarketEvent),
    CreatePt,
    Quit(QuitMode),
}

impl From<MarketEvent> for SessionEvent {
    fn from(ev: MarketEvent) -> Self {
        SessionEvent::Market(ev)
    }
}

/// Read-only snapshot for the admin surface, refreshed by the session loop.
#[derive(Debug, Clone, Serialize, Default)]
pub struct SessionStats {
    pub session_id: String,
    pub state: Option<SessionState>,
    pub cmp: Option<Decimal>,
    pub ticks: usize,
    pub monitor_count: usize,
    pub placed_count: usize,
    pub traded_completed_count: usize,
    pub traded_pending_count: usize,
    pub pt_created_count: u32,
    pub trades_to_new_pt: i32,
    pub cycles_from_last_trade: u64,
    pub initial_balance: Option<AccountBalance>,
    pub current_balance: Option<AccountBalance>,
    pub net_balance: Option<AccountBalance>,
    pub kpi: Vec<KpiRow>,
    pub cmp_history: Vec<Decimal>,
    pub orders: serde_json::Value,
}

/// Session policy parameters, parsed once from configuration.
#[derive(Debug, Clone)]
pub struct SessionParams {
    pub max_pt_per_session: u32,
    pub pt_qty: Decimal,
    pub pt_net_amount: Decimal,
    pub buy_fee: Decimal,
    pub sell_fee: Decimal,
    pub placement_distance: Decimal,
    pub isolation_distance: Decimal,
    pub min_valid_cmp: Decimal,
    pub max_cycles_without_trade: u64,
    pub shift_unit: Decimal,
    pub max_shift: Decimal,
    pub quote_buffer: Decimal,
    pub base_buffer: Decimal,
    pub max_compensation_qty: Decimal,
}

impl SessionParams {
    pub fn from_cfg(cfg: &SessionCfg) -> Result<Self> {
        Ok(Self {
            max_pt_per_session: cfg.max_pt_per_session,
            pt_qty: Decimal::from_str(&cfg.pt_qty).context("pt_qty")?,
            pt_net_amount: Decimal::from_str(&cfg.pt_net_amount).context("pt_net_amount")?,
            buy_fee: Decimal::from_str(&cfg.buy_fee).context("buy_fee")?,
            sell_fee: Decimal::from_str(&cfg.sell_fee).context("sell_fee")?,
            placement_distance: Decimal::from_str(&cfg.placement_distance).context("placement_distance")?,
            isolation_distance: Decimal::from_str(&cfg.isolation_distance).context("isolation_distance")?,
            min_valid_cmp: Decimal::from_str(&cfg.min_valid_cmp).context("min_valid_cmp")?,
            max_cycles_without_trade: cfg.max_cycles_without_trade,
            shift_unit: Decimal::from_str(&cfg.shift_unit).context("shift_unit")?,
            max_shift: Decimal::from_str(&cfg.max_shift).context("max_shift")?,
            quote_buffer: Decimal::from_str(&cfg.quote_buffer).context("quote_buffer")?,
            base_buffer: Decimal::from_str(&cfg.base_buffer).context("base_buffer")?,
            max_compensation_qty: Decimal::from_str(&cfg.max_compensation_qty)
                .context("max_compensation_qty")?,
        })
    }
}

pub fn strategy_params(cfg: &StrategyCfg, session: &SessionParams) -> Result<StrategyParams> {
    Ok(StrategyParams {
        min_cycles_for_first_split: cfg.min_cycles_for_first_split,
        distance_for_first_children: Decimal::from_str(&cfg.distance_for_first_children)
            .context("distance_for_first_children")?,
        inter_distance_children: Decimal::from_str(&cfg.inter_distance_children)
            .context("inter_distance_children")?,
        child_count: cfg.child_count,
        compensation_enabled: cfg.compensation_enabled,
        distance_for_compensation: Decimal::from_str(&cfg.distance_for_compensation)
            .context("distance_for_compensation")?,
        compensation_gap: Decimal::from_str(&cfg.compensation_gap).context("compensation_gap")?,
        side_balance_distance: Decimal::from_str(&cfg.side_balance_distance)
            .context("side_balance_distance")?,
        concentration_gap: Decimal::from_str(&cfg.concentration_gap).context("concentration_gap")?,
        max_compensation_qty: session.max_compensation_qty,
        buy_fee: session.buy_fee,
        sell_fee: session.sell_fee,
    })
}

/// Central control loop. Reacts serially to price ticks, fills and balance
/// updates; owns pt creation, placement policy, inactivity recovery and
/// graceful shutdown. All book mutation happens inside this task.
pub struct Session {
    pub session_id: String,
    pub state: SessionState,
    pub book: PendingOrdersBook,
    pub traded: TradedOrdersBook,
    pub balance: BalanceManager,
    pub cmps: Vec<Decimal>,
    pub pt_created_count: u32,
    pub trades_to_new_pt: i32,
    pub cycles_from_last_trade: u64,

    params: SessionParams,
    symbol: SymbolCfg,
    strategy: StrategyManager,
    filters: SymbolFilters,
    market: Arc<dyn Market>,
    store: Arc<SqliteStore>,
    stats: Arc<RwLock<SessionStats>>,
    rx: mpsc::Receiver<SessionEvent>,
    pt_seq: u32,
    first_pt_created: bool,
}

impl Session {
    pub async fn new(
        cfg: &AppConfig,
        store: Arc<SqliteStore>,
        market: Arc<dyn Market>,
        rx: mpsc::Receiver<SessionEvent>,
    ) -> Result<Self> {
        let params = SessionParams::from_cfg(&cfg.session)?;
        let strategy = StrategyManager::new(strategy_params(&cfg.strategy, &params)?);

        let session_id = format!("S_{}", now_ms());

        // snapshot the account balance before any order is placed
        let base = market.get_asset_balance(&cfg.symbol.base_asset).await?;
        let quote = market.get_asset_balance(&cfg.symbol.quote_asset).await?;
        let fee = market.get_asset_balance(&cfg.symbol.fee_asset).await?;
        let initial = AccountBalance { base, quote, fee };
        let balance = BalanceManager::new(initial, params.quote_buffer, params.base_buffer);

        let filters = market
            .get_symbol_filters(&cfg.symbol.symbol)
            .await
            .context("fetch symbol filters")?;

        // orders left pending by a previous run go back to monitor
        let restored = match store.load_orders(PENDING_TABLE).await {
            Ok(orders) => {
                if !orders.is_empty() {
                    tracing::info!(count = orders.len(), "restored pending orders");
                }
                orders
            }
            Err(e) => {
                tracing::error!(error=?e, "failed to restore pending orders");
                Vec::new()
            }
        };
        let book = PendingOrdersBook::new(restored, store.clone());

        let session = Self {
            session_id: session_id.clone(),
            state: SessionState::Initializing,
            book,
            traded: TradedOrdersBook::new(),
            balance,
            cmps: Vec::new(),
            pt_created_count: 0,
            trades_to_new_pt: 0,
            cycles_from_last_trade: 0,
            params,
            symbol: cfg.symbol.clone(),
            strategy,
            filters,
            market,
            store,
            stats: Arc::new(RwLock::new(SessionStats {
                session_id,
                state: Some(SessionState::Initializing),
                ..Default::default()
            })),
            rx,
            pt_seq: 0,
            first_pt_created: false,
        };
        Ok(session)
    }

    pub fn stats_handle(&self) -> Arc<RwLock<SessionStats>> {
        self.stats.clone()
    }

    pub fn last_cmp(&self) -> Option<Decimal> {
        self.cmps.last().copied()
    }

    /// Serial event loop; runs until a quit event has been handled.
    pub async fn run(&mut self) {
        self.state = SessionState::Running;
        tracing::info!(session_id=%self.session_id, "session running");
        while let Some(event) = self.rx.recv().await {
            let quitting = matches!(event, SessionEvent::Quit(_));
            self.handle_event(event).await;
            if quitting {
                break;
            }
        }
        tracing::info!(session_id=%self.session_id, "session loop ended");
    }

    pub async fn handle_event(&mut self, event: SessionEvent) {
        match event {
            SessionEvent::Market(MarketEvent::PriceTick { cmp }) => self.on_price_tick(cmp).await,
            SessionEvent::Market(MarketEvent::OrderTraded {
                uid,
                price,
                commission,
            }) => self.on_order_traded(&uid, price, commission).await,
            SessionEvent::Market(MarketEvent::BalanceUpdate(balance)) => {
                self.on_balance_update(balance).await
            }
            SessionEvent::CreatePt => match self.last_cmp() {
                Some(cmp) => {
                    self.create_new_pt(cmp).await;
                    self.update_stats().await;
                }
                None => tracing::warn!("manual pt requested before any price tick"),
            },
            SessionEvent::Quit(mode) => self.quit(mode).await,
        }
    }

    pub async fn on_price_tick(&mut self, cmp: Decimal) {
        if self.state == SessionState::Initializing {
            self.state = SessionState::Running;
        }
        if self.state != SessionState::Running {
            return;
        }

        if !self.first_pt_created && cmp > self.params.min_valid_cmp {
            if self.create_new_pt(cmp).await {
                self.first_pt_created = true;
            }
        }

        self.cmps.push(cmp);
        self.cycles_from_last_trade += 1;
        self.book.bump_cycles();

        self.check_isolated_orders(cmp).await;

        let delta = self.strategy.assess_strategy_actions(&mut self.book, cmp).await;
        self.trades_to_new_pt += delta;

        self.check_side_balance(cmp).await;

        // one placement per tick, to avoid bursts of exchange calls
        let ready = self
            .book
            .monitor
            .iter()
            .find(|o| o.is_ready_for_placement(cmp, self.params.placement_distance))
            .map(|o| o.uid.clone());
        if let Some(uid) = ready {
            self.try_place_order(&uid).await;
        }

        if self.cycles_from_last_trade >= self.params.max_cycles_without_trade {
            tracing::warn!(
                cycles = self.cycles_from_last_trade,
                "no trade for too long, forcing a recovery pt"
            );
            if self.create_new_pt(cmp).await {
                self.cycles_from_last_trade = 0;
            }
        }

        self.update_stats().await;
    }

    pub async fn on_order_traded(&mut self, uid: &str, price: Decimal, commission: Decimal) {
        let Some(mut order) = self.book.take_traded(uid).await else {
            tracing::error!(uid, "traded order not found in the placed list");
            return;
        };

        order.set_fill(price, commission);
        order.set_status(OrderStatus::Traded);
        if let Err(e) = self.store.add_order(TRADED_TABLE, &order).await {
            tracing::error!(error=?e, uid, "traded orders table write failed");
        }

        let has_pending_sibling = self.book.has_pt_id(&order.pt_id);
        self.traded.add(order, has_pending_sibling);

        self.trades_to_new_pt += 1;
        self.cycles_from_last_trade = 0;

        if self.pt_created_count < self.params.max_pt_per_session && self.trades_to_new_pt >= 0 {
            if let Some(cmp) = self.last_cmp() {
                self.create_new_pt(cmp).await;
            }
        }

        self.update_stats().await;
    }

    pub async fn on_balance_update(&mut self, balance: AccountBalance) {
        self.balance.update_current(balance);
        self.update_stats().await;
    }

    /// Creates a symmetric buy/sell pt around the current price, shifted by
    /// the side imbalance of the book. Both legs must pass the exchange
    /// filters; no partial pt is ever created.
    pub async fn create_new_pt(&mut self, cmp: Decimal) -> bool {
        if self.pt_created_count >= self.params.max_pt_per_session {
            tracing::warn!(cap = self.params.max_pt_per_session, "pt cap reached for this session");
            return false;
        }

        let buy = self.book.side_count(Side::Buy) as i64;
        let sell = self.book.side_count(Side::Sell) as i64;
        let shift = (Decimal::from(buy - sell) * self.params.shift_unit)
            .clamp(-self.params.max_shift, self.params.max_shift);
        let center = cmp + shift;

        let Some(values) = calculator::pt_values(
            center,
            self.params.pt_net_amount,
            self.params.pt_qty,
            self.params.buy_fee,
            self.params.sell_fee,
        ) else {
            tracing::error!(%center, "pt computation failed");
            return false;
        };

        let pt_id = format!("PT_{:06}", self.pt_seq + 1);
        let b1 = Order::new(
            &self.session_id,
            &pt_id,
            Side::Buy,
            values.b1_price.round_dp(2),
            values.b1_qty.round_dp(6),
        );
        let s1 = Order::new(
            &self.session_id,
            &pt_id,
            Side::Sell,
            values.s1_price.round_dp(2),
            self.params.pt_qty,
        );

        if !b1.is_filter_passed(&self.filters) || !s1.is_filter_passed(&self.filters) {
            tracing::error!(%pt_id, "pt creation aborted, a leg failed filter validation");
            return false;
        }

        self.pt_seq += 1;
        self.pt_created_count += 1;
        self.book.add_order(b1).await;
        self.book.add_order(s1).await;
        self.trades_to_new_pt -= 2;
        tracing::info!(%pt_id, %center, gap=%values.gap, "new pt created");
        true
    }

    async fn check_isolated_orders(&mut self, cmp: Decimal) {
        let isolated: Vec<Order> = self
            .book
            .placed
            .iter()
            .filter(|o| o.is_isolated(cmp, self.params.isolation_distance))
            .cloned()
            .collect();
        if isolated.is_empty() {
            return;
        }

        for order in &isolated {
            tracing::info!(uid=%order.uid, distance=%order.distance(cmp), "placed order isolated");
            self.book.place_back_order(&order.uid);
        }
        if let Err(e) = self.market.cancel_orders(&isolated).await {
            tracing::error!(error=?e, "cancellation of isolated orders failed");
        }
    }

    async fn check_side_balance(&mut self, cmp: Decimal) {
        let candidates = self.strategy.assess_side_balance(&self.book.monitor, cmp);
        if candidates.is_empty() {
            return;
        }

        let n = candidates.len() as i32;
        let new_pt_id = format!("CON_{:06}", self.pt_seq + 1);
        let ok = self
            .book
            .concentrate_orders(
                &candidates,
                cmp,
                self.strategy.params().concentration_gap,
                self.params.buy_fee,
                self.params.sell_fee,
                self.params.max_compensation_qty,
                &new_pt_id,
                &mut self.traded,
            )
            .await;
        if ok {
            self.pt_seq += 1;
            // n orders collapsed into 2: the counter advances by the difference
            self.trades_to_new_pt += n - 2;
        } else {
            tracing::error!(candidates = n, "concentration failed");
        }
    }

    async fn try_place_order(&mut self, uid: &str) {
        let Some(candidate) = self.book.get_monitor_order(uid).cloned() else {
            return;
        };

        let (enough, needed) = self.balance.is_balance_enough(&candidate);
        if !enough {
            // recoverable: the order stays in monitor, retried next tick
            tracing::debug!(uid, %needed, "placement postponed, balance not sufficient");
            return;
        }

        let Some(order) = self.book.place_order(uid) else {
            return;
        };
        match self.market.place_order(&order).await {
            Ok(Some(receipt)) => {
                self.book.set_placement_confirmed(uid, receipt.exchange_order_id);
            }
            Ok(None) => {
                tracing::error!(uid, "exchange rejected placement");
                self.book.place_back_order(uid);
            }
            Err(e) => {
                tracing::error!(uid, error=?e, "placement call failed");
                self.book.place_back_order(uid);
            }
        }
    }

    pub async fn quit(&mut self, mode: QuitMode) {
        self.state = SessionState::Quitting;
        tracing::info!(?mode, "session quitting");

        match mode {
            QuitMode::CancelAllPlaced => {
                let placed = self.book.placed.clone();
                if !placed.is_empty() {
                    if let Err(e) = self.market.cancel_orders(&placed).await {
                        tracing::error!(error=?e, "cancellation of placed orders failed");
                    }
                    for order in &placed {
                        self.book.place_back_order(&order.uid);
                    }
                }
            }
            QuitMode::PlaceAllPending => {
                let uids: Vec<String> = self.book.monitor.iter().map(|o| o.uid.clone()).collect();
                for uid in uids {
                    let Some(order) = self.book.place_order(&uid) else {
                        continue;
                    };
                    match self.market.place_order(&order).await {
                        Ok(Some(receipt)) => {
                            self.book.set_placement_confirmed(&uid, receipt.exchange_order_id);
                        }
                        Ok(None) => {
                            tracing::error!(uid, "exchange rejected placement during quit");
                            self.book.place_back_order(&uid);
                        }
                        Err(e) => {
                            tracing::error!(uid, error=?e, "placement failed during quit");
                            self.book.place_back_order(&uid);
                        }
                    }
                }
            }
        }

        // a locked remainder indicates a cancellation leak
        for asset in [&self.symbol.base_asset, &self.symbol.quote_asset] {
            match self.market.get_asset_balance(asset).await {
                Ok(balance) if !balance.locked.is_zero() => {
                    tracing::error!(asset, locked=%balance.locked, "locked balance remains after quit");
                }
                Ok(_) => {}
                Err(e) => tracing::error!(asset, error=?e, "balance check failed during quit"),
            }
        }

        self.market.stop().await;
        self.state = SessionState::Stopped;
        self.update_stats().await;
        tracing::info!(session_id=%self.session_id, "session stopped");
    }

    async fn update_stats(&self) {
        let orders: Vec<&Order> = self.book.all_orders().chain(self.traded.iter_all()).collect();
        let orders_json = serde_json::to_value(&orders).unwrap_or(serde_json::Value::Null);
        let kpi = match self.last_cmp() {
            Some(cmp) => self
                .book
                .pending_orders_kpi(cmp, self.params.buy_fee, self.params.sell_fee),
            None => Vec::new(),
        };

        let mut stats = self.stats.write().await;
        stats.session_id = self.session_id.clone();
        stats.state = Some(self.state);
        stats.cmp = self.last_cmp();
        stats.ticks = self.cmps.len();
        stats.monitor_count = self.book.monitor.len();
        stats.placed_count = self.book.placed.len();
        stats.traded_completed_count = self.traded.completed.len();
        stats.traded_pending_count = self.traded.pending.len();
        stats.pt_created_count = self.pt_created_count;
        stats.trades_to_new_pt = self.trades_to_new_pt;
        stats.cycles_from_last_trade = self.cycles_from_last_trade;
        stats.initial_balance = Some(self.balance.initial().clone());
        stats.current_balance = Some(self.balance.current().clone());
        stats.net_balance = Some(self.balance.net());
        stats.kpi = kpi;
        stats.cmp_history = self.cmps.clone();
        stats.orders = orders_json;
    }
}
