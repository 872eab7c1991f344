use anyhow::{Context, Result};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Simulated,
    Live,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SymbolCfg {
    pub symbol: String,
    pub base_asset: String,
    pub quote_asset: String,
    pub fee_asset: String,
}

impl Default for SymbolCfg {
    fn default() -> Self {
        Self {
            symbol: "BTCEUR".into(),
            base_asset: "BTC".into(),
            quote_asset: "EUR".into(),
            fee_asset: "BNB".into(),
        }
    }
}

/// Session-level policy parameters. Decimal-valued fields are carried as
/// strings and parsed once at session construction.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionCfg {
    pub max_pt_per_session: u32,
    /// Sell-leg quantity of a new pt.
    pub pt_qty: String,
    /// Target net base-asset gain of a pt, net of fees.
    pub pt_net_amount: String,
    pub buy_fee: String,
    pub sell_fee: String,
    /// An order is placed when its distance drops below this.
    pub placement_distance: String,
    /// A placed order is pulled back to monitor beyond this distance.
    pub isolation_distance: String,
    /// First tick must exceed this before the first pt is created.
    pub min_valid_cmp: String,
    /// Ticks without a fill before a recovery pt is forced.
    pub max_cycles_without_trade: u64,
    /// Quote units of price shift per unit of buy/sell imbalance.
    pub shift_unit: String,
    pub max_shift: String,
    pub quote_buffer: String,
    pub base_buffer: String,
    pub max_compensation_qty: String,
}

impl Default for SessionCfg {
    fn default() -> Self {
        Self {
            max_pt_per_session: 100,
            pt_qty: "0.012".into(),
            pt_net_amount: "0.00002".into(),
            buy_fee: "0.0008".into(),
            sell_fee: "0.0008".into(),
            placement_distance: "25.0".into(),
            isolation_distance: "500.0".into(),
            min_valid_cmp: "1000.0".into(),
            max_cycles_without_trade: 125,
            shift_unit: "10.0".into(),
            max_shift: "50.0".into(),
            quote_buffer: "2000.0".into(),
            base_buffer: "0.04".into(),
            max_compensation_qty: "0.07".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StrategyCfg {
    pub min_cycles_for_first_split: u64,
    pub distance_for_first_children: String,
    pub inter_distance_children: String,
    pub child_count: u32,
    pub compensation_enabled: bool,
    pub distance_for_compensation: String,
    pub compensation_gap: String,
    pub side_balance_distance: String,
    pub concentration_gap: String,
}

impl Default for StrategyCfg {
    fn default() -> Self {
        Self {
            min_cycles_for_first_split: 100,
            distance_for_first_children: "150.0".into(),
            inter_distance_children: "50.0".into(),
            child_count: 2,
            compensation_enabled: false,
            distance_for_compensation: "200.0".into(),
            compensation_gap: "50.0".into(),
            side_balance_distance: "150.0".into(),
            concentration_gap: "50.0".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimCfg {
    pub initial_base: String,
    pub initial_quote: String,
    pub initial_fee: String,
    pub initial_cmp: String,
    pub fee_rate: String,
    /// Quote price of the fee asset, for expressing commissions.
    pub fee_asset_price: String,
    pub update_rate_ms: u64,
}

impl Default for SimCfg {
    fn default() -> Self {
        Self {
            initial_base: "0.2".into(),
            initial_quote: "10000.0".into(),
            initial_fee: "50.0".into(),
            initial_cmp: "45000.0".into(),
            fee_rate: "0.0008".into(),
            fee_asset_price: "450.0".into(),
            update_rate_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceCfg {
    pub sqlite_path: String,
}

impl Default for PersistenceCfg {
    fn default() -> Self {
        Self {
            sqlite_path: "polaris.db".into(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AdminCfg {
    pub bind: String,
    pub require_token: bool,
}

impl Default for AdminCfg {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:8090".into(),
            require_token: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ObservabilityCfg {
    pub log_json: bool,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub mode: Mode,
    pub symbol: SymbolCfg,
    pub session: SessionCfg,
    pub strategy: StrategyCfg,
    pub sim: SimCfg,
    pub persistence: PersistenceCfg,
    pub admin: AdminCfg,
    pub observability: ObservabilityCfg,
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::File::with_name("config.example").required(false))
            .add_source(config::Environment::default().separator("__"));

        if let Ok(path) = std::env::var("BOT_CONFIG") {
            builder = builder.add_source(config::File::with_name(&path).required(true));
        }

        builder
            .build()
            .context("failed to build config")?
            .try_deserialize()
            .context("failed to deserialize config")
    }
}
