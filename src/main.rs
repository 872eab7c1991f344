use anyhow::{bail, Context, Result};
use polaris_bot::config::{AppConfig, Mode};
use polaris_bot::market::sim::SimMarket;
use polaris_bot::market::{Market, MarketEvent};
use polaris_bot::observability::init_tracing;
use polaris_bot::persistence::SqliteStore;
use polaris_bot::session::{QuitMode, Session, SessionEvent};
use polaris_bot::types::{AccountBalance, AssetBalance};
use polaris_bot::admin;
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::mpsc;

fn sim_initial_balance(cfg: &AppConfig) -> Result<AccountBalance> {
    let asset = |name: &str, free: &str| -> Result<AssetBalance> {
        Ok(AssetBalance {
            asset: name.to_string(),
            free: Decimal::from_str(free).with_context(|| format!("sim balance for {name}"))?,
            locked: Decimal::ZERO,
        })
    };
    Ok(AccountBalance {
        base: asset(&cfg.symbol.base_asset, &cfg.sim.initial_base)?,
        quote: asset(&cfg.symbol.quote_asset, &cfg.sim.initial_quote)?,
        fee: asset(&cfg.symbol.fee_asset, &cfg.sim.initial_fee)?,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    let cfg = AppConfig::load()?;
    init_tracing(&cfg.observability)?;

    let store = Arc::new(SqliteStore::new(&cfg.persistence.sqlite_path).await?);
    store.init_schema().await?;

    let (market_tx, mut market_rx) = mpsc::unbounded_channel::<MarketEvent>();
    let (session_tx, session_rx) = mpsc::channel::<SessionEvent>(256);

    let market: Arc<SimMarket> = match cfg.mode {
        Mode::Simulated => Arc::new(SimMarket::new(
            &cfg.symbol.symbol,
            sim_initial_balance(&cfg)?,
            Decimal::from_str(&cfg.sim.initial_cmp).context("sim initial_cmp")?,
            Decimal::from_str(&cfg.sim.fee_rate).context("sim fee_rate")?,
            Decimal::from_str(&cfg.sim.fee_asset_price).context("sim fee_asset_price")?,
            market_tx,
        )),
        Mode::Live => bail!("live mode is not available in this build"),
    };

    let mut session = Session::new(
        &cfg,
        store.clone(),
        market.clone() as Arc<dyn Market>,
        session_rx,
    )
    .await?;
    let stats = session.stats_handle();

    // market notifications feed the session loop
    let forwarder = {
        let tx = session_tx.clone();
        tokio::spawn(async move {
            while let Some(event) = market_rx.recv().await {
                if tx.send(event.into()).await.is_err() {
                    break;
                }
            }
        })
    };

    market.clone().start_generator(cfg.sim.update_rate_ms);

    let admin_handle = {
        let admin_cfg = cfg.admin.clone();
        let stats = stats.clone();
        let tx = session_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = admin::serve(admin_cfg, stats, tx).await {
                tracing::error!(error=?e, "admin server failed");
            }
        })
    };

    let session_handle = tokio::spawn(async move {
        session.run().await;
    });

    // Graceful shutdown on SIGINT
    signal::ctrl_c().await?;
    tracing::warn!("ctrl_c received; initiating shutdown");
    let _ = session_tx
        .send(SessionEvent::Quit(QuitMode::CancelAllPlaced))
        .await;
    let _ = session_handle.await;

    forwarder.abort();
    admin_handle.abort();
    Ok(())
}
