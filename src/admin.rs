use crate::config::AdminCfg;
use crate::session::{QuitMode, SessionEvent, SessionState, SessionStats};
use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

#[derive(Clone)]
struct AdminState {
    cfg: AdminCfg,
    stats: Arc<RwLock<SessionStats>>,
    tx: mpsc::Sender<SessionEvent>,
}

fn authorized(cfg: &AdminCfg, headers: &HeaderMap) -> bool {
    if !cfg.require_token {
        return true;
    }
    let token = match std::env::var("ADMIN_TOKEN") {
        Ok(t) => t,
        Err(_) => return false,
    };
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    auth == format!("Bearer {}", token)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(st): State<AdminState>) -> StatusCode {
    let stats = st.stats.read().await;
    if stats.state == Some(SessionState::Running) {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}

async fn status(State(st): State<AdminState>) -> Json<serde_json::Value> {
    let stats = st.stats.read().await;
    Json(serde_json::json!({
        "session_id": stats.session_id,
        "state": stats.state,
        "cmp": stats.cmp,
        "ticks": stats.ticks,
        "monitor_count": stats.monitor_count,
        "placed_count": stats.placed_count,
        "traded_completed_count": stats.traded_completed_count,
        "traded_pending_count": stats.traded_pending_count,
        "pt_created_count": stats.pt_created_count,
        "trades_to_new_pt": stats.trades_to_new_pt,
        "cycles_from_last_trade": stats.cycles_from_last_trade,
        "initial_balance": stats.initial_balance,
        "current_balance": stats.current_balance,
        "net_balance": stats.net_balance,
        "cmp_history": stats.cmp_history,
    }))
}

async fn orders(State(st): State<AdminState>) -> Json<serde_json::Value> {
    let stats = st.stats.read().await;
    Json(stats.orders.clone())
}

async fn kpi(State(st): State<AdminState>) -> Json<serde_json::Value> {
    let stats = st.stats.read().await;
    Json(serde_json::json!({ "cmp": stats.cmp, "rows": stats.kpi }))
}

async fn create_pt(headers: HeaderMap, State(st): State<AdminState>) -> StatusCode {
    if !authorized(&st.cfg, &headers) {
        return StatusCode::UNAUTHORIZED;
    }
    match st.tx.send(SessionEvent::CreatePt).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

#[derive(Deserialize)]
struct QuitQuery {
    mode: Option<String>,
}

async fn quit(
    headers: HeaderMap,
    Query(q): Query<QuitQuery>,
    State(st): State<AdminState>,
) -> StatusCode {
    if !authorized(&st.cfg, &headers) {
        return StatusCode::UNAUTHORIZED;
    }
    let mode = match q.mode.as_deref() {
        None | Some("cancel_all_placed") => QuitMode::CancelAllPlaced,
        Some("place_all_pending") => QuitMode::PlaceAllPending,
        Some(other) => {
            tracing::warn!(mode = other, "unknown quit mode");
            return StatusCode::BAD_REQUEST;
        }
    };
    match st.tx.send(SessionEvent::Quit(mode)).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn metrics() -> (StatusCode, String) {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buf = vec![];
    let _ = encoder.encode(&metric_families, &mut buf);
    (StatusCode::OK, String::from_utf8_lossy(&buf).to_string())
}

pub async fn serve(
    cfg: AdminCfg,
    stats: Arc<RwLock<SessionStats>>,
    tx: mpsc::Sender<SessionEvent>,
) -> Result<()> {
    let st = AdminState {
        cfg: cfg.clone(),
        stats,
        tx,
    };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/status", get(status))
        .route("/orders", get(orders))
        .route("/kpi", get(kpi))
        .route("/pt", post(create_pt))
        .route("/quit", post(quit))
        .route("/metrics", get(metrics))
        .with_state(st);

    let addr = cfg.bind.parse()?;
    tracing::info!(bind=%cfg.bind, "admin server listening");
    axum::Server::bind(&addr).serve(app.into_make_service()).await?;
    Ok(())
}
