use axum::{extract::State, Json};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppContext;

pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<Value> {
    let uptime = ctx.started_at.elapsed().as_secs();
    // "exhausted" here means the realtime channel gave up reconnecting and
    // needs a restart — the one state an operator has to act on.
    let realtime = ctx
        .driver
        .as_ref()
        .map(|d| d.channel_state().borrow().as_str());
    Json(json!({
        "status": "ok",
        "uptime_secs": uptime,
        "version": env!("CARGO_PKG_VERSION"),
        "sync_configured": ctx.driver.is_some(),
        "realtime": realtime,
    }))
}
