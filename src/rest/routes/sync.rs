// rest/routes/sync.rs — manual "trigger sync now" surface.
//
// Always returns a structured result: `{message, report}` on success,
// `{message, error}` on failure. A missing access token fails immediately —
// no remote call is attempted.

use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::AppContext;

pub async fn trigger_sync(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    let Some(driver) = &ctx.driver else {
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "TickTick access token not configured" })),
        ));
    };

    match driver.run_sync().await {
        Ok(report) => Ok(Json(json!({
            "message": "Tasks synchronized successfully",
            "report": report,
        }))),
        Err(e) => {
            error!(err = %e, "manual sync failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Error syncing tasks",
                    "error": e.to_string(),
                })),
            ))
        }
    }
}
