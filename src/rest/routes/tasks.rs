// rest/routes/tasks.rs — local task read surface + ICE edit path.
//
// PATCH …/ice is the local-edit trigger: the triple is persisted (the store
// re-derives the priority) and the task is pushed to TickTick immediately.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

use crate::ice::IceScore;
use crate::tasks::TaskPatch;
use crate::AppContext;

pub async fn list_tasks(
    State(ctx): State<Arc<AppContext>>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    match ctx.store.list().await {
        Ok(tasks) => Ok(Json(json!({ "tasks": tasks }))),
        Err(e) => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": e.to_string() })),
        )),
    }
}

#[derive(Deserialize)]
pub struct UpdateIceRequest {
    pub impact: i64,
    pub confidence: i64,
    pub ease: i64,
}

pub async fn update_ice(
    State(ctx): State<Arc<AppContext>>,
    Path(external_id): Path<String>,
    Json(body): Json<UpdateIceRequest>,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    for (name, value) in [
        ("impact", body.impact),
        ("confidence", body.confidence),
        ("ease", body.ease),
    ] {
        if !(1..=10).contains(&value) {
            return Err((
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": format!("{name} must be between 1 and 10") })),
            ));
        }
    }

    let ice = IceScore::new(body.impact, body.confidence, body.ease);

    let Some(driver) = &ctx.driver else {
        // No engine running: keep the edit locally so it isn't lost, then
        // report that nothing was pushed.
        let patch = TaskPatch {
            impact: Some(ice.impact),
            confidence: Some(ice.confidence),
            ease: Some(ice.ease),
            ..Default::default()
        };
        if let Err(e) = ctx.store.update(&external_id, patch).await {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            ));
        }
        return Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "TickTick access token not configured" })),
        ));
    };

    // The edit and the push run under the task's sync lock, so a realtime
    // reconcile arriving mid-request applies before or after — never between.
    let edit = match driver.update_ice(&external_id, ice).await {
        Ok(edit) => edit,
        Err(e) => {
            return Err((
                StatusCode::NOT_FOUND,
                Json(json!({ "error": e.to_string() })),
            ))
        }
    };

    match edit.push_error {
        None => Ok(Json(json!({
            "message": "Task updated and pushed",
            "task": edit.task,
        }))),
        Some(e) => {
            error!(external_id = %external_id, err = %e, "push after ICE edit failed");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({
                    "message": "Task updated locally but push failed",
                    "error": e.to_string(),
                    "task": edit.task,
                })),
            ))
        }
    }
}
