use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::routing::{get, patch};
use serde_json::json;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::notification::Notification;
use crate::state::AppState;
use crate::store::Predicate;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/riders/:id/notifications", get(list_for_recipient))
        .route("/notifications/:id/read", patch(mark_read))
}

async fn list_for_recipient(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Notification>>, DispatchError> {
    let notifications = state
        .repo
        .find::<Notification>(&[Predicate::eq("recipient_id", json!(id))])
        .await?;

    Ok(Json(notifications.into_iter().map(|n| n.value).collect()))
}

async fn mark_read(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Notification>, DispatchError> {
    let stored = state
        .repo
        .fetch::<Notification>(id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("notification {id} not found")))?;

    let mut updated = stored.value.clone();
    updated.read = true;

    let saved = state.repo.save(stored.version, &updated).await?;
    Ok(Json(saved.value))
}
