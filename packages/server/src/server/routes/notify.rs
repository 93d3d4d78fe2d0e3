//! Event ingestion route for the external notification layer.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

use crate::domains::auth::NotificationEvent;
use crate::server::app::AppState;

/// Dispatch an incoming event by its `type` discriminator.
pub async fn notify_handler(
    State(state): State<AppState>,
    Json(event): Json<NotificationEvent>,
) -> Response {
    match event {
        NotificationEvent::LoginSuccess(login) => {
            match state.notifications.handle_login_successful(login).await {
                Ok(parked) => Json(json!({ "ok": true, "parked": parked })).into_response(),
                Err(err) => err.into_response(),
            }
        }
        NotificationEvent::OrderPaid(notice) => {
            match state.notifications.handle_order_paid(notice).await {
                Ok(user) => Json(json!({ "ok": true, "uid": user.id })).into_response(),
                Err(err) => err.into_response(),
            }
        }
    }
}
