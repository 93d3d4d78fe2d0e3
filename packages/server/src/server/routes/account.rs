//! Authenticated account routes.

use axum::extract::{Extension, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domains::entitlement::{models::Payment, Plan};
use crate::domains::identity::models::{STATUS_ACTIVE, STATUS_DELETED};
use crate::domains::identity::{User, UserPatch};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::routes::unauthorized;

#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: User,
    pub plan: Plan,
}

#[derive(Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// Profile + current entitlement for the bearer of the session token.
pub async fn me_handler(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(auth)) = auth else {
        return unauthorized("no-uid");
    };

    let user = match User::find_by_id(auth.uid, &state.db_pool).await {
        Ok(Some(user)) if user.status == STATUS_ACTIVE => user.scrubbed(),
        Ok(_) => return crate::common::ServiceError::NotFound.into_response(),
        Err(err) => return err.into_response(),
    };

    match state.entitlement.get_plan(&user) {
        Ok(plan) => Json(MeResponse { user, plan }).into_response(),
        Err(err) => err.into_response(),
    }
}

#[derive(Deserialize)]
pub struct UpdateMeRequest {
    pub email: Option<String>,
    pub info: Option<Value>,
}

/// Profile update. Only email and info are caller-editable; info merges
/// into the stored bag.
pub async fn update_me_handler(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(req): Json<UpdateMeRequest>,
) -> Response {
    let Some(Extension(auth)) = auth else {
        return unauthorized("no-uid");
    };

    let patch = UserPatch {
        email: req.email,
        info: req.info,
        ..Default::default()
    };
    match state.identity.update_user(auth.uid, patch).await {
        Ok(user) => Json(user).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Soft delete: the row is kept and the email stays blocked.
pub async fn delete_me_handler(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(auth)) = auth else {
        return unauthorized("no-uid");
    };

    let patch = UserPatch {
        status: Some(STATUS_DELETED),
        ..Default::default()
    };
    match state.identity.update_user(auth.uid, patch).await {
        Ok(_) => Json(serde_json::json!({ "deleted": true })).into_response(),
        Err(err) => err.into_response(),
    }
}

/// Payment history for the bearer, newest first.
pub async fn payments_handler(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
) -> Response {
    let Some(Extension(auth)) = auth else {
        return unauthorized("no-uid");
    };

    match Payment::find_by_uid(auth.uid, &state.db_pool).await {
        Ok(payments) => {
            let rows: Vec<Value> = payments
                .into_iter()
                .map(|p| {
                    serde_json::json!({
                        "order_id": p.order_id,
                        "amount": p.amount,
                        "meta": p.meta,
                        "created_at": p.created_at,
                    })
                })
                .collect();
            Json(rows).into_response()
        }
        Err(err) => err.into_response(),
    }
}

/// Change password; requires the current one.
pub async fn change_password_handler(
    State(state): State<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(req): Json<ChangePasswordRequest>,
) -> Response {
    let Some(Extension(auth)) = auth else {
        return unauthorized("no-uid");
    };

    match state
        .identity
        .change_password(auth.uid, &req.current_password, &req.new_password)
        .await
    {
        Ok(true) => Json(serde_json::json!({ "changed": true })).into_response(),
        Ok(false) => unauthorized("auth-failed"),
        Err(err) => err.into_response(),
    }
}
