//! Authentication routes: registration, password login, OTT exchange.

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::common::ServiceError;
use crate::domains::identity::models::{FRM_NATIVE, STATUS_ACTIVE};
use crate::domains::identity::{NewUser, User};
use crate::server::app::AppState;
use crate::server::routes::unauthorized;

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct ExchangeRequest {
    pub token: String,
}

/// Session grant handed back after any successful authentication.
#[derive(Serialize)]
pub struct SessionResponse {
    pub token: String,
    pub user: User,
}

fn grant_session(state: &AppState, user: User) -> Response {
    match state.sessions.issue(user.id) {
        Ok(token) => Json(SessionResponse { token, user }).into_response(),
        Err(err) => ServiceError::Internal(err).into_response(),
    }
}

/// Native registration: email + password, provenance 0.
pub async fn register_handler(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Response {
    let new_user = NewUser {
        email: req.email,
        password: Some(req.password),
        frm: FRM_NATIVE,
        info: json!({}),
        status: STATUS_ACTIVE,
    };
    match state.identity.create_user(new_user).await {
        Ok(user) => grant_session(&state, user),
        Err(err) => err.into_response(),
    }
}

/// Password login. Unknown email and wrong password are indistinguishable.
pub async fn login_handler(
    State(state): State<AppState>,
    Json(req): Json<LoginRequest>,
) -> Response {
    match state.identity.authenticate(&req.email, &req.password).await {
        Ok(Some(user)) => grant_session(&state, user),
        Ok(None) => unauthorized("auth-failed"),
        Err(err) => err.into_response(),
    }
}

/// One-time-token exchange: a federated login's token becomes a session.
/// A spent, expired or unknown token fails with `invalid-code`.
pub async fn exchange_handler(
    State(state): State<AppState>,
    Json(req): Json<ExchangeRequest>,
) -> Response {
    if req.token.is_empty() {
        return ServiceError::validation("no-token").into_response();
    }
    match state.identity.resolve_from_ott(&req.token).await {
        Ok(Some(user)) => grant_session(&state, user),
        Ok(None) => unauthorized("invalid-code"),
        Err(err) => err.into_response(),
    }
}
