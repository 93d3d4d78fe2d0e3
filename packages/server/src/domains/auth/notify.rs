//! Notification ingestion - entry points for broker/payment events.
//!
//! The external notification layer delivers `login_success` and
//! `order_paid` events; this module is the contract it consumes.

use serde::Deserialize;
use tracing::{debug, warn};

use crate::common::{ServiceError, ServiceResult};
use crate::domains::cache::{SetOptions, TokenCache};
use crate::domains::entitlement::{EntitlementService, PaymentNotice};
use crate::domains::identity::{OttPayload, User};

/// A successful federated login at the identity broker. The broker hands
/// us the token it gave the user's browser plus the provider assertion.
/// The payload keeps its own `type` (provider) distinct from the event's.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginSuccess {
    pub token: String,
    pub payload: OttPayload,
}

/// Event envelope with a `type` discriminator.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationEvent {
    LoginSuccess(LoginSuccess),
    OrderPaid(PaymentNotice),
}

#[derive(Clone)]
pub struct NotificationHandler {
    cache: TokenCache,
    entitlement: EntitlementService,
    ott_ttl_seconds: u64,
}

impl NotificationHandler {
    pub fn new(cache: TokenCache, entitlement: EntitlementService, ott_ttl_seconds: u64) -> Self {
        Self {
            cache,
            entitlement,
            ott_ttl_seconds,
        }
    }

    /// Park the OTT payload under its token, pending exchange.
    ///
    /// NX write: a replayed broker event cannot overwrite a token that is
    /// still pending, which makes issuance idempotent. Returns whether the
    /// token was newly parked.
    pub async fn handle_login_successful(&self, event: LoginSuccess) -> ServiceResult<bool> {
        if event.token.is_empty() {
            return Err(ServiceError::validation("no-token"));
        }
        let value = serde_json::to_value(&event.payload)
            .map_err(|err| ServiceError::Internal(err.into()))?;
        let parked = self
            .cache
            .set(
                &event.token,
                value,
                SetOptions {
                    ttl_seconds: Some(self.ott_ttl_seconds),
                    if_not_exists: true,
                },
            )
            .await;
        if !parked {
            debug!("duplicate login_success event ignored");
        }
        Ok(parked)
    }

    /// Apply a payment event to the user's entitlement.
    pub async fn handle_order_paid(&self, notice: PaymentNotice) -> ServiceResult<User> {
        let order_id = notice.order_id.clone();
        self.entitlement.apply_payment(notice).await.map_err(|err| {
            warn!(%order_id, error = %err, "order_paid event failed");
            err
        })
    }
}
