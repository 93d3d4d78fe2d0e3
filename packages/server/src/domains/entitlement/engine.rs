//! Entitlement engine - applies payment events and derives current plans.

use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::common::{ServiceError, ServiceResult};
use crate::domains::entitlement::models::Payment;
use crate::domains::entitlement::plan::{plan_from_info, proration_delta, Plan, PlanSnapshot};
use crate::domains::identity::User;

/// An `order_paid` event as delivered by the notification layer. `meta` is
/// the provider's raw subscription snapshot; it becomes the new `info.pay`.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotice {
    pub uid: i64,
    pub order_id: String,
    pub meta: Value,
}

#[derive(Clone)]
pub struct EntitlementService {
    pool: PgPool,
}

impl EntitlementService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Current plan for a user.
    pub fn get_plan(&self, user: &User) -> ServiceResult<Plan> {
        plan_from_info(&user.info, Utc::now().timestamp())
    }

    /// Apply a payment event: audit-record it, compute the proration delta
    /// against the previous snapshot, then overwrite `info.pay` with the
    /// new snapshot and `info.delta` with the new delta (replace, not
    /// accumulate).
    ///
    /// Malformed incoming metadata is a ValidationError; a failed audit
    /// insert is swallowed so a flaky webhook never blocks entitlement.
    pub async fn apply_payment(&self, notice: PaymentNotice) -> ServiceResult<User> {
        // Validate before touching any state.
        let new_snapshot = PlanSnapshot::parse(&notice.meta)?;
        if notice.order_id.is_empty() {
            return Err(ServiceError::validation("no-order-id"));
        }

        let user = User::find_by_id(notice.uid, &self.pool)
            .await?
            .ok_or(ServiceError::NotFound)?;

        // Best-effort audit row.
        match Payment::record(
            notice.uid,
            &notice.order_id,
            new_snapshot.amount,
            &notice.meta,
            &self.pool,
        )
        .await
        {
            Ok(Some(_)) => {}
            Ok(None) => {
                debug!(order_id = %notice.order_id, "duplicate payment event, audit row skipped")
            }
            Err(err) => {
                warn!(error = %err, order_id = %notice.order_id, "payment audit insert failed")
            }
        }

        let delta = match user.info.get("pay").filter(|pay| !pay.is_null()) {
            Some(old_pay) => match PlanSnapshot::parse(old_pay) {
                Ok(old_snapshot) => proration_delta(
                    &old_snapshot,
                    &new_snapshot,
                    Utc::now().timestamp_millis(),
                ),
                Err(err) => {
                    // An unreadable stored snapshot only skips proration;
                    // the new payment still lands.
                    warn!(uid = user.id, error = %err, "stored pay snapshot unreadable, proration skipped");
                    0
                }
            },
            None => 0,
        };

        info!(
            uid = user.id,
            order_id = %notice.order_id,
            delta,
            "applying payment"
        );
        let patch = json!({ "pay": notice.meta, "delta": delta });
        User::merge_info(notice.uid, &patch, &self.pool)
            .await?
            .map(User::scrubbed)
            .ok_or(ServiceError::NotFound)
    }
}
