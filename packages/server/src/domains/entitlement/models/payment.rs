use chrono::{DateTime, Utc};
use serde_json::Value;
use sqlx::PgPool;

use crate::common::ServiceResult;

/// Payment audit record - one row per `order_paid` webhook.
#[derive(sqlx::FromRow, Debug, Clone)]
pub struct Payment {
    pub id: i64,
    pub uid: i64,
    pub order_id: String,
    pub amount: i64,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    /// Record a payment event. Duplicate `order_id` is tolerated: the
    /// conditional insert simply matches nothing and `None` comes back.
    pub async fn record(
        uid: i64,
        order_id: &str,
        amount: i64,
        meta: &Value,
        pool: &PgPool,
    ) -> ServiceResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO payments (uid, order_id, amount, meta)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (order_id) DO NOTHING
             RETURNING *",
        )
        .bind(uid)
        .bind(order_id)
        .bind(amount)
        .bind(meta)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Payments for a user, newest first.
    pub async fn find_by_uid(uid: i64, pool: &PgPool) -> ServiceResult<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM payments WHERE uid = $1 ORDER BY created_at DESC",
        )
        .bind(uid)
        .fetch_all(pool)
        .await
        .map_err(Into::into)
    }
}
