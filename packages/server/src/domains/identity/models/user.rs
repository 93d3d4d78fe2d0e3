use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sqlx::PgPool;

use crate::common::ServiceResult;

/// Account status: active
pub const STATUS_ACTIVE: i16 = 1;
/// Account status: soft-deleted (row is kept; email stays blocked)
pub const STATUS_DELETED: i16 = 0;

/// Provenance tags (`frm` column)
pub const FRM_NATIVE: i16 = 0;
pub const FRM_GOOGLE: i16 = 1;
pub const FRM_BROWSER: i16 = 2;
pub const FRM_EMAIL_LINK: i16 = 3;

/// User model - SQL persistence layer
///
/// `info` is a free-form JSON bag holding the nested `pay` subscription
/// snapshot and the accumulated proration `delta` (seconds). `level` /
/// `level_expire_at` belong to a separate tiering feature and are stored
/// but not interpreted here.
///
/// Invariant: email is unique regardless of `status` - soft-deleted rows
/// still block reuse of their address. Rows are never hard-deleted.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub frm: i16,
    pub info: Value,
    pub status: i16,
    pub level: i16,
    pub level_expire_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields for inserting a new user row.
#[derive(Debug, Clone)]
pub struct NewUserRow {
    pub email: String,
    pub password: String,
    pub frm: i16,
    pub info: Value,
    pub status: i16,
}

/// Explicit allow-list of updatable fields. Anything not listed here
/// cannot be touched through the profile-update path.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub email: Option<String>,
    pub frm: Option<i16>,
    pub info: Option<Value>,
    pub status: Option<i16>,
}

impl UserPatch {
    pub fn is_empty(&self) -> bool {
        self.email.is_none() && self.frm.is_none() && self.info.is_none() && self.status.is_none()
    }
}

/// Normalize an email for lookup and storage: trimmed, ASCII-lowercased.
/// The unique index on `email` therefore enforces case-insensitive
/// uniqueness.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_ascii_lowercase()
}

// =============================================================================
// SQL Queries - ALL queries must be in models/
// =============================================================================

impl User {
    /// Find user by (normalized) email
    pub async fn find_by_email(email: &str, pool: &PgPool) -> ServiceResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Find user by id
    pub async fn find_by_id(id: i64, pool: &PgPool) -> ServiceResult<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
            .map_err(Into::into)
    }

    /// Insert a new user row. A duplicate email surfaces as the unique
    /// constraint firing, which the error layer maps to Conflict.
    pub async fn insert(row: NewUserRow, pool: &PgPool) -> ServiceResult<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO users (email, password, frm, info, status)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING *",
        )
        .bind(&row.email)
        .bind(&row.password)
        .bind(row.frm)
        .bind(&row.info)
        .bind(row.status)
        .fetch_one(pool)
        .await
        .map_err(Into::into)
    }

    /// Apply an allow-listed patch in a single statement. `info` merges
    /// into the stored bag (jsonb `||`) rather than replacing it, so a
    /// patch touching both scalar fields and `info` lands atomically.
    pub async fn update(id: i64, patch: &UserPatch, pool: &PgPool) -> ServiceResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE users SET
                email = COALESCE($2, email),
                frm = COALESCE($3, frm),
                info = info || COALESCE($4, '{}'::jsonb),
                status = COALESCE($5, status),
                updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(&patch.email)
        .bind(patch.frm)
        .bind(&patch.info)
        .bind(patch.status)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Merge a JSON object into `info` atomically (jsonb `||`).
    pub async fn merge_info(id: i64, patch: &Value, pool: &PgPool) -> ServiceResult<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE users SET info = info || $2, updated_at = now()
             WHERE id = $1
             RETURNING *",
        )
        .bind(id)
        .bind(patch)
        .fetch_optional(pool)
        .await
        .map_err(Into::into)
    }

    /// Replace the stored password hash.
    pub async fn update_password(id: i64, password: &str, pool: &PgPool) -> ServiceResult<bool> {
        let result = sqlx::query(
            "UPDATE users SET password = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(password)
        .execute(pool)
        .await
        .map_err(crate::common::ServiceError::from)?;
        Ok(result.rows_affected() > 0)
    }

    /// Return a copy with credential material removed, for handing to
    /// callers outside the identity domain.
    pub fn scrubbed(mut self) -> Self {
        self.password = String::new();
        self
    }
}
