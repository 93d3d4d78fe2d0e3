//! Identity resolver - maps login assertions to canonical local users.

use serde_json::{json, Value};
use sqlx::PgPool;
use tracing::{info, warn};

use crate::common::{ServiceError, ServiceResult};
use crate::domains::cache::TokenCache;
use crate::domains::credentials::{
    generate_random_password, hash_password, verify_password, GENERATED_PASSWORD_LEN,
};
use crate::domains::identity::models::user::{FRM_BROWSER, FRM_EMAIL_LINK, FRM_GOOGLE, STATUS_ACTIVE};
use crate::domains::identity::models::{normalize_email, NewUserRow, User, UserPatch};
use crate::domains::identity::ott::{
    OttPayload, MAXTHON_PLACEHOLDER_EMAIL, OTT_TYPE_EMAIL, OTT_TYPE_GOOGLE, OTT_TYPE_MAXTHON,
};

/// Request to resolve-or-create a user from an external assertion.
#[derive(Debug, Clone, Default)]
pub struct EnsureUser {
    pub email: Option<String>,
    pub uid: Option<i64>,
    pub frm: i16,
    pub info: Value,
    /// Federated callers normally leave this empty; a random password is
    /// generated for them.
    pub password: Option<String>,
}

/// Request to create a user explicitly (registration path).
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: Option<String>,
    pub frm: i16,
    pub info: Value,
    pub status: i16,
}

/// Identity resolver with explicit dependencies - no ambient context.
#[derive(Clone)]
pub struct IdentityService {
    pool: PgPool,
    cache: TokenCache,
}

impl IdentityService {
    pub fn new(pool: PgPool, cache: TokenCache) -> Self {
        Self { pool, cache }
    }

    /// Resolve an existing user by uid or email, creating one when absent.
    ///
    /// Idempotent: an existing row is returned unchanged. Creation races
    /// between concurrent callers are absorbed by the unique email
    /// constraint - the loser re-fetches the winner's row.
    pub async fn ensure_user(&self, req: EnsureUser) -> ServiceResult<User> {
        if let Some(uid) = req.uid {
            if let Some(user) = User::find_by_id(uid, &self.pool).await? {
                return Ok(user.scrubbed());
            }
        }

        let email = match req.email.as_deref().map(normalize_email) {
            Some(email) if !email.is_empty() => email,
            _ => return Err(ServiceError::validation("no-email")),
        };

        if let Some(user) = User::find_by_email(&email, &self.pool).await? {
            return Ok(user.scrubbed());
        }

        let password = match req.password {
            Some(p) if !p.is_empty() => p,
            _ if req.frm > 0 => generate_random_password(GENERATED_PASSWORD_LEN),
            _ => return Err(ServiceError::validation("no-password")),
        };

        let row = NewUserRow {
            email: email.clone(),
            password: hash_password(&password, None),
            frm: req.frm,
            // The info column is a NOT NULL json object
            info: if req.info.is_object() {
                req.info
            } else {
                json!({})
            },
            status: STATUS_ACTIVE,
        };
        match User::insert(row, &self.pool).await {
            Ok(user) => {
                info!(uid = user.id, %email, frm = req.frm, "provisioned new user");
                Ok(user.scrubbed())
            }
            Err(ServiceError::Conflict(_)) => {
                // Lost a creation race; the row now exists.
                match User::find_by_email(&email, &self.pool).await? {
                    Some(user) => Ok(user.scrubbed()),
                    None => Err(ServiceError::Conflict(email)),
                }
            }
            Err(err) => Err(err),
        }
    }

    /// Consume a one-time token and resolve it to a user.
    ///
    /// Consumption is atomic (`cache.take`): a token resolves at most once,
    /// so two concurrent requests cannot both turn the same OTT into a
    /// session grant. Returns `None` for unknown, expired, already-consumed
    /// or unrecognized-provider tokens.
    pub async fn resolve_from_ott(&self, token: &str) -> ServiceResult<Option<User>> {
        let Some(raw) = self.cache.take(token).await else {
            return Ok(None);
        };
        let payload: OttPayload = match serde_json::from_value(raw) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(error = %err, "unreadable OTT payload");
                return Ok(None);
            }
        };

        let req = match payload.kind.as_str() {
            OTT_TYPE_GOOGLE => {
                let Some(email) = payload.email else {
                    warn!("google OTT payload without email");
                    return Ok(None);
                };
                EnsureUser {
                    email: Some(email),
                    frm: FRM_GOOGLE,
                    info: avatar_info(payload.picture),
                    ..Default::default()
                }
            }
            OTT_TYPE_MAXTHON => EnsureUser {
                email: Some(
                    payload
                        .email
                        .unwrap_or_else(|| MAXTHON_PLACEHOLDER_EMAIL.to_string()),
                ),
                frm: FRM_BROWSER,
                info: avatar_info(payload.avatar_url),
                ..Default::default()
            },
            OTT_TYPE_EMAIL => {
                let Some(email) = payload.email else {
                    warn!("email OTT payload without email");
                    return Ok(None);
                };
                EnsureUser {
                    email: Some(email),
                    frm: FRM_EMAIL_LINK,
                    info: json!({}),
                    ..Default::default()
                }
            }
            other => {
                warn!(kind = other, "OTT payload with unrecognized type");
                return Ok(None);
            }
        };

        self.ensure_user(req).await.map(Some)
    }

    /// Create a user through the registration path.
    ///
    /// Native accounts require a password; federated ones get a random one.
    /// Duplicate email fails with Conflict (pre-check, unique constraint as
    /// backstop). The returned user carries no credential material.
    pub async fn create_user(&self, req: NewUser) -> ServiceResult<User> {
        let email = normalize_email(&req.email);
        if email.is_empty() {
            return Err(ServiceError::validation("no-email"));
        }
        let password = match req.password {
            Some(p) if !p.is_empty() => p,
            _ if req.frm > 0 => generate_random_password(GENERATED_PASSWORD_LEN),
            _ => return Err(ServiceError::validation("no-password")),
        };

        if User::find_by_email(&email, &self.pool).await?.is_some() {
            return Err(ServiceError::Conflict(email));
        }

        let row = NewUserRow {
            email: email.clone(),
            password: hash_password(&password, None),
            frm: req.frm,
            info: if req.info.is_object() {
                req.info
            } else {
                json!({})
            },
            status: req.status,
        };
        let user = User::insert(row, &self.pool).await?;
        info!(uid = user.id, %email, "registered new user");
        Ok(user.scrubbed())
    }

    /// Password login. Returns `None` for unknown email, inactive account
    /// and wrong password alike - indistinguishable to the caller to avoid
    /// user enumeration; the distinction is only logged.
    pub async fn authenticate(&self, email: &str, password: &str) -> ServiceResult<Option<User>> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(ServiceError::validation("no-email"));
        }
        if password.is_empty() {
            return Err(ServiceError::validation("no-password"));
        }

        let Some(user) = User::find_by_email(&email, &self.pool).await? else {
            warn!(%email, "login attempt for unknown email");
            return Ok(None);
        };
        if user.status != STATUS_ACTIVE {
            warn!(%email, uid = user.id, "login attempt for inactive account");
            return Ok(None);
        }
        if !verify_password(password, &user.password) {
            warn!(%email, uid = user.id, "login attempt with wrong password");
            return Ok(None);
        }

        Ok(Some(user.scrubbed()))
    }

    /// Apply an allow-listed profile patch. `info` merges rather than
    /// replaces so entitlement fields survive profile edits; the whole
    /// patch lands in one UPDATE, so it applies fully or not at all.
    pub async fn update_user(&self, uid: i64, mut patch: UserPatch) -> ServiceResult<User> {
        if patch.is_empty() {
            return Err(ServiceError::validation("no-fields"));
        }
        if let Some(email) = patch.email.take() {
            let email = normalize_email(&email);
            if email.is_empty() {
                return Err(ServiceError::validation("no-email"));
            }
            patch.email = Some(email);
        }
        if let Some(info) = &patch.info {
            if !info.is_object() {
                return Err(ServiceError::validation("invalid-info"));
            }
        }

        let user = User::update(uid, &patch, &self.pool)
            .await?
            .ok_or(ServiceError::NotFound)?;
        Ok(user.scrubbed())
    }

    /// Change password after verifying the current one. Returns `false`
    /// (not an error) when the current password does not match.
    pub async fn change_password(
        &self,
        uid: i64,
        current: &str,
        new_password: &str,
    ) -> ServiceResult<bool> {
        if new_password.is_empty() {
            return Err(ServiceError::validation("no-password"));
        }
        let user = User::find_by_id(uid, &self.pool)
            .await?
            .ok_or(ServiceError::NotFound)?;
        if !verify_password(current, &user.password) {
            warn!(uid, "password change with wrong current password");
            return Ok(false);
        }
        User::update_password(uid, &hash_password(new_password, None), &self.pool).await
    }
}

fn avatar_info(avatar: Option<String>) -> Value {
    match avatar {
        Some(url) => json!({ "avatar": url }),
        None => json!({}),
    }
}
