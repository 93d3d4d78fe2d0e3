//! One-time-token payloads.
//!
//! The external identity broker writes these into the cache keyed by an
//! opaque token string; the resolver consumes them exactly once. The shape
//! is deliberately loose - providers disagree on field names - so unknown
//! `type` values parse fine and simply resolve no user.

use serde::{Deserialize, Serialize};

/// OTT payload type discriminators
pub const OTT_TYPE_GOOGLE: &str = "google";
pub const OTT_TYPE_MAXTHON: &str = "maxthon";
pub const OTT_TYPE_EMAIL: &str = "email";

/// Placeholder address for third-party-browser logins that arrive without
/// an email. `.invalid` is reserved (RFC 2606) so it can never collide
/// with a real mailbox.
pub const MAXTHON_PLACEHOLDER_EMAIL: &str = "unbound@maxthon.invalid";

/// Payload stored in the cache for a pending one-time token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OttPayload {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Google sends `picture`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
    /// Maxthon sends `avatar_url`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}
