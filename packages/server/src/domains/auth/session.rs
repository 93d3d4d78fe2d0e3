use anyhow::Result;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Session claims - data carried by the opaque bearer token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SessionClaims {
    pub sub: String, // Subject (uid as string)
    pub uid: i64,    // User id
    pub iat: i64,    // Created at timestamp
    pub exp: i64,    // Expiry timestamp
    pub iss: String, // Issuer
    pub jti: String, // Unique token identifier
}

/// Session issuer - mints and verifies stateless bearer tokens.
///
/// Tokens are never stored server-side; verification rejects expired or
/// tampered tokens and returns no identity on failure.
#[derive(Clone)]
pub struct SessionIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    default_ttl: chrono::Duration,
}

impl SessionIssuer {
    /// Create a new issuer with secret, issuer name and default lifetime
    pub fn new(secret: &str, issuer: String, default_ttl_days: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            default_ttl: chrono::Duration::days(default_ttl_days),
        }
    }

    /// Mint a token for a user with the default lifetime
    pub fn issue(&self, uid: i64) -> Result<String> {
        self.issue_with_ttl(uid, self.default_ttl)
    }

    /// Mint a token with an explicit lifetime
    pub fn issue_with_ttl(&self, uid: i64, ttl: chrono::Duration) -> Result<String> {
        let now = chrono::Utc::now();
        let claims = SessionClaims {
            sub: uid.to_string(),
            uid,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(Into::into)
    }

    /// Verify and decode a token
    ///
    /// Returns claims only if the token is authentic and not expired
    pub fn verify(&self, token: &str) -> Result<SessionClaims> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        decode::<SessionClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(Into::into)
    }
}
