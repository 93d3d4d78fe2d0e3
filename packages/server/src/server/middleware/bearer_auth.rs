use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::domains::auth::SessionIssuer;
use crate::server::app::AppState;

/// Authenticated user information from a verified session token
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub uid: i64,
}

/// Bearer-token authentication middleware
///
/// Extracts the token from the Authorization header, verifies it, and adds
/// AuthUser to request extensions. Requests without a valid token continue
/// without AuthUser (public access); handlers decide whether to gate.
pub async fn bearer_auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_user = extract_auth_user(&request, &state.sessions);

    if let Some(user) = auth_user {
        debug!(uid = user.uid, "authenticated request");
        request.extensions_mut().insert(user);
    }

    next.run(request).await
}

/// Extract and verify the session token from the request
fn extract_auth_user(request: &Request, sessions: &SessionIssuer) -> Option<AuthUser> {
    let auth_header = request.headers().get("authorization")?;
    let auth_str = auth_header.to_str().ok()?;

    // Handle both "Bearer <token>" and a raw token
    let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str);

    let claims = sessions.verify(token).ok()?;
    Some(AuthUser { uid: claims.uid })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn issuer() -> SessionIssuer {
        SessionIssuer::new("test_secret", "test_issuer".to_string(), 30)
    }

    fn request_with_auth(value: &str) -> Request {
        axum::http::Request::builder()
            .header("authorization", value)
            .body(axum::body::Body::empty())
            .unwrap()
    }

    #[test]
    fn test_extract_token_with_bearer_prefix() {
        let sessions = issuer();
        let token = sessions.issue(42).unwrap();

        let request = request_with_auth(&format!("Bearer {}", token));
        let auth_user = extract_auth_user(&request, &sessions);
        assert_eq!(auth_user.unwrap().uid, 42);
    }

    #[test]
    fn test_extract_raw_token() {
        let sessions = issuer();
        let token = sessions.issue(7).unwrap();

        let request = request_with_auth(&token);
        let auth_user = extract_auth_user(&request, &sessions);
        assert_eq!(auth_user.unwrap().uid, 7);
    }

    #[test]
    fn test_invalid_token_yields_no_user() {
        let sessions = issuer();
        let request = request_with_auth("Bearer not-a-token");
        assert!(extract_auth_user(&request, &sessions).is_none());
    }

    #[test]
    fn test_missing_header_yields_no_user() {
        let sessions = issuer();
        let request = axum::http::Request::builder()
            .body(axum::body::Body::empty())
            .unwrap();
        assert!(extract_auth_user(&request, &sessions).is_none());
    }
}
