//! Access Enforcement Middleware
//! Mission: Gate every request through the access policy

use crate::auth::access::{AccessPolicy, Decision};
use crate::auth::jwt::JwtHandler;
use crate::auth::models::Principal;
use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Cookie that carries the session token.
pub const SESSION_COOKIE: &str = "campus_session";

/// Everything the gate needs per request: the validated, immutable policy
/// and the token validator. Shared read-only across request tasks.
pub struct AccessGate {
    pub jwt_handler: Arc<JwtHandler>,
    pub policy: Arc<AccessPolicy>,
}

impl AccessGate {
    pub fn new(jwt_handler: Arc<JwtHandler>, policy: Arc<AccessPolicy>) -> Self {
        Self { jwt_handler, policy }
    }
}

/// Middleware that resolves the session principal (if any) and enforces
/// the access policy on the request path.
///
/// The whole router sits behind this layer, so even unmatched paths go
/// through the policy (and are denied by default) before axum's 404.
pub async fn access_control(
    State(gate): State<Arc<AccessGate>>,
    mut req: Request,
    next: Next,
) -> Result<Response, AccessDenied> {
    let path = req.uri().path().to_string();

    // Session token from the cookie, or a Bearer header for API clients
    let token = token_from_cookie(&req).or_else(|| token_from_header(&req));

    let principal = token.and_then(|t| match gate.jwt_handler.validate_token(&t) {
        Ok(claims) => Some(Principal::from_session(&claims.sub, claims.authorities)),
        Err(e) => {
            debug!("Rejected session token: {e:#}");
            None
        }
    });

    match gate.policy.decide(&path, principal.as_ref()) {
        Decision::PublicAllowed | Decision::Granted => {
            if let Some(principal) = principal {
                req.extensions_mut().insert(principal);
            }
            Ok(next.run(req).await)
        }
        Decision::AuthenticationRequired => Err(AccessDenied::Unauthenticated),
        Decision::Denied => {
            if let Some(p) = &principal {
                warn!(username = %p.username, path = %path, "Access denied");
            }
            Err(AccessDenied::Forbidden)
        }
    }
}

fn token_from_cookie(req: &Request) -> Option<String> {
    let cookies = req.headers().get(header::COOKIE)?.to_str().ok()?;
    cookies
        .split(';')
        .map(str::trim)
        .find_map(|pair| pair.strip_prefix(SESSION_COOKIE).and_then(|rest| rest.strip_prefix('=')))
        .map(str::to_string)
}

fn token_from_header(req: &Request) -> Option<String> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Extract the session principal from a request (use behind the gate).
pub fn extract_principal(req: &Request) -> Option<&Principal> {
    req.extensions().get::<Principal>()
}

/// Terminal middleware outcomes: a login challenge or a forbidden result.
/// Normal control flow, never retried.
#[derive(Debug, PartialEq, Eq)]
pub enum AccessDenied {
    Unauthenticated,
    Forbidden,
}

impl IntoResponse for AccessDenied {
    fn into_response(self) -> Response {
        match self {
            AccessDenied::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                "Authentication required",
            )
                .into_response(),
            AccessDenied::Forbidden => {
                (StatusCode::FORBIDDEN, "Insufficient permissions").into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request as HttpRequest;

    #[test]
    fn test_access_denied_responses() {
        let challenge = AccessDenied::Unauthenticated.into_response();
        assert_eq!(challenge.status(), StatusCode::UNAUTHORIZED);
        assert!(challenge.headers().contains_key(header::WWW_AUTHENTICATE));

        let forbidden = AccessDenied::Forbidden.into_response();
        assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn test_token_from_cookie_header() {
        let req = HttpRequest::builder()
            .header(header::COOKIE, "theme=dark; campus_session=abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_cookie(&req), Some("abc.def.ghi".to_string()));

        let req = HttpRequest::builder()
            .header(header::COOKIE, "campus_session_old=zzz")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_cookie(&req), None);
    }

    #[test]
    fn test_token_from_bearer_header() {
        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Bearer abc.def.ghi")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_header(&req), Some("abc.def.ghi".to_string()));

        let req = HttpRequest::builder()
            .header(header::AUTHORIZATION, "Basic dXNlcg==")
            .body(Body::empty())
            .unwrap();
        assert_eq!(token_from_header(&req), None);
    }

    #[test]
    fn test_extract_principal_from_extensions() {
        let mut req = HttpRequest::new(Body::empty());
        assert!(extract_principal(&req).is_none());

        let principal = Principal::from_session("student", ["ROLE_STUDENT".to_string()]);
        req.extensions_mut().insert(principal);

        let extracted = extract_principal(&req).unwrap();
        assert_eq!(extracted.username, "student");
    }
}
