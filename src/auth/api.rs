//! Authentication API Endpoints
//! Mission: Provide login, logout, and session inspection

use crate::auth::{
    jwt::JwtHandler,
    middleware::{extract_principal, SESSION_COOKIE},
    models::{LoginRequest, LoginResponse, SessionResponse},
    resolver::{PrincipalResolver, ResolveError},
    user_store::UserStore,
};
use axum::{
    extract::{Request, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared auth state
#[derive(Clone)]
pub struct AuthState {
    pub user_store: Arc<UserStore>,
    pub resolver: Arc<PrincipalResolver>,
    pub jwt_handler: Arc<JwtHandler>,
}

impl AuthState {
    pub fn new(
        user_store: Arc<UserStore>,
        resolver: Arc<PrincipalResolver>,
        jwt_handler: Arc<JwtHandler>,
    ) -> Self {
        Self {
            user_store,
            resolver,
            jwt_handler,
        }
    }
}

/// Login endpoint - POST /api/auth/login
///
/// Unknown username, wrong password, and an unhealthy account all produce
/// the same generic 401: callers must not be able to probe which usernames
/// exist. The concrete reason only goes to the log.
pub async fn login(
    State(state): State<AuthState>,
    jar: CookieJar,
    Json(payload): Json<LoginRequest>,
) -> Result<(CookieJar, Json<LoginResponse>), AuthApiError> {
    info!("🔐 Login attempt: {}", payload.username);

    let principal = match state.resolver.resolve(&payload.username) {
        Ok(principal) => principal,
        Err(ResolveError::IdentityNotFound { username }) => {
            warn!("❌ Failed login: unknown user {}", username);
            return Err(AuthApiError::InvalidCredentials);
        }
        Err(ResolveError::Store(e)) => {
            warn!("Identity store failure during login: {e:#}");
            return Err(AuthApiError::InternalError);
        }
    };

    let valid = bcrypt::verify(&payload.password, &principal.password_hash)
        .map_err(|_| AuthApiError::InternalError)?;
    if !valid {
        warn!("❌ Failed login: bad password for {}", principal.username);
        return Err(AuthApiError::InvalidCredentials);
    }

    if !principal.is_active() {
        warn!(
            username = %principal.username,
            enabled = principal.enabled,
            non_locked = principal.account_non_locked,
            non_expired = principal.account_non_expired,
            credentials_non_expired = principal.credentials_non_expired,
            "❌ Failed login: account not active"
        );
        return Err(AuthApiError::InvalidCredentials);
    }

    let (token, expires_in) = state
        .jwt_handler
        .generate_token(&principal)
        .map_err(|_| AuthApiError::InternalError)?;

    info!("✅ Login successful: {}", principal.username);

    let cookie = Cookie::build((SESSION_COOKIE, token.clone()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build();

    let response = LoginResponse {
        token,
        expires_in,
        username: principal.username.clone(),
        authorities: SessionResponse::from_principal(&principal).authorities,
    };

    Ok((jar.add(cookie), Json(response)))
}

/// Logout endpoint - POST /api/auth/logout
///
/// Sessions are stateless tokens, so logout means clearing the cookie.
pub async fn logout(jar: CookieJar) -> (CookieJar, StatusCode) {
    let removal = Cookie::build((SESSION_COOKIE, "")).path("/").build();
    (jar.remove(removal), StatusCode::NO_CONTENT)
}

/// Current session - GET /api/auth/me
pub async fn get_current_session(req: Request) -> Result<Json<SessionResponse>, AuthApiError> {
    let principal = extract_principal(&req).ok_or(AuthApiError::Unauthorized)?;
    Ok(Json(SessionResponse::from_principal(principal)))
}

/// Auth API errors
#[derive(Debug, PartialEq, Eq)]
pub enum AuthApiError {
    InvalidCredentials,
    Unauthorized,
    InternalError,
}

impl IntoResponse for AuthApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AuthApiError::InvalidCredentials => {
                (StatusCode::UNAUTHORIZED, "Invalid username or password")
            }
            AuthApiError::Unauthorized => (StatusCode::UNAUTHORIZED, "Authentication required"),
            AuthApiError::InternalError => {
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        (status, message).into_response()
    }
}
