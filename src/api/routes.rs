use axum::{
    extract::Request,
    middleware,
    response::Json,
    routing::{get, post},
    Router,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::auth::{
    access::{AccessPolicy, AccessRule, PolicyError},
    api as auth_api,
    middleware::{access_control, extract_principal, AccessGate},
    AuthState,
};
use crate::middleware::logging::request_logging;

/// The portal's authorization rules, ordered most restrictive first.
///
/// The bypass list names what is public; everything else requires a
/// session, and paths no rule matches are denied outright. Loaded once at
/// startup; construction fails on shadowed or malformed rules.
pub fn portal_policy() -> Result<AccessPolicy, PolicyError> {
    AccessPolicy::new(
        &["/", "/health", "/api/auth/login", "/api/auth/logout"],
        vec![
            // Admin domain
            AccessRule::new("/admin/**", ["ROLE_ADMIN"])?,
            // Student domain (admins may enter too)
            AccessRule::new("/student/**", ["ROLE_STUDENT", "ROLE_ADMIN"])?,
            // Session inspection for any authenticated principal
            AccessRule::new("/api/auth/me", ["ROLE_ADMIN", "ROLE_STUDENT"])?,
        ],
    )
}

/// Create the portal router behind the access gate.
pub fn create_router(auth_state: AuthState, gate: Arc<AccessGate>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health_check))
        .route("/admin", get(admin_home))
        .route("/admin/grades", get(admin_grades))
        .route("/student", get(student_home))
        .route("/student/books", get(student_books))
        .route("/api/auth/login", post(auth_api::login))
        .route("/api/auth/logout", post(auth_api::logout))
        .route("/api/auth/me", get(auth_api::get_current_session))
        .with_state(auth_state)
        .layer(
            ServiceBuilder::new()
                .layer(middleware::from_fn(request_logging))
                .layer(middleware::from_fn_with_state(gate, access_control))
                .layer(CorsLayer::permissive()),
        )
}

// ===== Route Handlers =====

/// Public home page
async fn home() -> Json<Value> {
    Json(json!({
        "message": "Welcome to the campus portal",
        "login": "/api/auth/login",
    }))
}

/// Health check endpoint
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Admin landing page
async fn admin_home(req: Request) -> Json<Value> {
    let who = extract_principal(&req)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    Json(json!({
        "area": "admin",
        "message": format!("Welcome to the admin area, {who}"),
    }))
}

/// Sample admin-only data
async fn admin_grades() -> Json<Value> {
    Json(json!({
        "grades": [
            { "student": "student", "subject": "Rust", "grade": "A" },
            { "student": "student", "subject": "Databases", "grade": "B+" },
        ]
    }))
}

/// Student landing page
async fn student_home(req: Request) -> Json<Value> {
    let who = extract_principal(&req)
        .map(|p| p.username.clone())
        .unwrap_or_default();
    Json(json!({
        "area": "student",
        "message": format!("Welcome to the student area, {who}"),
    }))
}

/// Sample data for any student
async fn student_books() -> Json<Value> {
    Json(json!({
        "books": [
            { "title": "The Rust Programming Language", "due": "2026-09-15" },
            { "title": "Database Internals", "due": "2026-09-22" },
        ]
    }))
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}
