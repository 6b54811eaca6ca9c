//! CampusGate - Role-Gated Campus Portal
//! Mission: Demonstrate authentication and role-based authorization wiring
//! end to end: identity store, principal resolution, and an ordered
//! path-pattern access policy enforced on every request.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use campusgate_backend::{
    api::{create_router, portal_policy},
    auth::{AccessGate, AuthState, JwtHandler, PrincipalResolver, UserStore},
    config::Config,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::from_env()?;

    info!("🚀 CampusGate starting");

    // Identity store (seeds demo accounts on first start)
    let user_store =
        Arc::new(UserStore::new(&config.database_path).context("Failed to open identity store")?);
    info!("🗄️  Identity store initialized at: {}", config.database_path);

    let resolver = Arc::new(PrincipalResolver::new(user_store.clone()));
    let jwt_handler = Arc::new(JwtHandler::new(config.jwt_secret.clone(), config.token_hours));

    // The access policy is validated here, once; a shadowed or malformed
    // rule refuses to serve rather than silently allowing traffic.
    let policy = Arc::new(portal_policy().context("Invalid access policy")?);
    info!("🛡️  Access policy loaded");

    let auth_state = AuthState::new(user_store, resolver, jwt_handler.clone());
    let gate = Arc::new(AccessGate::new(jwt_handler, policy));

    let app = create_router(auth_state, gate);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;
    info!("🎯 Portal listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "campusgate_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
