//! Authentication & Authorization Module
//! Mission: Identity store, principal resolution, and role-gated access
//! decisions with JWT sessions

pub mod access;
pub mod api;
pub mod jwt;
pub mod middleware;
pub mod models;
pub mod resolver;
pub mod user_store;

pub use access::{AccessPolicy, AccessRule, Decision};
pub use api::AuthState;
pub use jwt::JwtHandler;
pub use middleware::{access_control, AccessGate};
pub use models::Principal;
pub use resolver::PrincipalResolver;
pub use user_store::UserStore;
