pub mod routes;

pub use routes::{create_router, portal_policy};
