//! Identity Models
//! Mission: Define the user/role data model and the derived Principal

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

/// Authority strings are role names with this marker prepended,
/// e.g. role "ADMIN" grants authority "ROLE_ADMIN".
pub const ROLE_PREFIX: &str = "ROLE_";

/// Build the authority string for a role name.
pub fn authority_for(role_name: &str) -> String {
    format!("{ROLE_PREFIX}{role_name}")
}

/// A named role, persisted in the `role` table.
///
/// Roles are created at seed time (or administratively) and are immutable
/// afterwards. The user↔role association lives solely in `users_roles`;
/// neither side owns the other.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Role {
    pub id: i64,
    pub name: String,
}

/// A user account, persisted in the `user` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip_serializing)]
    pub password_hash: String, // bcrypt hash - never serialize
    pub email: Option<String>,
    pub credentials_non_expired: bool,
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub enabled: bool,
}

/// Fields of a user that callers supply on creation; ids are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub email: Option<String>,
    pub credentials_non_expired: bool,
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub enabled: bool,
}

impl NewUser {
    /// A user with all status flags set healthy.
    pub fn active(username: &str, password_hash: &str, email: Option<&str>) -> Self {
        Self {
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            email: email.map(str::to_string),
            credentials_non_expired: true,
            account_non_locked: true,
            account_non_expired: true,
            enabled: true,
        }
    }
}

/// The resolved identity used for authorization decisions.
///
/// Constructed fresh per authentication attempt by the resolver and treated
/// as immutable afterwards. The authority set is derived from the user's
/// roles at resolution time, never cached on the user row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub username: String,
    pub password_hash: String,
    pub credentials_non_expired: bool,
    pub account_non_locked: bool,
    pub account_non_expired: bool,
    pub enabled: bool,
    pub authorities: HashSet<String>,
}

impl Principal {
    /// Derive a principal from a stored user and its associated roles.
    pub fn from_user(user: &User, roles: &[Role]) -> Self {
        Self {
            username: user.username.clone(),
            password_hash: user.password_hash.clone(),
            credentials_non_expired: user.credentials_non_expired,
            account_non_locked: user.account_non_locked,
            account_non_expired: user.account_non_expired,
            enabled: user.enabled,
            authorities: roles.iter().map(|r| authority_for(&r.name)).collect(),
        }
    }

    /// Rebuild a principal from validated session claims.
    ///
    /// No password hash is available (or needed) at this point; the status
    /// flags were checked at login, before the session was established.
    pub fn from_session(username: &str, authorities: impl IntoIterator<Item = String>) -> Self {
        Self {
            username: username.to_string(),
            password_hash: String::new(),
            credentials_non_expired: true,
            account_non_locked: true,
            account_non_expired: true,
            enabled: true,
            authorities: authorities.into_iter().collect(),
        }
    }

    /// All four account-status flags are healthy.
    pub fn is_active(&self) -> bool {
        self.enabled
            && self.account_non_locked
            && self.account_non_expired
            && self.credentials_non_expired
    }

    pub fn has_authority(&self, authority: &str) -> bool {
        self.authorities.contains(authority)
    }
}

/// JWT Claims payload for the session token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // subject (username)
    pub authorities: Vec<String>,
    pub exp: usize, // expiration timestamp
}

/// Login request body
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_in: usize, // seconds until expiration
    pub username: String,
    pub authorities: Vec<String>,
}

/// Current-session response (sanitized)
#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub username: String,
    pub authorities: Vec<String>,
}

impl SessionResponse {
    pub fn from_principal(principal: &Principal) -> Self {
        let mut authorities: Vec<String> = principal.authorities.iter().cloned().collect();
        authorities.sort();
        Self {
            username: principal.username.clone(),
            authorities,
        }
    }
}
