//! JWT Session Handler
//! Mission: Mint and validate session tokens carrying the principal's
//! identity and authority set

use crate::auth::models::{Claims, Principal};
use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use tracing::debug;

/// JWT Handler for session token operations
pub struct JwtHandler {
    secret: String,
    expiration_hours: i64,
}

impl JwtHandler {
    /// Create a new JWT handler with secret key
    pub fn new(secret: String, expiration_hours: i64) -> Self {
        Self {
            secret,
            expiration_hours,
        }
    }

    /// Generate a session token for a resolved principal
    pub fn generate_token(&self, principal: &Principal) -> Result<(String, usize)> {
        let now = Utc::now();
        let expiration = now
            .checked_add_signed(chrono::Duration::hours(self.expiration_hours))
            .context("Invalid timestamp")?
            .timestamp() as usize;

        let expires_in = (self.expiration_hours * 3600) as usize;

        let mut authorities: Vec<String> = principal.authorities.iter().cloned().collect();
        authorities.sort();

        let claims = Claims {
            sub: principal.username.clone(),
            authorities,
            exp: expiration,
        };

        debug!(
            "Generating session token for {}, expires in {}h",
            principal.username, self.expiration_hours
        );

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.secret.as_bytes()),
        )
        .context("Failed to generate session token")?;

        Ok((token, expires_in))
    }

    /// Validate a session token and extract claims
    pub fn validate_token(&self, token: &str) -> Result<Claims> {
        let decoded = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.secret.as_bytes()),
            &Validation::default(),
        )
        .context("Invalid or expired session token")?;

        debug!("Validated session token for {}", decoded.claims.sub);

        Ok(decoded.claims)
    }
}
