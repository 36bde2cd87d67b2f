//! Authentication
//!
//! Bearer tokens are HS256 JWTs. The subject is the user id and `roles`
//! lists role names; the caller acts with the highest-ranked role it holds.

use chrono::{Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use core_kernel::UserId;
use domain_billing::{Actor, Role};

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,
    pub roles: Vec<String>,
    /// Expiration timestamp
    pub exp: i64,
    /// Issued at timestamp
    pub iat: i64,
}

impl Claims {
    /// Identity the ledger sees for this token
    ///
    /// Unknown role names are ignored so tokens shared with other services
    /// still work.
    pub fn actor(&self) -> Result<Actor, AuthError> {
        let user_id: UserId = self.sub.parse().map_err(|_| AuthError::InvalidSubject)?;
        let role = self
            .roles
            .iter()
            .filter_map(|name| name.parse::<Role>().ok())
            .max_by_key(|role| role.rank())
            .ok_or(AuthError::NoKnownRole)?;
        Ok(Actor::new(user_id, role))
    }
}

/// Auth errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token subject is not a user id")]
    InvalidSubject,
    #[error("Token carries no ledger role")]
    NoKnownRole,
    #[error("Token lifetime exceeds {max_secs} seconds")]
    LifetimeTooLong { max_secs: u64 },
}

/// Creates a new JWT token
pub fn create_token(
    user_id: UserId,
    roles: &[Role],
    secret: &str,
    expiration_secs: u64,
) -> Result<String, AuthError> {
    let now = Utc::now();
    let exp = now + Duration::seconds(expiration_secs as i64);

    let claims = Claims {
        sub: user_id.as_uuid().to_string(),
        roles: roles.iter().map(|r| r.as_str().to_string()).collect(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|_| AuthError::InvalidToken)
}

/// Validates a JWT token
///
/// Tokens minted with a lifetime longer than `max_lifetime_secs` are refused
/// even while unexpired.
pub fn validate_token(token: &str, secret: &str, max_lifetime_secs: u64) -> Result<Claims, AuthError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => AuthError::TokenExpired,
        _ => AuthError::InvalidToken,
    })?;

    let claims = token_data.claims;
    if claims.exp.saturating_sub(claims.iat) > max_lifetime_secs as i64 {
        return Err(AuthError::LifetimeTooLong {
            max_secs: max_lifetime_secs,
        });
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-0123456789";

    #[test]
    fn test_token_round_trip_picks_highest_role() {
        let user = UserId::new();
        let token = create_token(user, &[Role::DealerStaff, Role::DealerManager], SECRET, 60).unwrap();

        let actor = validate_token(&token, SECRET, 3600).unwrap().actor().unwrap();
        assert_eq!(actor.user_id, user);
        assert_eq!(actor.role, Role::DealerManager);
    }

    #[test]
    fn test_wrong_secret_is_invalid() {
        let token = create_token(UserId::new(), &[Role::Customer], SECRET, 60).unwrap();
        assert_eq!(
            validate_token(&token, "another-secret-0123", 3600).unwrap_err(),
            AuthError::InvalidToken
        );
    }

    #[test]
    fn test_long_lived_token_is_refused() {
        let token = create_token(UserId::new(), &[Role::DealerStaff], SECRET, 7 * 24 * 3600).unwrap();
        assert_eq!(
            validate_token(&token, SECRET, 3600).unwrap_err(),
            AuthError::LifetimeTooLong { max_secs: 3600 }
        );
        assert!(validate_token(&token, SECRET, 7 * 24 * 3600).is_ok());
    }

    #[test]
    fn test_unknown_roles_are_ignored() {
        let claims = Claims {
            sub: UserId::new().to_string(),
            roles: vec!["catalog:read".to_string(), "evm_staff".to_string()],
            exp: 0,
            iat: 0,
        };
        assert_eq!(claims.actor().unwrap().role, Role::ManufacturerStaff);

        let no_roles = Claims {
            roles: vec!["catalog:read".to_string()],
            ..claims
        };
        assert_eq!(no_roles.actor().unwrap_err(), AuthError::NoKnownRole);
    }
}
