use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::config;

/// Longest token lifetime accepted from configuration or `fleetctl token --hours`
pub const MAX_TOKEN_HOURS: i64 = 24 * 365 * 10;

/// Bearer token claims. `sub` is the caller's user id in the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub tenant_id: String,
    #[serde(default)]
    pub roles: Vec<String>,
    pub exp: i64,
    pub iat: i64,
}

impl Claims {
    pub fn new(user_id: String, tenant_id: String, roles: Vec<String>) -> Self {
        let expiry_hours = i64::try_from(config::config().security.jwt_expiry_hours)
            .unwrap_or(MAX_TOKEN_HOURS)
            .min(MAX_TOKEN_HOURS);
        Self::with_expiry(user_id, tenant_id, roles, Duration::hours(expiry_hours))
    }

    pub fn with_expiry(user_id: String, tenant_id: String, roles: Vec<String>, ttl: Duration) -> Self {
        let now = Utc::now();
        Self {
            sub: user_id,
            tenant_id,
            roles,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        }
    }
}

/// Request-scoped caller identity, resolved once per request by the auth middleware
/// and passed explicitly to the access check and the notifier.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionContext {
    pub user_id: String,
    pub tenant_id: String,
    pub roles: Vec<String>,
}

impl From<Claims> for SessionContext {
    fn from(claims: Claims) -> Self {
        Self {
            user_id: claims.sub,
            tenant_id: claims.tenant_id,
            roles: claims.roles,
        }
    }
}

#[derive(Debug)]
pub enum JwtError {
    TokenGeneration(String),
    InvalidToken(String),
    MissingClaim(&'static str),
    InvalidSecret,
}

impl std::fmt::Display for JwtError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JwtError::TokenGeneration(msg) => write!(f, "JWT generation error: {}", msg),
            JwtError::InvalidToken(msg) => write!(f, "Invalid JWT token: {}", msg),
            JwtError::MissingClaim(claim) => write!(f, "JWT token is missing the '{}' claim", claim),
            JwtError::InvalidSecret => write!(f, "JWT secret not configured"),
        }
    }
}

impl std::error::Error for JwtError {}

/// Sign claims with the configured secret
pub fn generate_jwt(claims: &Claims) -> Result<String, JwtError> {
    encode_with_secret(claims, &config::config().security.jwt_secret)
}

/// Verify a token with the configured secret
pub fn validate_jwt(token: &str) -> Result<Claims, JwtError> {
    decode_with_secret(token, &config::config().security.jwt_secret)
}

pub fn encode_with_secret(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let encoding_key = EncodingKey::from_secret(secret.as_bytes());
    encode(&Header::default(), claims, &encoding_key).map_err(|e| JwtError::TokenGeneration(e.to_string()))
}

pub fn decode_with_secret(token: &str, secret: &str) -> Result<Claims, JwtError> {
    if secret.is_empty() {
        return Err(JwtError::InvalidSecret);
    }

    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let token_data = decode::<Claims>(token, &decoding_key, &Validation::default())
        .map_err(|e| JwtError::InvalidToken(e.to_string()))?;

    let claims = token_data.claims;
    if claims.sub.trim().is_empty() {
        return Err(JwtError::MissingClaim("sub"));
    }
    if claims.tenant_id.trim().is_empty() {
        return Err(JwtError::MissingClaim("tenant_id"));
    }
    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "unit-test-secret";

    #[test]
    fn round_trips_session_fields() {
        let claims = Claims::with_expiry("user-1".into(), "tenant-a".into(), vec!["owner".into()], Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();

        let session: SessionContext = decode_with_secret(&token, SECRET).unwrap().into();
        assert_eq!(session.user_id, "user-1");
        assert_eq!(session.tenant_id, "tenant-a");
        assert_eq!(session.roles, vec!["owner".to_string()]);
    }

    #[test]
    fn rejects_wrong_secret_and_expired_tokens() {
        let claims = Claims::with_expiry("user-1".into(), "tenant-a".into(), vec![], Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(matches!(decode_with_secret(&token, "other"), Err(JwtError::InvalidToken(_))));

        // Well past the default 60s leeway
        let expired = Claims::with_expiry("user-1".into(), "tenant-a".into(), vec![], Duration::hours(-2));
        let token = encode_with_secret(&expired, SECRET).unwrap();
        assert!(matches!(decode_with_secret(&token, SECRET), Err(JwtError::InvalidToken(_))));
    }

    #[test]
    fn rejects_tokens_without_tenant() {
        let claims = Claims::with_expiry("user-1".into(), "".into(), vec![], Duration::hours(1));
        let token = encode_with_secret(&claims, SECRET).unwrap();
        assert!(matches!(decode_with_secret(&token, SECRET), Err(JwtError::MissingClaim("tenant_id"))));
    }

    #[test]
    fn configured_lifetime_applies_to_new_claims() {
        let claims = Claims::new("user-1".into(), "tenant-a".into(), vec![]);
        let hours = config::config().security.jwt_expiry_hours as i64;
        assert_eq!(claims.exp - claims.iat, hours.min(MAX_TOKEN_HOURS) * 3600);

        let token = generate_jwt(&claims).unwrap();
        assert_eq!(validate_jwt(&token).unwrap().sub, "user-1");
    }

    #[test]
    fn empty_secret_is_refused() {
        let claims = Claims::with_expiry("user-1".into(), "tenant-a".into(), vec![], Duration::hours(1));
        assert!(matches!(encode_with_secret(&claims, ""), Err(JwtError::InvalidSecret)));
    }
}
