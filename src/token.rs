use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use uuid::Uuid;

use crate::errors::AppError;

/// Stateless session token issuer/validator (HMAC-SHA256).
///
/// There is no server-side session table: a token is valid until its `exp`,
/// full stop. Rotating the secret invalidates everything outstanding.
#[derive(Debug, Clone)]
pub struct TokenConfig {
    secret: Arc<Vec<u8>>,
    pub exp_hours: i64,
}

impl TokenConfig {
    /// Reads `JWT_SECRET` (mandatory - running with a default secret is a
    /// startup error, not a warning) and `JWT_EXP_HOURS` (default 24).
    pub fn from_env() -> Result<Self, AppError> {
        let secret =
            std::env::var("JWT_SECRET").map_err(|_| AppError::configuration("JWT_SECRET not set"))?;
        if secret.trim().is_empty() {
            return Err(AppError::configuration("JWT_SECRET is empty"));
        }
        let exp_hours = std::env::var("JWT_EXP_HOURS")
            .map(|val| val.parse::<i64>())
            .unwrap_or(Ok(24))
            .map_err(|_| AppError::configuration("JWT_EXP_HOURS must be a valid integer"))?;

        Ok(Self::new(secret.into_bytes(), exp_hours))
    }

    pub fn new(secret: Vec<u8>, exp_hours: i64) -> Self {
        Self {
            secret: Arc::new(secret),
            exp_hours,
        }
    }

    /// Issue a token for a user, optionally pinned to an active company.
    pub fn issue(&self, user_id: Uuid, company_id: Option<Uuid>) -> Result<String, AppError> {
        self.issue_with_ttl(user_id, company_id, Duration::hours(self.exp_hours))
    }

    pub fn issue_with_ttl(
        &self,
        user_id: Uuid,
        company_id: Option<Uuid>,
        ttl: Duration,
    ) -> Result<String, AppError> {
        let now = chrono::Utc::now();
        let claims = Claims {
            sub: user_id,
            company_id,
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
        };

        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(&self.secret))
            .map_err(|_| AppError::internal("failed to sign token"))
    }

    /// Verify signature and expiry. Expiry is checked with zero leeway so a
    /// token is rejected the second it lapses.
    pub fn decode(&self, token: &str) -> Result<Claims, AppError> {
        let mut validation = Validation::default();
        validation.validate_exp = true;
        validation.leeway = 0;

        jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(&self.secret), &validation)
            .map(|data| data.claims)
            .map_err(|err| match err.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    /// Active company at issue time, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company_id: Option<Uuid>,
    pub exp: i64,
    pub iat: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> TokenConfig {
        TokenConfig::new(b"test-secret".to_vec(), 24)
    }

    #[test]
    fn token_round_trips_subject_and_company() {
        let cfg = config();
        let user = Uuid::new_v4();
        let company = Uuid::new_v4();

        let token = cfg.issue(user, Some(company)).unwrap();
        let claims = cfg.decode(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.company_id, Some(company));
    }

    #[test]
    fn token_without_company_claim_round_trips() {
        let cfg = config();
        let user = Uuid::new_v4();
        let claims = cfg.decode(&cfg.issue(user, None).unwrap()).unwrap();
        assert_eq!(claims.company_id, None);
    }

    #[test]
    fn expired_token_is_rejected_distinctly() {
        let cfg = config();
        let token = cfg
            .issue_with_ttl(Uuid::new_v4(), None, Duration::seconds(-5))
            .unwrap();
        let err = cfg.decode(&token).unwrap_err();
        assert!(matches!(err, AppError::ExpiredToken));
    }

    #[test]
    fn tampered_token_is_invalid_not_expired() {
        let cfg = config();
        let other = TokenConfig::new(b"other-secret".to_vec(), 24);
        let token = other.issue(Uuid::new_v4(), None).unwrap();
        let err = cfg.decode(&token).unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = config().decode("not.a.token").unwrap_err();
        assert!(matches!(err, AppError::InvalidToken));
    }
}
