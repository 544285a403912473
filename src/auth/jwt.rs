use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, TokenData, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
}

pub fn create_access_token(user_id: Uuid, username: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (now + Duration::seconds(config.jwt_access_ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Access,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create access token: {}", e)))
}

pub fn create_refresh_token(user_id: Uuid, username: &str, config: &Config) -> AppResult<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (now + Duration::seconds(config.jwt_refresh_ttl_secs)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Refresh,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.jwt_secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("Failed to create refresh token: {}", e)))
}

pub fn create_token_pair(user_id: Uuid, username: &str, config: &Config) -> AppResult<TokenPair> {
    let access_token = create_access_token(user_id, username, config)?;
    let refresh_token = create_refresh_token(user_id, username, config)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
        expires_in: config.jwt_access_ttl_secs,
    })
}

pub fn verify_token(token: &str, config: &Config) -> AppResult<TokenData<Claims>> {
    let mut validation = Validation::default();
    validation.validate_exp = true;

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        &validation,
    )
    .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn access_token_round_trips() {
        let config = Config::for_tests();
        let user_id = Uuid::new_v4();
        let token = create_access_token(user_id, "marta", &config).unwrap();

        let data = verify_token(&token, &config).unwrap();
        assert_eq!(data.claims.sub, user_id);
        assert_eq!(data.claims.username, "marta");
        assert_eq!(data.claims.token_type, TokenType::Access);
    }

    #[test]
    fn pair_carries_both_types() {
        let config = Config::for_tests();
        let pair = create_token_pair(Uuid::new_v4(), "marta", &config).unwrap();
        assert_eq!(pair.expires_in, config.jwt_access_ttl_secs);

        let access = verify_token(&pair.access_token, &config).unwrap();
        let refresh = verify_token(&pair.refresh_token, &config).unwrap();
        assert_eq!(access.claims.token_type, TokenType::Access);
        assert_eq!(refresh.claims.token_type, TokenType::Refresh);
    }

    #[test]
    fn expired_token_is_rejected() {
        let mut config = Config::for_tests();
        config.jwt_access_ttl_secs = -120;

        let token = create_access_token(Uuid::new_v4(), "marta", &config).unwrap();
        assert!(verify_token(&token, &config).is_err());
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let config = Config::for_tests();
        let token = create_access_token(Uuid::new_v4(), "marta", &config).unwrap();

        let mut other = Config::for_tests();
        other.jwt_secret = "completely-different".into();
        assert!(verify_token(&token, &other).is_err());
    }
}
