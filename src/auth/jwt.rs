//! JWT token management
//!
//! Handles creation, validation, and refresh of JWT tokens.

use crate::error::AppError;
use crate::models::User;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Access token expiration (15 minutes)
const ACCESS_TOKEN_EXPIRATION_MINUTES: i64 = 15;

/// Refresh token expiration (7 days)
const REFRESH_TOKEN_EXPIRATION_DAYS: i64 = 7;

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: i32,
    pub email: String,
    pub is_staff: bool,
    /// May add and edit any plan
    pub can_manage_plans: bool,
    /// Editor groups; limited editors only see plans assigned to these
    pub groups: Vec<i32>,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    pub token_type: TokenType,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

/// Token pair response
#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
}

fn sign(claims: &Claims, secret: &str) -> Result<String, AppError> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
}

/// Create access and refresh tokens for a user
pub fn create_tokens(user: &User, secret: &str) -> Result<TokenPair, AppError> {
    let now = Utc::now();

    let access_claims = Claims {
        sub: user.id,
        email: user.email.clone(),
        is_staff: user.is_staff,
        can_manage_plans: user.can_manage_plans,
        groups: user.group_ids.clone(),
        exp: (now + Duration::minutes(ACCESS_TOKEN_EXPIRATION_MINUTES)).timestamp(),
        iat: now.timestamp(),
        token_type: TokenType::Access,
    };
    let refresh_claims = Claims {
        exp: (now + Duration::days(REFRESH_TOKEN_EXPIRATION_DAYS)).timestamp(),
        token_type: TokenType::Refresh,
        ..access_claims.clone()
    };

    Ok(TokenPair {
        access_token: sign(&access_claims, secret)?,
        refresh_token: sign(&refresh_claims, secret)?,
        token_type: "Bearer".to_string(),
        expires_in: ACCESS_TOKEN_EXPIRATION_MINUTES * 60,
    })
}

/// Decode and validate a JWT token
pub fn decode_token(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
            AppError::Unauthorized("Token expired".to_string())
        }
        jsonwebtoken::errors::ErrorKind::InvalidToken => {
            AppError::Unauthorized("Invalid token".to_string())
        }
        _ => AppError::Unauthorized(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

/// Check a refresh token; the caller reloads the user before issuing new tokens
pub fn refresh_tokens(refresh_token: &str, secret: &str) -> Result<Claims, AppError> {
    let claims = decode_token(refresh_token, secret)?;

    if claims.token_type != TokenType::Refresh {
        return Err(AppError::Unauthorized(
            "Invalid token type for refresh".to_string(),
        ));
    }

    Ok(claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn editor() -> User {
        User {
            id: 12,
            email: "editor@example.org".to_string(),
            password_hash: String::new(),
            name: None,
            is_staff: true,
            can_manage_plans: false,
            group_ids: vec![3, 4],
        }
    }

    #[test]
    fn test_token_round_trip() {
        let tokens = create_tokens(&editor(), "secret").unwrap();
        let claims = decode_token(&tokens.access_token, "secret").unwrap();

        assert_eq!(claims.sub, 12);
        assert_eq!(claims.groups, vec![3, 4]);
        assert_eq!(claims.token_type, TokenType::Access);
        assert!(claims.is_staff);
    }

    #[test]
    fn test_wrong_secret_is_rejected() {
        let tokens = create_tokens(&editor(), "secret").unwrap();
        assert!(decode_token(&tokens.access_token, "other").is_err());
    }

    #[test]
    fn test_refresh_requires_refresh_token() {
        let tokens = create_tokens(&editor(), "secret").unwrap();
        assert!(refresh_tokens(&tokens.access_token, "secret").is_err());
        assert_eq!(refresh_tokens(&tokens.refresh_token, "secret").unwrap().sub, 12);
    }
}
