//! Signed identity tokens.
//!
//! Tokens are HS256 JWTs carrying `{ "user": { "id": <uuid> } }`, signed with
//! the process-wide secret from the configuration. Tokens carry no expiry,
//! matching the deployed clients; sessions last until the secret rotates.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("failed to sign token")]
    Sign(#[source] jsonwebtoken::errors::Error),
    #[error("invalid token")]
    Invalid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub user: UserClaim,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct UserClaim {
    pub id: Uuid,
}

/// Issue a token for the given user id.
///
/// # Errors
///
/// Returns `TokenError::Sign` if HMAC signing fails.
pub fn issue(user_id: Uuid, secret: &SecretString) -> Result<String, TokenError> {
    let claims = Claims {
        user: UserClaim { id: user_id },
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.expose_secret().as_bytes()),
    )
    .map_err(TokenError::Sign)
}

/// Verify a token and return the user id it carries.
///
/// # Errors
///
/// Returns `TokenError::Invalid` when the token is empty, malformed, or the
/// signature does not match the secret.
pub fn verify(token: &str, secret: &SecretString) -> Result<Uuid, TokenError> {
    if token.is_empty() {
        return Err(TokenError::Invalid);
    }

    // No expiry claim is issued, so exp validation must be off
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();

    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.expose_secret().as_bytes()),
        &validation,
    )
    .map(|data| data.claims.user.id)
    .map_err(|_| TokenError::Invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> SecretString {
        SecretString::from("test-signing-secret".to_string())
    }

    #[test]
    fn test_issue_verify_roundtrip() {
        let user_id = Uuid::new_v4();
        let token = issue(user_id, &secret()).unwrap();

        assert_eq!(verify(&token, &secret()).unwrap(), user_id);
    }

    #[test]
    fn test_empty_token_fails() {
        assert!(matches!(
            verify("", &secret()),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_malformed_token_fails() {
        assert!(matches!(
            verify("not-a-jwt", &secret()),
            Err(TokenError::Invalid)
        ));
    }

    #[test]
    fn test_tampered_token_fails() {
        let token = issue(Uuid::new_v4(), &secret()).unwrap();

        // Flip a character in the payload segment
        let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
        assert_eq!(parts.len(), 3);
        let mut payload: Vec<char> = parts[1].chars().collect();
        payload[0] = if payload[0] == 'A' { 'B' } else { 'A' };
        parts[1] = payload.into_iter().collect();
        let tampered = parts.join(".");

        assert!(verify(&tampered, &secret()).is_err());
    }

    #[test]
    fn test_wrong_secret_fails() {
        let token = issue(Uuid::new_v4(), &secret()).unwrap();

        assert!(verify(&token, &SecretString::from("other-secret".to_string())).is_err());
    }
}
