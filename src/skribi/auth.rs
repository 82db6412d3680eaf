//! Authenticated principal extraction.
//!
//! Flow Overview: read the `auth-token` header, verify it against the signing
//! secret, and return a principal that downstream handlers can trust. Every
//! ownership check downstream relies on this user id being authentic.

use axum::http::{HeaderMap, StatusCode};

use crate::cli::globals::GlobalArgs;
use crate::skribi::token;

pub const AUTH_TOKEN_HEADER: &str = "auth-token";

/// Authenticated user context derived from the `auth-token` header.
#[derive(Clone, Debug)]
pub struct Principal {
    pub user_id: uuid::Uuid,
}

/// Resolve the request token into a principal, or return 401.
///
/// # Errors
///
/// Returns `StatusCode::UNAUTHORIZED` when the header is missing, unreadable,
/// or the token does not verify.
pub fn require_auth(headers: &HeaderMap, globals: &GlobalArgs) -> Result<Principal, StatusCode> {
    let token = headers
        .get(AUTH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    match token::verify(token, &globals.token_secret) {
        Ok(user_id) => Ok(Principal { user_id }),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use uuid::Uuid;

    fn globals() -> GlobalArgs {
        GlobalArgs::new(SecretString::from("test-signing-secret".to_string()))
    }

    #[test]
    fn test_missing_header_is_unauthorized() {
        let headers = HeaderMap::new();

        assert_eq!(
            require_auth(&headers, &globals()).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_garbage_token_is_unauthorized() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_static("garbage"));

        assert_eq!(
            require_auth(&headers, &globals()).unwrap_err(),
            StatusCode::UNAUTHORIZED
        );
    }

    #[test]
    fn test_valid_token_yields_principal() {
        let globals = globals();
        let user_id = Uuid::new_v4();
        let token = token::issue(user_id, &globals.token_secret).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(AUTH_TOKEN_HEADER, HeaderValue::from_str(&token).unwrap());

        let principal = require_auth(&headers, &globals).unwrap();
        assert_eq!(principal.user_id, user_id);
    }
}
