//! User login.
//!
//! The failure response is deliberately the same whether the email is unknown
//! or the password is wrong, so the endpoint leaks nothing about which one it
//! was.

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, response::Response, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{debug, error, instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::skribi::handlers::user_register::AuthToken;
use crate::skribi::handlers::{valid_email, FieldError, ValidationErrors};
use crate::skribi::token;

const BAD_CREDENTIALS: &str = "Please try to login using correct Credentials";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct UserLogin {
    email: String,
    password: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = UserLogin,
    responses(
        (status = 200, description = "Login successful, token returned", body = AuthToken),
        (status = 400, description = "Validation errors or wrong credentials", body = ValidationErrors),
    ),
    tag = "auth"
)]
#[instrument(skip(pool, globals, payload))]
pub async fn login(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<UserLogin>>,
) -> Response {
    let user: UserLogin = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = user.email.trim().to_lowercase();

    let mut errors = Vec::new();
    if !valid_email(&email) {
        errors.push(FieldError::new("email", "Enter a valid email"));
    }
    if user.password.len() < 5 {
        errors.push(FieldError::new("password", "Password cannot be blank"));
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let (user_id, password_hash) = match get_credentials(&pool, &email).await {
        Ok(Some(row)) => row,
        Ok(None) => {
            debug!("User not found");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": BAD_CREDENTIALS })),
            )
                .into_response();
        }
        Err(e) => {
            error!("Error getting credentials from database: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match bcrypt::verify(&user.password, &password_hash) {
        Ok(true) => (),
        Ok(false) => {
            debug!("Password mismatch");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": BAD_CREDENTIALS })),
            )
                .into_response();
        }
        Err(e) => {
            error!("Error verifying password: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    match token::issue(user_id, &globals.token_secret) {
        Ok(auth_token) => (StatusCode::OK, Json(AuthToken { auth_token })).into_response(),
        Err(e) => {
            error!("Error issuing token: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn get_credentials(
    pool: &PgPool,
    email: &str,
) -> Result<Option<(Uuid, String)>, sqlx::Error> {
    let row = sqlx::query("SELECT id, password FROM users WHERE email = $1")
        .bind(email)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| (row.get("id"), row.get("password"))))
}
