//! User signup.
//!
//! Flow Overview:
//! 1) Validate field shapes, returning every failed check at once.
//! 2) Reject duplicate emails.
//! 3) Hash the password with bcrypt and create the user row.
//! 4) Issue a token so the new user is logged in immediately.

use axum::{
    extract::Extension, http::StatusCode, response::IntoResponse, response::Response, Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{error, info_span, instrument, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::skribi::handlers::{valid_email, FieldError, ValidationErrors};
use crate::skribi::token;

/// bcrypt cost factor, matching the hashes already in production databases.
pub const BCRYPT_COST: u32 = 10;

// Misspelling is the deployed wire format, clients match on this string
const DUPLICATE_EMAIL_ERROR: &str = "Sorry a user with this email already exixts";

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct CreateUser {
    fname: String,
    lname: String,
    email: String,
    password: String,
}

#[derive(ToSchema, Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct AuthToken {
    pub auth_token: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/createuser",
    request_body = CreateUser,
    responses(
        (status = 200, description = "User created, token returned", body = AuthToken),
        (status = 400, description = "Validation errors or email already registered", body = ValidationErrors),
    ),
    tag = "auth"
)]
#[instrument(skip(pool, globals, payload))]
pub async fn createuser(
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    payload: Option<Json<CreateUser>>,
) -> Response {
    let user: CreateUser = match payload {
        Some(Json(payload)) => payload,
        None => return (StatusCode::BAD_REQUEST, "Missing payload".to_string()).into_response(),
    };

    let email = user.email.trim().to_lowercase();

    let mut errors = Vec::new();
    if user.fname.trim().len() < 3 {
        errors.push(FieldError::new("fname", "Enter a valid first name"));
    }
    if user.lname.trim().len() < 3 {
        errors.push(FieldError::new("lname", "Enter a valid last name"));
    }
    if !valid_email(&email) {
        errors.push(FieldError::new("email", "Enter a valid email"));
    }
    if user.password.len() < 5 {
        errors.push(FieldError::new(
            "password",
            "Password must be atleast 5 characters",
        ));
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    match user_exists(&pool, &email).await {
        Ok(true) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": DUPLICATE_EMAIL_ERROR })),
            )
                .into_response();
        }
        Ok(false) => (),
        Err(e) => {
            error!("Error checking if user exists: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    }

    let password_hash = match bcrypt::hash(&user.password, BCRYPT_COST) {
        Ok(hash) => hash,
        Err(e) => {
            error!("Error hashing password: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let name = format!("{} {}", user.fname.trim(), user.lname.trim());

    let user_id = match insert_user(&pool, &user.fname, &user.lname, &name, &email, &password_hash)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            // Unique violation from a concurrent signup with the same email
            if let Some(db_err) = e.as_database_error() {
                if db_err.code().as_deref() == Some("23505") {
                    return (
                        StatusCode::BAD_REQUEST,
                        Json(json!({ "error": DUPLICATE_EMAIL_ERROR })),
                    )
                        .into_response();
                }
            }
            error!("Error inserting user: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    match token::issue(user_id, &globals.token_secret) {
        Ok(auth_token) => (StatusCode::OK, Json(AuthToken { auth_token })).into_response(),
        Err(e) => {
            error!("Error issuing token: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn user_exists(pool: &PgPool, email: &str) -> Result<bool, sqlx::Error> {
    let query = "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1) AS exists";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(email)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("exists"))
}

async fn insert_user(
    pool: &PgPool,
    fname: &str,
    lname: &str,
    name: &str,
    email: &str,
    password_hash: &str,
) -> Result<Uuid, sqlx::Error> {
    let query = r"
        INSERT INTO users (fname, lname, name, email, password)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(fname)
        .bind(lname)
        .bind(name)
        .bind(email)
        .bind(password_hash)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("id"))
}

#[cfg(test)]
mod tests {
    use super::*;

    // The live frontend matches on this exact string, typo included.
    #[test]
    fn test_duplicate_email_message_matches_wire_format() {
        assert_eq!(
            DUPLICATE_EMAIL_ERROR,
            "Sorry a user with this email already exixts"
        );
    }
}
