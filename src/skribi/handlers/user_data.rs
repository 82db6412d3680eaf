//! Authenticated profile read, password hash never leaves the database.

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    response::Response,
    Json,
};
use serde::Serialize;
use sqlx::{PgPool, Row};
use tracing::error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::skribi::auth::require_auth;

#[derive(Debug, Serialize, ToSchema)]
pub struct UserData {
    pub id: Uuid,
    pub fname: String,
    pub lname: String,
    pub name: String,
    pub email: String,
}

#[utoipa::path(
    post,
    path = "/api/auth/getuserdata",
    responses(
        (status = 200, description = "Profile of the authenticated user", body = UserData),
        (status = 401, description = "Missing or invalid auth-token header"),
        (status = 404, description = "User no longer exists"),
    ),
    tag = "auth"
)]
pub async fn getuserdata(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &globals) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    match fetch_user(&pool, principal.user_id).await {
        Ok(Some(user)) => (StatusCode::OK, Json(user)).into_response(),
        Ok(None) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            error!("Error fetching user data: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

async fn fetch_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserData>, sqlx::Error> {
    let row = sqlx::query("SELECT id, fname, lname, name, email FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(|row| UserData {
        id: row.get("id"),
        fname: row.get("fname"),
        lname: row.get("lname"),
        name: row.get("name"),
        email: row.get("email"),
    }))
}
