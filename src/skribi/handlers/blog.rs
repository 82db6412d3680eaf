//! Blog-post CRUD, ownership enforced at the service boundary.
//!
//! Flow Overview:
//! 1) Protected routes resolve the caller via the auth-token header.
//! 2) Create runs media ingest before the database write.
//! 3) Reads resolve the owner's display name and a client-usable image URL.
//! 4) Delete is allowed only when the caller owns the post. Legacy rows with
//!    no owner cannot be deleted by anyone.

use axum::{
    extract::{Extension, Multipart, Path},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    response::Response,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use sqlx::{PgPool, Row};
use tracing::{error, info_span, instrument, Instrument};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::cli::globals::GlobalArgs;
use crate::skribi::auth::require_auth;
use crate::skribi::handlers::{FieldError, ValidationErrors};
use crate::skribi::media::{self, MediaError};

#[derive(Debug, Serialize, ToSchema)]
pub struct BlogPost {
    pub id: Uuid,
    /// Owning user id; absent on rows predating ownership.
    pub user: Option<Uuid>,
    /// Owner's display name, resolved at read time.
    pub author: Option<String>,
    pub title: String,
    pub description: String,
    /// Client-usable image URL.
    pub img: Option<String>,
    pub date: DateTime<Utc>,
}

#[utoipa::path(
    post,
    path = "/api/blog/addblog",
    request_body(
        content = String,
        content_type = "multipart/form-data",
        description = "Fields: title, description and the img file"
    ),
    responses(
        (status = 200, description = "Created blog post with resolved image URL", body = BlogPost),
        (status = 400, description = "Validation errors", body = ValidationErrors),
        (status = 401, description = "Missing or invalid auth-token header"),
        (status = 415, description = "No image attached or unsupported format"),
    ),
    tag = "blog"
)]
#[instrument(skip(headers, pool, globals, multipart))]
pub async fn addblog(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
    mut multipart: Multipart,
) -> Response {
    let principal = match require_auth(&headers, &globals) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let mut title = String::new();
    let mut description = String::new();
    let mut upload: Option<(String, Vec<u8>)> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                error!("Error reading multipart field: {:?}", e);
                return (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
                    .into_response();
            }
        };

        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "title" => match field.text().await {
                Ok(text) => title = text,
                Err(e) => {
                    error!("Error reading title field: {:?}", e);
                    return (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
                        .into_response();
                }
            },
            "description" => match field.text().await {
                Ok(text) => description = text,
                Err(e) => {
                    error!("Error reading description field: {:?}", e);
                    return (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
                        .into_response();
                }
            },
            "img" => {
                let filename = field.file_name().map(str::to_string);
                match field.bytes().await {
                    Ok(bytes) => {
                        if let Some(filename) = filename {
                            upload = Some((filename, bytes.to_vec()));
                        }
                    }
                    Err(e) => {
                        error!("Error reading img field: {:?}", e);
                        return (StatusCode::BAD_REQUEST, "Malformed multipart body".to_string())
                            .into_response();
                    }
                }
            }
            _ => (),
        }
    }

    let mut errors = Vec::new();
    if title.trim().len() < 3 {
        errors.push(FieldError::new("title", "Enter a valid title"));
    }
    if description.trim().len() < 5 {
        errors.push(FieldError::new(
            "description",
            "Description must be atleast 5 characters",
        ));
    }
    if !errors.is_empty() {
        return (StatusCode::BAD_REQUEST, Json(ValidationErrors { errors })).into_response();
    }

    let Some((filename, bytes)) = upload else {
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(json!({ "error": "No image attached" })),
        )
            .into_response();
    };

    let img = match media::store(&globals, &filename, bytes).await {
        Ok(reference) => reference,
        Err(MediaError::UnsupportedFormat(ext)) => {
            return (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(json!({ "error": format!("Unsupported image format: {ext}") })),
            )
                .into_response();
        }
        Err(e) => {
            error!("Error storing image: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let blog_id = match insert_blog(&pool, principal.user_id, &title, &description, &img).await {
        Ok(id) => id,
        Err(e) => {
            error!("Error inserting blog: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let base = media::request_base(&headers);
    match fetch_blog(&pool, blog_id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row.resolve(&base))).into_response(),
        Ok(None) => {
            error!("Blog {blog_id} missing right after insert");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
        Err(e) => {
            error!("Error fetching created blog: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/blog/fetchblogs",
    responses(
        (status = 200, description = "Every blog post, newest first", body = [BlogPost]),
    ),
    tag = "blog"
)]
pub async fn fetchblogs(headers: HeaderMap, pool: Extension<PgPool>) -> Response {
    let base = media::request_base(&headers);

    match fetch_blogs(&pool, None).await {
        Ok(rows) => {
            let posts: Vec<BlogPost> = rows.into_iter().map(|row| row.resolve(&base)).collect();
            (StatusCode::OK, Json(posts)).into_response()
        }
        Err(e) => {
            error!("Error fetching blogs: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/blog/fetchuserblogs",
    responses(
        (status = 200, description = "Blog posts owned by the caller, newest first", body = [BlogPost]),
        (status = 401, description = "Missing or invalid auth-token header"),
    ),
    tag = "blog"
)]
pub async fn fetchuserblogs(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &globals) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let base = media::request_base(&headers);

    match fetch_blogs(&pool, Some(principal.user_id)).await {
        Ok(rows) => {
            let posts: Vec<BlogPost> = rows.into_iter().map(|row| row.resolve(&base)).collect();
            (StatusCode::OK, Json(posts)).into_response()
        }
        Err(e) => {
            error!("Error fetching user blogs: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    get,
    path = "/api/blog/{id}",
    params(
        ("id" = String, Path, description = "Blog post id")
    ),
    responses(
        (status = 200, description = "One blog post", body = BlogPost),
        (status = 404, description = "No blog post with that id"),
    ),
    tag = "blog"
)]
pub async fn blog_by_id(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
) -> Response {
    let Ok(blog_id) = Uuid::parse_str(id.trim()) else {
        return not_found();
    };

    let base = media::request_base(&headers);

    match fetch_blog(&pool, blog_id).await {
        Ok(Some(row)) => (StatusCode::OK, Json(row.resolve(&base))).into_response(),
        Ok(None) => not_found(),
        Err(e) => {
            error!("Error fetching blog {blog_id}: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

#[utoipa::path(
    delete,
    path = "/api/blog/deleteblog/{id}",
    params(
        ("id" = String, Path, description = "Blog post id")
    ),
    responses(
        (status = 200, description = "Deleted blog post's prior state", body = BlogPost),
        (status = 401, description = "Missing token, or the caller does not own the post"),
        (status = 404, description = "No blog post with that id"),
    ),
    tag = "blog"
)]
#[instrument(skip(headers, pool, globals))]
pub async fn deleteblog(
    Path(id): Path<String>,
    headers: HeaderMap,
    pool: Extension<PgPool>,
    globals: Extension<GlobalArgs>,
) -> Response {
    let principal = match require_auth(&headers, &globals) {
        Ok(principal) => principal,
        Err(status) => return status.into_response(),
    };

    let Ok(blog_id) = Uuid::parse_str(id.trim()) else {
        return not_found();
    };

    let row = match fetch_blog(&pool, blog_id).await {
        Ok(Some(row)) => row,
        Ok(None) => return not_found(),
        Err(e) => {
            error!("Error fetching blog {blog_id}: {:?}", e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    // Non-owners get 401 here, the wire status deployed clients expect
    if !may_delete(row.user_id, principal.user_id) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "Not Allowed" })),
        )
            .into_response();
    }

    match delete_blog(&pool, blog_id).await {
        Ok(true) => {
            let base = media::request_base(&headers);
            (StatusCode::OK, Json(row.resolve(&base))).into_response()
        }
        Ok(false) => not_found(),
        Err(e) => {
            error!("Error deleting blog {blog_id}: {:?}", e);
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

/// Sole deletion authority is the owning user. Rows without an owner are
/// locked: `None` never matches a caller.
fn may_delete(owner: Option<Uuid>, caller: Uuid) -> bool {
    owner == Some(caller)
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not Found" }))).into_response()
}

struct BlogRow {
    id: Uuid,
    user_id: Option<Uuid>,
    author: Option<String>,
    title: String,
    description: String,
    img: Option<String>,
    date: DateTime<Utc>,
}

impl BlogRow {
    fn resolve(self, base: &str) -> BlogPost {
        BlogPost {
            id: self.id,
            user: self.user_id,
            author: self.author,
            title: self.title,
            description: self.description,
            img: self
                .img
                .map(|img| media::resolve_image_url(&img, base)),
            date: self.date,
        }
    }
}

fn row_to_blog(row: &sqlx::postgres::PgRow) -> BlogRow {
    BlogRow {
        id: row.get("id"),
        user_id: row.get("user_id"),
        author: row.get("author"),
        title: row.get("title"),
        description: row.get("description"),
        img: row.get("img"),
        date: row.get("date"),
    }
}

async fn insert_blog(
    pool: &PgPool,
    user_id: Uuid,
    title: &str,
    description: &str,
    img: &str,
) -> Result<Uuid, sqlx::Error> {
    let query = r"
        INSERT INTO blogs (user_id, title, description, img)
        VALUES ($1, $2, $3, $4)
        RETURNING id
    ";
    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );
    let row = sqlx::query(query)
        .bind(user_id)
        .bind(title)
        .bind(description)
        .bind(img)
        .fetch_one(pool)
        .instrument(span)
        .await?;

    Ok(row.get("id"))
}

async fn fetch_blog(pool: &PgPool, blog_id: Uuid) -> Result<Option<BlogRow>, sqlx::Error> {
    let query = r"
        SELECT b.id, b.user_id, u.name AS author, b.title, b.description, b.img, b.date
        FROM blogs b
        LEFT JOIN users u ON u.id = b.user_id
        WHERE b.id = $1
    ";
    let row = sqlx::query(query).bind(blog_id).fetch_optional(pool).await?;

    Ok(row.as_ref().map(row_to_blog))
}

async fn fetch_blogs(pool: &PgPool, owner: Option<Uuid>) -> Result<Vec<BlogRow>, sqlx::Error> {
    // Newest first; the source read rows unsorted, the explicit order is a
    // deliberate change documented in DESIGN.md
    let rows = match owner {
        Some(user_id) => {
            let query = r"
                SELECT b.id, b.user_id, u.name AS author, b.title, b.description, b.img, b.date
                FROM blogs b
                LEFT JOIN users u ON u.id = b.user_id
                WHERE b.user_id = $1
                ORDER BY b.date DESC
            ";
            sqlx::query(query).bind(user_id).fetch_all(pool).await?
        }
        None => {
            let query = r"
                SELECT b.id, b.user_id, u.name AS author, b.title, b.description, b.img, b.date
                FROM blogs b
                LEFT JOIN users u ON u.id = b.user_id
                ORDER BY b.date DESC
            ";
            sqlx::query(query).fetch_all(pool).await?
        }
    };

    Ok(rows.iter().map(row_to_blog).collect())
}

async fn delete_blog(pool: &PgPool, blog_id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM blogs WHERE id = $1")
        .bind(blog_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
