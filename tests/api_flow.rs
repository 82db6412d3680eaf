//! End-to-end API tests against a live Postgres.
//!
//! Ignored by default; point `SKRIBI_TEST_DSN` at a scratch database and run
//! `cargo test -- --ignored` to exercise them. The schema is applied on each
//! run and statements are idempotent, so reusing a database is fine.

use anyhow::{Context, Result};
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use secrecy::SecretString;
use serde_json::{json, Value};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tower::ServiceExt;
use uuid::Uuid;

use skribi::cli::globals::GlobalArgs;

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

const BOUNDARY: &str = "------------------------skribitest";

struct TestApp {
    app: Router,
    _uploads: tempfile::TempDir,
}

impl TestApp {
    async fn new() -> Result<Self> {
        let dsn = std::env::var("SKRIBI_TEST_DSN").context("SKRIBI_TEST_DSN is not set")?;

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(&dsn)
            .await
            .context("failed to connect test pool")?;

        apply_schema(&pool).await?;

        let uploads = tempfile::tempdir().context("failed to create upload dir")?;
        let mut globals = GlobalArgs::new(SecretString::from("test-secret".to_string()));
        globals.upload_dir = uploads.path().to_path_buf();

        Ok(Self {
            app: skribi::skribi::app(pool, &globals),
            _uploads: uploads,
        })
    }

    async fn request(&self, request: Request<Body>) -> Result<(StatusCode, Value)> {
        let response = self.app.clone().oneshot(request).await?;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .with_context(|| format!("non-JSON body: {}", String::from_utf8_lossy(&bytes)))?
        };
        Ok((status, body))
    }

    async fn post_json(&self, path: &str, payload: &Value) -> Result<(StatusCode, Value)> {
        let request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))?;
        self.request(request).await
    }

    async fn signup(&self, email: &str) -> Result<String> {
        let (status, body) = self
            .post_json(
                "/api/auth/createuser",
                &json!({
                    "fname": "Ada",
                    "lname": "Lovelace",
                    "email": email,
                    "password": "secret1",
                }),
            )
            .await?;
        assert_eq!(status, StatusCode::OK, "signup failed: {body}");
        body["authToken"]
            .as_str()
            .map(String::from)
            .context("signup response missing authToken")
    }

    async fn add_blog(&self, token: &str, title: &str) -> Result<Uuid> {
        let request = Request::builder()
            .method(Method::POST)
            .uri("/api/blog/addblog")
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .header("auth-token", token)
            .body(Body::from(multipart_body(title)))?;
        let (status, body) = self.request(request).await?;
        assert_eq!(status, StatusCode::OK, "addblog failed: {body}");
        body["id"]
            .as_str()
            .and_then(|id| Uuid::parse_str(id).ok())
            .context("addblog response missing id")
    }
}

async fn apply_schema(pool: &PgPool) -> Result<()> {
    sqlx::raw_sql(SCHEMA_SQL)
        .execute(pool)
        .await
        .context("failed to apply schema")?;
    Ok(())
}

fn multipart_body(title: &str) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, value) in [("title", title), ("description", "An integration post")] {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"img\"; \
             filename=\"{}.png\"\r\nContent-Type: image/png\r\n\r\n",
            Uuid::new_v4()
        )
        .as_bytes(),
    );
    body.extend_from_slice(&[0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a]);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn unique_email() -> String {
    format!("{}@test.invalid", Uuid::new_v4())
}

#[ignore = "requires SKRIBI_TEST_DSN pointing at a scratch Postgres"]
#[tokio::test]
async fn test_duplicate_signup_is_rejected() -> Result<()> {
    let app = TestApp::new().await?;
    let email = unique_email();

    app.signup(&email).await?;

    let (status, body) = app
        .post_json(
            "/api/auth/createuser",
            &json!({
                "fname": "Ada",
                "lname": "Lovelace",
                "email": email,
                "password": "secret1",
            }),
        )
        .await?;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Sorry a user with this email already exixts");

    Ok(())
}

#[ignore = "requires SKRIBI_TEST_DSN pointing at a scratch Postgres"]
#[tokio::test]
async fn test_fetchuserblogs_returns_only_own_posts() -> Result<()> {
    let app = TestApp::new().await?;
    let alice = app.signup(&unique_email()).await?;
    let bob = app.signup(&unique_email()).await?;

    let alice_post = app.add_blog(&alice, "Alice writes").await?;
    let bob_post = app.add_blog(&bob, "Bob writes").await?;

    let request = Request::builder()
        .method(Method::GET)
        .uri("/api/blog/fetchuserblogs")
        .header("auth-token", &alice)
        .body(Body::empty())?;
    let (status, body) = app.request(request).await?;
    assert_eq!(status, StatusCode::OK);

    let ids: Vec<&str> = body
        .as_array()
        .context("expected an array of posts")?
        .iter()
        .filter_map(|post| post["id"].as_str())
        .collect();
    assert!(ids.contains(&alice_post.to_string().as_str()));
    assert!(!ids.contains(&bob_post.to_string().as_str()));

    Ok(())
}

#[ignore = "requires SKRIBI_TEST_DSN pointing at a scratch Postgres"]
#[tokio::test]
async fn test_delete_flow_enforces_ownership() -> Result<()> {
    let app = TestApp::new().await?;
    let owner = app.signup(&unique_email()).await?;
    let intruder = app.signup(&unique_email()).await?;

    let post_id = app.add_blog(&owner, "Keep out").await?;

    let get_post = async |app: &TestApp| {
        let uri = format!("/api/blog/{post_id}");
        let request = Request::builder()
            .method(Method::GET)
            .uri(uri)
            .body(Body::empty())
            .expect("request builds");
        app.request(request).await
    };

    let (status, body) = get_post(&app).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["title"], "Keep out");

    // Someone else's token must not be able to delete the post
    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/blog/deleteblog/{post_id}"))
        .header("auth-token", &intruder)
        .body(Body::empty())?;
    let (status, body) = app.request(request).await?;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Not Allowed");

    let request = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/blog/deleteblog/{post_id}"))
        .header("auth-token", &owner)
        .body(Body::empty())?;
    let (status, _) = app.request(request).await?;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = get_post(&app).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    Ok(())
}
