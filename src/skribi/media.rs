//! Media ingest: one uploaded file in, one durable image reference out.
//!
//! Flow Overview:
//! 1) The create-post handler hands over the uploaded filename and bytes.
//! 2) Local strategy writes the file under the configured upload directory,
//!    keeping the client-supplied filename verbatim. Two uploads with the same
//!    filename overwrite each other; deployed clients depend on the stored
//!    reference being the original name, so this is kept as-is.
//! 3) Cloud strategy streams the file to the image host with a signed request,
//!    a `jpg|jpeg|png` allow-list and a 500x500 limit transform, and stores the
//!    returned secure URL verbatim.

use axum::http::HeaderMap;
use chrono::Utc;
use reqwest::multipart::{Form, Part};
use secrecy::ExposeSecret;
use serde_json::Value;
use sha1::{Digest, Sha1};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::cli::globals::{GlobalArgs, MediaStrategy};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

/// Transform applied by the image host: fit inside 500x500, keep aspect
/// ratio, never upscale.
const CLOUD_TRANSFORMATION: &str = "c_limit,h_500,w_500";

const ALLOWED_FORMATS: &[&str] = &["jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("unsupported image format: {0}")]
    UnsupportedFormat(String),
    #[error("failed to store image")]
    Io(#[from] std::io::Error),
    #[error("image host request failed")]
    Http(#[from] reqwest::Error),
    #[error("image host rejected upload: {0}")]
    Upload(String),
}

/// Store an uploaded file and return the reference to persist, a bare
/// filename for the local strategy or an absolute URL for the cloud one.
///
/// # Errors
///
/// Returns `MediaError::UnsupportedFormat` for files outside the allow-list
/// (cloud strategy), `Io` when the local write fails, and `Http`/`Upload`
/// when the image host call fails.
#[instrument(skip(globals, bytes))]
pub async fn store(
    globals: &GlobalArgs,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String, MediaError> {
    match globals.media_strategy {
        MediaStrategy::Local => store_local(globals, filename, bytes).await,
        MediaStrategy::Cloud => store_cloud(globals, filename, bytes).await,
    }
}

async fn store_local(
    globals: &GlobalArgs,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String, MediaError> {
    tokio::fs::create_dir_all(&globals.upload_dir).await?;

    // Client-supplied name verbatim, same name overwrites
    let path = globals.upload_dir.join(filename);
    tokio::fs::write(&path, bytes).await?;

    debug!("stored image at {}", path.display());

    Ok(filename.to_string())
}

async fn store_cloud(
    globals: &GlobalArgs,
    filename: &str,
    bytes: Vec<u8>,
) -> Result<String, MediaError> {
    let extension = file_extension(filename);
    if !allowed_format(&extension) {
        return Err(MediaError::UnsupportedFormat(extension));
    }

    let timestamp = Utc::now().timestamp();
    let signature = upload_signature(
        &globals.cloud_folder,
        timestamp,
        CLOUD_TRANSFORMATION,
        globals.cloud_api_secret.expose_secret(),
    );

    let form = Form::new()
        .text("api_key", globals.cloud_api_key.clone())
        .text("timestamp", timestamp.to_string())
        .text("signature", signature)
        .text("folder", globals.cloud_folder.clone())
        .text("transformation", CLOUD_TRANSFORMATION)
        .part("file", Part::bytes(bytes).file_name(filename.to_string()));

    let client = reqwest::Client::builder()
        .user_agent(APP_USER_AGENT)
        .timeout(Duration::from_secs(30))
        .build()?;

    let url = format!(
        "https://api.cloudinary.com/v1_1/{}/image/upload",
        globals.cloud_name
    );

    let response = client.post(&url).multipart(form).send().await?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        error!("Image host returned {status}: {body}");
        return Err(MediaError::Upload(status.to_string()));
    }

    let json: Value = response.json().await?;

    json.get("secure_url")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| MediaError::Upload("missing secure_url in response".to_string()))
}

/// Parameters sorted by key, joined with `&`, secret appended, SHA-1 hex.
fn upload_signature(folder: &str, timestamp: i64, transformation: &str, secret: &str) -> String {
    let to_sign = format!(
        "folder={folder}&timestamp={timestamp}&transformation={transformation}{secret}"
    );

    let mut hasher = Sha1::new();
    hasher.update(to_sign.as_bytes());
    hex::encode(hasher.finalize())
}

fn file_extension(filename: &str) -> String {
    filename
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_lowercase())
        .unwrap_or_default()
}

#[must_use]
pub fn allowed_format(extension: &str) -> bool {
    ALLOWED_FORMATS.contains(&extension)
}

/// Base URL of the incoming request, for composing local image URLs.
#[must_use]
pub fn request_base(headers: &HeaderMap) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("http");

    let host = headers
        .get("host")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("localhost");

    format!("{scheme}://{host}")
}

/// Resolve a stored image reference to a client-usable URL. Cloud references
/// are already absolute; local references are served from `/images/*`.
#[must_use]
pub fn resolve_image_url(img: &str, base: &str) -> String {
    if img.starts_with("http://") || img.starts_with("https://") {
        img.to_string()
    } else {
        format!("{base}/images/{img}")
    }
}
