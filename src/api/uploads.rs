//! Image upload and signed URL endpoints.

use std::time::Duration;

use axum::extract::multipart::MultipartError;
use axum::extract::{Multipart, Query, State};
use axum::http::StatusCode;
use serde::{Deserialize, Serialize};

use super::{success, ApiResult};
use crate::errors::AppError;
use crate::AppState;

/// Default lifetime of admin signed URLs.
pub const ADMIN_SIGNED_URL_SECS: u64 = 3600;
/// Default lifetime of public image URLs.
pub const PUBLIC_SIGNED_URL_SECS: u64 = 1800;
/// Longest lifetime handed out publicly.
pub const PUBLIC_SIGNED_URL_MAX_SECS: u64 = 7200;

/// Stored upload.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub key: String,
    pub url: String,
    pub content_type: String,
    pub bytes: usize,
}

/// POST /api/admin/uploads - Store a single image from the `file` field.
pub async fn upload_image(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<UploadResponse> {
    let max_bytes = state.config.upload_max_bytes;

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        if field.name() != Some("file") {
            continue;
        }

        let filename = field
            .file_name()
            .filter(|name| !name.is_empty())
            .unwrap_or("upload")
            .to_string();
        let content_type = field.content_type().unwrap_or_default().to_string();
        if !content_type.starts_with("image/") {
            return Err(AppError::UnsupportedMediaType(
                "Only image uploads are allowed".to_string(),
            ));
        }

        let bytes = field.bytes().await.map_err(multipart_error)?;
        if bytes.len() > max_bytes {
            return Err(too_large(max_bytes));
        }

        let size = bytes.len();
        let stored = state
            .assets
            .upload_static_file(&filename, Some(&content_type), bytes)
            .await?;

        return success(UploadResponse {
            key: stored.key,
            url: stored.url,
            content_type,
            bytes: size,
        });
    }

    Err(AppError::BadRequest("Missing file".to_string()))
}

fn multipart_error(err: MultipartError) -> AppError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::PayloadTooLarge(err.body_text())
    } else {
        AppError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

fn too_large(max_bytes: usize) -> AppError {
    AppError::PayloadTooLarge(format!("File too large (max {} bytes)", max_bytes))
}

/// Signed URL query parameters.
#[derive(Debug, Deserialize)]
pub struct SignedUrlQuery {
    /// Full object URL or bare key.
    pub url: Option<String>,
    /// Lifetime in seconds.
    pub expires: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedUrlResponse {
    pub signed_url: String,
    pub key: String,
    pub expires_in: u64,
}

/// GET /api/images/signed-url - Short-lived URL for a product image.
pub async fn public_signed_url(
    State(state): State<AppState>,
    Query(params): Query<SignedUrlQuery>,
) -> ApiResult<SignedUrlResponse> {
    let expires = params
        .expires
        .unwrap_or(PUBLIC_SIGNED_URL_SECS)
        .min(PUBLIC_SIGNED_URL_MAX_SECS);
    signed_url(&state, params.url, expires).await
}

/// GET /api/admin/uploads/signed-url - Signed URL for any static object.
pub async fn admin_signed_url(
    State(state): State<AppState>,
    Query(params): Query<SignedUrlQuery>,
) -> ApiResult<SignedUrlResponse> {
    let expires = params.expires.unwrap_or(ADMIN_SIGNED_URL_SECS);
    signed_url(&state, params.url, expires).await
}

async fn signed_url(
    state: &AppState,
    url: Option<String>,
    expires: u64,
) -> ApiResult<SignedUrlResponse> {
    let url = url
        .filter(|u| !u.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'url' parameter".to_string()))?;
    let expires = expires.max(1);

    let key = state.assets.resolve_key(url.trim());
    let signed_url = state
        .assets
        .signed_url(&key, Duration::from_secs(expires))
        .await?;

    success(SignedUrlResponse {
        signed_url,
        key,
        expires_in: expires,
    })
}
