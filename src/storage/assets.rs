//! Static asset bucket: uploaded product images and their URLs.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::http::Method;
use chrono::Utc;
use object_store::path::Path;
use object_store::signer::Signer;
use object_store::{Attribute, Attributes, ObjectStore, PutOptions, PutPayload};
use serde::Serialize;
use url::Url;

use crate::errors::AppError;

/// Key and public URL of a stored asset.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StoredAsset {
    pub key: String,
    pub url: String,
}

/// Media storage for the public site.
#[derive(Clone)]
pub struct AssetStore {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    public_base_url: String,
    content_type_attributes: bool,
}

impl AssetStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        signer: Option<Arc<dyn Signer>>,
        public_base_url: impl Into<String>,
        content_type_attributes: bool,
    ) -> Self {
        Self {
            store,
            signer,
            public_base_url: public_base_url.into(),
            content_type_attributes,
        }
    }

    /// Store an uploaded file under `uploads/{date}/{stem}_{millis}.{ext}`.
    pub async fn upload_static_file(
        &self,
        filename: &str,
        content_type: Option<&str>,
        bytes: Bytes,
    ) -> Result<StoredAsset, AppError> {
        let now = Utc::now();
        let key = upload_key(
            filename,
            &now.format("%Y-%m-%d").to_string(),
            now.timestamp_millis(),
        );

        let mut attributes = Attributes::new();
        if let (true, Some(content_type)) = (self.content_type_attributes, content_type) {
            attributes.insert(Attribute::ContentType, content_type.to_string().into());
        }
        let options = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&Path::from(key.as_str()), PutPayload::from(bytes), options)
            .await?;

        tracing::info!("Stored upload {}", key);
        Ok(StoredAsset {
            url: self.public_url(&key),
            key,
        })
    }

    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url.trim_end_matches('/'), key)
    }

    /// Time-limited GET URL for a private object.
    ///
    /// Backends that cannot presign hand out the public URL instead.
    pub async fn signed_url(&self, key: &str, expires_in: Duration) -> Result<String, AppError> {
        match &self.signer {
            Some(signer) => {
                let url = signer
                    .signed_url(Method::GET, &Path::from(key), expires_in)
                    .await?;
                Ok(url.to_string())
            }
            None => Ok(self.public_url(key)),
        }
    }

    /// Object key of a URL pointing into this bucket or any COS bucket.
    pub fn key_from_url(&self, url: &str) -> Option<String> {
        let base = format!("{}/", self.public_base_url.trim_end_matches('/'));
        if let Some(key) = url.strip_prefix(&base) {
            return Some(key.to_string()).filter(|k| !k.is_empty());
        }

        let parsed = Url::parse(url).ok()?;
        let host = parsed.host_str()?;
        if !(host.contains(".cos.") && host.ends_with(".myqcloud.com")) {
            return None;
        }
        Some(parsed.path().trim_start_matches('/').to_string()).filter(|k| !k.is_empty())
    }

    /// Key for a `url` query parameter that may be a full URL or already a key.
    pub fn resolve_key(&self, url_or_key: &str) -> String {
        self.key_from_url(url_or_key)
            .unwrap_or_else(|| url_or_key.to_string())
    }
}

/// Object key for an upload; the filename is reduced to `[A-Za-z0-9._-]`.
fn upload_key(filename: &str, date: &str, millis: i64) -> String {
    let safe: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    match safe.rsplit_once('.') {
        Some((stem, ext)) if !ext.is_empty() => {
            format!("uploads/{}/{}_{}.{}", date, stem, millis, ext)
        }
        Some((stem, _)) => format!("uploads/{}/{}_{}", date, stem, millis),
        None => format!("uploads/{}/{}_{}", date, safe, millis),
    }
}
