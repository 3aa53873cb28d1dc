//! Object storage wiring.
//!
//! Two buckets back the site: the settings bucket holds the JSON documents
//! and the static bucket holds uploaded media. Both are built once at startup
//! from [`StorageBackend`] and passed to the repositories.

mod assets;
mod documents;

pub use assets::*;
pub use documents::*;

use std::path::Path;
use std::sync::Arc;

use object_store::aws::{AmazonS3Builder, S3ConditionalPut};
use object_store::local::LocalFileSystem;
use object_store::memory::InMemory;
use object_store::signer::Signer;
use object_store::ObjectStore;

use crate::config::{CosConfig, StorageBackend};
use crate::errors::AppError;

/// URL prefix under which the local backend serves its static bucket.
pub const LOCAL_STATIC_ROUTE: &str = "/static";

/// Document and asset stores for one deployment.
#[derive(Clone)]
pub struct Storage {
    pub documents: DocumentStore,
    pub assets: AssetStore,
}

/// Build the stores for the configured backend.
pub fn init_storage(backend: &StorageBackend) -> Result<Storage, AppError> {
    match backend {
        StorageBackend::Cos(cos) => init_cos(cos),
        StorageBackend::Local { root } => init_local(root),
        StorageBackend::Memory => Ok(init_memory()),
    }
}

fn init_cos(cos: &CosConfig) -> Result<Storage, AppError> {
    let settings: Arc<dyn ObjectStore> =
        Arc::new(cos_bucket(cos, &cos.setting_bucket, cos.conditional_put)?);
    let static_bucket = Arc::new(cos_bucket(cos, &cos.static_bucket, false)?);
    let signer: Arc<dyn Signer> = static_bucket.clone();

    Ok(Storage {
        documents: DocumentStore::new(
            settings,
            cos.bucket_url(&cos.setting_bucket),
            Capabilities {
                conditional_put: cos.conditional_put,
                attributes: true,
            },
        ),
        assets: AssetStore::new(
            static_bucket,
            Some(signer),
            cos.bucket_url(&cos.static_bucket),
            true,
        ),
    })
}

fn cos_bucket(
    cos: &CosConfig,
    bucket: &str,
    conditional_put: bool,
) -> Result<object_store::aws::AmazonS3, AppError> {
    let mut builder = AmazonS3Builder::new()
        .with_bucket_name(bucket)
        .with_region(&cos.region)
        .with_endpoint(cos.bucket_url(bucket))
        .with_virtual_hosted_style_request(true)
        .with_access_key_id(&cos.secret_id)
        .with_secret_access_key(&cos.secret_key);
    if conditional_put {
        builder = builder.with_conditional_put(S3ConditionalPut::ETagMatch);
    }

    builder
        .build()
        .map_err(|e| AppError::Config(format!("Invalid COS configuration for {}: {}", bucket, e)))
}

fn init_local(root: &Path) -> Result<Storage, AppError> {
    let settings_dir = root.join("settings");
    let static_dir = root.join("static");
    for dir in [&settings_dir, &static_dir] {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Config(format!("Failed to create {}: {}", dir.display(), e))
        })?;
    }

    let open = |dir: &Path| {
        LocalFileSystem::new_with_prefix(dir)
            .map_err(|e| AppError::Config(format!("Failed to open {}: {}", dir.display(), e)))
    };

    // The filesystem backend supports neither attributes nor If-Match puts.
    let capabilities = Capabilities {
        conditional_put: false,
        attributes: false,
    };

    Ok(Storage {
        documents: DocumentStore::new(
            Arc::new(open(&settings_dir)?),
            format!("file://{}", settings_dir.display()),
            capabilities,
        ),
        assets: AssetStore::new(Arc::new(open(&static_dir)?), None, LOCAL_STATIC_ROUTE, false),
    })
}

fn init_memory() -> Storage {
    Storage {
        documents: DocumentStore::new(
            Arc::new(InMemory::new()),
            "memory://settings",
            Capabilities {
                conditional_put: true,
                attributes: true,
            },
        ),
        assets: AssetStore::new(Arc::new(InMemory::new()), None, LOCAL_STATIC_ROUTE, true),
    }
}
