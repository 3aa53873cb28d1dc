//! JSON document store on top of an object-storage bucket.
//!
//! Each collection lives in one object and is always rewritten whole.
//! Updates go through [`DocumentStore::update_document`], which writes with a
//! precondition on the version that was read and retries the whole
//! read-modify-write when another writer got there first.

use std::sync::Arc;

use object_store::path::Path;
use object_store::{
    Attribute, Attributes, ObjectStore, PutMode, PutOptions, PutPayload, UpdateVersion,
};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::errors::AppError;

/// Maximum read-modify-write attempts before giving up with a conflict.
pub const MAX_UPDATE_ATTEMPTS: usize = 8;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

/// Where a document was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentLocation {
    pub key: String,
    pub url: String,
}

/// Outcome of a mutation passed to [`DocumentStore::update_document`].
pub enum Change<R> {
    /// Persist the mutated document and return the value.
    Commit(R),
    /// Leave storage untouched and return the value.
    Discard(R),
}

/// What a backend supports beyond plain get/put.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// `PutMode::Create` / `PutMode::Update` are honoured
    pub conditional_put: bool,
    /// Object attributes such as `Content-Type` can be set
    pub attributes: bool,
}

/// A document read together with the precondition its rewrite must meet.
pub(crate) struct Loaded<T> {
    pub value: T,
    pub mode: PutMode,
}

/// Read/write whole JSON documents by key.
#[derive(Clone)]
pub struct DocumentStore {
    store: Arc<dyn ObjectStore>,
    public_base_url: String,
    capabilities: Capabilities,
}

impl DocumentStore {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        public_base_url: impl Into<String>,
        capabilities: Capabilities,
    ) -> Self {
        Self {
            store,
            public_base_url: public_base_url.into(),
            capabilities,
        }
    }

    /// Read and parse a document. Missing objects and invalid JSON are errors.
    pub async fn read_document<T: DeserializeOwned>(&self, key: &str) -> Result<T, AppError> {
        let bytes = self.store.get(&Path::from(key)).await?.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            AppError::Internal(format!("Failed to parse JSON from document '{}': {}", key, e))
        })
    }

    /// Overwrite a document unconditionally. The last writer wins.
    pub async fn write_document<T: Serialize>(
        &self,
        key: &str,
        value: &T,
    ) -> Result<DocumentLocation, AppError> {
        self.put(key, value, PutMode::Overwrite).await?;
        Ok(self.location(key))
    }

    /// Read-modify-write a document under a version precondition.
    ///
    /// A missing document or one that is not JSON at all starts from
    /// `T::default()`. JSON that does not fit `T` and any other read error
    /// abort without writing. `mutate` may run several times.
    pub async fn update_document<T, R, F>(&self, key: &str, mut mutate: F) -> Result<R, AppError>
    where
        T: DeserializeOwned + Serialize + Default,
        F: FnMut(&mut T) -> Change<R>,
    {
        for attempt in 1..=MAX_UPDATE_ATTEMPTS {
            let Loaded { mut value, mode } = self.load::<T>(key).await?;

            let result = match mutate(&mut value) {
                Change::Discard(result) => return Ok(result),
                Change::Commit(result) => result,
            };

            match self.put(key, &value, mode).await {
                Ok(()) => return Ok(result),
                Err(AppError::Conflict(_)) => {
                    tracing::warn!(
                        "Document '{}' changed while updating (attempt {}/{}), retrying",
                        key,
                        attempt,
                        MAX_UPDATE_ATTEMPTS
                    );
                }
                Err(e) => return Err(e),
            }
        }

        Err(AppError::Conflict(format!(
            "Document '{}' kept changing; gave up after {} attempts",
            key, MAX_UPDATE_ATTEMPTS
        )))
    }

    #[cfg(test)]
    pub(crate) fn store(&self) -> &Arc<dyn ObjectStore> {
        &self.store
    }

    /// Public URL of a document in this bucket.
    pub fn location(&self, key: &str) -> DocumentLocation {
        DocumentLocation {
            key: key.to_string(),
            url: format!("{}/{}", self.public_base_url.trim_end_matches('/'), key),
        }
    }

    pub(crate) async fn load<T>(&self, key: &str) -> Result<Loaded<T>, AppError>
    where
        T: DeserializeOwned + Default,
    {
        let result = match self.store.get(&Path::from(key)).await {
            Ok(result) => result,
            Err(object_store::Error::NotFound { .. }) => {
                return Ok(Loaded {
                    value: T::default(),
                    mode: self.mode(PutMode::Create),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let version = UpdateVersion {
            e_tag: result.meta.e_tag.clone(),
            version: result.meta.version.clone(),
        };
        let bytes = result.bytes().await?;

        let value = match serde_json::from_slice(&bytes) {
            Ok(value) => value,
            Err(e) if e.is_syntax() || e.is_eof() => {
                tracing::warn!(
                    "Document '{}' is not valid JSON ({}); starting from an empty document",
                    key,
                    e
                );
                T::default()
            }
            // Well-formed JSON of an unexpected shape is never overwritten.
            Err(e) => {
                return Err(AppError::Internal(format!(
                    "Document '{}' does not match the expected shape: {}",
                    key, e
                )));
            }
        };

        Ok(Loaded {
            value,
            mode: self.mode(PutMode::Update(version)),
        })
    }

    pub(crate) async fn put<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        mode: PutMode,
    ) -> Result<(), AppError> {
        let body = serde_json::to_vec_pretty(value)?;

        let mut attributes = Attributes::new();
        if self.capabilities.attributes {
            attributes.insert(Attribute::ContentType, JSON_CONTENT_TYPE.into());
        }
        let options = PutOptions {
            mode,
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&Path::from(key), PutPayload::from(body), options)
            .await?;
        Ok(())
    }

    fn mode(&self, wanted: PutMode) -> PutMode {
        if self.capabilities.conditional_put {
            wanted
        } else {
            PutMode::Overwrite
        }
    }
}
