//! Site configuration stored as the `site-config.json` singleton.

use crate::errors::AppError;
use crate::models::{SiteConfig, SITE_CONFIG_ID};
use crate::storage::DocumentStore;

/// Object key of the site configuration.
pub const SITE_CONFIG_KEY: &str = "site-config.json";

#[derive(Clone)]
pub struct SiteConfigRepository {
    documents: DocumentStore,
}

impl SiteConfigRepository {
    pub fn new(documents: DocumentStore) -> Self {
        Self { documents }
    }

    /// The stored configuration, or the built-in defaults when it cannot be read.
    pub async fn get(&self) -> SiteConfig {
        match self.documents.read_document::<SiteConfig>(SITE_CONFIG_KEY).await {
            Ok(config) => SiteConfig {
                id: SITE_CONFIG_ID.to_string(),
                ..config
            },
            Err(e) => {
                tracing::warn!("Using default site configuration: {}", e);
                SiteConfig::default()
            }
        }
    }

    /// Replace the stored configuration.
    pub async fn update(&self, config: SiteConfig) -> Result<SiteConfig, AppError> {
        let location = self
            .documents
            .write_document(SITE_CONFIG_KEY, &config)
            .await?;
        tracing::info!("Site configuration written to {}", location.url);
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StorageBackend;
    use crate::models::SiteConfigForm;
    use crate::storage::init_storage;
    use object_store::path::Path;
    use object_store::PutPayload;
    use serde_json::json;

    fn repository() -> (SiteConfigRepository, DocumentStore) {
        let storage = init_storage(&StorageBackend::Memory).unwrap();
        (
            SiteConfigRepository::new(storage.documents.clone()),
            storage.documents,
        )
    }

    #[tokio::test]
    async fn test_missing_document_yields_defaults() {
        let (repo, _) = repository();
        let config = repo.get().await;
        assert_eq!(config.brand_name, "康备尔净水");
        assert_eq!(config.id, "default");
    }

    #[tokio::test]
    async fn test_unreadable_document_yields_defaults() {
        let (repo, documents) = repository();
        documents
            .write_document(SITE_CONFIG_KEY, &json!({ "brandName": 5 }))
            .await
            .unwrap();
        assert_eq!(repo.get().await, SiteConfig::default());

        documents
            .store()
            .put(&Path::from(SITE_CONFIG_KEY), PutPayload::from("{not json"))
            .await
            .unwrap();
        assert_eq!(repo.get().await, SiteConfig::default());
    }

    #[tokio::test]
    async fn test_partial_document_keeps_stored_fields() {
        let (repo, documents) = repository();
        documents
            .write_document(
                SITE_CONFIG_KEY,
                &json!({
                    "brandName": "康备尔",
                    "tel": "0571-00000000",
                    "email": "sales@example.com"
                }),
            )
            .await
            .unwrap();

        let config = repo.get().await;
        assert_eq!(config.id, SITE_CONFIG_ID);
        assert_eq!(config.brand_name, "康备尔");
        assert_eq!(config.company_name, SiteConfig::default().company_name);
        assert_eq!(config.tel, "0571-00000000");
        assert_eq!(config.email, "sales@example.com");
    }

    #[tokio::test]
    async fn test_stored_id_is_normalised() {
        let (repo, documents) = repository();
        documents
            .write_document(SITE_CONFIG_KEY, &json!({ "id": "other", "brandName": "康备尔" }))
            .await
            .unwrap();

        assert_eq!(repo.get().await.id, SITE_CONFIG_ID);
    }

    #[tokio::test]
    async fn test_update_persists_with_singleton_id() {
        let (repo, documents) = repository();
        let config = SiteConfigForm {
            brand_name: "康备尔".to_string(),
            tel: "18258831947".to_string(),
            ..Default::default()
        }
        .validate()
        .unwrap();

        repo.update(config.clone()).await.unwrap();

        assert_eq!(repo.get().await, config);
        let raw: serde_json::Value = documents.read_document(SITE_CONFIG_KEY).await.unwrap();
        assert_eq!(raw["id"], SITE_CONFIG_ID);
        assert_eq!(raw["tel"], "18258831947");
    }
}
