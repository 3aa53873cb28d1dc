//! Product collection stored as one `products.json` document.

use crate::errors::AppError;
use crate::models::{find_category, now_iso, Product, ProductInput, ProductsDocument};
use crate::storage::{Change, DocumentStore};

/// Object key of the product collection.
pub const PRODUCTS_KEY: &str = "products.json";

/// Whole-collection CRUD over the product document.
#[derive(Clone)]
pub struct ProductRepository {
    documents: DocumentStore,
}

impl ProductRepository {
    pub fn new(documents: DocumentStore) -> Self {
        Self { documents }
    }

    async fn read_products(&self) -> ProductsDocument {
        match self.documents.read_document(PRODUCTS_KEY).await {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Falling back to an empty product list: {}", e);
                ProductsDocument::default()
            }
        }
    }

    /// All products, newest first.
    pub async fn list(&self) -> Vec<Product> {
        let mut products = self.read_products().await.products;
        products.sort_by(|a, b| b.created_at_ts().cmp(&a.created_at_ts()));
        products
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Product> {
        self.read_products()
            .await
            .products
            .into_iter()
            .find(|p| p.id == id)
    }

    /// Create a published product with a fresh identifier.
    pub async fn create(&self, input: &ProductInput) -> Result<Product, AppError> {
        warn_unknown_categories(input);

        let product = self
            .documents
            .update_document(PRODUCTS_KEY, |data: &mut ProductsDocument| {
                let id = fresh_id(&data.products);
                let product = Product::new(id, input, &now_iso());
                data.products.push(product.clone());
                Change::Commit(product)
            })
            .await?;

        tracing::info!("Created product {} ({})", product.id, product.name);
        Ok(product)
    }

    /// Replace a product's editable fields. `None` if no such product exists.
    pub async fn update(
        &self,
        id: &str,
        input: &ProductInput,
    ) -> Result<Option<Product>, AppError> {
        warn_unknown_categories(input);

        let updated = self
            .documents
            .update_document(PRODUCTS_KEY, |data: &mut ProductsDocument| {
                match data.products.iter_mut().find(|p| p.id == id) {
                    Some(product) => {
                        product.apply(input, &now_iso());
                        Change::Commit(Some(product.clone()))
                    }
                    None => Change::Discard(None),
                }
            })
            .await?;

        if updated.is_some() {
            tracing::info!("Updated product {}", id);
        }
        Ok(updated)
    }

    /// Remove a product. Returns whether anything was removed.
    pub async fn delete(&self, id: &str) -> Result<bool, AppError> {
        let removed = self
            .documents
            .update_document(PRODUCTS_KEY, |data: &mut ProductsDocument| {
                let before = data.products.len();
                data.products.retain(|p| p.id != id);
                if data.products.len() == before {
                    Change::Discard(false)
                } else {
                    Change::Commit(true)
                }
            })
            .await?;

        if removed {
            tracing::info!("Deleted product {}", id);
        }
        Ok(removed)
    }

    /// Flip the published flag. `None` if no such product exists.
    pub async fn toggle_publish(&self, id: &str) -> Result<Option<Product>, AppError> {
        self.documents
            .update_document(PRODUCTS_KEY, |data: &mut ProductsDocument| {
                match data.products.iter_mut().find(|p| p.id == id) {
                    Some(product) => {
                        product.is_published = !product.is_published;
                        product.updated_at = now_iso();
                        Change::Commit(Some(product.clone()))
                    }
                    None => Change::Discard(None),
                }
            })
            .await
    }
}

fn fresh_id(existing: &[Product]) -> String {
    loop {
        let id = uuid::Uuid::new_v4().to_string();
        if !existing.iter().any(|p| p.id == id) {
            return id;
        }
    }
}

fn warn_unknown_categories(input: &ProductInput) {
    for id in &input.category_ids {
        if find_category(id).is_none() {
            tracing::warn!("Product '{}' references unknown category '{}'", input.name, id);
        }
    }
}
