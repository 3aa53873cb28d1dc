//! Cache of rendered public page payloads.
//!
//! Pages are rendered on first request and kept until an admin write
//! revalidates their path.

use std::collections::HashMap;
use std::future::Future;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::errors::AppError;

/// Public page paths.
pub mod paths {
    pub const HOME: &str = "/";
    pub const PRODUCTS: &str = "/products";
    pub const ABOUT: &str = "/about";
    pub const CONTACT: &str = "/contact";

    /// Pages showing product data.
    pub const PRODUCT_PAGES: &[&str] = &[HOME, PRODUCTS];
    /// Pages showing site configuration.
    pub const SITE_PAGES: &[&str] = &[HOME, PRODUCTS, ABOUT, CONTACT];
}

/// Rendered page payloads keyed by path (including any query string).
#[derive(Default)]
pub struct PageCache {
    pages: RwLock<HashMap<String, Value>>,
}

impl PageCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn get(&self, path: &str) -> Option<Value> {
        self.pages.read().await.get(path).cloned()
    }

    /// Return the cached page or render and cache it.
    pub async fn get_or_render<F, Fut>(&self, path: &str, render: F) -> Result<Value, AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Value, AppError>>,
    {
        if let Some(page) = self.get(path).await {
            return Ok(page);
        }

        let page = render().await?;
        self.pages
            .write()
            .await
            .insert(path.to_string(), page.clone());
        Ok(page)
    }

    /// Drop the given paths and every query variant of them.
    pub async fn revalidate(&self, paths: &[&str]) {
        let mut pages = self.pages.write().await;
        pages.retain(|key, _| {
            let base = key.split_once('?').map_or(key.as_str(), |(base, _)| base);
            !paths.contains(&base)
        });
        tracing::debug!("Revalidated pages {:?}", paths);
    }
}
