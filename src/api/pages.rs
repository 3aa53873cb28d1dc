//! Public page payloads.
//!
//! Each page is rendered from the repositories once and served from the page
//! cache until an admin write revalidates it.

use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{success, ApiResult};
use crate::cache::paths;
use crate::errors::AppError;
use crate::models::{find_category, sorted_categories, Category, Product, SiteConfig};
use crate::AppState;

/// Products shown per category on the home page.
pub const HOME_PRODUCTS_PER_CATEGORY: usize = 3;

/// A category with the products listed under it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategorySection {
    #[serde(flatten)]
    pub category: Category,
    pub products: Vec<Product>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogPage {
    pub site: SiteConfig,
    pub categories: Vec<CategorySection>,
}

#[derive(Debug, Serialize)]
pub struct SitePage {
    pub site: SiteConfig,
}

#[derive(Debug, Deserialize)]
pub struct ProductsPageQuery {
    pub category: Option<String>,
}

/// GET /api/pages/home - Site details and a few products per category.
pub async fn home_page(State(state): State<AppState>) -> ApiResult<Value> {
    let page = state
        .pages
        .get_or_render(paths::HOME, || async {
            let published = published_products(&state).await;
            let page = CatalogPage {
                site: state.site_config.get().await,
                categories: sections(&published, None, Some(HOME_PRODUCTS_PER_CATEGORY)),
            };
            serde_json::to_value(page).map_err(AppError::from)
        })
        .await?;
    success(page)
}

/// GET /api/pages/products - Every published product grouped by category.
pub async fn products_page(
    State(state): State<AppState>,
    Query(query): Query<ProductsPageQuery>,
) -> ApiResult<Value> {
    // Unknown categories fall back to the full listing.
    let category = query
        .category
        .as_deref()
        .and_then(find_category)
        .map(|c| c.id);
    let path = match category {
        Some(id) => format!("{}?category={}", paths::PRODUCTS, id),
        None => paths::PRODUCTS.to_string(),
    };

    let page = state
        .pages
        .get_or_render(&path, || async {
            let published = published_products(&state).await;
            let page = CatalogPage {
                site: state.site_config.get().await,
                categories: sections(&published, category, None),
            };
            serde_json::to_value(page).map_err(AppError::from)
        })
        .await?;
    success(page)
}

/// GET /api/pages/about - Company introduction.
pub async fn about_page(State(state): State<AppState>) -> ApiResult<Value> {
    site_page(&state, paths::ABOUT).await
}

/// GET /api/pages/contact - Contact details.
pub async fn contact_page(State(state): State<AppState>) -> ApiResult<Value> {
    site_page(&state, paths::CONTACT).await
}

/// GET /api/categories - The category catalogue.
pub async fn list_categories() -> ApiResult<Vec<&'static Category>> {
    success(sorted_categories())
}

async fn site_page(state: &AppState, path: &str) -> ApiResult<Value> {
    let page = state
        .pages
        .get_or_render(path, || async {
            let page = SitePage {
                site: state.site_config.get().await,
            };
            serde_json::to_value(page).map_err(AppError::from)
        })
        .await?;
    success(page)
}

async fn published_products(state: &AppState) -> Vec<Product> {
    state
        .products
        .list()
        .await
        .into_iter()
        .filter(|p| p.is_published)
        .collect()
}

/// Group newest-first products under each category, optionally keeping only
/// one category and the newest `limit` products, then order by `sort_order`.
fn sections(
    published: &[Product],
    only: Option<&str>,
    limit: Option<usize>,
) -> Vec<CategorySection> {
    sorted_categories()
        .into_iter()
        .filter(|c| only.map_or(true, |id| c.id == id))
        .map(|category| {
            let mut products: Vec<Product> = published
                .iter()
                .filter(|p| p.in_category(category.id))
                .take(limit.unwrap_or(usize::MAX))
                .cloned()
                .collect();
            products.sort_by_key(|p| p.sort_order);
            CategorySection {
                category: category.clone(),
                products,
            }
        })
        .collect()
}
