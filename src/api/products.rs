//! Product endpoints: the public read API and the admin actions.

use axum::extract::{Path, State};
use axum::Json;
use axum_extra::extract::Form;
use serde::Serialize;

use super::{success, ApiResult};
use crate::cache::paths;
use crate::errors::AppError;
use crate::models::{Product, ProductForm};
use crate::AppState;

/// GET /api/products/{id} - A published product as the bare document record.
///
/// Storefront clients read this without the response envelope.
pub async fn get_published_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Product>, AppError> {
    match state.products.get_by_id(&id).await {
        Some(product) if product.is_published => Ok(Json(product)),
        _ => Err(not_found(&id)),
    }
}

/// GET /api/admin/products - All products, newest first.
pub async fn list_products(State(state): State<AppState>) -> ApiResult<Vec<Product>> {
    success(state.products.list().await)
}

/// GET /api/admin/products/{id} - Any product, published or not.
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    match state.products.get_by_id(&id).await {
        Some(product) => success(product),
        None => Err(not_found(&id)),
    }
}

/// POST /api/admin/products - Create a product, or update it when the form carries an `id`.
pub async fn save_product(
    State(state): State<AppState>,
    Form(form): Form<ProductForm>,
) -> ApiResult<Product> {
    let input = form.validate()?;

    let product = match form.target_id() {
        Some(id) => state
            .products
            .update(&id, &input)
            .await?
            .ok_or_else(|| not_found(&id))?,
        None => state.products.create(&input).await?,
    };

    state.pages.revalidate(paths::PRODUCT_PAGES).await;
    success(product)
}

/// PUT /api/admin/products/{id} - Update a product.
pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Form(form): Form<ProductForm>,
) -> ApiResult<Product> {
    let input = form.validate()?;

    let product = state
        .products
        .update(&id, &input)
        .await?
        .ok_or_else(|| not_found(&id))?;

    state.pages.revalidate(paths::PRODUCT_PAGES).await;
    success(product)
}

/// POST /api/admin/products/{id}/toggle-publish - Publish or unpublish a product.
pub async fn toggle_publish(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Product> {
    let product = state
        .products
        .toggle_publish(&id)
        .await?
        .ok_or_else(|| not_found(&id))?;

    state.pages.revalidate(paths::PRODUCT_PAGES).await;
    success(product)
}

/// Result of a delete.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub id: String,
}

/// DELETE /api/admin/products/{id} - Delete a product.
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Deleted> {
    if !state.products.delete(&id).await? {
        return Err(not_found(&id));
    }

    state.pages.revalidate(paths::PRODUCT_PAGES).await;
    success(Deleted { id })
}

fn not_found(id: &str) -> AppError {
    AppError::NotFound(format!("Product {} not found", id))
}
