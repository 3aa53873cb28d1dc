//! Admin session and dashboard.

use axum::extract::State;
use axum::Extension;
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::AdminUser;
use crate::models::CATEGORIES;
use crate::AppState;

/// GET /api/admin/session - The authenticated admin.
pub async fn session(Extension(user): Extension<AdminUser>) -> ApiResult<AdminUser> {
    success(user)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    pub product_count: usize,
    pub published_count: usize,
    pub category_count: usize,
}

/// GET /api/admin/dashboard - Catalogue counts.
pub async fn dashboard(State(state): State<AppState>) -> ApiResult<DashboardStats> {
    let products = state.products.list().await;
    let published_count = products.iter().filter(|p| p.is_published).count();

    success(DashboardStats {
        product_count: products.len(),
        published_count,
        category_count: CATEGORIES.len(),
    })
}
