//! Site settings endpoints.

use axum::extract::State;
use axum_extra::extract::Form;

use super::{success, ApiResult};
use crate::cache::paths;
use crate::models::{SiteConfig, SiteConfigForm};
use crate::AppState;

/// GET /api/admin/settings - Current site configuration.
pub async fn get_settings(State(state): State<AppState>) -> ApiResult<SiteConfig> {
    success(state.site_config.get().await)
}

/// POST /api/admin/settings - Replace the site configuration.
pub async fn save_settings(
    State(state): State<AppState>,
    Form(form): Form<SiteConfigForm>,
) -> ApiResult<SiteConfig> {
    let config = form.validate()?;
    let saved = state.site_config.update(config).await?;

    state.pages.revalidate(paths::SITE_PAGES).await;
    success(saved)
}
