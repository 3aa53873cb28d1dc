//! Kangbeier Site Backend
//!
//! Serves the public marketing pages and the admin API for the product
//! catalogue. Products and site settings live as JSON documents in object
//! storage; uploaded media goes to a separate static bucket.

mod api;
mod auth;
mod cache;
mod config;
mod errors;
mod models;
mod repository;
mod storage;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use auth::AdminCredentials;
use cache::PageCache;
use config::{Config, StorageBackend};
use repository::{ProductRepository, SiteConfigRepository};
use storage::{AssetStore, Storage, LOCAL_STATIC_ROUTE};

/// Multipart framing allowance on top of the upload size limit.
const MULTIPART_OVERHEAD_BYTES: usize = 64 * 1024;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub products: Arc<ProductRepository>,
    pub site_config: Arc<SiteConfigRepository>,
    pub assets: Arc<AssetStore>,
    pub pages: Arc<PageCache>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Wire repositories and caches over the configured storage.
    pub fn new(config: Config) -> Result<Self, errors::AppError> {
        let storage = storage::init_storage(&config.storage)?;
        Ok(Self::with_storage(config, storage))
    }

    pub fn with_storage(config: Config, storage: Storage) -> Self {
        Self {
            products: Arc::new(ProductRepository::new(storage.documents.clone())),
            site_config: Arc::new(SiteConfigRepository::new(storage.documents)),
            assets: Arc::new(storage.assets),
            pages: Arc::new(PageCache::new()),
            config: Arc::new(config),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Kangbeier Site Backend");
    match &config.storage {
        StorageBackend::Cos(cos) => tracing::info!(
            "Storage: COS {} (settings {}, static {})",
            cos.region,
            cos.setting_bucket,
            cos.static_bucket
        ),
        StorageBackend::Local { root } => tracing::info!("Storage: local directory {:?}", root),
        StorageBackend::Memory => {
            tracing::warn!("Storage: in-memory, all data is lost on shutdown")
        }
    }
    tracing::info!("Bind address: {}", config.bind_addr);

    if config.admin_password.is_empty() {
        tracing::warn!("ADMIN_PASSWORD is empty. Admin logins are disabled.");
    } else if config.admin_password == "admin" {
        tracing::warn!("ADMIN_PASSWORD is the default value. Set a real password!");
    }

    let bind_addr = config.bind_addr;
    let state = AppState::new(config)?;

    // Build router
    let app = create_router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("Server listening on {}", bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Create the application router with all routes.
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let credentials = Arc::new(AdminCredentials {
        username: state.config.admin_username.clone(),
        password: state.config.admin_password.clone(),
    });
    let body_limit = state.config.upload_max_bytes + MULTIPART_OVERHEAD_BYTES;

    // Admin routes
    let admin_routes = Router::new()
        .route("/session", get(api::session))
        .route("/dashboard", get(api::dashboard))
        // Products
        .route("/products", get(api::list_products).post(api::save_product))
        .route(
            "/products/{id}",
            get(api::get_product)
                .put(api::update_product)
                .delete(api::delete_product),
        )
        .route("/products/{id}/toggle-publish", post(api::toggle_publish))
        // Settings
        .route("/settings", get(api::get_settings).post(api::save_settings))
        // Uploads
        .route(
            "/uploads",
            post(api::upload_image).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/uploads/signed-url", get(api::admin_signed_url))
        // Apply Basic auth middleware
        .layer(middleware::from_fn(move |req, next| {
            auth::admin_auth_layer(credentials.clone(), req, next)
        }));

    // Public routes (no auth required)
    let api_routes = Router::new()
        .route("/pages/home", get(api::home_page))
        .route("/pages/products", get(api::products_page))
        .route("/pages/about", get(api::about_page))
        .route("/pages/contact", get(api::contact_page))
        .route("/categories", get(api::list_categories))
        .route("/products/{id}", get(api::get_published_product))
        .route("/images/signed-url", get(api::public_signed_url))
        .nest("/admin", admin_routes);

    // Health check (no auth required)
    let health_routes = Router::new().route("/health", get(health_check));

    let mut router = Router::new().nest("/api", api_routes).merge(health_routes);

    // The filesystem backend has no public bucket URL; serve its files here.
    if let StorageBackend::Local { root } = &state.config.storage {
        router = router.nest_service(LOCAL_STATIC_ROUTE, ServeDir::new(root.join("static")));
    }

    router
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests;
