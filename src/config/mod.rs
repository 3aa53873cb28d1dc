//! Configuration module for the site backend.
//!
//! All configuration is loaded from environment variables with sensible defaults.

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use crate::errors::AppError;

/// Default upload limit for admin image uploads (10 MiB).
pub const DEFAULT_UPLOAD_MAX_BYTES: usize = 10 * 1024 * 1024;

/// Tencent COS connection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct CosConfig {
    pub secret_id: String,
    pub secret_key: String,
    pub region: String,
    /// Bucket holding the JSON documents
    pub setting_bucket: String,
    /// Bucket holding uploaded media
    pub static_bucket: String,
    /// Use If-Match conditional puts for document updates
    pub conditional_put: bool,
}

impl CosConfig {
    /// Virtual-hosted endpoint of a bucket, which is also its public URL base.
    pub fn bucket_url(&self, bucket: &str) -> String {
        format!("https://{}.cos.{}.myqcloud.com", bucket, self.region)
    }
}

/// Where documents and assets are stored.
#[derive(Debug, Clone, PartialEq)]
pub enum StorageBackend {
    /// Tencent COS through its S3-compatible API
    Cos(CosConfig),
    /// Local directory with `settings/` and `static/` subdirectories
    Local { root: PathBuf },
    /// Process memory, for tests and throwaway instances
    Memory,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Admin username for the Basic auth gate
    pub admin_username: String,
    /// Admin password for the Basic auth gate
    pub admin_password: String,
    /// Storage backend for documents and assets
    pub storage: StorageBackend,
    /// Maximum accepted upload size in bytes
    pub upload_max_bytes: usize,
    /// Address to bind the server to
    pub bind_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let admin_username = var("ADMIN_USERNAME").unwrap_or_else(|| "admin".to_string());
        // A present but blank password stays empty so the admin gate denies every login.
        let admin_password = match lookup("ADMIN_PASSWORD") {
            Some(raw) if raw.trim().is_empty() => String::new(),
            Some(raw) => raw,
            None => "admin".to_string(),
        };

        let backend = var("SITE_STORAGE_BACKEND").unwrap_or_else(|| {
            if var("COS_SECRET_ID").is_some() {
                "cos".to_string()
            } else {
                "local".to_string()
            }
        });

        let storage = match backend.to_ascii_lowercase().as_str() {
            "cos" => {
                let required = |key: &str| {
                    var(key).ok_or_else(|| {
                        AppError::Config(format!("{} is required for the cos backend", key))
                    })
                };
                StorageBackend::Cos(CosConfig {
                    secret_id: required("COS_SECRET_ID")?,
                    secret_key: required("COS_SECRET_KEY")?,
                    region: required("COS_REGION")?,
                    setting_bucket: required("COS_SETTING_BUCKET")?,
                    static_bucket: required("COS_STATIC_BUCKET")?,
                    conditional_put: parse_bool(var("COS_CONDITIONAL_PUT").as_deref(), true)?,
                })
            }
            "local" => StorageBackend::Local {
                root: var("SITE_DATA_DIR")
                    .unwrap_or_else(|| "./data".to_string())
                    .into(),
            },
            "memory" => StorageBackend::Memory,
            other => {
                return Err(AppError::Config(format!(
                    "Unknown SITE_STORAGE_BACKEND '{}'",
                    other
                )))
            }
        };

        let upload_max_bytes = match var("UPLOAD_MAX_BYTES") {
            Some(raw) => raw.trim().parse().map_err(|_| {
                AppError::Config(format!("Invalid UPLOAD_MAX_BYTES '{}'", raw))
            })?,
            None => DEFAULT_UPLOAD_MAX_BYTES,
        };

        let bind_raw = var("SITE_BIND_ADDR").unwrap_or_else(|| "127.0.0.1:3000".to_string());
        let bind_addr = bind_raw
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid SITE_BIND_ADDR '{}'", bind_raw)))?;

        let log_level = var("SITE_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        Ok(Self {
            admin_username,
            admin_password,
            storage,
            upload_max_bytes,
            bind_addr,
            log_level,
        })
    }
}

fn parse_bool(raw: Option<&str>, default: bool) -> Result<bool, AppError> {
    match raw.map(|s| s.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(v) => match v.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(AppError::Config(format!("Invalid boolean '{}'", v))),
        },
    }
}
