//! Admin authentication via HTTP Basic credentials.
//!
//! Implements constant-time comparison to mitigate timing attacks. Anything
//! other than a well-formed header carrying the configured pair is rejected.

use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;
use subtle::ConstantTimeEq;

use crate::errors::AppError;

/// The single admin account.
#[derive(Debug, Clone)]
pub struct AdminCredentials {
    pub username: String,
    pub password: String,
}

/// Authenticated admin, available to handlers as a request extension.
#[derive(Debug, Clone, Serialize)]
pub struct AdminUser {
    pub id: &'static str,
    pub name: String,
}

/// Basic auth layer function that takes the expected credentials as a parameter.
pub async fn admin_auth_layer(
    credentials: Arc<AdminCredentials>,
    mut request: Request,
    next: Next,
) -> Response {
    let provided = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_basic);

    match provided {
        Some((username, password)) if verify(&credentials, &username, &password) => {
            request.extensions_mut().insert(AdminUser {
                id: "admin",
                name: username,
            });
            next.run(request).await
        }
        Some((username, _)) => {
            tracing::warn!("Rejected admin login for '{}'", username);
            unauthorized_response("Invalid username or password")
        }
        None => unauthorized_response("Missing or malformed credentials"),
    }
}

/// Decode `Basic base64(username:password)`.
fn parse_basic(value: &str) -> Option<(String, String)> {
    let (scheme, encoded) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("basic") {
        return None;
    }
    let decoded = STANDARD.decode(encoded.trim()).ok()?;
    let decoded = String::from_utf8(decoded).ok()?;
    let (username, password) = decoded.split_once(':')?;
    Some((username.to_string(), password.to_string()))
}

fn verify(expected: &AdminCredentials, username: &str, password: &str) -> bool {
    if expected.password.is_empty() {
        return false;
    }
    let user_ok = username.as_bytes().ct_eq(expected.username.as_bytes());
    let pass_ok = password.as_bytes().ct_eq(expected.password.as_bytes());
    (user_ok & pass_ok).into()
}

/// Create an unauthorized response carrying the Basic challenge.
fn unauthorized_response(message: &str) -> Response {
    let mut response = AppError::Unauthorized(message.to_string()).into_response();
    response.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"admin\", charset=\"UTF-8\""),
    );
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credentials() -> AdminCredentials {
        AdminCredentials {
            username: "admin".to_string(),
            password: "s3cret".to_string(),
        }
    }

    #[test]
    fn test_parse_basic() {
        let header = format!("Basic {}", STANDARD.encode("admin:pa:ss"));
        assert_eq!(
            parse_basic(&header),
            Some(("admin".to_string(), "pa:ss".to_string()))
        );
    }

    #[test]
    fn test_parse_basic_rejects_malformed() {
        assert_eq!(parse_basic("Bearer abc"), None);
        assert_eq!(parse_basic("Basic !!!"), None);
        assert_eq!(parse_basic(&format!("Basic {}", STANDARD.encode("nocolon"))), None);
        assert_eq!(parse_basic("Basic"), None);
    }

    #[test]
    fn test_verify() {
        assert!(verify(&credentials(), "admin", "s3cret"));
        assert!(!verify(&credentials(), "admin", "s3cret "));
        assert!(!verify(&credentials(), "root", "s3cret"));
        assert!(!verify(&credentials(), "", ""));
    }

    #[test]
    fn test_empty_configured_password_denies_everything() {
        let open = AdminCredentials {
            username: "admin".to_string(),
            password: String::new(),
        };
        assert!(!verify(&open, "admin", ""));
    }

    #[test]
    fn test_blank_password_from_env_denies_default_login() {
        let config = crate::config::Config::from_lookup(|key| match key {
            "ADMIN_PASSWORD" => Some(String::new()),
            _ => None,
        })
        .unwrap();
        let credentials = AdminCredentials {
            username: config.admin_username,
            password: config.admin_password,
        };

        assert!(!verify(&credentials, "admin", "admin"));
        assert!(!verify(&credentials, "admin", ""));
    }

    #[test]
    fn test_challenge_header() {
        let response = unauthorized_response("nope");
        assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
        assert!(response
            .headers()
            .get(header::WWW_AUTHENTICATE)
            .unwrap()
            .to_str()
            .unwrap()
            .starts_with("Basic realm=\"admin\""));
    }
}
