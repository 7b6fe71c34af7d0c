//! CORS for the browser frontend.

use crate::domain::config::CorsConfig;
use axum::http::{HeaderName, HeaderValue, Method};
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};

/// Build the CORS layer from config.
///
/// A wildcard origin cannot be combined with credentials, so credentials are
/// only allowed for an explicit origin list.
pub fn create_cors_layer(config: &CorsConfig) -> CorsLayer {
    if !config.enabled {
        return CorsLayer::very_permissive();
    }

    let wildcard = config.allowed_origins.iter().any(|o| o == "*");
    let mut cors = if wildcard {
        CorsLayer::new().allow_origin(Any)
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        CorsLayer::new().allow_origin(origins)
    };

    let methods: Vec<Method> = config
        .allowed_methods
        .iter()
        .filter_map(|m| m.parse().ok())
        .collect();
    let headers: Vec<HeaderName> = config
        .allowed_headers
        .iter()
        .filter_map(|h| h.parse().ok())
        .collect();

    cors = cors
        .allow_methods(methods)
        .allow_headers(headers)
        .max_age(Duration::from_secs(config.max_age));

    if config.allow_credentials && !wildcard {
        cors = cors.allow_credentials(true);
    }
    cors
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::Request, routing::get, Router};
    use tower::ServiceExt;

    async fn preflight(config: &CorsConfig, origin: &str) -> axum::response::Response {
        let app = Router::new()
            .route("/api/bonds", get(|| async { "ok" }))
            .layer(create_cors_layer(config));
        app.oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/api/bonds")
                .header("origin", origin)
                .header("access-control-request-method", "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_frontend_origin_allowed_with_credentials() {
        let response = preflight(&CorsConfig::default(), "http://localhost:3000").await;
        let headers = response.headers();
        assert_eq!(
            headers["access-control-allow-origin"],
            "http://localhost:3000"
        );
        assert_eq!(headers["access-control-allow-credentials"], "true");
    }

    #[tokio::test]
    async fn test_unknown_origin_not_echoed() {
        let response = preflight(&CorsConfig::default(), "https://evil.example").await;
        assert!(!response
            .headers()
            .contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn test_wildcard_drops_credentials() {
        let config = CorsConfig {
            allowed_origins: vec!["*".to_string()],
            ..CorsConfig::default()
        };
        let response = preflight(&config, "https://any.example").await;
        assert_eq!(response.headers()["access-control-allow-origin"], "*");
        assert!(!response
            .headers()
            .contains_key("access-control-allow-credentials"));
    }
}
