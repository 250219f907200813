//! Backend endpoint configuration.
//!
//! Development talks to the backend host directly; a deployed build goes
//! through the same-origin `/api` proxy path instead, which cannot carry
//! WebSocket traffic, so realtime chat is switched off there.

use std::env;

const DEFAULT_API_HOST: &str = "158.160.203.172";
const REST_PORT: u16 = 8080;
const SOCKETIO_PORT: u16 = 8081;
const WEBSOCKET_PORT: u16 = 8082;
const DOCS_PORT: u16 = 8083;

const PROXY_REST_PATH: &str = "/api";
const PROXY_DOCS_PATH: &str = "/api-docs";

#[derive(Debug, Clone, PartialEq)]
pub struct ApiConfig {
    /// Base for REST calls: direct URL in development, proxy path when deployed.
    pub rest_api: String,
    /// Realtime endpoint speaking the Socket.IO protocol.
    pub ws_socketio: String,
    /// Realtime endpoint speaking plain WebSocket; the chat client uses this one.
    pub ws_plain: String,
    /// False when the proxy path cannot carry WebSocket traffic.
    pub ws_enabled: bool,
    pub docs: String,
    /// Direct backend URL, kept for resolving image paths even when
    /// REST goes through the proxy.
    pub external_api_base: String,
}

impl ApiConfig {
    /// Resolve from `LIBRIS_API_HOST` / `LIBRIS_DEPLOYED`, with the
    /// defaults the app ships with.
    pub fn from_env() -> ApiConfig {
        let host = env::var("LIBRIS_API_HOST").unwrap_or_else(|_| DEFAULT_API_HOST.to_string());
        let deployed = env::var("LIBRIS_DEPLOYED")
            .map(|value| {
                let lowered = value.trim().to_ascii_lowercase();
                lowered == "1" || lowered == "true" || lowered == "yes" || lowered == "on"
            })
            .unwrap_or(false);
        if deployed {
            ApiConfig::deployed(&host)
        } else {
            ApiConfig::development(&host)
        }
    }

    pub fn development(host: &str) -> ApiConfig {
        ApiConfig {
            rest_api: format!("http://{host}:{REST_PORT}"),
            ws_socketio: format!("ws://{host}:{SOCKETIO_PORT}"),
            ws_plain: format!("ws://{host}:{WEBSOCKET_PORT}"),
            ws_enabled: true,
            docs: format!("http://{host}:{DOCS_PORT}"),
            external_api_base: format!("http://{host}:{REST_PORT}"),
        }
    }

    /// Deployed profile: REST and docs go through the same-origin proxy,
    /// realtime stays pointed at the backend but is disabled.
    pub fn deployed(host: &str) -> ApiConfig {
        ApiConfig {
            rest_api: PROXY_REST_PATH.to_string(),
            ws_socketio: format!("ws://{host}:{SOCKETIO_PORT}"),
            ws_plain: format!("ws://{host}:{WEBSOCKET_PORT}"),
            ws_enabled: false,
            docs: PROXY_DOCS_PATH.to_string(),
            external_api_base: format!("http://{host}:{REST_PORT}"),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        ApiConfig::development(DEFAULT_API_HOST)
    }
}

pub mod endpoints {
    pub const BOOKS: &str = "/book/";
    pub const AUTHORS: &str = "/author/";
    pub const GENRES: &str = "/genre/";
    pub const IMAGE_UPLOAD: &str = "/image/url";

    pub fn book_by_id(id: i64) -> String {
        format!("/book/?id={id}")
    }

    pub fn author_by_id(id: i64) -> String {
        format!("/author/?id={id}")
    }

    pub fn genre_by_id(id: i64) -> String {
        format!("/genre/?id={id}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_profile_targets_backend_directly() {
        let config = ApiConfig::development("backend.local");
        assert_eq!(config.rest_api, "http://backend.local:8080");
        assert_eq!(config.ws_plain, "ws://backend.local:8082");
        assert!(config.ws_enabled);
    }

    #[test]
    fn deployed_profile_proxies_rest_and_disables_realtime() {
        let config = ApiConfig::deployed("backend.local");
        assert_eq!(config.rest_api, "/api");
        assert_eq!(config.docs, "/api-docs");
        assert!(!config.ws_enabled);
        assert_eq!(config.external_api_base, "http://backend.local:8080");
    }

    #[test]
    fn id_endpoints_use_query_parameters() {
        assert_eq!(endpoints::book_by_id(12), "/book/?id=12");
        assert_eq!(endpoints::author_by_id(3), "/author/?id=3");
        assert_eq!(endpoints::genre_by_id(7), "/genre/?id=7");
    }
}
