//! HTTP client for the external catalog backend.
//!
//! Every non-GET call that is not an image endpoint carries Basic-Auth
//! credentials, resolved stored-singleton first, then environment, then
//! the shipped default. Failures are classified into a fixed taxonomy
//! and surface as one [`ApiError`] value with a user-facing message.

use std::env;
use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Method, StatusCode};
use serde_json::{json, Value};

use crate::adapter::{
    author_from_external, authors_from_external, book_from_external, book_to_external,
    books_from_external, genre_from_external, genres_from_external,
};
use crate::config::{endpoints, ApiConfig};
use crate::db::LocalStore;
use crate::models::{Author, Book, BookPayload, Credentials, Genre};

const HTTP_TIMEOUT_SECS: u64 = 10;
const HTTP_MAX_RETRIES: u32 = 1;
const HTTP_USER_AGENT: &str = "libris/0.1";
const RETRY_BASE_DELAY_MS: u64 = 350;
const RETRY_MAX_DELAY_MS: u64 = 4_000;

const ENV_USERNAME: &str = "LIBRIS_API_USERNAME";
const ENV_PASSWORD: &str = "LIBRIS_API_PASSWORD";
const DEFAULT_USERNAME: &str = "admin";
const DEFAULT_PASSWORD: &str = "admin";

const MSG_BAD_REQUEST: &str = "Invalid request. Check the submitted data.";
const MSG_UNAUTHORIZED: &str =
    "Authorization required. Check the credentials in the admin panel settings.";
const MSG_FORBIDDEN: &str = "Access denied.";
const MSG_NOT_FOUND: &str = "Resource not found. Check that the API server is reachable.";
const MSG_SERVER: &str = "Internal server error.";
const MSG_NETWORK: &str =
    "The server is not responding. Check your connection and that the API is reachable.";

/// Classified request failure. The display form is the user-facing
/// message for the notification layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    /// 401; the UI should prompt for credentials.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Server(String),

    /// No response at all (DNS, refused connection, timeout).
    #[error("{0}")]
    Network(String),

    /// The request could not be built or its response decoded.
    #[error("{0}")]
    Request(String),
}

impl ApiError {
    pub fn is_auth_error(&self) -> bool {
        matches!(self, ApiError::Unauthorized(_))
    }
}

fn classify_status(status: StatusCode, server_message: Option<String>) -> ApiError {
    let message = |fallback: &str| server_message.clone().unwrap_or_else(|| fallback.to_string());
    match status.as_u16() {
        400 => ApiError::BadRequest(message(MSG_BAD_REQUEST)),
        401 => ApiError::Unauthorized(message(MSG_UNAUTHORIZED)),
        403 => ApiError::Forbidden(message(MSG_FORBIDDEN)),
        404 => ApiError::NotFound(message(MSG_NOT_FOUND)),
        500 => ApiError::Server(message(MSG_SERVER)),
        code => ApiError::Server(message(&format!(
            "Error {code}: {}",
            status.canonical_reason().unwrap_or("unknown error")
        ))),
    }
}

/// Stored singleton wins, then environment, then the shipped default.
fn pick_credentials(
    stored: Option<Credentials>,
    env_username: Option<String>,
    env_password: Option<String>,
) -> Credentials {
    if let Some(stored) = stored {
        if !stored.username.is_empty() && !stored.password.is_empty() {
            return stored;
        }
    }
    if let (Some(username), Some(password)) = (env_username, env_password) {
        if !username.is_empty() && !password.is_empty() {
            return Credentials { username, password };
        }
    }
    Credentials {
        username: DEFAULT_USERNAME.to_string(),
        password: DEFAULT_PASSWORD.to_string(),
    }
}

/// Normalized image upload result: the stored filename, the rooted path
/// and the fully qualified URL.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedImage {
    pub name: String,
    pub path: String,
    pub url: String,
}

fn normalize_upload_response(value: &Value, api_base: &str) -> Result<UploadedImage, ApiError> {
    let name = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| ApiError::Request("upload response is missing the file name".to_string()))?;
    let base = api_base.trim_end_matches('/');
    Ok(UploadedImage {
        name: name.to_string(),
        path: format!("/image/{name}"),
        url: format!("{base}/image/{name}"),
    })
}

enum RequestBody {
    Empty,
    Json(Value),
    /// File bytes repackaged into the `image` multipart field the
    /// backend expects, whatever the caller named the field.
    Image { file_name: String, bytes: Vec<u8> },
}

pub struct ApiClient {
    http: Client,
    config: ApiConfig,
    store: Arc<LocalStore>,
}

impl ApiClient {
    pub fn new(config: ApiConfig, store: Arc<LocalStore>) -> Result<ApiClient, ApiError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|err| ApiError::Request(err.to_string()))?;
        Ok(ApiClient { http, config, store })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    async fn resolve_credentials(&self) -> Credentials {
        let stored = match self.store.auth_data().get_credentials().await {
            Ok(stored) => stored,
            Err(err) => {
                log::warn!("could not read stored credentials: {err}");
                None
            }
        };
        pick_credentials(stored, env::var(ENV_USERNAME).ok(), env::var(ENV_PASSWORD).ok())
    }

    async fn send(&self, method: Method, path: &str, body: RequestBody) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.config.rest_api, path);
        // GET requests and image endpoints go out unauthenticated.
        let needs_auth = method != Method::GET && !path.contains("/image/");
        let credentials = if needs_auth {
            Some(self.resolve_credentials().await)
        } else {
            None
        };

        for attempt in 0..=HTTP_MAX_RETRIES {
            let mut request = self
                .http
                .request(method.clone(), &url)
                .header(reqwest::header::ACCEPT, "application/json")
                .header(reqwest::header::USER_AGENT, HTTP_USER_AGENT);
            if let Some(credentials) = &credentials {
                request = request.basic_auth(&credentials.username, Some(&credentials.password));
            }
            request = match &body {
                RequestBody::Empty => request,
                RequestBody::Json(value) => request.json(value),
                RequestBody::Image { file_name, bytes } => {
                    let part = reqwest::multipart::Part::bytes(bytes.clone())
                        .file_name(file_name.clone());
                    request.multipart(reqwest::multipart::Form::new().part("image", part))
                }
            };

            let response = match request.send().await {
                Ok(response) => response,
                Err(err) => {
                    log::warn!("transport error for {url} (attempt {}): {err}", attempt + 1);
                    if attempt < HTTP_MAX_RETRIES {
                        tokio::time::sleep(Duration::from_millis(
                            RETRY_BASE_DELAY_MS * (attempt + 1) as u64,
                        ))
                        .await;
                        continue;
                    }
                    return Err(ApiError::Network(MSG_NETWORK.to_string()));
                }
            };

            let status = response.status();
            if status.is_success() {
                let text = response
                    .text()
                    .await
                    .map_err(|err| ApiError::Request(err.to_string()))?;
                if text.trim().is_empty() {
                    return Ok(Value::Null);
                }
                return serde_json::from_str(&text)
                    .map_err(|err| ApiError::Request(format!("unreadable response: {err}")));
            }

            if (status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error())
                && attempt < HTTP_MAX_RETRIES
            {
                let retry_after_ms = response
                    .headers()
                    .get(reqwest::header::RETRY_AFTER)
                    .and_then(|value| value.to_str().ok())
                    .and_then(|value| value.parse::<u64>().ok())
                    .map(|seconds| seconds * 1000)
                    .unwrap_or(RETRY_BASE_DELAY_MS * (attempt + 1) as u64);
                log::warn!("status {status} for {url}, retrying");
                tokio::time::sleep(Duration::from_millis(retry_after_ms.min(RETRY_MAX_DELAY_MS)))
                    .await;
                continue;
            }

            let server_message = response
                .json::<Value>()
                .await
                .ok()
                .and_then(|data| {
                    data.get("message")
                        .and_then(Value::as_str)
                        .map(|message| message.to_string())
                });
            return Err(classify_status(status, server_message));
        }

        Err(ApiError::Network(MSG_NETWORK.to_string()))
    }

    // Books. Translation to and from the external shape happens here,
    // exactly once per direction.

    pub async fn books(&self) -> Result<Vec<Book>, ApiError> {
        let value = self.send(Method::GET, endpoints::BOOKS, RequestBody::Empty).await?;
        Ok(books_from_external(&value, &self.config.external_api_base))
    }

    pub async fn book(&self, id: i64) -> Result<Option<Book>, ApiError> {
        let value = self
            .send(Method::GET, &endpoints::book_by_id(id), RequestBody::Empty)
            .await?;
        Ok(book_from_external(&value, &self.config.external_api_base))
    }

    pub async fn create_book(&self, payload: &BookPayload) -> Result<Option<Book>, ApiError> {
        let value = self
            .send(Method::POST, endpoints::BOOKS, RequestBody::Json(book_to_external(payload)))
            .await?;
        Ok(book_from_external(&value, &self.config.external_api_base))
    }

    pub async fn update_book(&self, id: i64, payload: &BookPayload) -> Result<Option<Book>, ApiError> {
        let value = self
            .send(
                Method::PUT,
                &endpoints::book_by_id(id),
                RequestBody::Json(book_to_external(payload)),
            )
            .await?;
        Ok(book_from_external(&value, &self.config.external_api_base))
    }

    pub async fn delete_book(&self, id: i64) -> Result<(), ApiError> {
        self.send(Method::DELETE, &endpoints::book_by_id(id), RequestBody::Empty)
            .await?;
        Ok(())
    }

    // Authors. The backend takes `{full_name}` on writes.

    pub async fn authors(&self) -> Result<Vec<Author>, ApiError> {
        let value = self.send(Method::GET, endpoints::AUTHORS, RequestBody::Empty).await?;
        Ok(authors_from_external(&value))
    }

    pub async fn author(&self, id: i64) -> Result<Option<Author>, ApiError> {
        let value = self
            .send(Method::GET, &endpoints::author_by_id(id), RequestBody::Empty)
            .await?;
        Ok(author_from_external(&value))
    }

    pub async fn create_author(&self, name: &str) -> Result<Option<Author>, ApiError> {
        let value = self
            .send(
                Method::POST,
                endpoints::AUTHORS,
                RequestBody::Json(json!({ "full_name": name })),
            )
            .await?;
        Ok(author_from_external(&value))
    }

    pub async fn update_author(&self, id: i64, name: &str) -> Result<Option<Author>, ApiError> {
        let value = self
            .send(
                Method::PUT,
                &endpoints::author_by_id(id),
                RequestBody::Json(json!({ "full_name": name })),
            )
            .await?;
        Ok(author_from_external(&value))
    }

    pub async fn delete_author(&self, id: i64) -> Result<(), ApiError> {
        self.send(Method::DELETE, &endpoints::author_by_id(id), RequestBody::Empty)
            .await?;
        Ok(())
    }

    // Genres. Plain `{name}` payloads pass through unadapted.

    pub async fn genres(&self) -> Result<Vec<Genre>, ApiError> {
        let value = self.send(Method::GET, endpoints::GENRES, RequestBody::Empty).await?;
        Ok(genres_from_external(&value))
    }

    pub async fn genre(&self, id: i64) -> Result<Option<Genre>, ApiError> {
        let value = self
            .send(Method::GET, &endpoints::genre_by_id(id), RequestBody::Empty)
            .await?;
        Ok(genre_from_external(&value))
    }

    pub async fn create_genre(&self, name: &str) -> Result<Option<Genre>, ApiError> {
        let value = self
            .send(Method::POST, endpoints::GENRES, RequestBody::Json(json!({ "name": name })))
            .await?;
        Ok(genre_from_external(&value))
    }

    pub async fn update_genre(&self, id: i64, name: &str) -> Result<Option<Genre>, ApiError> {
        let value = self
            .send(
                Method::PUT,
                &endpoints::genre_by_id(id),
                RequestBody::Json(json!({ "name": name })),
            )
            .await?;
        Ok(genre_from_external(&value))
    }

    pub async fn delete_genre(&self, id: i64) -> Result<(), ApiError> {
        self.send(Method::DELETE, &endpoints::genre_by_id(id), RequestBody::Empty)
            .await?;
        Ok(())
    }

    /// Upload an image and normalize the `{name}` response into a rooted
    /// path plus a fully qualified URL.
    pub async fn upload_image(
        &self,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<UploadedImage, ApiError> {
        let value = self
            .send(
                Method::POST,
                endpoints::IMAGE_UPLOAD,
                RequestBody::Image { file_name: file_name.to_string(), bytes },
            )
            .await?;
        normalize_upload_response(&value, &self.config.external_api_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_is_flagged_and_mentions_authorization() {
        let err = classify_status(StatusCode::UNAUTHORIZED, None);
        assert!(err.is_auth_error());
        assert!(err.to_string().contains("Authorization"));
    }

    #[test]
    fn server_message_wins_over_the_fallback() {
        let err = classify_status(StatusCode::UNAUTHORIZED, Some("token expired".to_string()));
        assert!(err.is_auth_error());
        assert_eq!(err.to_string(), "token expired");
    }

    #[test]
    fn statuses_map_onto_the_taxonomy() {
        assert!(matches!(classify_status(StatusCode::BAD_REQUEST, None), ApiError::BadRequest(_)));
        assert!(matches!(classify_status(StatusCode::FORBIDDEN, None), ApiError::Forbidden(_)));
        assert!(matches!(classify_status(StatusCode::NOT_FOUND, None), ApiError::NotFound(_)));
        assert!(matches!(
            classify_status(StatusCode::INTERNAL_SERVER_ERROR, None),
            ApiError::Server(_)
        ));
        assert!(!classify_status(StatusCode::NOT_FOUND, None).is_auth_error());
    }

    #[test]
    fn unlisted_status_carries_code_and_reason() {
        let err = classify_status(StatusCode::IM_A_TEAPOT, None);
        assert!(err.to_string().contains("418"));
    }

    #[test]
    fn stored_credentials_win() {
        let stored = Credentials { username: "kept".to_string(), password: "secret".to_string() };
        let picked = pick_credentials(
            Some(stored),
            Some("env-user".to_string()),
            Some("env-pass".to_string()),
        );
        assert_eq!(picked.username, "kept");
    }

    #[test]
    fn environment_beats_the_default_when_nothing_is_stored() {
        let picked =
            pick_credentials(None, Some("env-user".to_string()), Some("env-pass".to_string()));
        assert_eq!(picked.username, "env-user");
        assert_eq!(picked.password, "env-pass");
    }

    #[test]
    fn empty_stored_record_falls_through_to_default() {
        let stored = Credentials { username: String::new(), password: String::new() };
        let picked = pick_credentials(Some(stored), None, None);
        assert_eq!(picked.username, DEFAULT_USERNAME);
        assert_eq!(picked.password, DEFAULT_PASSWORD);
    }

    #[test]
    fn upload_response_normalizes_to_path_and_url() {
        let uploaded =
            normalize_upload_response(&json!({ "name": "abc123.jpg" }), "http://backend:8080")
                .expect("normalized");
        assert_eq!(uploaded.name, "abc123.jpg");
        assert_eq!(uploaded.path, "/image/abc123.jpg");
        assert_eq!(uploaded.url, "http://backend:8080/image/abc123.jpg");
    }

    #[test]
    fn upload_response_without_name_is_a_request_error() {
        let err = normalize_upload_response(&json!({}), "http://backend:8080")
            .expect_err("missing name");
        assert!(matches!(err, ApiError::Request(_)));
    }
}
