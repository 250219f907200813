use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub publication_year: Option<i64>,
    /// 0 to 10, one decimal of precision.
    pub rating: Option<f64>,
    pub image_url: Option<String>,
    pub authors: Vec<Author>,
    pub genres: Vec<Genre>,
    /// Opaque backend timestamp, used only for sorting.
    pub created_at: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Author {
    /// Absent when the backend embedded the author as a bare string.
    pub id: Option<i64>,
    pub name: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Genre {
    pub id: Option<i64>,
    pub name: String,
}

/// Outbound book data for create/update calls.
///
/// `author_ids`/`genre_ids` take priority over ids derived from the
/// embedded `authors`/`genres` lists when both are present.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct BookPayload {
    pub title: String,
    pub description: String,
    pub publication_year: Option<i64>,
    pub image_url: Option<String>,
    pub author_ids: Option<Vec<i64>>,
    pub genre_ids: Option<Vec<i64>>,
    pub authors: Vec<Author>,
    pub genres: Vec<Genre>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ViewedBook {
    pub book_id: i64,
    pub viewed_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SearchEntry {
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    /// Server-assigned identity; local echoes may not have one.
    pub id: Option<String>,
    pub username: String,
    pub text: String,
    /// Book references extracted from embedded `/book?id=N` links.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_ids: Option<Vec<i64>>,
    pub timestamp: DateTime<Utc>,
}

/// A locally cached book plus the moment it entered the cache.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CachedBook {
    pub book: Book,
    pub cached_at: DateTime<Utc>,
}
