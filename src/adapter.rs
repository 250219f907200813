//! Translation between the external API's record shapes and the
//! application model.
//!
//! The external backend speaks `name` / `year_of_release` / `image` /
//! `author[]` with `full_name`; the app speaks `title` /
//! `publication_year` / `image_url` / `authors[]` with `name`. These
//! functions are the single place that mapping happens, and they are
//! total: `null` input yields `None`, a non-array where an array was
//! expected yields an empty list.

use serde_json::{json, Value};

use crate::models::{Author, Book, BookPayload, Genre};

/// Shape of the `image` field as the backend may send it.
///
/// Classifying first keeps every representable case explicit instead of
/// scattering `starts_with` checks through the mapping.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageRef {
    /// Fully qualified URL, passed through verbatim.
    Absolute(String),
    /// Server-rooted path such as `/images/a.jpg`.
    Rooted(String),
    /// Bare stored filename such as `a.jpg`.
    Bare(String),
}

impl ImageRef {
    pub fn classify(raw: &str) -> Option<ImageRef> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            Some(ImageRef::Absolute(trimmed.to_string()))
        } else if trimmed.starts_with('/') {
            Some(ImageRef::Rooted(trimmed.to_string()))
        } else {
            Some(ImageRef::Bare(trimmed.to_string()))
        }
    }

    /// Resolve to a URL the client can load, relative to `api_base`.
    pub fn resolve(&self, api_base: &str) -> String {
        let base = api_base.trim_end_matches('/');
        match self {
            ImageRef::Absolute(url) => url.clone(),
            ImageRef::Rooted(path) => format!("{base}{path}"),
            ImageRef::Bare(name) => format!("{base}/image/{name}"),
        }
    }

    /// Reduce to the bare filename the backend stores.
    ///
    /// Strips an `/image/` or `/images/` segment when one is present;
    /// values without that segment pass through unchanged (the backend
    /// owns interpretation of such values).
    pub fn file_name(&self) -> String {
        let raw = match self {
            ImageRef::Absolute(url) => url,
            ImageRef::Rooted(path) => path,
            ImageRef::Bare(name) => return name.clone(),
        };
        for marker in ["/images/", "/image/"] {
            if let Some(index) = raw.rfind(marker) {
                return raw[index + marker.len()..].to_string();
            }
        }
        raw.clone()
    }
}

/// Shape of an embedded author/genre entry.
#[derive(Debug, Clone, PartialEq)]
enum NameRef {
    /// `{id, full_name}` or `{id, name}` object.
    Object { id: Option<i64>, name: String },
    /// Bare string, no identity attached.
    Bare(String),
    /// Bare numeric id, as write payloads embed them.
    Id(i64),
}

impl NameRef {
    fn classify(value: &Value) -> Option<NameRef> {
        match value {
            Value::String(text) => Some(NameRef::Bare(text.clone())),
            Value::Number(number) => number.as_i64().map(NameRef::Id),
            Value::Object(map) => {
                let id = map.get("id").and_then(Value::as_i64);
                let name = map
                    .get("full_name")
                    .or_else(|| map.get("name"))
                    .and_then(Value::as_str)
                    .unwrap_or("")
                    .to_string();
                Some(NameRef::Object { id, name })
            }
            _ => None,
        }
    }

    fn id(&self) -> Option<i64> {
        match self {
            NameRef::Object { id, .. } => *id,
            NameRef::Bare(_) => None,
            NameRef::Id(id) => Some(*id),
        }
    }

    fn name(&self) -> String {
        match self {
            NameRef::Object { name, .. } => name.clone(),
            NameRef::Bare(text) => text.clone(),
            NameRef::Id(_) => String::new(),
        }
    }
}

pub fn book_from_external(value: &Value, api_base: &str) -> Option<Book> {
    let record = value.as_object()?;

    let image_url = record
        .get("image")
        .and_then(Value::as_str)
        .and_then(ImageRef::classify)
        .map(|image| image.resolve(api_base));

    Some(Book {
        id: record.get("id").and_then(Value::as_i64).unwrap_or_default(),
        title: record
            .get("name")
            .or_else(|| record.get("title"))
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        description: record
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string(),
        publication_year: record
            .get("year_of_release")
            .or_else(|| record.get("publicationYear"))
            .and_then(Value::as_i64),
        rating: record.get("rating").and_then(Value::as_f64),
        image_url,
        authors: record
            .get("author")
            .or_else(|| record.get("authors"))
            .map(authors_from_external)
            .unwrap_or_default(),
        genres: record
            .get("genre")
            .or_else(|| record.get("genres"))
            .map(genres_from_external)
            .unwrap_or_default(),
        created_at: record
            .get("createdAt")
            .and_then(Value::as_str)
            .map(|value| value.to_string()),
    })
}

pub fn books_from_external(value: &Value, api_base: &str) -> Vec<Book> {
    match value.as_array() {
        Some(records) => records
            .iter()
            .filter_map(|record| book_from_external(record, api_base))
            .collect(),
        None => vec![],
    }
}

/// Inverse mapping for create/update requests.
///
/// Explicit `author_ids`/`genre_ids` win over ids derived from the
/// embedded objects.
pub fn book_to_external(book: &BookPayload) -> Value {
    let author_ids: Vec<i64> = match &book.author_ids {
        Some(ids) => ids.clone(),
        None => book.authors.iter().filter_map(|author| author.id).collect(),
    };
    let genre_ids: Vec<i64> = match &book.genre_ids {
        Some(ids) => ids.clone(),
        None => book.genres.iter().filter_map(|genre| genre.id).collect(),
    };
    let image = book
        .image_url
        .as_deref()
        .and_then(ImageRef::classify)
        .map(|image| image.file_name());

    json!({
        "name": book.title,
        "year_of_release": book.publication_year,
        "description": book.description,
        "image": image,
        "author": author_ids,
        "genre": genre_ids,
    })
}

pub fn author_from_external(value: &Value) -> Option<Author> {
    let entry = NameRef::classify(value)?;
    Some(Author {
        id: entry.id(),
        name: entry.name(),
    })
}

pub fn authors_from_external(value: &Value) -> Vec<Author> {
    match value.as_array() {
        Some(entries) => entries.iter().filter_map(author_from_external).collect(),
        None => vec![],
    }
}

pub fn genre_from_external(value: &Value) -> Option<Genre> {
    let entry = NameRef::classify(value)?;
    Some(Genre {
        id: entry.id(),
        name: entry.name(),
    })
}

pub fn genres_from_external(value: &Value) -> Vec<Genre> {
    match value.as_array() {
        Some(entries) => entries.iter().filter_map(genre_from_external).collect(),
        None => vec![],
    }
}
