//! Client-side form validation.
//!
//! Errors come back keyed by field so the UI can render them inline
//! next to the inputs instead of as one blob.

use std::collections::HashMap;

use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

pub type FieldErrors = HashMap<String, String>;

const MIN_PUBLICATION_YEAR: i64 = 1000;

fn collect(result: Result<(), ValidationErrors>) -> FieldErrors {
    let mut collected = FieldErrors::new();
    if let Err(errors) = result {
        for (field, field_errors) in errors.field_errors() {
            let message = field_errors
                .first()
                .and_then(|error| error.message.as_ref().map(|message| message.to_string()))
                .unwrap_or_else(|| format!("{field} is invalid"));
            collected.insert(field.to_string(), message);
        }
    }
    collected
}

fn finish(errors: FieldErrors) -> Result<(), FieldErrors> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookForm {
    #[validate(length(min = 1, max = 200, message = "Title is required, up to 200 characters"))]
    pub title: String,

    #[validate(length(max = 2000, message = "Description is limited to 2000 characters"))]
    pub description: String,

    /// Checked against the dynamic upper bound in [`validate_book`].
    pub publication_year: Option<i64>,

    #[validate(range(min = 0.0, max = 10.0, message = "Rating must be between 0 and 10"))]
    pub rating: Option<f64>,

    pub image_url: Option<String>,

    #[validate(length(min = 1, message = "Select at least one author"))]
    pub author_ids: Option<Vec<i64>>,

    #[validate(length(min = 1, message = "Select at least one genre"))]
    pub genre_ids: Option<Vec<i64>>,
}

pub fn validate_book(form: &BookForm) -> Result<(), FieldErrors> {
    let mut errors = collect(form.validate());
    if let Some(year) = form.publication_year {
        let max_year = i64::from(Utc::now().year()) + 1;
        if year < MIN_PUBLICATION_YEAR || year > max_year {
            errors
                .entry("publication_year".to_string())
                .or_insert(format!("Year must be between {MIN_PUBLICATION_YEAR} and {max_year}"));
        }
    }
    finish(errors)
}

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct AuthorForm {
    #[validate(length(min = 2, max = 100, message = "Author name must be 2 to 100 characters"))]
    pub name: String,
}

pub fn validate_author(form: &AuthorForm) -> Result<(), FieldErrors> {
    finish(collect(form.validate()))
}

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct GenreForm {
    #[validate(length(min = 2, max = 50, message = "Genre name must be 2 to 50 characters"))]
    pub name: String,
}

pub fn validate_genre(form: &GenreForm) -> Result<(), FieldErrors> {
    finish(collect(form.validate()))
}

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct CredentialsForm {
    #[validate(length(min = 3, max = 50, message = "Username must be 3 to 50 characters"))]
    pub username: String,

    #[validate(length(min = 3, max = 100, message = "Password must be 3 to 100 characters"))]
    pub password: String,
}

pub fn validate_credentials(form: &CredentialsForm) -> Result<(), FieldErrors> {
    finish(collect(form.validate()))
}

#[derive(Debug, Clone, Default, Validate, Serialize, Deserialize)]
pub struct ChatMessageForm {
    #[validate(length(min = 1, max = 1000, message = "Message must be 1 to 1000 characters"))]
    pub text: String,

    #[validate(length(min = 2, max = 30, message = "Name must be 2 to 30 characters"))]
    pub username: String,
}

pub fn validate_chat_message(form: &ChatMessageForm) -> Result<(), FieldErrors> {
    finish(collect(form.validate()))
}

/// Display names allow letters, digits, underscores and spaces.
pub fn validate_chat_username(username: &str) -> Result<(), String> {
    let length = username.chars().count();
    if length < 2 {
        return Err("Name must contain at least 2 characters".to_string());
    }
    if length > 30 {
        return Err("Name is limited to 30 characters".to_string());
    }
    let allowed = username
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '_' || ch.is_whitespace());
    if !allowed {
        return Err("Name may only contain letters, digits, spaces and underscores".to_string());
    }
    Ok(())
}

pub fn validate_search_query(query: &str) -> Result<(), String> {
    if query.chars().count() > 100 {
        return Err("Search query is limited to 100 characters".to_string());
    }
    Ok(())
}
