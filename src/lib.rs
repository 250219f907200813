//! Book catalog client core.
//!
//! The non-UI layer of a catalog app talking to an external REST/realtime
//! backend: external-shape adaptation, a SQLite-backed local cache store
//! with a one-shot legacy migration, a Basic-Auth API client with a fixed
//! error taxonomy, a realtime chat client, and per-feature state
//! containers for the pages to hold.

pub mod adapter;
pub mod api;
pub mod catalog;
pub mod chat;
pub mod config;
pub mod db;
pub mod migration;
pub mod models;
pub mod state;
pub mod validation;

pub use api::{ApiClient, ApiError, UploadedImage};
pub use catalog::{Catalog, CatalogError};
pub use chat::{ChatConfig, ChatError, ChatHandle, ChatUpdate};
pub use config::ApiConfig;
pub use db::{LocalStore, StoreError};
pub use migration::{
    force_migration, run_migration, LegacyStore, MigrationReport, SectionOutcome,
};
pub use models::{
    Author, Book, BookPayload, CachedBook, ChatMessage, Credentials, Genre, SearchEntry,
    ViewedBook,
};
pub use state::{CatalogState, ChatState, DebouncedSearch, SortBy};
