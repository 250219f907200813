//! Application facade.
//!
//! Owns the wiring the pages share: configuration, the local store (with
//! its startup migration and cache purge), the API client and the chat
//! session factory. Pages read and write history/cache through the store
//! directly; everything network-shaped goes through [`ApiClient`].

use std::path::Path;
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;

use crate::api::{ApiClient, ApiError};
use crate::chat::{self, ChatConfig, ChatHandle, ChatUpdate};
use crate::config::ApiConfig;
use crate::db::{LocalStore, StoreError, DEFAULT_CACHE_MAX_AGE_DAYS};
use crate::migration::{force_migration, run_migration, LegacyStore, MigrationReport};
use crate::models::Book;
use crate::state::CatalogState;

const DB_FILE: &str = "libris.db";
const LEGACY_FILE: &str = "legacy_storage.json";

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

pub struct Catalog {
    config: ApiConfig,
    store: Arc<LocalStore>,
    api: ApiClient,
    legacy: LegacyStore,
    migration: MigrationReport,
}

impl Catalog {
    /// Start with configuration resolved from the environment.
    pub async fn start(data_dir: &Path) -> Result<Catalog, CatalogError> {
        Catalog::with_config(ApiConfig::from_env(), data_dir).await
    }

    /// Open the local store (falling back to memory when the profile
    /// directory is unusable), run the one-shot legacy migration, purge
    /// stale cache entries and build the API client.
    pub async fn with_config(config: ApiConfig, data_dir: &Path) -> Result<Catalog, CatalogError> {
        let store = Arc::new(LocalStore::open_or_memory(&data_dir.join(DB_FILE))?);
        let legacy = LegacyStore::open(data_dir.join(LEGACY_FILE));

        let migration = run_migration(&store, &legacy).await;
        match store.book_cache().remove_old(DEFAULT_CACHE_MAX_AGE_DAYS).await {
            Ok(0) => {}
            Ok(removed) => log::info!("purged {removed} stale cached books"),
            Err(err) => log::warn!("cache purge failed: {err}"),
        }

        let api = ApiClient::new(config.clone(), store.clone())?;
        Ok(Catalog { config, store, api, legacy, migration })
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<LocalStore> {
        self.store.clone()
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    /// Report of the startup migration run.
    pub fn migration_report(&self) -> &MigrationReport {
        &self.migration
    }

    /// Operator entry point: clear the completion flag and migrate again.
    pub async fn remigrate(&mut self) -> MigrationReport {
        let report = force_migration(&self.store, &self.legacy).await;
        self.migration = report.clone();
        report
    }

    /// Fresh catalog browsing state bound to this store.
    pub fn catalog_state(&self) -> CatalogState {
        CatalogState::new(self.store.clone())
    }

    /// Open a chat session, or `None` when the deployment profile
    /// cannot carry realtime traffic.
    pub fn chat(&self, username: &str) -> Option<(ChatHandle, UnboundedReceiver<ChatUpdate>)> {
        let config = ChatConfig::from_api(&self.config, username)?;
        Some(chat::connect(config))
    }

    /// Fetch the full book list, serving the cached copies when the
    /// backend is unreachable.
    pub async fn books(&self) -> Result<Vec<Book>, ApiError> {
        match self.api.books().await {
            Ok(books) => Ok(books),
            Err(err @ ApiError::Network(_)) => {
                let cached = match self.store.book_cache().get_all().await {
                    Ok(cached) => cached,
                    Err(store_err) => {
                        log::warn!("offline fallback unavailable: {store_err}");
                        return Err(err);
                    }
                };
                if cached.is_empty() {
                    return Err(err);
                }
                log::info!("backend unreachable, serving {} cached books", cached.len());
                Ok(cached.into_iter().map(|entry| entry.book).collect())
            }
            Err(err) => Err(err),
        }
    }

    /// Open one book: fetch, cache, and record the view. Falls back to
    /// the cached copy when the backend is unreachable.
    pub async fn view_book(&self, id: i64) -> Result<Option<Book>, ApiError> {
        match self.api.book(id).await {
            Ok(Some(book)) => {
                if let Err(err) = self.store.book_cache().set(&book).await {
                    log::warn!("could not cache book {id}: {err}");
                }
                self.record_view(id).await;
                Ok(Some(book))
            }
            Ok(None) => Ok(None),
            Err(err @ ApiError::Network(_)) => {
                let cached = match self.store.book_cache().get(id).await {
                    Ok(cached) => cached,
                    Err(store_err) => {
                        log::warn!("offline fallback unavailable: {store_err}");
                        return Err(err);
                    }
                };
                match cached {
                    Some(entry) => {
                        log::info!("backend unreachable, serving cached book {id}");
                        self.record_view(id).await;
                        Ok(Some(entry.book))
                    }
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }

    async fn record_view(&self, id: i64) {
        if let Err(err) = self.store.viewed_books().add(id).await {
            log::warn!("could not record view of book {id}: {err}");
        }
    }
}
