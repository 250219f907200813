//! Per-feature state containers.
//!
//! Each feature area owns an explicit container that tests can build in
//! isolation; nothing here is a process-wide singleton. The containers
//! write through to the local store where the data should survive a
//! restart, and keep working from memory when it is unavailable.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::chat::ChatUpdate;
use crate::db::LocalStore;
use crate::models::{Book, ChatMessage, SearchEntry};

const VIEWED_MIRROR_CAP: usize = 10;
const RECENT_BOOKS_LIMIT: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Title,
    /// Newest first by the backend's creation timestamp.
    Date,
    /// Highest rated first.
    Rating,
}

/// Dedup, move to front, cap. Shared by the store write-through and the
/// in-memory fallback so both paths agree.
fn remember_viewed(list: &mut Vec<i64>, book_id: i64) {
    list.retain(|id| *id != book_id);
    list.insert(0, book_id);
    list.truncate(VIEWED_MIRROR_CAP);
}

/// Catalog browsing state: search, filters, sort and the viewed-books
/// mirror backing the "recently viewed" shelf.
pub struct CatalogState {
    store: Arc<LocalStore>,
    pub search_query: String,
    pub selected_genre: Option<i64>,
    pub selected_author: Option<i64>,
    pub selected_year: Option<i64>,
    pub sort_by: SortBy,
    viewed_books: Vec<i64>,
}

impl CatalogState {
    pub fn new(store: Arc<LocalStore>) -> CatalogState {
        CatalogState {
            store,
            search_query: String::new(),
            selected_genre: None,
            selected_author: None,
            selected_year: None,
            sort_by: SortBy::default(),
            viewed_books: vec![],
        }
    }

    /// Load the viewed-books mirror from the store. Keeps the current
    /// in-memory list when the store is unavailable.
    pub async fn load_viewed(&mut self) {
        match self.store.viewed_books().get_all().await {
            Ok(records) => {
                self.viewed_books = records.iter().map(|record| record.book_id).collect();
            }
            Err(err) => log::warn!("could not load viewed books: {err}"),
        }
    }

    /// Record a book view. The store write keeps the dedup and cap
    /// rules; when it fails the mirror applies the same rules in memory
    /// so the feature degrades instead of disappearing.
    pub async fn add_viewed(&mut self, book_id: i64) {
        match self.store.viewed_books().add(book_id).await {
            Ok(()) => self.load_viewed().await,
            Err(err) => {
                log::warn!("could not persist viewed book {book_id}: {err}");
                remember_viewed(&mut self.viewed_books, book_id);
            }
        }
    }

    pub async fn clear_viewed(&mut self) {
        if let Err(err) = self.store.viewed_books().clear().await {
            log::warn!("could not clear viewed books: {err}");
        }
        self.viewed_books.clear();
    }

    pub fn viewed_books(&self) -> &[i64] {
        &self.viewed_books
    }

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.search_query = query.into();
    }

    /// Persist a submitted query into the search history. Advisory, so
    /// failures only log.
    pub async fn record_search(&self, query: &str) {
        if let Err(err) = self.store.search_history().add(query).await {
            log::warn!("could not record search query: {err}");
        }
    }

    pub async fn recent_searches(&self, limit: usize) -> Vec<SearchEntry> {
        match self.store.search_history().get_recent(limit).await {
            Ok(entries) => entries,
            Err(err) => {
                log::warn!("could not load search history: {err}");
                vec![]
            }
        }
    }

    pub fn set_selected_genre(&mut self, genre: Option<i64>) {
        self.selected_genre = genre;
    }

    pub fn set_selected_author(&mut self, author: Option<i64>) {
        self.selected_author = author;
    }

    pub fn set_selected_year(&mut self, year: Option<i64>) {
        self.selected_year = year;
    }

    pub fn set_sort_by(&mut self, sort_by: SortBy) {
        self.sort_by = sort_by;
    }

    pub fn reset_filters(&mut self) {
        self.search_query.clear();
        self.selected_genre = None;
        self.selected_author = None;
        self.selected_year = None;
        self.sort_by = SortBy::default();
    }

    /// Apply the active search, filters and sort to a fetched book list.
    pub fn filter_books(&self, books: &[Book]) -> Vec<Book> {
        let query = self.search_query.trim().to_lowercase();
        let mut filtered: Vec<Book> = books
            .iter()
            .filter(|book| {
                if query.is_empty() {
                    return true;
                }
                book.title.to_lowercase().contains(&query)
                    || book
                        .authors
                        .iter()
                        .any(|author| author.name.to_lowercase().contains(&query))
            })
            .filter(|book| match self.selected_genre {
                Some(genre_id) => book.genres.iter().any(|genre| genre.id == Some(genre_id)),
                None => true,
            })
            .filter(|book| match self.selected_author {
                Some(author_id) => book.authors.iter().any(|author| author.id == Some(author_id)),
                None => true,
            })
            .filter(|book| match self.selected_year {
                Some(year) => book.publication_year == Some(year),
                None => true,
            })
            .cloned()
            .collect();

        match self.sort_by {
            SortBy::Title => {
                filtered.sort_by(|a, b| a.title.to_lowercase().cmp(&b.title.to_lowercase()));
            }
            SortBy::Date => {
                filtered.sort_by(|a, b| {
                    b.created_at.as_deref().unwrap_or("").cmp(a.created_at.as_deref().unwrap_or(""))
                });
            }
            SortBy::Rating => {
                filtered.sort_by(|a, b| {
                    b.rating
                        .unwrap_or(0.0)
                        .total_cmp(&a.rating.unwrap_or(0.0))
                });
            }
        }
        filtered
    }

    /// Resolve the viewed mirror against a fetched list for the
    /// "recently viewed" shelf. Ids with no matching book drop out.
    pub fn recent_books(&self, books: &[Book]) -> Vec<Book> {
        self.viewed_books
            .iter()
            .filter_map(|id| books.iter().find(|book| book.id == *id))
            .take(RECENT_BOOKS_LIMIT)
            .cloned()
            .collect()
    }
}

/// Debounced scheduling for search-as-you-type. A new keystroke or
/// teardown cancels the pending callback.
pub struct DebouncedSearch {
    delay: Duration,
    pending: Option<JoinHandle<()>>,
}

impl DebouncedSearch {
    pub fn new(delay: Duration) -> DebouncedSearch {
        DebouncedSearch { delay, pending: None }
    }

    pub fn schedule<F>(&mut self, callback: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.cancel();
        let delay = self.delay;
        self.pending = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            callback.await;
        }));
    }

    pub fn cancel(&mut self) {
        if let Some(pending) = self.pending.take() {
            pending.abort();
        }
    }
}

impl Drop for DebouncedSearch {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Chat session state: the message list, connection flag, online users
/// and the unread badge.
#[derive(Debug, Default, Clone)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
    is_connected: bool,
    online_users: Vec<String>,
    unread_count: usize,
}

impl ChatState {
    pub fn new() -> ChatState {
        ChatState::default()
    }

    /// Fold one session update into the state.
    pub fn apply(&mut self, update: ChatUpdate) {
        match update {
            ChatUpdate::Connected => self.is_connected = true,
            ChatUpdate::Disconnected => self.is_connected = false,
            ChatUpdate::Message(message) => self.add_message(message),
            ChatUpdate::History(messages) => self.merge_history(messages),
            ChatUpdate::OnlineUsers(users) => self.online_users = users,
            // Errors are presentation concerns; the state does not change.
            ChatUpdate::Error(_) => {}
        }
    }

    pub fn add_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
        self.unread_count += 1;
    }

    /// Replace the list with a history replay, deduplicated by message
    /// id so a server that replays on every reconnect cannot produce
    /// duplicate entries.
    pub fn merge_history(&mut self, history: Vec<ChatMessage>) {
        let mut seen = std::collections::HashSet::new();
        self.messages = history
            .into_iter()
            .filter(|message| match &message.id {
                Some(id) => seen.insert(id.clone()),
                None => true,
            })
            .collect();
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_connected(&self) -> bool {
        self.is_connected
    }

    pub fn online_users(&self) -> &[String] {
        &self.online_users
    }

    pub fn unread_count(&self) -> usize {
        self.unread_count
    }

    pub fn reset_unread(&mut self) {
        self.unread_count = 0;
    }

    pub fn clear(&mut self) {
        self.messages.clear();
        self.unread_count = 0;
    }
}
