use std::fs;
use std::path::Path;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::models::{Book, CachedBook, ChatMessage, Credentials, SearchEntry, ViewedBook};

const VIEWED_BOOKS_CAP: i64 = 10;
const SEARCH_HISTORY_CAP: i64 = 20;
pub const DEFAULT_CACHE_MAX_AGE_DAYS: i64 = 7;

const CREDENTIALS_KEY: &str = "credentials";

const COLLECTIONS_SQL: &str = "
    CREATE TABLE IF NOT EXISTS viewed_books (
        book_id INTEGER PRIMARY KEY,
        viewed_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS book_cache (
        id INTEGER PRIMARY KEY,
        book TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS user_data (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS search_history (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        query TEXT NOT NULL,
        timestamp TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS auth_data (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS chat_messages (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT,
        username TEXT NOT NULL,
        text TEXT NOT NULL,
        book_ids TEXT,
        timestamp TEXT NOT NULL
    );
";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("storage unavailable: {0}")]
    Unavailable(#[from] std::io::Error),

    #[error("stored value could not be encoded: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Durable local document store, one SQLite file per profile directory.
///
/// Collections are independent; there is no cross-collection schema. All
/// data here is advisory (history, cache, preferences), the external
/// backend stays authoritative.
pub struct LocalStore {
    conn: Mutex<Connection>,
}

impl LocalStore {
    pub fn open(path: &Path) -> Result<LocalStore, StoreError> {
        if let Some(parent) = path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        init_schema(&conn)?;
        Ok(LocalStore { conn: Mutex::new(conn) })
    }

    /// Open the on-disk store, falling back to an in-memory database when
    /// the file cannot be opened (read-only profile dir, locked file).
    /// The caller keeps working, it just loses persistence.
    pub fn open_or_memory(path: &Path) -> Result<LocalStore, StoreError> {
        match LocalStore::open(path) {
            Ok(store) => Ok(store),
            Err(err) => {
                log::warn!(
                    "local store unavailable at {}, using in-memory fallback: {err}",
                    path.display()
                );
                LocalStore::open_in_memory()
            }
        }
    }

    pub fn open_in_memory() -> Result<LocalStore, StoreError> {
        let conn = Connection::open_in_memory()?;
        init_schema(&conn)?;
        Ok(LocalStore { conn: Mutex::new(conn) })
    }

    pub fn viewed_books(&self) -> ViewedBooks<'_> {
        ViewedBooks(self)
    }

    pub fn user_data(&self) -> UserData<'_> {
        UserData(self)
    }

    pub fn search_history(&self) -> SearchHistory<'_> {
        SearchHistory(self)
    }

    pub fn auth_data(&self) -> AuthData<'_> {
        AuthData(self)
    }

    pub fn book_cache(&self) -> BookCache<'_> {
        BookCache(self)
    }

    pub fn chat_messages(&self) -> ChatMessages<'_> {
        ChatMessages(self)
    }
}

fn init_schema(conn: &Connection) -> Result<(), StoreError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            id TEXT PRIMARY KEY NOT NULL,
            applied_at INTEGER NOT NULL
        );",
    )?;
    apply_migration(conn, "0001_collections", COLLECTIONS_SQL)?;
    Ok(())
}

fn apply_migration(conn: &Connection, id: &str, sql: &str) -> Result<(), StoreError> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT id FROM schema_migrations WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()?;
    if existing.is_some() {
        return Ok(());
    }
    conn.execute_batch(sql)?;
    conn.execute(
        "INSERT INTO schema_migrations (id, applied_at) VALUES (?1, ?2)",
        params![id, Utc::now().timestamp_millis()],
    )?;
    Ok(())
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .ok()
}

/// History of recently opened books, capped at the 10 most recent.
pub struct ViewedBooks<'a>(&'a LocalStore);

impl ViewedBooks<'_> {
    /// Re-adding an already viewed book refreshes its timestamp; the
    /// collection is then trimmed back to the cap.
    pub async fn add(&self, book_id: i64) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM viewed_books WHERE book_id = ?1", params![book_id])?;
        conn.execute(
            "INSERT INTO viewed_books (book_id, viewed_at) VALUES (?1, ?2)",
            params![book_id, Utc::now().to_rfc3339()],
        )?;
        conn.execute(
            "DELETE FROM viewed_books WHERE book_id NOT IN (
                SELECT book_id FROM viewed_books ORDER BY viewed_at DESC LIMIT ?1
            )",
            params![VIEWED_BOOKS_CAP],
        )?;
        Ok(())
    }

    /// Most recently viewed first.
    pub async fn get_all(&self) -> Result<Vec<ViewedBook>, StoreError> {
        let conn = self.0.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT book_id, viewed_at FROM viewed_books ORDER BY viewed_at DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![VIEWED_BOOKS_CAP], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (book_id, raw) = row?;
            if let Some(viewed_at) = parse_timestamp(&raw) {
                records.push(ViewedBook { book_id, viewed_at });
            }
        }
        Ok(records)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM viewed_books", [])?;
        Ok(())
    }
}

/// Generic key/value collection for preferences and flags.
pub struct UserData<'a>(&'a LocalStore);

impl UserData<'_> {
    pub async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let conn = self.0.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM user_data WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => match serde_json::from_str(&text) {
                Ok(value) => Ok(Some(value)),
                Err(err) => {
                    log::warn!("discarding undecodable user_data entry {key}: {err}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn set(&self, key: &str, value: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(value)?;
        let conn = self.0.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO user_data (key, value) VALUES (?1, ?2)",
            params![key, text],
        )?;
        Ok(())
    }

    pub async fn remove(&self, key: &str) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM user_data WHERE key = ?1", params![key])?;
        Ok(())
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM user_data", [])?;
        Ok(())
    }
}

/// Recent search queries, deduplicated by exact text, capped at 20.
pub struct SearchHistory<'a>(&'a LocalStore);

impl SearchHistory<'_> {
    pub async fn add(&self, query: &str) -> Result<(), StoreError> {
        if query.trim().is_empty() {
            return Ok(());
        }
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM search_history WHERE query = ?1", params![query])?;
        conn.execute(
            "INSERT INTO search_history (query, timestamp) VALUES (?1, ?2)",
            params![query, Utc::now().to_rfc3339()],
        )?;
        conn.execute(
            "DELETE FROM search_history WHERE id NOT IN (
                SELECT id FROM search_history ORDER BY timestamp DESC LIMIT ?1
            )",
            params![SEARCH_HISTORY_CAP],
        )?;
        Ok(())
    }

    pub async fn get_recent(&self, limit: usize) -> Result<Vec<SearchEntry>, StoreError> {
        let conn = self.0.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT query, timestamp FROM search_history ORDER BY timestamp DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (query, raw) = row?;
            if let Some(timestamp) = parse_timestamp(&raw) {
                entries.push(SearchEntry { query, timestamp });
            }
        }
        Ok(entries)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM search_history", [])?;
        Ok(())
    }
}

/// Singleton Basic-Auth credential record.
pub struct AuthData<'a>(&'a LocalStore);

impl AuthData<'_> {
    pub async fn save_credentials(&self, username: &str, password: &str) -> Result<(), StoreError> {
        let value = serde_json::to_string(&Credentials {
            username: username.to_string(),
            password: password.to_string(),
        })?;
        let conn = self.0.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO auth_data (key, value, updated_at) VALUES (?1, ?2, ?3)",
            params![CREDENTIALS_KEY, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_credentials(&self) -> Result<Option<Credentials>, StoreError> {
        let conn = self.0.conn.lock().await;
        let raw: Option<String> = conn
            .query_row(
                "SELECT value FROM auth_data WHERE key = ?1",
                params![CREDENTIALS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(text) => match serde_json::from_str(&text) {
                Ok(credentials) => Ok(Some(credentials)),
                Err(err) => {
                    log::warn!("discarding undecodable credential record: {err}");
                    Ok(None)
                }
            },
            None => Ok(None),
        }
    }

    pub async fn clear_credentials(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM auth_data WHERE key = ?1", params![CREDENTIALS_KEY])?;
        Ok(())
    }

    pub async fn has_credentials(&self) -> Result<bool, StoreError> {
        Ok(self.get_credentials().await?.is_some())
    }
}

/// Advisory copy of backend book records for offline continuity.
///
/// Eviction is purely age based; there is no LRU and no size bound.
pub struct BookCache<'a>(&'a LocalStore);

impl BookCache<'_> {
    pub async fn get(&self, id: i64) -> Result<Option<CachedBook>, StoreError> {
        let conn = self.0.conn.lock().await;
        let row: Option<(String, String)> = conn
            .query_row(
                "SELECT book, created_at FROM book_cache WHERE id = ?1",
                params![id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row.and_then(|(raw, stamp)| decode_cached_book(&raw, &stamp)))
    }

    /// Stamps the insertion time; re-setting a book refreshes the stamp.
    pub async fn set(&self, book: &Book) -> Result<(), StoreError> {
        let raw = serde_json::to_string(book)?;
        let conn = self.0.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO book_cache (id, book, created_at) VALUES (?1, ?2, ?3)",
            params![book.id, raw, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    pub async fn get_all(&self) -> Result<Vec<CachedBook>, StoreError> {
        let conn = self.0.conn.lock().await;
        let mut stmt = conn.prepare("SELECT book, created_at FROM book_cache")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut books = Vec::new();
        for row in rows {
            let (raw, stamp) = row?;
            if let Some(cached) = decode_cached_book(&raw, &stamp) {
                books.push(cached);
            }
        }
        Ok(books)
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM book_cache", [])?;
        Ok(())
    }

    /// Delete entries older than the cutoff. Returns how many went.
    pub async fn remove_old(&self, days_old: i64) -> Result<usize, StoreError> {
        let cutoff = (Utc::now() - Duration::days(days_old)).to_rfc3339();
        let conn = self.0.conn.lock().await;
        let removed = conn.execute(
            "DELETE FROM book_cache WHERE created_at < ?1",
            params![cutoff],
        )?;
        Ok(removed)
    }
}

fn decode_cached_book(raw: &str, stamp: &str) -> Option<CachedBook> {
    let book: Book = match serde_json::from_str(raw) {
        Ok(book) => book,
        Err(err) => {
            log::warn!("discarding undecodable cached book: {err}");
            return None;
        }
    };
    let cached_at = parse_timestamp(stamp)?;
    Some(CachedBook { book, cached_at })
}

/// Message buffer for offline chat continuity. Arrival order only, no
/// deduplication at this layer.
pub struct ChatMessages<'a>(&'a LocalStore);

impl ChatMessages<'_> {
    pub async fn add(&self, message: &ChatMessage) -> Result<(), StoreError> {
        let book_ids = match &message.book_ids {
            Some(ids) => Some(serde_json::to_string(ids)?),
            None => None,
        };
        let conn = self.0.conn.lock().await;
        conn.execute(
            "INSERT INTO chat_messages (message_id, username, text, book_ids, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                message.id,
                message.username,
                message.text,
                book_ids,
                message.timestamp.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    /// Oldest first.
    pub async fn get_all(&self) -> Result<Vec<ChatMessage>, StoreError> {
        self.query("SELECT message_id, username, text, book_ids, timestamp
                    FROM chat_messages ORDER BY timestamp ASC", None)
            .await
    }

    /// Newest first, bounded.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<ChatMessage>, StoreError> {
        self.query("SELECT message_id, username, text, book_ids, timestamp
                    FROM chat_messages ORDER BY timestamp DESC LIMIT ?1", Some(limit as i64))
            .await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        let conn = self.0.conn.lock().await;
        conn.execute("DELETE FROM chat_messages", [])?;
        Ok(())
    }

    async fn query(&self, sql: &str, limit: Option<i64>) -> Result<Vec<ChatMessage>, StoreError> {
        let conn = self.0.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let map_row = |row: &rusqlite::Row<'_>| {
            Ok((
                row.get::<_, Option<String>>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, Option<String>>(3)?,
                row.get::<_, String>(4)?,
            ))
        };
        let rows = match limit {
            Some(limit) => stmt.query_map(params![limit], map_row)?,
            None => stmt.query_map([], map_row)?,
        };

        let mut messages = Vec::new();
        for row in rows {
            let (id, username, text, book_ids, stamp) = row?;
            let timestamp = match parse_timestamp(&stamp) {
                Some(timestamp) => timestamp,
                None => continue,
            };
            let book_ids = book_ids.and_then(|raw| serde_json::from_str(&raw).ok());
            messages.push(ChatMessage { id, username, text, book_ids, timestamp });
        }
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn readding_a_viewed_book_keeps_one_record() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        store.viewed_books().add(42).await.expect("first add");
        let first = store.viewed_books().get_all().await.expect("get_all");
        store.viewed_books().add(42).await.expect("second add");

        let records = store.viewed_books().get_all().await.expect("get_all");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].book_id, 42);
        assert!(records[0].viewed_at >= first[0].viewed_at);
    }

    #[tokio::test]
    async fn viewed_books_cap_at_ten_most_recent() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        for id in 1..=11 {
            store.viewed_books().add(id).await.expect("add");
            // Distinct timestamps keep the eviction order deterministic.
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let records = store.viewed_books().get_all().await.expect("get_all");
        assert_eq!(records.len(), 10);
        assert_eq!(records[0].book_id, 11);
        assert!(records.iter().all(|record| record.book_id != 1));
    }

    #[tokio::test]
    async fn viewed_books_clear_empties_collection() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        store.viewed_books().add(1).await.expect("add");
        store.viewed_books().clear().await.expect("clear");
        assert!(store.viewed_books().get_all().await.expect("get_all").is_empty());
    }

    #[tokio::test]
    async fn user_data_round_trips_json_values() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        let data = store.user_data();

        assert!(data.get("missing").await.expect("get").is_none());

        data.set("theme", &json!("dark")).await.expect("set");
        data.set("prefs", &json!({ "pageSize": 24 })).await.expect("set");
        assert_eq!(data.get("theme").await.expect("get"), Some(json!("dark")));
        assert_eq!(data.get("prefs").await.expect("get"), Some(json!({ "pageSize": 24 })));

        data.remove("theme").await.expect("remove");
        assert!(data.get("theme").await.expect("get").is_none());

        data.clear().await.expect("clear");
        assert!(data.get("prefs").await.expect("get").is_none());
    }

    #[tokio::test]
    async fn search_history_dedups_and_caps() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        let history = store.search_history();

        history.add("   ").await.expect("whitespace is a no-op");
        assert!(history.get_recent(10).await.expect("get_recent").is_empty());

        for round in 0..22 {
            history.add(&format!("query {round}")).await.expect("add");
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        history.add("query 5").await.expect("re-add dedups");

        let entries = history.get_recent(30).await.expect("get_recent");
        assert_eq!(entries.len(), 20);
        assert_eq!(entries[0].query, "query 5");
        assert_eq!(entries.iter().filter(|entry| entry.query == "query 5").count(), 1);

        let limited = history.get_recent(10).await.expect("get_recent");
        assert_eq!(limited.len(), 10);
    }

    #[tokio::test]
    async fn credentials_singleton_round_trips() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        let auth = store.auth_data();

        assert!(!auth.has_credentials().await.expect("has"));
        auth.save_credentials("admin", "hunter2").await.expect("save");
        let credentials = auth.get_credentials().await.expect("get").expect("stored");
        assert_eq!(credentials.username, "admin");
        assert_eq!(credentials.password, "hunter2");

        auth.save_credentials("admin", "other").await.expect("overwrite");
        let credentials = auth.get_credentials().await.expect("get").expect("stored");
        assert_eq!(credentials.password, "other");

        auth.clear_credentials().await.expect("clear");
        assert!(!auth.has_credentials().await.expect("has"));
    }

    fn sample_book(id: i64) -> Book {
        Book {
            id,
            title: format!("Book {id}"),
            description: String::new(),
            publication_year: Some(2020),
            rating: None,
            image_url: None,
            authors: vec![],
            genres: vec![],
            created_at: None,
        }
    }

    #[tokio::test]
    async fn book_cache_round_trips_and_purges_by_age() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        let cache = store.book_cache();

        assert!(cache.get(1).await.expect("get").is_none());
        cache.set(&sample_book(1)).await.expect("set");
        cache.set(&sample_book(2)).await.expect("set");

        let cached = cache.get(1).await.expect("get").expect("cached");
        assert_eq!(cached.book.title, "Book 1");
        assert_eq!(cache.get_all().await.expect("get_all").len(), 2);

        // Back-date one entry past the cutoff.
        {
            let conn = store.conn.lock().await;
            let old = (Utc::now() - Duration::days(30)).to_rfc3339();
            conn.execute("UPDATE book_cache SET created_at = ?1 WHERE id = 1", params![old])
                .expect("backdate");
        }

        let removed = cache.remove_old(DEFAULT_CACHE_MAX_AGE_DAYS).await.expect("remove_old");
        assert_eq!(removed, 1);
        assert!(cache.get(1).await.expect("get").is_none());
        assert!(cache.get(2).await.expect("get").is_some());

        cache.clear().await.expect("clear");
        assert!(cache.get_all().await.expect("get_all").is_empty());
    }

    fn sample_message(text: &str, minutes_ago: i64) -> ChatMessage {
        ChatMessage {
            id: None,
            username: "reader".to_string(),
            text: text.to_string(),
            book_ids: Some(vec![1, 2]),
            timestamp: Utc::now() - Duration::minutes(minutes_ago),
        }
    }

    #[tokio::test]
    async fn chat_messages_order_both_ways() {
        let store = LocalStore::open_in_memory().expect("in-memory store");
        let buffer = store.chat_messages();

        buffer.add(&sample_message("first", 3)).await.expect("add");
        buffer.add(&sample_message("second", 2)).await.expect("add");
        buffer.add(&sample_message("third", 1)).await.expect("add");

        let ascending = buffer.get_all().await.expect("get_all");
        assert_eq!(ascending.len(), 3);
        assert_eq!(ascending[0].text, "first");
        assert_eq!(ascending[2].text, "third");
        assert_eq!(ascending[0].book_ids, Some(vec![1, 2]));

        let recent = buffer.get_recent(2).await.expect("get_recent");
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].text, "third");

        buffer.clear().await.expect("clear");
        assert!(buffer.get_all().await.expect("get_all").is_empty());
    }

    #[tokio::test]
    async fn open_or_memory_falls_back_when_path_is_unusable() {
        // A directory path cannot be opened as a database file.
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalStore::open_or_memory(dir.path()).expect("fallback store");
        store.viewed_books().add(1).await.expect("add against fallback");
        assert_eq!(store.viewed_books().get_all().await.expect("get_all").len(), 1);
    }

    #[tokio::test]
    async fn reopening_on_disk_store_keeps_data_and_skips_migrations() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("libris.db");

        {
            let store = LocalStore::open(&path).expect("open");
            store.viewed_books().add(7).await.expect("add");
        }
        let store = LocalStore::open(&path).expect("reopen");
        let records = store.viewed_books().get_all().await.expect("get_all");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].book_id, 7);
    }
}
