//! One-shot migration from the legacy flat key/value storage into the
//! local store. Runs at startup, guarded by a persisted completion flag.

use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};

use crate::db::LocalStore;

const MIGRATION_COMPLETED_KEY: &str = "migration_completed";
const MIGRATION_DATE_KEY: &str = "migration_date";

const LEGACY_AUTH_KEY: &str = "api_auth";
const LEGACY_BOOK_STORAGE_KEY: &str = "book-storage";
/// Preference keys copied verbatim; the legacy entries stay in place.
const LEGACY_PREFERENCE_KEYS: [&str; 3] = ["user_preferences", "theme", "language"];

/// The prior persistence scheme: one flat JSON object of string values,
/// kept on disk. Reads tolerate a missing or corrupt file by starting
/// empty, the way the old storage behaved.
pub struct LegacyStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl LegacyStore {
    pub fn open(path: impl Into<PathBuf>) -> LegacyStore {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<HashMap<String, String>>(&raw) {
                Ok(entries) => entries,
                Err(err) => {
                    log::warn!("legacy storage at {} is corrupt, starting empty: {err}", path.display());
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        LegacyStore { path, entries: Mutex::new(entries) }
    }

    pub fn get_item(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .ok()
            .and_then(|entries| entries.get(key).cloned())
    }

    pub fn set_item(&self, key: &str, value: &str) -> io::Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| io::Error::other("legacy storage lock poisoned"))?;
            entries.insert(key.to_string(), value.to_string());
            entries.clone()
        };
        self.persist(&snapshot)
    }

    pub fn remove_item(&self, key: &str) -> io::Result<()> {
        let snapshot = {
            let mut entries = self
                .entries
                .lock()
                .map_err(|_| io::Error::other("legacy storage lock poisoned"))?;
            entries.remove(key);
            entries.clone()
        };
        self.persist(&snapshot)
    }

    pub fn is_empty(&self) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.is_empty())
            .unwrap_or(true)
    }

    fn persist(&self, entries: &HashMap<String, String>) -> io::Result<()> {
        let raw = serde_json::to_string_pretty(entries)
            .map_err(|err| io::Error::other(err.to_string()))?;
        fs::write(&self.path, raw)
    }
}

/// Outcome of one sub-migration.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum SectionOutcome {
    /// Records were moved; `records` counts them.
    Migrated { records: usize },
    /// Nothing to migrate in the legacy storage.
    Empty,
    /// The sub-migration failed and its data stayed behind.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionReport {
    pub name: &'static str,
    #[serde(flatten)]
    pub outcome: SectionOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    pub success: bool,
    pub already_migrated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub sections: Vec<SectionReport>,
}

impl MigrationReport {
    fn already_done() -> MigrationReport {
        MigrationReport {
            success: true,
            already_migrated: true,
            error: None,
            sections: vec![],
        }
    }
}

/// Run the legacy migration once.
///
/// The three sub-migrations are independent: a failure in one is logged,
/// recorded in the report, and does not stop the others or the
/// completion flag. Rerunning after completion is a no-op.
pub async fn run_migration(store: &LocalStore, legacy: &LegacyStore) -> MigrationReport {
    match store.user_data().get(MIGRATION_COMPLETED_KEY).await {
        Ok(Some(Value::Bool(true))) => {
            log::info!("legacy migration already completed, skipping");
            return MigrationReport::already_done();
        }
        Ok(_) => {}
        Err(err) => {
            // Can't even read the flag; run anyway, every step is idempotent.
            log::warn!("could not read migration flag: {err}");
        }
    }

    log::info!("migrating legacy storage into the local store");
    let (auth, viewed, preferences) = tokio::join!(
        migrate_auth(store, legacy),
        migrate_viewed_books(store, legacy),
        migrate_preferences(store, legacy),
    );

    let sections = vec![
        SectionReport { name: "auth", outcome: auth },
        SectionReport { name: "viewed_books", outcome: viewed },
        SectionReport { name: "preferences", outcome: preferences },
    ];
    for section in &sections {
        if let SectionOutcome::Failed { reason } = &section.outcome {
            log::error!("legacy migration section {} failed: {reason}", section.name);
        }
    }

    let error = match mark_completed(store).await {
        Ok(()) => None,
        Err(err) => Some(err),
    };
    MigrationReport {
        success: error.is_none(),
        already_migrated: false,
        error,
        sections,
    }
}

/// Clear the completion flag and run the migration again. Debug tool.
pub async fn force_migration(store: &LocalStore, legacy: &LegacyStore) -> MigrationReport {
    if let Err(err) = store.user_data().remove(MIGRATION_COMPLETED_KEY).await {
        log::warn!("could not clear migration flag: {err}");
    }
    run_migration(store, legacy).await
}

async fn mark_completed(store: &LocalStore) -> Result<(), String> {
    store
        .user_data()
        .set(MIGRATION_COMPLETED_KEY, &Value::Bool(true))
        .await
        .map_err(|err| err.to_string())?;
    store
        .user_data()
        .set(MIGRATION_DATE_KEY, &json!(Utc::now().to_rfc3339()))
        .await
        .map_err(|err| err.to_string())?;
    Ok(())
}

/// Legacy auth blob `{username, password}` becomes the credential
/// singleton; the legacy key is deleted once it is safely stored.
async fn migrate_auth(store: &LocalStore, legacy: &LegacyStore) -> SectionOutcome {
    let raw = match legacy.get_item(LEGACY_AUTH_KEY) {
        Some(raw) => raw,
        None => return SectionOutcome::Empty,
    };

    let parsed: Value = match serde_json::from_str(&raw) {
        Ok(parsed) => parsed,
        Err(err) => return SectionOutcome::Failed { reason: err.to_string() },
    };
    let username = parsed.get("username").and_then(Value::as_str).unwrap_or("");
    let password = parsed.get("password").and_then(Value::as_str).unwrap_or("");

    if let Err(err) = store.auth_data().save_credentials(username, password).await {
        return SectionOutcome::Failed { reason: err.to_string() };
    }
    if let Err(err) = legacy.remove_item(LEGACY_AUTH_KEY) {
        // Credentials are stored; a stale legacy key is the lesser evil.
        log::warn!("migrated credentials but could not delete legacy key: {err}");
    }
    log::info!("migrated legacy credentials");
    SectionOutcome::Migrated { records: 1 }
}

/// The legacy persisted UI state nests viewed book ids at
/// `state.viewedBooks`. Each id is re-added through the store (keeping
/// the dedup/cap rules), then the blob is rewritten with that array
/// emptied and everything else preserved.
async fn migrate_viewed_books(store: &LocalStore, legacy: &LegacyStore) -> SectionOutcome {
    let raw = match legacy.get_item(LEGACY_BOOK_STORAGE_KEY) {
        Some(raw) => raw,
        None => return SectionOutcome::Empty,
    };

    let mut blob: Value = match serde_json::from_str(&raw) {
        Ok(blob) => blob,
        Err(err) => return SectionOutcome::Failed { reason: err.to_string() },
    };
    let ids: Vec<i64> = blob
        .get("state")
        .and_then(|state| state.get("viewedBooks"))
        .and_then(Value::as_array)
        .map(|entries| entries.iter().filter_map(legacy_book_id).collect())
        .unwrap_or_default();
    if ids.is_empty() {
        return SectionOutcome::Empty;
    }

    let mut migrated = 0usize;
    for id in &ids {
        match store.viewed_books().add(*id).await {
            Ok(()) => migrated += 1,
            Err(err) => return SectionOutcome::Failed { reason: err.to_string() },
        }
    }

    if let Some(state) = blob.get_mut("state") {
        if let Some(slot) = state.get_mut("viewedBooks") {
            *slot = Value::Array(vec![]);
        }
    }
    match serde_json::to_string(&blob) {
        Ok(rewritten) => {
            if let Err(err) = legacy.set_item(LEGACY_BOOK_STORAGE_KEY, &rewritten) {
                log::warn!("migrated viewed books but could not rewrite legacy blob: {err}");
            }
        }
        Err(err) => log::warn!("could not re-encode legacy blob: {err}"),
    }

    log::info!("migrated {migrated} viewed book records");
    SectionOutcome::Migrated { records: migrated }
}

fn legacy_book_id(value: &Value) -> Option<i64> {
    match value {
        Value::Number(number) => number.as_i64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

/// Copy the allow-listed preference keys into `user_data`. Values are
/// JSON when they parse, opaque strings otherwise. The legacy keys are
/// deliberately left in place.
async fn migrate_preferences(store: &LocalStore, legacy: &LegacyStore) -> SectionOutcome {
    let mut migrated = 0usize;
    for key in LEGACY_PREFERENCE_KEYS {
        let raw = match legacy.get_item(key) {
            Some(raw) => raw,
            None => continue,
        };
        let value = serde_json::from_str::<Value>(&raw).unwrap_or(Value::String(raw));
        match store.user_data().set(key, &value).await {
            Ok(()) => migrated += 1,
            Err(err) => return SectionOutcome::Failed { reason: err.to_string() },
        }
    }
    if migrated == 0 {
        SectionOutcome::Empty
    } else {
        log::info!("migrated {migrated} legacy preference keys");
        SectionOutcome::Migrated { records: migrated }
    }
}
