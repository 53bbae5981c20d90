use std::{collections::HashMap, fmt, str::FromStr};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::{broadcast, RwLock};
use tokio_stream::wrappers::BroadcastStream;
use tracing::error;

use shared::domain::WorkspaceId;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Keys addressing the device store. The string rendering doubles as the
/// persistence key, so it must stay stable across releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    Workspace(WorkspaceId),
    CurrencyList,
    Betas,
    PersonalDetails,
    LoginList,
}

impl fmt::Display for StoreKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreKey::Workspace(id) => write!(f, "workspace_{}", id.0),
            StoreKey::CurrencyList => f.write_str("currency_list"),
            StoreKey::Betas => f.write_str("betas"),
            StoreKey::PersonalDetails => f.write_str("personal_details"),
            StoreKey::LoginList => f.write_str("login_list"),
        }
    }
}

impl FromStr for StoreKey {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        if let Some(id) = raw.strip_prefix("workspace_") {
            let id: i64 = id
                .parse()
                .with_context(|| format!("invalid workspace id in store key '{raw}'"))?;
            return Ok(StoreKey::Workspace(WorkspaceId(id)));
        }
        match raw {
            "currency_list" => Ok(StoreKey::CurrencyList),
            "betas" => Ok(StoreKey::Betas),
            "personal_details" => Ok(StoreKey::PersonalDetails),
            "login_list" => Ok(StoreKey::LoginList),
            _ => Err(anyhow!("unrecognized store key '{raw}'")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreChange {
    pub key: StoreKey,
    pub value: Value,
    pub at: DateTime<Utc>,
}

/// Reactive key-value facade consumers depend on. Writes are fire-and-forget:
/// persistence problems are logged, never surfaced to UI code paths.
#[async_trait]
pub trait ObservableStore: Send + Sync {
    async fn get(&self, key: &StoreKey) -> Option<Value>;
    async fn set(&self, key: StoreKey, value: Value);
    async fn merge(&self, key: StoreKey, patch: Value);
    fn subscribe(&self) -> broadcast::Receiver<StoreChange>;
}

/// Typed read on top of the raw JSON store.
pub async fn read_as<T: DeserializeOwned>(store: &dyn ObservableStore, key: &StoreKey) -> Option<T> {
    let value = store.get(key).await?;
    match serde_json::from_value(value) {
        Ok(parsed) => Some(parsed),
        Err(err) => {
            error!("store: value under {key} does not match the requested shape err={err}");
            None
        }
    }
}

/// JSON merge-patch: objects merge recursively, an explicit null removes the
/// field, everything else replaces the previous value wholesale.
pub fn merge_values(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(existing), Value::Object(incoming)) => {
            for (field, incoming_value) in incoming {
                if incoming_value.is_null() {
                    existing.remove(&field);
                    continue;
                }
                match existing.get_mut(&field) {
                    Some(current) => merge_values(current, incoming_value),
                    None => {
                        existing.insert(field, incoming_value);
                    }
                }
            }
        }
        (slot, incoming) => *slot = incoming,
    }
}

/// Device-local observable store: an in-memory JSON map with write-through
/// SQLite persistence and a broadcast channel carrying every change.
pub struct DeviceStore {
    pool: Pool<Sqlite>,
    cache: RwLock<HashMap<StoreKey, Value>>,
    changes: broadcast::Sender<StoreChange>,
}

impl DeviceStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .with_context(|| format!("failed to open device store at '{database_url}'"))?;
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        let store = Self {
            pool,
            cache: RwLock::new(HashMap::new()),
            changes,
        };
        store.ensure_entries_table().await?;
        store.load_persisted_entries().await?;
        Ok(store)
    }

    pub async fn in_memory() -> Result<Self> {
        Self::new("sqlite::memory:").await
    }

    pub fn change_stream(&self) -> BroadcastStream<StoreChange> {
        BroadcastStream::new(self.changes.subscribe())
    }

    async fn ensure_entries_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                key        TEXT PRIMARY KEY,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create kv_entries table")?;
        Ok(())
    }

    async fn load_persisted_entries(&self) -> Result<()> {
        let rows = sqlx::query("SELECT key, value FROM kv_entries")
            .fetch_all(&self.pool)
            .await
            .context("failed to load persisted store entries")?;
        let mut cache = self.cache.write().await;
        for row in rows {
            let raw_key: String = row.get("key");
            let raw_value: String = row.get("value");
            let key = match raw_key.parse::<StoreKey>() {
                Ok(key) => key,
                Err(err) => {
                    error!("store: skipping persisted entry with unrecognized key {raw_key} err={err}");
                    continue;
                }
            };
            match serde_json::from_str(&raw_value) {
                Ok(value) => {
                    cache.insert(key, value);
                }
                Err(err) => error!("store: skipping corrupt persisted value under {raw_key} err={err}"),
            }
        }
        Ok(())
    }

    async fn persist(&self, key: &StoreKey, value: &Value) {
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(err) => {
                error!("store: failed to serialize value under {key} err={err}");
                return;
            }
        };
        if let Err(err) = sqlx::query(
            "INSERT INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, CURRENT_TIMESTAMP)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key.to_string())
        .bind(serialized)
        .execute(&self.pool)
        .await
        {
            error!("store: failed to persist {key} err={err}");
        }
    }

    fn publish(&self, key: StoreKey, value: Value) {
        let _ = self.changes.send(StoreChange {
            key,
            value,
            at: Utc::now(),
        });
    }
}

#[async_trait]
impl ObservableStore for DeviceStore {
    async fn get(&self, key: &StoreKey) -> Option<Value> {
        self.cache.read().await.get(key).cloned()
    }

    async fn set(&self, key: StoreKey, value: Value) {
        self.cache.write().await.insert(key, value.clone());
        self.persist(&key, &value).await;
        self.publish(key, value);
    }

    async fn merge(&self, key: StoreKey, patch: Value) {
        let merged = {
            let mut cache = self.cache.write().await;
            let slot = cache
                .entry(key)
                .or_insert_with(|| Value::Object(Default::default()));
            merge_values(slot, patch);
            slot.clone()
        };
        self.persist(&key, &merged).await;
        self.publish(key, merged);
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
