//! Small key-value record stores used to cache client session state between runs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use tokio::sync::RwLock;
use tracing::debug;

const MEMORY_DATABASE_URL: &str = "sqlite::memory:";

/// Flat JSON record store. Values are whole JSON documents keyed by name.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>>;
    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>>;
    /// Writes every entry or none of them.
    async fn set_many(&self, entries: &[(&str, Value)]) -> Result<()>;
    async fn remove(&self, keys: &[&str]) -> Result<()>;
    async fn clear(&self) -> Result<()>;

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_many(&[(key, value)]).await
    }
}

#[derive(Clone)]
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .with_context(|| format!("invalid sqlite url '{database_url}'"))?
            .create_if_missing(true);
        // Every in-memory connection is its own database.
        let max_connections = if database_url.starts_with(MEMORY_DATABASE_URL) {
            1
        } else {
            5
        };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(connect_options)
            .await?;

        let store = Self { pool };
        store.ensure_records_table().await?;
        debug!(%database_url, "opened key-value store");
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }

    async fn ensure_records_table(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_records (
                record_key  TEXT PRIMARY KEY NOT NULL,
                record_json TEXT NOT NULL,
                updated_at  TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .context("failed to create kv_records table")?;
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        let row = sqlx::query("SELECT record_json FROM kv_records WHERE record_key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|row| decode_record(key, row.get::<String, _>("record_json")))
            .transpose()
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let mut records = HashMap::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(key).await? {
                records.insert((*key).to_string(), value);
            }
        }
        Ok(records)
    }

    async fn set_many(&self, entries: &[(&str, Value)]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for (key, value) in entries {
            sqlx::query(
                r#"
                INSERT INTO kv_records (record_key, record_json, updated_at)
                VALUES (?, ?, CURRENT_TIMESTAMP)
                ON CONFLICT(record_key) DO UPDATE SET
                    record_json = excluded.record_json,
                    updated_at = CURRENT_TIMESTAMP
                "#,
            )
            .bind(*key)
            .bind(serde_json::to_string(value)?)
            .execute(&mut *tx)
            .await
            .with_context(|| format!("failed to write record '{key}'"))?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for key in keys {
            sqlx::query("DELETE FROM kv_records WHERE record_key = ?")
                .bind(*key)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        sqlx::query("DELETE FROM kv_records")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

fn decode_record(key: &str, raw: String) -> Result<Value> {
    serde_json::from_str(&raw).with_context(|| format!("record '{key}' is not valid json"))
}

/// Process-local store; nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        Ok(self.records.read().await.get(key).cloned())
    }

    async fn get_many(&self, keys: &[&str]) -> Result<HashMap<String, Value>> {
        let guard = self.records.read().await;
        Ok(keys
            .iter()
            .filter_map(|key| guard.get(*key).map(|value| ((*key).to_string(), value.clone())))
            .collect())
    }

    async fn set_many(&self, entries: &[(&str, Value)]) -> Result<()> {
        let mut guard = self.records.write().await;
        for (key, value) in entries {
            guard.insert((*key).to_string(), value.clone());
        }
        Ok(())
    }

    async fn remove(&self, keys: &[&str]) -> Result<()> {
        let mut guard = self.records.write().await;
        for key in keys {
            guard.remove(*key);
        }
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.records.write().await.clear();
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with(MEMORY_DATABASE_URL) || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
