//! SQLite-backed kv, secret and settings stores for the stdio host.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::host::{ConfigurationStore, KvStore, SecretStore};

/// Single-connection store; every capability it implements shares the file.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA busy_timeout = 5000;
            ",
        )?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run migrations on this store
    pub fn migrate(&self) -> Result<()> {
        let conn = self.connection()?;
        super::schema::run_migrations(&conn)
    }

    fn connection(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("database connection lock poisoned".to_string()))
    }

    fn get_json(&self, table: &str, key: &str) -> Result<Option<Value>> {
        let conn = self.connection()?;
        let raw: Option<String> = conn
            .query_row(
                &format!("SELECT value FROM {} WHERE key = ?1", table),
                [key],
                |row| row.get(0),
            )
            .optional()?;
        match raw {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    fn set_json(&self, table: &str, key: &str, value: &Value) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            &format!(
                "INSERT INTO {} (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                table
            ),
            params![key, serde_json::to_string(value)?, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn delete_key(&self, table: &str, key: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(&format!("DELETE FROM {} WHERE key = ?1", table), [key])?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.get_json("kv", key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        self.set_json("kv", key, &value)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.delete_key("kv", key)
    }
}

#[async_trait]
impl SecretStore for SqliteStore {
    async fn get(&self, name: &str) -> Result<Option<String>> {
        let conn = self.connection()?;
        let value = conn
            .query_row("SELECT value FROM secrets WHERE name = ?1", [name], |row| {
                row.get(0)
            })
            .optional()?;
        Ok(value)
    }

    async fn store(&self, name: &str, value: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO secrets (name, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(name) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![name, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let conn = self.connection()?;
        conn.execute("DELETE FROM secrets WHERE name = ?1", [name])?;
        Ok(())
    }
}

#[async_trait]
impl ConfigurationStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<Value>> {
        self.get_json("settings", key)
    }

    async fn set(&self, key: &str, value: Value) -> Result<()> {
        if value.is_null() {
            self.delete_key("settings", key)
        } else {
            self.set_json("settings", key, &value)
        }
    }
}
