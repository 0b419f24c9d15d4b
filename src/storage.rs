//! State persistence
//!
//! The decision logic never touches storage directly; everything goes
//! through `SignalStore` so the backing can change without touching the
//! pipeline. `Database` is the sqlite default, `MemoryStore` backs tests
//! and dry runs.

use crate::error::Result;
use crate::notify::WebhookConfig;
use crate::types::{SignalOutcome, TradingSignal};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use tracing::info;

/// Everything the service persists between runs
#[derive(Debug, Clone, Default)]
pub struct PersistedState {
    pub signals: Vec<TradingSignal>,
    pub outcomes: Vec<SignalOutcome>,
    pub webhooks: Vec<WebhookConfig>,
}

#[async_trait]
pub trait SignalStore: Send + Sync {
    async fn load_state(&self) -> Result<PersistedState>;
    async fn save_state(&self, state: &PersistedState) -> Result<()>;
}

/// sqlite-backed store. Rows are JSON documents keyed by id; the schema
/// stays stable while the signal shape evolves.
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn connect(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| crate::error::BotError::Config(e.to_string()))?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path))
            .map_err(crate::error::BotError::Database)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS signals (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS outcomes (
                signal_id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS webhooks (
                id TEXT PRIMARY KEY,
                data TEXT NOT NULL
            )",
        )
        .execute(&pool)
        .await?;

        info!("Database connected: {}", path);
        Ok(Self { pool })
    }
}

#[async_trait]
impl SignalStore for Database {
    async fn load_state(&self) -> Result<PersistedState> {
        let mut state = PersistedState::default();

        for row in sqlx::query("SELECT data FROM signals")
            .fetch_all(&self.pool)
            .await?
        {
            let data: String = row.get("data");
            state.signals.push(serde_json::from_str(&data)?);
        }
        for row in sqlx::query("SELECT data FROM outcomes")
            .fetch_all(&self.pool)
            .await?
        {
            let data: String = row.get("data");
            state.outcomes.push(serde_json::from_str(&data)?);
        }
        for row in sqlx::query("SELECT data FROM webhooks")
            .fetch_all(&self.pool)
            .await?
        {
            let data: String = row.get("data");
            state.webhooks.push(serde_json::from_str(&data)?);
        }

        Ok(state)
    }

    async fn save_state(&self, state: &PersistedState) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM signals").execute(&mut *tx).await?;
        for signal in &state.signals {
            sqlx::query("INSERT INTO signals (id, data) VALUES (?, ?)")
                .bind(signal.id.to_string())
                .bind(serde_json::to_string(signal)?)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM outcomes").execute(&mut *tx).await?;
        for outcome in &state.outcomes {
            sqlx::query("INSERT INTO outcomes (signal_id, data) VALUES (?, ?)")
                .bind(outcome.signal_id.to_string())
                .bind(serde_json::to_string(outcome)?)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM webhooks").execute(&mut *tx).await?;
        for webhook in &state.webhooks {
            sqlx::query("INSERT INTO webhooks (id, data) VALUES (?, ?)")
                .bind(webhook.id.to_string())
                .bind(serde_json::to_string(webhook)?)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

/// In-memory store for tests and dry runs
#[derive(Default)]
pub struct MemoryStore {
    state: parking_lot::Mutex<PersistedState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SignalStore for MemoryStore {
    async fn load_state(&self) -> Result<PersistedState> {
        Ok(self.state.lock().clone())
    }

    async fn save_state(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock() = state.clone();
        Ok(())
    }
}
