use crate::error::PollError;
use crate::models::ClientVoteState;
use async_trait::async_trait;
use chrono::Utc;
use log::{debug, warn};
use sqlx::{migrate::MigrateDatabase, sqlite::{SqlitePool, SqlitePoolOptions}, Row, Sqlite};

#[cfg(test)]
mod memory;
#[cfg(test)]
pub use memory::MemoryStore;

/// Durable "have I voted" entry for a poll.
pub fn vote_key(poll_id: &str) -> String {
    format!("poll_vote_{}", poll_id)
}

/// Session entry holding the featured poll ids of a category board.
pub fn featured_key(category_key: &str) -> String {
    format!("featured_polls_{}", category_key)
}

/// Injectable get/set/remove capability. Profile and session scopes are
/// simply two instances.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PollError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), PollError>;
    async fn remove(&self, key: &str) -> Result<(), PollError>;
}

// Read the remembered vote for a poll. Store failures read as "not voted".
pub async fn load_vote_state(store: &dyn KeyValueStore, poll_id: &str) -> ClientVoteState {
    let voted_option = match store.get(&vote_key(poll_id)).await {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            warn!("Could not read vote state for poll {}: {}", poll_id, e);
            None
        }
    };
    ClientVoteState {
        poll_id: poll_id.to_string(),
        voted_option,
    }
}

pub async fn save_vote_state(store: &dyn KeyValueStore, state: &ClientVoteState) -> Result<(), PollError> {
    match &state.voted_option {
        Some(option) => store.set(&vote_key(&state.poll_id), option).await,
        None => store.remove(&vote_key(&state.poll_id)).await,
    }
}

// Malformed or missing entries read as an empty selection.
pub async fn load_featured(store: &dyn KeyValueStore, category_key: &str) -> Vec<String> {
    let raw = match store.get(&featured_key(category_key)).await {
        Ok(Some(raw)) => raw,
        Ok(None) => return Vec::new(),
        Err(e) => {
            warn!("Could not read featured selection for {}: {}", category_key, e);
            return Vec::new();
        }
    };
    match serde_json::from_str::<Vec<String>>(&raw) {
        Ok(ids) => ids,
        Err(e) => {
            warn!("Discarding malformed featured selection for {}: {}", category_key, e);
            Vec::new()
        }
    }
}

pub async fn save_featured(store: &dyn KeyValueStore, category_key: &str, ids: &[String]) -> Result<(), PollError> {
    let raw = serde_json::to_string(ids)?;
    store.set(&featured_key(category_key), &raw).await
}

/// sqlite-backed store. Several namespaces can share one database file.
pub struct SqliteStore {
    pool: SqlitePool,
    namespace: String,
}

impl SqliteStore {
    pub async fn connect(db_url: &str, namespace: &str) -> Result<Self, PollError> {
        let in_memory = db_url.contains(":memory:");

        // Create database if it doesn't exist
        if !in_memory && !Sqlite::database_exists(db_url).await.unwrap_or(false) {
            Sqlite::create_database(db_url).await?;
        }

        // Every connection to :memory: is a fresh database, so keep exactly one alive
        let options = if in_memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };
        let pool = options.connect(db_url).await?;

        Self::init_schema(&pool).await?;

        Ok(Self {
            pool,
            namespace: namespace.to_string(),
        })
    }

    /// Another scope over the same database.
    pub fn with_namespace(&self, namespace: &str) -> Self {
        Self {
            pool: self.pool.clone(),
            namespace: namespace.to_string(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn init_schema(pool: &SqlitePool) -> Result<(), PollError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_entries (
                namespace TEXT NOT NULL,
                key TEXT NOT NULL,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (namespace, key)
            );
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    /// Drop every entry of this namespace, e.g. when a session ends.
    pub async fn clear(&self) -> Result<u64, PollError> {
        let result = sqlx::query("DELETE FROM kv_entries WHERE namespace = ?")
            .bind(&self.namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[async_trait]
impl KeyValueStore for SqliteStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PollError> {
        let row = sqlx::query("SELECT value FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| r.get::<String, _>("value")))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), PollError> {
        sqlx::query(
            r#"
            INSERT INTO kv_entries (namespace, key, value, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(namespace, key)
            DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(&self.namespace)
        .bind(key)
        .bind(value)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await?;
        debug!("[{}] stored {}", self.namespace, key);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), PollError> {
        sqlx::query("DELETE FROM kv_entries WHERE namespace = ? AND key = ?")
            .bind(&self.namespace)
            .bind(key)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_patterns() {
        assert_eq!(vote_key("p1"), "poll_vote_p1");
        assert_eq!(featured_key("vehicle:limousine"), "featured_polls_vehicle:limousine");
    }

    #[tokio::test]
    async fn sqlite_roundtrip_and_namespaces() {
        let profile = SqliteStore::connect("sqlite::memory:", "profile").await.unwrap();
        let session = profile.with_namespace("session:abc");

        profile.set("poll_vote_p1", "B").await.unwrap();
        assert_eq!(profile.get("poll_vote_p1").await.unwrap().as_deref(), Some("B"));
        assert_eq!(session.get("poll_vote_p1").await.unwrap(), None);

        profile.set("poll_vote_p1", "A").await.unwrap();
        assert_eq!(profile.get("poll_vote_p1").await.unwrap().as_deref(), Some("A"));

        session.set("featured_polls_x", "[\"p1\"]").await.unwrap();
        assert_eq!(session.clear().await.unwrap(), 1);
        assert_eq!(session.get("featured_polls_x").await.unwrap(), None);

        profile.remove("poll_vote_p1").await.unwrap();
        assert_eq!(profile.get("poll_vote_p1").await.unwrap(), None);
    }

    #[tokio::test]
    async fn vote_state_helpers() {
        let store = MemoryStore::new();
        assert_eq!(load_vote_state(&store, "p1").await.voted_option, None);

        let state = ClientVoteState { poll_id: "p1".into(), voted_option: Some("B".into()) };
        save_vote_state(&store, &state).await.unwrap();
        assert_eq!(store.get("poll_vote_p1").await.unwrap().as_deref(), Some("B"));
        assert_eq!(load_vote_state(&store, "p1").await, state);

        let cleared = ClientVoteState { poll_id: "p1".into(), voted_option: None };
        save_vote_state(&store, &cleared).await.unwrap();
        assert_eq!(store.len(), 0);
    }

    #[tokio::test]
    async fn featured_helpers_tolerate_garbage() {
        let store = MemoryStore::new();
        assert!(load_featured(&store, "event:prom").await.is_empty());

        store.set(&featured_key("event:prom"), "not json").await.unwrap();
        assert!(load_featured(&store, "event:prom").await.is_empty());

        let ids = vec!["a".to_string(), "b".to_string()];
        save_featured(&store, "event:prom", &ids).await.unwrap();
        assert_eq!(load_featured(&store, "event:prom").await, ids);
    }
}
