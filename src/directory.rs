use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::types::ChatIdentity;

/// A chat identity that has interacted with the bot at least once.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub chat_id: ChatIdentity,
    pub first_seen: String,
    pub last_seen: String,
}

impl UserRecord {
    /// First contact. Timestamps have one-second resolution, so a repeat
    /// visit within the same second also reads as new.
    pub fn is_new(&self) -> bool {
        self.first_seen == self.last_seen
    }
}

fn parse_user_row(row: &rusqlite::Row) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        chat_id: ChatIdentity(row.get(0)?),
        first_seen: row.get(1)?,
        last_seen: row.get(2)?,
    })
}

/// Durable record of everyone who has talked to the bot.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Insert the identity, or refresh `last_seen` if it is already known.
    async fn upsert(&self, chat_id: ChatIdentity) -> Result<UserRecord>;

    async fn count(&self) -> Result<u64>;

    async fn list_all(&self) -> Result<Vec<ChatIdentity>>;
}

/// Thread-safe SQLite user directory
#[derive(Clone)]
pub struct SqliteDirectory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteDirectory {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        Self::run_migrations(&conn)?;

        info!("User directory initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (tests, or deployments without storage)
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS users (
                chat_id INTEGER PRIMARY KEY,
                first_seen TEXT NOT NULL DEFAULT (datetime('now')),
                last_seen TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )
        .context("Failed to create users table")?;
        Ok(())
    }
}

#[async_trait]
impl UserDirectory for SqliteDirectory {
    async fn upsert(&self, chat_id: ChatIdentity) -> Result<UserRecord> {
        let conn = self.conn.lock().await;
        conn.query_row(
            "INSERT INTO users (chat_id) VALUES (?1)
             ON CONFLICT(chat_id) DO UPDATE SET last_seen = datetime('now')
             RETURNING chat_id, first_seen, last_seen",
            rusqlite::params![chat_id.0],
            parse_user_row,
        )
        .context("Failed to upsert user")
    }

    async fn count(&self) -> Result<u64> {
        let conn = self.conn.lock().await;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))
            .context("Failed to count users")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn list_all(&self) -> Result<Vec<ChatIdentity>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare("SELECT chat_id FROM users ORDER BY first_seen ASC, chat_id ASC")
            .context("Failed to prepare user listing")?;
        let ids = stmt
            .query_map([], |row| Ok(ChatIdentity(row.get(0)?)))
            .context("Failed to map rows")?
            .collect::<rusqlite::Result<Vec<_>>>()
            .context("Failed to collect users")?;
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_and_count() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        dir.upsert(ChatIdentity(1)).await.unwrap();
        dir.upsert(ChatIdentity(2)).await.unwrap();
        dir.upsert(ChatIdentity(1)).await.unwrap();

        assert_eq!(dir.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_all_returns_every_identity() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        for id in [30, 10, 20] {
            dir.upsert(ChatIdentity(id)).await.unwrap();
        }

        let mut ids = dir.list_all().await.unwrap();
        ids.sort();
        assert_eq!(ids, vec![ChatIdentity(10), ChatIdentity(20), ChatIdentity(30)]);
    }

    #[tokio::test]
    async fn test_upsert_keeps_first_seen() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        dir.upsert(ChatIdentity(5)).await.unwrap();
        {
            let conn = dir.conn.lock().await;
            conn.execute(
                "UPDATE users SET first_seen = '2020-01-01 00:00:00',
                                  last_seen = '2020-01-01 00:00:00'",
                [],
            )
            .unwrap();
        }

        let record = dir.upsert(ChatIdentity(5)).await.unwrap();
        assert_eq!(record.chat_id, ChatIdentity(5));
        assert_eq!(record.first_seen, "2020-01-01 00:00:00");
        assert_ne!(record.last_seen, "2020-01-01 00:00:00");
        assert!(!record.is_new());
    }

    #[tokio::test]
    async fn test_first_upsert_is_new() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        let record = dir.upsert(ChatIdentity(404)).await.unwrap();
        assert!(record.is_new());
    }

    #[tokio::test]
    async fn test_empty_directory() {
        let dir = SqliteDirectory::open_in_memory().unwrap();
        assert_eq!(dir.count().await.unwrap(), 0);
        assert!(dir.list_all().await.unwrap().is_empty());
    }
}
