//! SQLite-backed conversation history store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::error::{Error, Result};
use crate::state::{Message, Role};

use super::HistoryStore;

/// SQLite-backed history store.
pub struct SqliteHistoryStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteHistoryStore {
    /// Open or create a history store at the given path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| Error::History(e.to_string()))?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Create an in-memory store (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::History(e.to_string()))?;
        initialize_schema(&conn)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> rusqlite::Result<T>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|e| Error::Internal(format!("failed to lock connection: {e}")))?;
        f(&conn).map_err(|e| Error::History(e.to_string()))
    }
}

fn initialize_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject TEXT NOT NULL,
            role TEXT NOT NULL,
            content TEXT NOT NULL,
            created_at TEXT,
            annotations TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_messages_subject ON messages(subject);",
    )
    .map_err(|e| Error::History(e.to_string()))
}

fn role_from_str(role: &str) -> Role {
    match role {
        "system" => Role::System,
        "assistant" => Role::Assistant,
        _ => Role::User,
    }
}

impl HistoryStore for SqliteHistoryStore {
    fn load(&self, subject_identity: &str) -> Result<Vec<Message>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT role, content, created_at, annotations
                 FROM messages WHERE subject = ?1 ORDER BY id",
            )?;

            let rows = stmt.query_map(params![subject_identity], |row| {
                let role: String = row.get(0)?;
                let content: String = row.get(1)?;
                let created_at: Option<String> = row.get(2)?;
                let annotations: Option<String> = row.get(3)?;

                Ok(Message {
                    role: role_from_str(&role),
                    content,
                    timestamp: created_at
                        .as_deref()
                        .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
                        .map(|t| t.with_timezone(&Utc)),
                    annotations: annotations
                        .as_deref()
                        .and_then(|a| serde_json::from_str(a).ok()),
                })
            })?;

            rows.collect()
        })
    }

    fn append(&self, subject_identity: &str, message: &Message) -> Result<()> {
        let annotations = message
            .annotations
            .as_ref()
            .map(|a| serde_json::to_string(a))
            .transpose()?;

        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (subject, role, content, created_at, annotations)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    subject_identity,
                    message.role.to_string(),
                    message.content,
                    message.timestamp.map(|t| t.to_rfc3339()),
                    annotations,
                ],
            )?;
            Ok(())
        })
    }
}
