//! SQLite-backed store for conversations, messages, and document records.
//!
//! One connection behind a mutex; every write commits immediately. The
//! schema matches the service's three aggregates:
//!
//! - `conversations` -- `{id, title, created_at, updated_at}`; `updated_at`
//!   is refreshed on every appended message.
//! - `messages` -- immutable once created; `id` is the chronological order
//!   within a conversation (autoincrement), which is what context building
//!   keys on so same-second inserts stay strictly ordered.
//! - `documents` -- upload bookkeeping for the knowledge base.

use std::path::Path;

use chrono::Utc;
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;

use mn_domain::error::{Error, Result};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize)]
pub struct Conversation {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Conversation list entry with its message count.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationSummary {
    pub id: i64,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub message_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessageRow {
    pub id: i64,
    pub conversation_id: i64,
    /// "user" or "assistant".
    pub role: String,
    pub content: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    pub filename: String,
    pub file_type: String,
    pub file_path: String,
    pub file_size: i64,
    pub chunk_count: i64,
    pub created_at: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Database
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct Database {
    conn: Mutex<Connection>,
}

fn from_sql(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

impl Database {
    /// Open (and migrate) the database at `path`, creating parent
    /// directories as needed.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(Error::Io)?;
        }
        let conn = Connection::open(path).map_err(from_sql)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        tracing::info!(path = %path.display(), "database opened");
        Ok(db)
    }

    /// In-memory database for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(from_sql)?;
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                "
                PRAGMA journal_mode=WAL;
                PRAGMA foreign_keys=ON;

                CREATE TABLE IF NOT EXISTS conversations (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL DEFAULT 'New conversation',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS messages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    conversation_id INTEGER NOT NULL,
                    role TEXT NOT NULL CHECK (role IN ('user', 'assistant')),
                    content TEXT NOT NULL,
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
                );

                CREATE INDEX IF NOT EXISTS idx_messages_conversation
                    ON messages(conversation_id);

                CREATE TABLE IF NOT EXISTS documents (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    filename TEXT NOT NULL,
                    file_type TEXT NOT NULL,
                    file_path TEXT NOT NULL,
                    file_size INTEGER NOT NULL DEFAULT 0,
                    chunk_count INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL
                );
                ",
            )
            .map_err(from_sql)
    }

    // ── Conversations ─────────────────────────────────────────────────

    pub fn create_conversation(&self, title: &str) -> Result<Conversation> {
        let conn = self.conn.lock();
        let ts = now();
        conn.execute(
            "INSERT INTO conversations (title, created_at, updated_at) VALUES (?1, ?2, ?2)",
            params![title, ts],
        )
        .map_err(from_sql)?;
        let id = conn.last_insert_rowid();
        Ok(Conversation {
            id,
            title: title.to_owned(),
            created_at: ts.clone(),
            updated_at: ts,
        })
    }

    pub fn get_conversation(&self, id: i64) -> Result<Option<Conversation>> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, title, created_at, updated_at FROM conversations WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Conversation {
                        id: row.get(0)?,
                        title: row.get(1)?,
                        created_at: row.get(2)?,
                        updated_at: row.get(3)?,
                    })
                },
            )
            .optional()
            .map_err(from_sql)
    }

    /// All conversations, most recently updated first, with message counts.
    pub fn list_conversations(&self) -> Result<Vec<ConversationSummary>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT c.id, c.title, c.created_at, c.updated_at,
                        (SELECT COUNT(*) FROM messages m WHERE m.conversation_id = c.id)
                 FROM conversations c
                 ORDER BY c.updated_at DESC, c.id DESC",
            )
            .map_err(from_sql)?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ConversationSummary {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: row.get(2)?,
                    updated_at: row.get(3)?,
                    message_count: row.get(4)?,
                })
            })
            .map_err(from_sql)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(from_sql)
    }

    pub fn update_conversation_title(&self, id: i64, title: &str) -> Result<()> {
        self.conn
            .lock()
            .execute(
                "UPDATE conversations SET title = ?1, updated_at = ?2 WHERE id = ?3",
                params![title, now(), id],
            )
            .map_err(from_sql)?;
        Ok(())
    }

    /// Delete a conversation and its messages.
    pub fn delete_conversation(&self, id: i64) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "DELETE FROM messages WHERE conversation_id = ?1",
            params![id],
        )
        .map_err(from_sql)?;
        conn.execute("DELETE FROM conversations WHERE id = ?1", params![id])
            .map_err(from_sql)?;
        Ok(())
    }

    // ── Messages ──────────────────────────────────────────────────────

    /// Append a message and refresh the conversation's `updated_at`.
    pub fn append_message(
        &self,
        conversation_id: i64,
        role: &str,
        content: &str,
    ) -> Result<MessageRow> {
        let conn = self.conn.lock();
        let ts = now();
        conn.execute(
            "INSERT INTO messages (conversation_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![conversation_id, role, content, ts],
        )
        .map_err(from_sql)?;
        let id = conn.last_insert_rowid();
        conn.execute(
            "UPDATE conversations SET updated_at = ?1 WHERE id = ?2",
            params![ts, conversation_id],
        )
        .map_err(from_sql)?;
        Ok(MessageRow {
            id,
            conversation_id,
            role: role.to_owned(),
            content: content.to_owned(),
            created_at: ts,
        })
    }

    /// All messages of a conversation in chronological order.
    pub fn messages(&self, conversation_id: i64) -> Result<Vec<MessageRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1 ORDER BY id ASC",
            )
            .map_err(from_sql)?;
        let rows = stmt
            .query_map(params![conversation_id], map_message)
            .map_err(from_sql)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(from_sql)
    }

    /// The most recent `limit` messages in chronological order (oldest
    /// first). This ordering becomes the model's input sequence, so it is
    /// preserved exactly.
    pub fn recent_messages(&self, conversation_id: i64, limit: usize) -> Result<Vec<MessageRow>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, conversation_id, role, content, created_at
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(from_sql)?;
        let rows = stmt
            .query_map(params![conversation_id, limit as i64], map_message)
            .map_err(from_sql)?;
        let mut messages = rows
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(from_sql)?;
        messages.reverse();
        Ok(messages)
    }

    // ── Documents ─────────────────────────────────────────────────────

    pub fn insert_document(
        &self,
        filename: &str,
        file_type: &str,
        file_path: &str,
        file_size: i64,
        chunk_count: i64,
    ) -> Result<DocumentRecord> {
        let conn = self.conn.lock();
        let ts = now();
        conn.execute(
            "INSERT INTO documents (filename, file_type, file_path, file_size, chunk_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![filename, file_type, file_path, file_size, chunk_count, ts],
        )
        .map_err(from_sql)?;
        Ok(DocumentRecord {
            id: conn.last_insert_rowid(),
            filename: filename.to_owned(),
            file_type: file_type.to_owned(),
            file_path: file_path.to_owned(),
            file_size,
            chunk_count,
            created_at: ts,
        })
    }

    pub fn get_document(&self, id: i64) -> Result<Option<DocumentRecord>> {
        self.conn
            .lock()
            .query_row(
                "SELECT id, filename, file_type, file_path, file_size, chunk_count, created_at
                 FROM documents WHERE id = ?1",
                params![id],
                map_document,
            )
            .optional()
            .map_err(from_sql)
    }

    /// All document records, newest first.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                "SELECT id, filename, file_type, file_path, file_size, chunk_count, created_at
                 FROM documents ORDER BY id DESC",
            )
            .map_err(from_sql)?;
        let rows = stmt.query_map([], map_document).map_err(from_sql)?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(from_sql)
    }

    pub fn delete_document(&self, id: i64) -> Result<()> {
        self.conn
            .lock()
            .execute("DELETE FROM documents WHERE id = ?1", params![id])
            .map_err(from_sql)?;
        Ok(())
    }
}

fn map_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageRow> {
    Ok(MessageRow {
        id: row.get(0)?,
        conversation_id: row.get(1)?,
        role: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn map_document(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        filename: row.get(1)?,
        file_type: row.get(2)?,
        file_path: row.get(3)?,
        file_size: row.get(4)?,
        chunk_count: row.get(5)?,
        created_at: row.get(6)?,
    })
}
