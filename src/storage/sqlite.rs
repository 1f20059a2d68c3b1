//! SQLite-backed conversation store
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix) so that ordering by the text column is ordering
//! by time.

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::ConversationStore;
use crate::chat::model::{Conversation, ConversationId, Message, MessageId, MessageRole};

const CONVERSATION_COLUMNS: &str = "id, title, created_at, updated_at, is_pinned, model_id";

const RECENT_ORDER: &str = "ORDER BY is_pinned DESC, updated_at DESC, rowid DESC";

/// Conversation store backed by a single SQLite connection
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl std::fmt::Debug for SqliteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteStore").finish_non_exhaustive()
    }
}

impl SqliteStore {
    /// Open (creating if needed) the database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create database directory")?;
        }

        let conn = Connection::open(path).context("Failed to open conversations database")?;

        // Enable WAL mode for better write performance
        conn.execute_batch("PRAGMA journal_mode=WAL;")
            .context("Failed to enable WAL mode")?;

        let store = Self::init(conn)?;
        info!(db_path = %path.display(), "Conversations database initialized");
        Ok(store)
    }

    /// Private in-memory database, used by tests and dry runs
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().context("Failed to open in-memory database")?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .context("Failed to enable foreign keys")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL DEFAULT '',
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                is_pinned INTEGER NOT NULL DEFAULT 0,
                model_id TEXT NOT NULL DEFAULT ''
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_updated_at
                ON conversations(updated_at DESC);
            CREATE INDEX IF NOT EXISTS idx_conversations_pinned_updated
                ON conversations(is_pinned DESC, updated_at DESC);

            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                conversation_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL,
                model_id TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (conversation_id) REFERENCES conversations(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_messages_conversation_created
                ON messages(conversation_id, created_at);
            "#,
        )
        .context("Failed to create conversation tables")?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn query_conversations(
        &self,
        sql: &str,
        params: impl rusqlite::Params,
    ) -> Result<Vec<Conversation>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(sql)
            .context("Failed to prepare conversation query")?;

        let conversations = stmt
            .query_map(params, row_to_conversation)
            .context("Failed to query conversations")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect conversations")?;
        Ok(conversations)
    }
}

impl ConversationStore for SqliteStore {
    fn create_conversation(&self, conversation: &Conversation) -> Result<ConversationId> {
        let conn = self.conn.lock();
        conn.execute(
            r#"
            INSERT INTO conversations (id, title, created_at, updated_at, is_pinned, model_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO NOTHING
            "#,
            params![
                conversation.id.as_str(),
                conversation.title,
                format_timestamp(&conversation.created_at),
                format_timestamp(&conversation.updated_at),
                conversation.is_pinned as i32,
                conversation.model_id,
            ],
        )
        .context("Failed to create conversation")?;

        debug!(conversation_id = %conversation.id, "Conversation created");
        Ok(conversation.id)
    }

    fn add_message(&self, message: &Message) -> Result<MessageId> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction()
            .context("Failed to begin message transaction")?;

        tx.execute(
            r#"
            INSERT INTO messages (id, conversation_id, role, content, created_at, model_id)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                content = excluded.content,
                model_id = excluded.model_id
            "#,
            params![
                message.id.as_str(),
                message.conversation_id.as_str(),
                message.role.as_str(),
                message.content,
                format_timestamp(&message.created_at),
                message.model_id,
            ],
        )
        .context("Failed to save message")?;

        tx.execute(
            "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
            params![
                message.conversation_id.as_str(),
                format_timestamp(&Utc::now())
            ],
        )
        .context("Failed to update conversation timestamp")?;

        tx.commit().context("Failed to commit message")?;

        debug!(
            message_id = %message.id,
            conversation_id = %message.conversation_id,
            role = %message.role,
            len = message.content.len(),
            "Message saved"
        );
        Ok(message.id)
    }

    fn list_recent(&self, limit: usize) -> Result<Vec<Conversation>> {
        let sql = format!(
            "SELECT {} FROM conversations {} LIMIT ?1",
            CONVERSATION_COLUMNS, RECENT_ORDER
        );
        let conversations = self.query_conversations(&sql, params![limit as i64])?;
        debug!(count = conversations.len(), "Listed recent conversations");
        Ok(conversations)
    }

    fn get_conversation(&self, id: &ConversationId) -> Result<Option<Conversation>> {
        let conn = self.conn.lock();
        let sql = format!("SELECT {} FROM conversations WHERE id = ?1", CONVERSATION_COLUMNS);
        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare get_conversation query")?;

        let result = stmt
            .query_row(params![id.as_str()], row_to_conversation)
            .optional()
            .context("Failed to get conversation")?;
        Ok(result)
    }

    fn get_messages(&self, conversation_id: &ConversationId) -> Result<Vec<Message>> {
        let conn = self.conn.lock();
        let mut stmt = conn
            .prepare(
                r#"
                SELECT id, conversation_id, role, content, created_at, model_id
                FROM messages
                WHERE conversation_id = ?1
                ORDER BY created_at ASC, rowid ASC
                "#,
            )
            .context("Failed to prepare get_messages query")?;

        let messages = stmt
            .query_map(params![conversation_id.as_str()], row_to_message)
            .context("Failed to get messages")?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to collect messages")?;
        Ok(messages)
    }

    fn delete_conversation(&self, id: &ConversationId) -> Result<bool> {
        let conn = self.conn.lock();
        let deleted = conn
            .execute(
                "DELETE FROM conversations WHERE id = ?1",
                params![id.as_str()],
            )
            .context("Failed to delete conversation")?;

        info!(conversation_id = %id, deleted = deleted > 0, "Conversation deleted");
        Ok(deleted > 0)
    }

    fn update_title(&self, id: &ConversationId, title: &str) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE conversations SET title = ?2 WHERE id = ?1",
            params![id.as_str(), title],
        )
        .context("Failed to update conversation title")?;

        debug!(conversation_id = %id, title = %title, "Conversation title updated");
        Ok(())
    }

    fn update_pin(&self, id: &ConversationId, pinned: bool) -> Result<()> {
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE conversations SET is_pinned = ?2 WHERE id = ?1",
            params![id.as_str(), pinned as i32],
        )
        .context("Failed to update conversation pin")?;

        debug!(conversation_id = %id, pinned, "Conversation pin updated");
        Ok(())
    }

    fn search_conversations(&self, query: &str, limit: usize) -> Result<Vec<Conversation>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_recent(limit);
        }

        // LIKE instead of FTS5: MATCH rejects quotes and other punctuation
        let pattern = format!("%{}%", escape_like(query));
        let sql = format!(
            r#"
            SELECT {} FROM conversations c
            WHERE c.title LIKE ?1 ESCAPE '\'
               OR EXISTS (
                   SELECT 1 FROM messages m
                   WHERE m.conversation_id = c.id AND m.content LIKE ?1 ESCAPE '\'
               )
            {}
            LIMIT ?2
            "#,
            CONVERSATION_COLUMNS, RECENT_ORDER
        );
        let conversations = self.query_conversations(&sql, params![pattern, limit as i64])?;

        debug!(query = %query, count = conversations.len(), "Conversation search completed");
        Ok(conversations)
    }
}

fn format_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_timestamp(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

/// Convert a database row to a Conversation
fn row_to_conversation(row: &rusqlite::Row) -> rusqlite::Result<Conversation> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let created_at_str: String = row.get(2)?;
    let updated_at_str: String = row.get(3)?;
    let is_pinned: i32 = row.get(4)?;
    let model_id: String = row.get(5)?;

    let id = ConversationId::parse(&id_str).ok_or_else(|| invalid_id(0, &id_str))?;

    Ok(Conversation {
        id,
        title,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
        is_pinned: is_pinned != 0,
        model_id,
    })
}

/// Convert a database row to a Message
fn row_to_message(row: &rusqlite::Row) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let conversation_id_str: String = row.get(1)?;
    let role_str: String = row.get(2)?;
    let content: String = row.get(3)?;
    let created_at_str: String = row.get(4)?;
    let model_id: String = row.get(5)?;

    let id = MessageId::parse(&id_str).ok_or_else(|| invalid_id(0, &id_str))?;
    let conversation_id = ConversationId::parse(&conversation_id_str)
        .ok_or_else(|| invalid_id(1, &conversation_id_str))?;
    let role = MessageRole::parse(&role_str).unwrap_or(MessageRole::User);

    Ok(Message {
        id,
        conversation_id,
        role,
        content,
        created_at: parse_timestamp(&created_at_str),
        model_id,
        is_streaming: false,
        error: None,
    })
}

fn invalid_id(column: usize, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        column,
        rusqlite::types::Type::Text,
        format!("invalid id: {}", value).into(),
    )
}

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;
