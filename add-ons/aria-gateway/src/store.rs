//! SQLite store for users and conversation turns (bare-metal local DB).
//!
//! Schema follows the analytics shape: each turn row carries an optional
//! sentiment polarity (user turns) and pipeline latency in ms (assistant
//! turns). Connections are opened per operation; queries are small and local.

use aria_voice::{AuthService, ChatMessage, ConversationStore, VoiceError, VoiceResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
}

fn db_err(e: rusqlite::Error) -> VoiceError {
    VoiceError::ExternalService(format!("sqlite: {e}"))
}

impl SqliteStore {
    pub fn new(db_path: impl Into<PathBuf>) -> VoiceResult<Self> {
        let this = Self {
            db_path: db_path.into(),
        };
        this.init()?;
        Ok(this)
    }

    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn open(&self) -> VoiceResult<Connection> {
        Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE,
        )
        .map_err(db_err)
    }

    fn init(&self) -> VoiceResult<()> {
        if let Some(parent) = self.db_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let conn = self.open()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                api_token TEXT UNIQUE,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS conversations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                sentiment_score REAL,
                latency_ms INTEGER,
                FOREIGN KEY(user_id) REFERENCES users(id)
            );

            CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id);
            "#,
        )
        .map_err(db_err)?;
        Ok(())
    }

    /// Insert or refresh a user row keyed by email; returns the user id.
    pub fn ensure_user(&self, email: &str, password_hash: &str, api_token: &str) -> VoiceResult<i64> {
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO users (email, password_hash, api_token, created_at)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(email) DO UPDATE SET api_token = excluded.api_token
            "#,
            params![email, password_hash, api_token, chrono::Utc::now().to_rfc3339()],
        )
        .map_err(db_err)?;
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE email = ?1",
                params![email],
                |r| r.get(0),
            )
            .map_err(db_err)?;
        Ok(id)
    }

    /// Resolve an API token to a user id, if any.
    pub fn lookup_token(&self, token: &str) -> VoiceResult<Option<i64>> {
        if token.is_empty() {
            return Ok(None);
        }
        let conn = self.open()?;
        conn.query_row(
            "SELECT id FROM users WHERE api_token = ?1",
            params![token],
            |r| r.get(0),
        )
        .optional()
        .map_err(db_err)
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    async fn read_history(&self, user_id: i64, limit: usize) -> VoiceResult<Vec<ChatMessage>> {
        let conn = self.open()?;
        let mut stmt = conn
            .prepare(
                "SELECT role, content FROM conversations WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
            )
            .map_err(db_err)?;
        let mut rows: Vec<ChatMessage> = stmt
            .query_map(params![user_id, limit as i64], |r| {
                Ok(ChatMessage {
                    role: r.get(0)?,
                    content: r.get(1)?,
                })
            })
            .map_err(db_err)?
            .collect::<Result<Vec<_>, _>>()
            .map_err(db_err)?;
        // Oldest first for the prompt.
        rows.reverse();
        Ok(rows)
    }

    async fn append_turn(
        &self,
        user_id: i64,
        role: &str,
        content: &str,
        sentiment: Option<f32>,
        latency_ms: Option<u64>,
    ) -> VoiceResult<()> {
        let conn = self.open()?;
        conn.execute(
            r#"
            INSERT INTO conversations (user_id, role, content, timestamp, sentiment_score, latency_ms)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
            params![
                user_id,
                role,
                content,
                chrono::Utc::now().to_rfc3339(),
                sentiment.map(|s| s as f64),
                latency_ms.map(|l| l as i64),
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

/// Auth backed by the users table: the bearer token presented at accept is an
/// API token column lookup.
pub struct SqliteAuth {
    store: Arc<SqliteStore>,
}

impl SqliteAuth {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthService for SqliteAuth {
    async fn decode(&self, token: &str) -> VoiceResult<i64> {
        self.store
            .lookup_token(token)?
            .ok_or_else(|| VoiceError::Auth("invalid or missing token".to_string()))
    }
}
