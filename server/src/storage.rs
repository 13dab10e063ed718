//! Durable per-node store over three logical relations: `commits`, `users`,
//! `messages` (SPEC_FULL.md §4.1). Backed by an embedded SQLite database —
//! WAL journaling plus `synchronous = FULL` so every committing write is
//! fsynced before the pool hands control back, satisfying the durability
//! requirement without standing up a separate database service per node.

use std::collections::HashSet;
use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Sqlite, SqlitePool, Transaction};

use crate::models::{Commit, Message, User};

pub type Tx<'a> = Transaction<'a, Sqlite>;

#[derive(Clone)]
pub struct Storage {
    pool: SqlitePool,
}

impl Storage {
    /// Open (creating if absent) the node's SQLite file and run schema
    /// migrations if the tables are missing.
    pub async fn open(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite://{path}"))?
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Full);

        let pool = SqlitePoolOptions::new().max_connections(8).connect_with(options).await?;

        let storage = Storage { pool };
        storage.migrate().await?;
        Ok(storage)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS commits (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                request_blob TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                username TEXT PRIMARY KEY,
                password_hash TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id TEXT PRIMARY KEY,
                sender TEXT NOT NULL,
                recipient TEXT NOT NULL,
                body TEXT NOT NULL,
                timestamp REAL NOT NULL,
                read_flag INTEGER NOT NULL DEFAULT 0
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn begin(&self) -> Result<Tx<'_>, sqlx::Error> {
        self.pool.begin().await
    }

    // ------------------------------------------------------------------
    // Commits
    // ------------------------------------------------------------------

    /// Append a commit inside an already-open transaction, returning its
    /// assigned `seq`. The caller commits the transaction once the state
    /// mutation and this append both succeed (I3).
    pub async fn append_commit(
        tx: &mut Tx<'_>,
        request_id: &str,
        request_blob: &str,
    ) -> Result<i64, sqlx::Error> {
        let result = sqlx::query("INSERT INTO commits (request_id, request_blob) VALUES (?1, ?2)")
            .bind(request_id)
            .bind(request_blob)
            .execute(&mut **tx)
            .await?;
        Ok(result.last_insert_rowid())
    }

    pub async fn max_seq(&self) -> Result<i64, sqlx::Error> {
        let seq: Option<i64> = sqlx::query_scalar("SELECT MAX(seq) FROM commits")
            .fetch_one(&self.pool)
            .await?;
        Ok(seq.unwrap_or(0))
    }

    pub async fn commits_after(&self, seq: i64) -> Result<Vec<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT seq, request_id, request_blob FROM commits WHERE seq > ?1 ORDER BY seq ASC",
        )
        .bind(seq)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn all_commits(&self) -> Result<Vec<Commit>, sqlx::Error> {
        sqlx::query_as::<_, Commit>(
            "SELECT seq, request_id, request_blob FROM commits ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    /// Rebuild the hot `request_ids` set from the full commit log at
    /// startup (§3 "reloaded from `commits` on start").
    pub async fn load_request_ids(&self) -> Result<HashSet<String>, sqlx::Error> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT request_id FROM commits")
            .fetch_all(&self.pool)
            .await?;
        Ok(ids.into_iter().collect())
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub async fn get_user(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>("SELECT username, password_hash FROM users WHERE username = ?1")
            .bind(username)
            .fetch_optional(&self.pool)
            .await
    }

    pub async fn insert_user(
        tx: &mut Tx<'_>,
        username: &str,
        password_hash: &str,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO users (username, password_hash) VALUES (?1, ?2)")
            .bind(username)
            .bind(password_hash)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    /// Delete the user row and every message whose recipient is that user.
    pub async fn delete_user(tx: &mut Tx<'_>, username: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM messages WHERE recipient = ?1")
            .bind(username)
            .execute(&mut **tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE username = ?1")
            .bind(username)
            .execute(&mut **tx)
            .await?;
        Ok(())
    }

    pub async fn list_usernames(&self, pattern: &str) -> Result<Vec<String>, sqlx::Error> {
        let all: Vec<String> = sqlx::query_scalar("SELECT username FROM users")
            .fetch_all(&self.pool)
            .await?;

        let matcher = glob::Pattern::new(pattern).unwrap_or_else(|_| {
            // An unparseable pattern matches nothing rather than erroring the
            // whole request — LIST_USERS has no error case in the spec.
            glob::Pattern::new("\0unmatchable\0").expect("literal pattern is always valid")
        });

        Ok(all.into_iter().filter(|u| matcher.matches(u)).collect())
    }

    // ------------------------------------------------------------------
    // Messages
    // ------------------------------------------------------------------

    pub async fn get_messages_for(&self, recipient: &str) -> Result<Vec<Message>, sqlx::Error> {
        sqlx::query_as::<_, Message>(
            "SELECT id, sender, recipient, body, timestamp, read_flag \
             FROM messages WHERE recipient = ?1 ORDER BY timestamp ASC",
        )
        .bind(recipient)
        .fetch_all(&self.pool)
        .await
    }

    pub async fn insert_message(
        tx: &mut Tx<'_>,
        message: &crate::models::MessageInput,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO messages (id, sender, recipient, body, timestamp, read_flag) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )
        .bind(&message.id)
        .bind(&message.sender)
        .bind(&message.recipient)
        .bind(&message.body)
        .bind(message.timestamp)
        .bind(message.read)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }

    pub async fn set_read(tx: &mut Tx<'_>, message_ids: &[String]) -> Result<(), sqlx::Error> {
        for id in message_ids {
            sqlx::query("UPDATE messages SET read_flag = 1 WHERE id = ?1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }

    pub async fn delete_messages(tx: &mut Tx<'_>, message_ids: &[String]) -> Result<(), sqlx::Error> {
        for id in message_ids {
            sqlx::query("DELETE FROM messages WHERE id = ?1")
                .bind(id)
                .execute(&mut **tx)
                .await?;
        }
        Ok(())
    }
}
