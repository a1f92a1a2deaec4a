//! SQLite database management with migrations
//!
//! Provides structured storage for inquiries, search results, and reaction events

use crate::error::{Result, SleuthError};
use crate::storage::models::{
    Inquiry, InquiryStatus, NewInquiry, NewReactionEvent, ReactionEvent, SearchResult,
};
use chrono::{DateTime, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::path::Path;

/// Database connection pool
pub type DbPool = Pool<SqliteConnectionManager>;

const INQUIRY_COLUMNS: &str = "id, message_id, channel_id, user_id, message_text, source_timestamp, \
     status, created_at, processed_at, response_sent, response_text, reply_thread_id";

const REACTION_COLUMNS: &str = "id, message_id, channel_id, user_id, reaction, event_type, \
     source_timestamp, processed, inquiry_id, created_at";

/// Database manager with migration support
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Create a new database connection
    pub fn new(db_path: &Path) -> Result<Self> {
        Self::with_pool_size(db_path, 16)
    }

    /// Create a database with an explicit connection pool size
    pub fn with_pool_size(db_path: &Path, max_size: u32) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SleuthError::Io {
                source: e,
                context: format!("Failed to create database directory: {:?}", parent),
            })?;
        }

        // Pragmas run on every pooled connection, foreign keys are per-connection in SQLite
        let manager = SqliteConnectionManager::file(db_path).with_init(|conn| {
            conn.execute_batch(
                "
                PRAGMA foreign_keys = ON;
                PRAGMA busy_timeout = 5000;
                ",
            )
        });

        let pool = Pool::builder().max_size(max_size).build(manager)?;

        {
            let conn = pool.get()?;
            conn.execute_batch(
                "
                PRAGMA journal_mode = WAL;
                PRAGMA synchronous = NORMAL;
                ",
            )?;
        }

        let db = Self { pool };
        db.migrate()?;

        Ok(db)
    }

    /// Get a connection from the pool
    pub fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    /// Run database migrations
    fn migrate(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            )",
            [],
        )?;

        let current_version: i32 = conn
            .query_row(
                "SELECT COALESCE(MAX(version), 0) FROM _migrations",
                [],
                |row| row.get(0),
            )
            .unwrap_or(0);

        for (version, migration) in MIGRATIONS.iter().enumerate() {
            let version = version as i32 + 1;

            if version > current_version {
                tracing::info!("Applying migration {}", version);

                conn.execute_batch(migration)?;

                conn.execute(
                    "INSERT INTO _migrations (version, applied_at) VALUES (?1, datetime('now'))",
                    params![version],
                )?;
            }
        }

        Ok(())
    }

    // ---- inquiries ----

    /// Insert a new inquiry in `pending` state.
    ///
    /// The UNIQUE constraint on `message_id` is what closes the race between two
    /// reactions on the same message; losing it yields [`SleuthError::DuplicateInquiry`].
    pub fn create_inquiry(&self, new: &NewInquiry) -> Result<Inquiry> {
        let conn = self.get_conn()?;
        let now = Utc::now();

        let inserted = conn.execute(
            "INSERT INTO inquiries (message_id, channel_id, user_id, message_text, source_timestamp,
                                    status, created_at, response_sent, response_text, reply_thread_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, '', '')",
            params![
                &new.message_id,
                &new.channel_id,
                &new.user_id,
                &new.message_text,
                &new.source_timestamp,
                InquiryStatus::Pending.as_str(),
                now.timestamp(),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                return Err(SleuthError::DuplicateInquiry {
                    message_id: new.message_id.clone(),
                });
            }
            Err(e) => return Err(e.into()),
        }

        Ok(Inquiry {
            id: conn.last_insert_rowid(),
            message_id: new.message_id.clone(),
            channel_id: new.channel_id.clone(),
            user_id: new.user_id.clone(),
            message_text: new.message_text.clone(),
            source_timestamp: new.source_timestamp.clone(),
            status: InquiryStatus::Pending,
            created_at: from_unix(now.timestamp()),
            processed_at: None,
            response_sent: false,
            response_text: String::new(),
            reply_thread_id: String::new(),
            search_results: Vec::new(),
        })
    }

    /// Persist the mutable fields of an inquiry.
    ///
    /// Rows already in a terminal state are left untouched; returns whether a row changed.
    pub fn save_inquiry(&self, inquiry: &Inquiry) -> Result<bool> {
        let conn = self.get_conn()?;
        let changed = conn.execute(
            "UPDATE inquiries
             SET status = ?2, processed_at = ?3, response_sent = ?4,
                 response_text = ?5, reply_thread_id = ?6
             WHERE id = ?1 AND status NOT IN ('completed', 'failed')",
            params![
                inquiry.id,
                inquiry.status.as_str(),
                inquiry.processed_at.map(|t| t.timestamp()),
                inquiry.response_sent,
                &inquiry.response_text,
                &inquiry.reply_thread_id,
            ],
        )?;
        Ok(changed > 0)
    }

    /// Get an inquiry with its search results
    pub fn get_inquiry(&self, id: i64) -> Result<Option<Inquiry>> {
        let conn = self.get_conn()?;
        let inquiry = conn
            .query_row(
                &format!("SELECT {} FROM inquiries WHERE id = ?1", INQUIRY_COLUMNS),
                params![id],
                inquiry_from_row,
            )
            .optional()?;

        match inquiry {
            Some(mut inquiry) => {
                inquiry.search_results = self.search_results_for(inquiry.id)?;
                Ok(Some(inquiry))
            }
            None => Ok(None),
        }
    }

    /// Look up an inquiry by source message without loading its search results
    pub fn find_inquiry_by_message_id(&self, message_id: &str) -> Result<Option<Inquiry>> {
        let conn = self.get_conn()?;
        Ok(conn
            .query_row(
                &format!(
                    "SELECT {} FROM inquiries WHERE message_id = ?1",
                    INQUIRY_COLUMNS
                ),
                params![message_id],
                inquiry_from_row,
            )
            .optional()?)
    }

    /// Get an inquiry by source message, including its search results
    pub fn get_inquiry_by_message_id(&self, message_id: &str) -> Result<Option<Inquiry>> {
        match self.find_inquiry_by_message_id(message_id)? {
            Some(mut inquiry) => {
                inquiry.search_results = self.search_results_for(inquiry.id)?;
                Ok(Some(inquiry))
            }
            None => Ok(None),
        }
    }

    /// Most recent inquiries first
    pub fn list_recent_inquiries(&self, limit: usize) -> Result<Vec<Inquiry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM inquiries ORDER BY created_at DESC, id DESC LIMIT ?1",
            INQUIRY_COLUMNS
        ))?;
        let rows = stmt.query_map(params![limit as i64], inquiry_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Delete an inquiry; its search results go with it
    pub fn delete_inquiry(&self, id: i64) -> Result<bool> {
        let conn = self.get_conn()?;
        let deleted = conn.execute("DELETE FROM inquiries WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    // ---- search results ----

    /// Persist a batch of scored results in one transaction
    pub fn insert_search_results(&self, results: &[SearchResult]) -> Result<usize> {
        if results.is_empty() {
            return Ok(0);
        }

        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO search_results (inquiry_id, source, source_item_id, title, content,
                                             url, score, author, created_date)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            )?;
            for r in results {
                stmt.execute(params![
                    r.inquiry_id,
                    r.source.as_str(),
                    &r.source_item_id,
                    &r.title,
                    &r.content,
                    &r.url,
                    r.score,
                    &r.author,
                    r.created_date.timestamp_micros(),
                ])?;
            }
        }
        tx.commit()?;

        Ok(results.len())
    }

    /// Every persisted result for an inquiry, in discovery order
    pub fn search_results_for(&self, inquiry_id: i64) -> Result<Vec<SearchResult>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT inquiry_id, source, source_item_id, title, content, url, score, author, created_date
             FROM search_results WHERE inquiry_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![inquiry_id], search_result_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    // ---- reaction events ----

    /// Record an observed reaction; returns the new event
    pub fn record_reaction_event(&self, new: &NewReactionEvent) -> Result<ReactionEvent> {
        let conn = self.get_conn()?;
        let now = Utc::now().timestamp();
        conn.execute(
            "INSERT INTO reaction_events (message_id, channel_id, user_id, reaction, event_type,
                                          source_timestamp, processed, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, 0, ?7)",
            params![
                &new.message_id,
                &new.channel_id,
                &new.user_id,
                &new.reaction,
                new.event_type.as_str(),
                &new.source_timestamp,
                now,
            ],
        )?;

        Ok(ReactionEvent {
            id: conn.last_insert_rowid(),
            message_id: new.message_id.clone(),
            channel_id: new.channel_id.clone(),
            user_id: new.user_id.clone(),
            reaction: new.reaction.clone(),
            event_type: new.event_type,
            source_timestamp: new.source_timestamp.clone(),
            processed: false,
            inquiry_id: None,
            created_at: from_unix(now),
        })
    }

    /// Mark a reaction event processed and link it to its inquiry
    pub fn mark_reaction_processed(&self, event_id: i64, inquiry_id: i64) -> Result<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "UPDATE reaction_events SET processed = 1, inquiry_id = ?2 WHERE id = ?1",
            params![event_id, inquiry_id],
        )?;
        Ok(())
    }

    /// Audit trail of reactions seen on a message, oldest first
    pub fn reaction_events_for_message(&self, message_id: &str) -> Result<Vec<ReactionEvent>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM reaction_events WHERE message_id = ?1 ORDER BY id",
            REACTION_COLUMNS
        ))?;
        let rows = stmt.query_map(params![message_id], reaction_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats> {
        let conn = self.get_conn()?;

        let count_status = |status: InquiryStatus| -> Result<usize> {
            let n: i64 = conn.query_row(
                "SELECT COUNT(*) FROM inquiries WHERE status = ?1",
                params![status.as_str()],
                |row| row.get(0),
            )?;
            Ok(n as usize)
        };

        let inquiry_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM inquiries", [], |row| row.get(0))?;

        let search_result_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM search_results", [], |row| row.get(0))?;

        let reaction_event_count: i64 =
            conn.query_row("SELECT COUNT(*) FROM reaction_events", [], |row| row.get(0))?;

        Ok(DbStats {
            inquiry_count: inquiry_count as usize,
            completed_count: count_status(InquiryStatus::Completed)?,
            failed_count: count_status(InquiryStatus::Failed)?,
            in_flight_count: count_status(InquiryStatus::Pending)?
                + count_status(InquiryStatus::Processing)?,
            search_result_count: search_result_count as usize,
            reaction_event_count: reaction_event_count as usize,
        })
    }
}

/// Database statistics
#[derive(Debug)]
pub struct DbStats {
    pub inquiry_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub in_flight_count: usize,
    pub search_result_count: usize,
    pub reaction_event_count: usize,
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
    )
}

fn from_unix(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_else(Utc::now)
}

/// Source item dates keep Slack `ts` precision
fn from_unix_micros(micros: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(micros).unwrap_or_else(Utc::now)
}

fn parse_column<T: std::str::FromStr<Err = String>>(idx: usize, raw: String) -> rusqlite::Result<T> {
    raw.parse().map_err(|e: String| {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            rusqlite::types::Type::Text,
            e.into(),
        )
    })
}

fn inquiry_from_row(row: &Row<'_>) -> rusqlite::Result<Inquiry> {
    let processed_at: Option<i64> = row.get(8)?;
    Ok(Inquiry {
        id: row.get(0)?,
        message_id: row.get(1)?,
        channel_id: row.get(2)?,
        user_id: row.get(3)?,
        message_text: row.get(4)?,
        source_timestamp: row.get(5)?,
        status: parse_column(6, row.get(6)?)?,
        created_at: from_unix(row.get(7)?),
        processed_at: processed_at.map(from_unix),
        response_sent: row.get(9)?,
        response_text: row.get(10)?,
        reply_thread_id: row.get(11)?,
        search_results: Vec::new(),
    })
}

fn search_result_from_row(row: &Row<'_>) -> rusqlite::Result<SearchResult> {
    Ok(SearchResult {
        inquiry_id: row.get(0)?,
        source: parse_column(1, row.get(1)?)?,
        source_item_id: row.get(2)?,
        title: row.get(3)?,
        content: row.get(4)?,
        url: row.get(5)?,
        score: row.get(6)?,
        author: row.get(7)?,
        created_date: from_unix_micros(row.get(8)?),
    })
}

fn reaction_from_row(row: &Row<'_>) -> rusqlite::Result<ReactionEvent> {
    Ok(ReactionEvent {
        id: row.get(0)?,
        message_id: row.get(1)?,
        channel_id: row.get(2)?,
        user_id: row.get(3)?,
        reaction: row.get(4)?,
        event_type: parse_column(5, row.get(5)?)?,
        source_timestamp: row.get(6)?,
        processed: row.get(7)?,
        inquiry_id: row.get(8)?,
        created_at: from_unix(row.get(9)?),
    })
}

/// Database migrations (each string is one migration)
const MIGRATIONS: &[&str] = &[
    // Migration 1: Initial schema
    r#"
    -- One row per triggering message
    CREATE TABLE inquiries (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL UNIQUE,
        channel_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        message_text TEXT NOT NULL,
        source_timestamp TEXT NOT NULL,
        status TEXT NOT NULL,
        created_at INTEGER NOT NULL,
        processed_at INTEGER,
        response_sent BOOLEAN NOT NULL DEFAULT 0,
        response_text TEXT NOT NULL DEFAULT '',
        reply_thread_id TEXT NOT NULL DEFAULT ''
    );

    CREATE INDEX idx_inquiries_created_at ON inquiries(created_at);
    CREATE INDEX idx_inquiries_status ON inquiries(status);

    -- Every candidate considered for an inquiry, kept for audit
    CREATE TABLE search_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        inquiry_id INTEGER NOT NULL,
        source TEXT NOT NULL,
        source_item_id TEXT NOT NULL,
        title TEXT NOT NULL,
        content TEXT NOT NULL,
        url TEXT NOT NULL,
        score REAL NOT NULL,
        author TEXT NOT NULL,
        created_date INTEGER NOT NULL, -- microseconds
        FOREIGN KEY (inquiry_id) REFERENCES inquiries(id) ON DELETE CASCADE
    );

    CREATE INDEX idx_search_results_inquiry ON search_results(inquiry_id);

    -- Audit trail of trigger-emoji reactions
    CREATE TABLE reaction_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        message_id TEXT NOT NULL,
        channel_id TEXT NOT NULL,
        user_id TEXT NOT NULL,
        reaction TEXT NOT NULL,
        event_type TEXT NOT NULL,
        source_timestamp TEXT NOT NULL,
        processed BOOLEAN NOT NULL DEFAULT 0,
        inquiry_id INTEGER,
        created_at INTEGER NOT NULL,
        FOREIGN KEY (inquiry_id) REFERENCES inquiries(id) ON DELETE SET NULL
    );

    CREATE INDEX idx_reaction_events_message ON reaction_events(message_id);
    "#,
];
