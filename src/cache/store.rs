// SQLite-backed persistence for cache entries and the usage ledger
// Author: kelexine (https://github.com/kelexine)

use crate::cache::codec;
use crate::cache::models::{
    EmbeddingCacheEntry, RequestCacheEntry, RequestKind, UsageLogEntry, UsageSummary,
};
use crate::error::{ProxyError, Result};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Append-only tables. Rows are never updated; lookups pick the newest row for a key,
/// so concurrent inserts of the same key are harmless.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS "requests" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "request_hash" TEXT NOT NULL,
    "created_at" INTEGER NOT NULL,
    "request_type" TEXT NOT NULL,
    "request_json" TEXT NOT NULL,
    "response_json" TEXT NOT NULL,
    "tokens" INTEGER NULL,
    "model" TEXT NOT NULL,
    "cost" REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS "requests_hash_latest"
    ON "requests" ("request_hash", "created_at" DESC, "id" DESC);
CREATE INDEX IF NOT EXISTS "requests_request_type" ON "requests" ("request_type");

CREATE TABLE IF NOT EXISTS "embeddings" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "text_hash" TEXT NOT NULL,
    "model" TEXT NOT NULL,
    "created_at" INTEGER NOT NULL,
    "text" TEXT NOT NULL,
    "embedding" BLOB NOT NULL
);

CREATE INDEX IF NOT EXISTS "embeddings_hash_model_latest"
    ON "embeddings" ("text_hash", "model", "created_at" DESC, "id" DESC);
CREATE INDEX IF NOT EXISTS "embeddings_model" ON "embeddings" ("model");

CREATE TABLE IF NOT EXISTS "log" (
    "id" INTEGER PRIMARY KEY AUTOINCREMENT,
    "time" INTEGER NOT NULL,
    "request_type" TEXT NOT NULL,
    "model" TEXT NOT NULL,
    "tokens" INTEGER NOT NULL,
    "cost" REAL NOT NULL
);

CREATE INDEX IF NOT EXISTS "log_time" ON "log" ("time");
CREATE INDEX IF NOT EXISTS "log_request_type" ON "log" ("request_type");
CREATE INDEX IF NOT EXISTS "log_model" ON "log" ("model");
"#;

/// Persistent store for request/embedding cache entries and the usage ledger.
///
/// Cloning is cheap and every clone shares one connection. Each call runs on
/// tokio's blocking pool, so async callers are never blocked on disk I/O.
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open (or create) the database at `path` and make sure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "FULL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        info!("Opened cache store at {} (journal_mode={})", path.display(), mode);
        Self::from_connection(conn)
    }

    /// Private in-memory store, mostly useful for tests.
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create tables and indexes. A no-op when they already exist.
    pub fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(SCHEMA)?;
        debug!("Store schema ready");
        Ok(())
    }

    async fn with_conn<T, F>(&self, op: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let mut guard = conn.lock();
            op(&mut *guard)
        })
        .await
        .map_err(|e| ProxyError::Internal(format!("store task failed: {}", e)))?
    }

    // ---------------------------------------------------------------------
    // requests
    // ---------------------------------------------------------------------

    /// Append a request cache row.
    #[allow(clippy::too_many_arguments)]
    pub async fn insert_request(
        &self,
        kind: RequestKind,
        fingerprint: &str,
        request_json: &str,
        response_json: &str,
        tokens: Option<u64>,
        model: &str,
        cost: f64,
    ) -> Result<()> {
        self.insert_request_at(
            kind,
            fingerprint,
            request_json,
            response_json,
            tokens,
            model,
            cost,
            Utc::now(),
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn insert_request_at(
        &self,
        kind: RequestKind,
        fingerprint: &str,
        request_json: &str,
        response_json: &str,
        tokens: Option<u64>,
        model: &str,
        cost: f64,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let tokens = tokens.map(to_sql_int).transpose()?;
        let row = (
            fingerprint.to_string(),
            created_at.timestamp_micros(),
            kind.as_str(),
            request_json.to_string(),
            response_json.to_string(),
            tokens,
            model.to_string(),
            cost,
        );

        self.with_conn(move |conn| {
            insert_one(conn, "requests", |tx| {
                tx.execute(
                    r#"INSERT INTO "requests" (
                        "request_hash", "created_at", "request_type", "request_json",
                        "response_json", "tokens", "model", "cost"
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)"#,
                    params![row.0, row.1, row.2, row.3, row.4, row.5, row.6, row.7],
                )
            })
        })
        .await
    }

    /// Newest request row with this fingerprint, if any.
    pub async fn find_latest_request(
        &self,
        fingerprint: &str,
    ) -> Result<Option<RequestCacheEntry>> {
        let fingerprint = fingerprint.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    r#"SELECT "request_hash", "request_type", "request_json", "response_json",
                              "tokens", "model", "cost", "created_at"
                       FROM "requests"
                       WHERE "request_hash" = ?1
                       ORDER BY "created_at" DESC, "id" DESC
                       LIMIT 1"#,
                    params![fingerprint],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, String>(3)?,
                            row.get::<_, Option<i64>>(4)?,
                            row.get::<_, String>(5)?,
                            row.get::<_, f64>(6)?,
                            row.get::<_, i64>(7)?,
                        ))
                    },
                )
                .optional()?;

            let Some((
                fingerprint,
                kind,
                request_json,
                response_json,
                tokens,
                model,
                cost,
                created_at,
            )) = row
            else {
                return Ok(None);
            };
            Ok(Some(RequestCacheEntry {
                fingerprint,
                kind: kind.parse()?,
                request_json,
                response_json,
                tokens: tokens.map(from_sql_int),
                model,
                cost,
                created_at: from_micros(created_at)?,
            }))
        })
        .await
    }

    // ---------------------------------------------------------------------
    // embeddings
    // ---------------------------------------------------------------------

    /// Append an embedding cache row. `embedding` is the codec-encoded blob.
    pub async fn insert_embedding(
        &self,
        fingerprint: &str,
        model: &str,
        text: &str,
        embedding: Vec<u8>,
    ) -> Result<()> {
        self.insert_embedding_at(fingerprint, model, text, embedding, Utc::now())
            .await
    }

    async fn insert_embedding_at(
        &self,
        fingerprint: &str,
        model: &str,
        text: &str,
        embedding: Vec<u8>,
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let row = (
            fingerprint.to_string(),
            model.to_string(),
            created_at.timestamp_micros(),
            text.to_string(),
            embedding,
        );

        self.with_conn(move |conn| {
            insert_one(conn, "embeddings", |tx| {
                tx.execute(
                    r#"INSERT INTO "embeddings"
                           ("text_hash", "model", "created_at", "text", "embedding")
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![row.0, row.1, row.2, row.3, row.4],
                )
            })
        })
        .await
    }

    /// Newest embedding row for (fingerprint, model), if any.
    ///
    /// Fails with `CorruptEmbedding` when the stored blob cannot be decoded.
    pub async fn find_latest_embedding(
        &self,
        fingerprint: &str,
        model: &str,
    ) -> Result<Option<EmbeddingCacheEntry>> {
        let fingerprint = fingerprint.to_string();
        let model = model.to_string();
        self.with_conn(move |conn| {
            let row = conn
                .query_row(
                    r#"SELECT "text_hash", "model", "text", "embedding", "created_at"
                       FROM "embeddings"
                       WHERE "text_hash" = ?1 AND "model" = ?2
                       ORDER BY "created_at" DESC, "id" DESC
                       LIMIT 1"#,
                    params![fingerprint, model],
                    |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                            row.get::<_, Vec<u8>>(3)?,
                            row.get::<_, i64>(4)?,
                        ))
                    },
                )
                .optional()?;

            let Some((fingerprint, model, text, blob, created_at)) = row else {
                return Ok(None);
            };
            Ok(Some(EmbeddingCacheEntry {
                fingerprint,
                model,
                text,
                embedding: codec::decode(&blob)?,
                created_at: from_micros(created_at)?,
            }))
        })
        .await
    }

    // ---------------------------------------------------------------------
    // usage log
    // ---------------------------------------------------------------------

    /// Append a ledger row. Durable once this returns `Ok`.
    pub async fn append_log(
        &self,
        kind: RequestKind,
        model: &str,
        tokens: u64,
        cost: f64,
    ) -> Result<()> {
        let row = (
            Utc::now().timestamp_micros(),
            kind.as_str(),
            model.to_string(),
            to_sql_int(tokens)?,
            cost,
        );

        self.with_conn(move |conn| {
            insert_one(conn, "log", |tx| {
                tx.execute(
                    r#"INSERT INTO "log" ("time", "request_type", "model", "tokens", "cost")
                       VALUES (?1, ?2, ?3, ?4, ?5)"#,
                    params![row.0, row.1, row.2, row.3, row.4],
                )
            })
        })
        .await
    }

    /// All ledger rows in insertion order.
    pub async fn log_entries(&self) -> Result<Vec<UsageLogEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT "request_type", "model", "tokens", "cost", "time"
                   FROM "log" ORDER BY "id" ASC"#,
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, i64>(4)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (kind, model, tokens, cost, time) = row?;
                entries.push(UsageLogEntry {
                    kind: kind.parse()?,
                    model,
                    tokens: from_sql_int(tokens),
                    cost,
                    time: from_micros(time)?,
                });
            }
            Ok(entries)
        })
        .await
    }

    /// Ledger totals grouped by request kind and model.
    pub async fn usage_summary(&self) -> Result<Vec<UsageSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                r#"SELECT "request_type", "model", COUNT(*), SUM("tokens"), SUM("cost")
                   FROM "log"
                   GROUP BY "request_type", "model"
                   ORDER BY "request_type", "model""#,
            )?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            })?;

            let mut summary = Vec::new();
            for row in rows {
                let (kind, model, calls, tokens, cost) = row?;
                summary.push(UsageSummary {
                    kind: kind.parse()?,
                    model,
                    calls: from_sql_int(calls),
                    tokens: from_sql_int(tokens),
                    cost,
                });
            }
            Ok(summary)
        })
        .await
    }

    /// Cheap round trip to the engine, used by the health check.
    pub async fn ping(&self) -> Result<()> {
        self.with_conn(|conn| {
            conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
            Ok(())
        })
        .await
    }
}

/// Run a single-row insert in its own transaction.
///
/// Anything other than exactly one affected row rolls back and reports `WriteFailed`.
fn insert_one<F>(conn: &mut Connection, table: &str, op: F) -> Result<()>
where
    F: FnOnce(&rusqlite::Transaction<'_>) -> rusqlite::Result<usize>,
{
    let write_failed = |e: rusqlite::Error| ProxyError::WriteFailed(format!("{}: {}", table, e));

    let tx = conn.transaction().map_err(write_failed)?;
    let changes = op(&tx).map_err(write_failed)?;
    if changes != 1 {
        return Err(ProxyError::WriteFailed(format!(
            "{}: expected 1 row, {} affected",
            table, changes
        )));
    }
    tx.commit().map_err(write_failed)
}

fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| ProxyError::WriteFailed(format!("token count {} out of range", value)))
}

fn from_sql_int(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn from_micros(micros: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| ProxyError::Internal(format!("invalid timestamp: {}", micros)))
}
