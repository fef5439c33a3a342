// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The symbol index store.
//!
//! A single connection guarded by a mutex is the write aggregation point
//! for the whole daemon; SQLite WAL mode keeps the file readable by other
//! handles while a write is in flight. All timestamps are UTC (RFC 3339).

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use mayla_core::{FileStatus, Language, Reference, RefKind, Symbol, SymbolKind};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row};
use thiserror::Error;
use tracing::debug;

use crate::schema;

/// SQLite busy timeout applied to the connection.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Errors from index store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("unsupported schema version {found} (supported: {supported})")]
    UnsupportedSchema { found: i64, supported: i64 },
}

/// Stored tag that failed to parse back into its domain type.
#[derive(Debug, Error)]
#[error("invalid {field} value {value:?}")]
struct InvalidTag {
    field: &'static str,
    value: String,
}

fn bad_tag(field: &'static str, value: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(InvalidTag { field, value }),
    )
}

/// A file row from the index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub content_hash: String,
    pub encoding: String,
    pub language: Option<Language>,
    pub status: FileStatus,
    pub error: Option<String>,
    pub indexed_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

/// Input for `upsert_file`: everything the indexer knows about a file.
#[derive(Debug, Clone)]
pub struct FileUpsert {
    pub path: String,
    pub content_hash: String,
    pub encoding: String,
    pub language: Option<Language>,
    pub status: FileStatus,
    pub error: Option<String>,
}

/// A symbol row joined with its ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymbolRecord {
    pub id: i64,
    pub file_id: i64,
    pub symbol: Symbol,
}

/// A reference row joined with its ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceRecord {
    pub id: i64,
    pub symbol_id: i64,
    pub file_id: i64,
    pub reference: Reference,
}

/// Input for `insert_references`: the file a reference site lives in plus
/// the reference itself.
#[derive(Debug, Clone)]
pub struct RefUpsert {
    pub file_id: i64,
    pub reference: Reference,
}

/// Aggregate counts reported by `get_stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexStats {
    pub pending: i64,
    pub indexed: i64,
    pub failed: i64,
    pub skipped: i64,
    pub total_symbols: i64,
    pub last_indexed_at: Option<DateTime<Utc>>,
}

impl IndexStats {
    pub fn total_files(&self) -> i64 {
        self.pending + self.indexed + self.failed + self.skipped
    }
}

/// Persistent symbol index backed by a single SQLite file.
pub struct IndexStore {
    conn: Mutex<Connection>,
}

impl IndexStore {
    /// Open (creating if needed) the index database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        Self::configure(conn)
    }

    /// Open an in-memory index (tests).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Self::configure(conn)
    }

    fn configure(conn: Connection) -> Result<Self, StoreError> {
        conn.busy_timeout(BUSY_TIMEOUT)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        schema::apply(&conn)?;
        let found = schema::version(&conn)?;
        if found > schema::SCHEMA_VERSION {
            return Err(StoreError::UnsupportedSchema {
                found,
                supported: schema::SCHEMA_VERSION,
            });
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Insert or update a file record by its unique path. Returns the
    /// file id. `indexed_at` is stamped only when the status is `indexed`.
    pub fn upsert_file(&self, file: &FileUpsert) -> Result<i64, StoreError> {
        let now = Utc::now().to_rfc3339();
        let indexed_at = (file.status == FileStatus::Indexed).then(|| now.clone());
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO files (path, content_hash, encoding, language, status, error, indexed_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(path) DO UPDATE SET
                 content_hash = excluded.content_hash,
                 encoding = excluded.encoding,
                 language = excluded.language,
                 status = excluded.status,
                 error = excluded.error,
                 indexed_at = coalesce(excluded.indexed_at, files.indexed_at),
                 updated_at = excluded.updated_at",
            params![
                file.path,
                file.content_hash,
                file.encoding,
                file.language.map(|l| l.as_str()),
                file.status.as_str(),
                file.error,
                indexed_at,
                now,
            ],
        )?;
        let id = conn.query_row(
            "SELECT id FROM files WHERE path = ?1",
            [&file.path],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Look up a file record by path.
    pub fn get_file(&self, path: &str) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, path, content_hash, encoding, language, status, error, indexed_at, updated_at
                 FROM files WHERE path = ?1",
                [path],
                file_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Look up a file record by id.
    pub fn get_file_by_id(&self, id: i64) -> Result<Option<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT id, path, content_hash, encoding, language, status, error, indexed_at, updated_at
                 FROM files WHERE id = ?1",
                [id],
                file_from_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Files in a given status, oldest update first.
    pub fn get_files_by_status(
        &self,
        status: FileStatus,
        limit: usize,
    ) -> Result<Vec<FileRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, path, content_hash, encoding, language, status, error, indexed_at, updated_at
             FROM files WHERE status = ?1 ORDER BY updated_at ASC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![status.as_str(), limit as i64], file_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Delete a file record; symbols and references cascade. Returns true
    /// if a record was removed.
    pub fn delete_file(&self, path: &str) -> Result<bool, StoreError> {
        let conn = self.conn.lock();
        let n = conn.execute("DELETE FROM files WHERE path = ?1", [path])?;
        if n > 0 {
            debug!(path, "removed file record");
        }
        Ok(n > 0)
    }

    /// Update status and error message for an existing file record.
    pub fn update_file_status(
        &self,
        path: &str,
        status: FileStatus,
        error: Option<&str>,
    ) -> Result<(), StoreError> {
        let now = Utc::now().to_rfc3339();
        let conn = self.conn.lock();
        conn.execute(
            "UPDATE files SET status = ?1, error = ?2, updated_at = ?3 WHERE path = ?4",
            params![status.as_str(), error, now, path],
        )?;
        Ok(())
    }

    /// Replace all symbols for a file in one transaction: delete the old
    /// set, insert the new set. Readers observe either set in full.
    pub fn insert_symbols(&self, file_id: i64, symbols: &[Symbol]) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM symbols WHERE file_id = ?1", [file_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO symbols (file_id, name, kind, signature, line_start, line_end,
                                      column_start, column_end, visibility, documentation, is_exported)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            )?;
            for sym in symbols {
                stmt.execute(params![
                    file_id,
                    sym.name,
                    sym.kind.as_str(),
                    sym.signature,
                    sym.line_start,
                    sym.line_end,
                    sym.column_start,
                    sym.column_end,
                    sym.visibility,
                    sym.documentation,
                    sym.is_exported,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// All symbols for a file, ordered by starting line.
    pub fn get_symbols_by_file(&self, file_id: i64) -> Result<Vec<SymbolRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, file_id, name, kind, signature, line_start, line_end,
                    column_start, column_end, visibility, documentation, is_exported
             FROM symbols WHERE file_id = ?1 ORDER BY line_start ASC, id ASC",
        )?;
        let rows = stmt.query_map([file_id], symbol_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Full-text search over symbol names, signatures and documentation.
    pub fn search_symbols(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SymbolRecord>, StoreError> {
        let Some(fts_query) = fts_quote(query) else {
            return Ok(Vec::new());
        };
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.file_id, s.name, s.kind, s.signature, s.line_start, s.line_end,
                    s.column_start, s.column_end, s.visibility, s.documentation, s.is_exported
             FROM symbols_fts f
             JOIN symbols s ON s.id = f.rowid
             WHERE symbols_fts MATCH ?1
             ORDER BY rank LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![fts_query, limit as i64], symbol_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Replace all references recorded for a symbol in one transaction.
    pub fn insert_references(
        &self,
        symbol_id: i64,
        refs: &[RefUpsert],
    ) -> Result<(), StoreError> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        tx.execute("DELETE FROM refs WHERE symbol_id = ?1", [symbol_id])?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO refs (symbol_id, file_id, line, column, kind, snippet)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for r in refs {
                stmt.execute(params![
                    symbol_id,
                    r.file_id,
                    r.reference.line,
                    r.reference.column,
                    r.reference.kind.as_str(),
                    r.reference.snippet,
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// References recorded for a symbol, ordered by (file, line).
    pub fn get_references_for_symbol(
        &self,
        symbol_id: i64,
    ) -> Result<Vec<ReferenceRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, file_id, line, column, kind, snippet
             FROM refs WHERE symbol_id = ?1 ORDER BY file_id ASC, line ASC",
        )?;
        let rows = stmt.query_map([symbol_id], reference_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// All references whose site is inside a file, ordered by line.
    pub fn get_references_in_file(
        &self,
        file_id: i64,
    ) -> Result<Vec<ReferenceRecord>, StoreError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, symbol_id, file_id, line, column, kind, snippet
             FROM refs WHERE file_id = ?1 ORDER BY line ASC, id ASC",
        )?;
        let rows = stmt.query_map([file_id], reference_from_row)?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row?);
        }
        Ok(out)
    }

    /// Counts by file status plus total symbols and the most recent
    /// successful index time.
    pub fn get_stats(&self) -> Result<IndexStats, StoreError> {
        let conn = self.conn.lock();
        let mut stats = IndexStats::default();

        let mut stmt = conn.prepare("SELECT status, COUNT(*) FROM files GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        for row in rows {
            let (status, count) = row?;
            match FileStatus::from_tag(&status) {
                Some(FileStatus::Pending) => stats.pending = count,
                Some(FileStatus::Indexed) => stats.indexed = count,
                Some(FileStatus::Failed) => stats.failed = count,
                Some(FileStatus::Skipped) => stats.skipped = count,
                None => {}
            }
        }

        stats.total_symbols =
            conn.query_row("SELECT COUNT(*) FROM symbols", [], |row| row.get(0))?;
        let last: Option<String> = conn.query_row(
            "SELECT MAX(indexed_at) FROM files WHERE indexed_at IS NOT NULL",
            [],
            |row| row.get(0),
        )?;
        stats.last_indexed_at = last.as_deref().and_then(parse_utc);

        Ok(stats)
    }
}

/// Quote a free-form query for FTS5: each whitespace token becomes a quoted
/// phrase (implicit AND), so user input can't inject FTS operators.
fn fts_quote(query: &str) -> Option<String> {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" "))
    }
}

fn parse_utc(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

fn file_from_row(row: &Row<'_>) -> rusqlite::Result<FileRecord> {
    let language: Option<String> = row.get(4)?;
    let status: String = row.get(5)?;
    let indexed_at: Option<String> = row.get(7)?;
    let updated_at: String = row.get(8)?;
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        content_hash: row.get(2)?,
        encoding: row.get(3)?,
        language: language.as_deref().and_then(Language::from_tag),
        status: FileStatus::from_tag(&status)
            .ok_or_else(|| bad_tag("status", status.clone()))?,
        error: row.get(6)?,
        indexed_at: indexed_at.as_deref().and_then(parse_utc),
        updated_at: parse_utc(&updated_at)
            .ok_or_else(|| bad_tag("updated_at", updated_at.clone()))?,
    })
}

fn symbol_from_row(row: &Row<'_>) -> rusqlite::Result<SymbolRecord> {
    let kind: String = row.get(3)?;
    Ok(SymbolRecord {
        id: row.get(0)?,
        file_id: row.get(1)?,
        symbol: Symbol {
            name: row.get(2)?,
            kind: SymbolKind::from_tag(&kind).ok_or_else(|| bad_tag("kind", kind.clone()))?,
            signature: row.get(4)?,
            line_start: row.get(5)?,
            line_end: row.get(6)?,
            column_start: row.get(7)?,
            column_end: row.get(8)?,
            visibility: row.get(9)?,
            documentation: row.get(10)?,
            is_exported: row.get(11)?,
        },
    })
}

fn reference_from_row(row: &Row<'_>) -> rusqlite::Result<ReferenceRecord> {
    let kind: String = row.get(5)?;
    Ok(ReferenceRecord {
        id: row.get(0)?,
        symbol_id: row.get(1)?,
        file_id: row.get(2)?,
        reference: Reference {
            line: row.get(3)?,
            column: row.get(4)?,
            kind: RefKind::from_tag(&kind).ok_or_else(|| bad_tag("kind", kind.clone()))?,
            snippet: row.get(6)?,
        },
    })
}

#[cfg(test)]
#[path = "index_tests.rs"]
mod tests;
