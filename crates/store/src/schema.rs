// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Index database schema.
//!
//! Applied on first open; `meta.schema_version` gates future migrations.
//! Symbols and references cascade-delete with their file; the FTS table is
//! a contentless-delete projection synced by triggers.

use rusqlite::Connection;

/// Current schema version recorded in the `meta` table.
pub const SCHEMA_VERSION: i64 = 1;

/// DDL for a fresh database.
const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS meta (
    id              INTEGER PRIMARY KEY CHECK (id = 1),
    schema_version  INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS files (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    path          TEXT NOT NULL UNIQUE,
    content_hash  TEXT NOT NULL DEFAULT '',
    encoding      TEXT NOT NULL DEFAULT '',
    language      TEXT,
    status        TEXT NOT NULL DEFAULT 'pending',
    error         TEXT,
    indexed_at    TEXT,
    updated_at    TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_files_status ON files(status, updated_at);

CREATE TABLE IF NOT EXISTS symbols (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    file_id       INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    name          TEXT NOT NULL,
    kind          TEXT NOT NULL,
    signature     TEXT,
    line_start    INTEGER NOT NULL,
    line_end      INTEGER NOT NULL,
    column_start  INTEGER,
    column_end    INTEGER,
    visibility    TEXT,
    documentation TEXT,
    is_exported   INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_symbols_file ON symbols(file_id, line_start);
CREATE INDEX IF NOT EXISTS idx_symbols_name ON symbols(name);

CREATE TABLE IF NOT EXISTS refs (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    symbol_id INTEGER NOT NULL REFERENCES symbols(id) ON DELETE CASCADE,
    file_id   INTEGER NOT NULL REFERENCES files(id) ON DELETE CASCADE,
    line      INTEGER NOT NULL,
    column    INTEGER,
    kind      TEXT NOT NULL,
    snippet   TEXT
);

CREATE INDEX IF NOT EXISTS idx_refs_symbol ON refs(symbol_id);
CREATE INDEX IF NOT EXISTS idx_refs_file ON refs(file_id, line);

CREATE VIRTUAL TABLE IF NOT EXISTS symbols_fts USING fts5(
    name,
    signature,
    documentation,
    content='symbols',
    content_rowid='id'
);

CREATE TRIGGER IF NOT EXISTS symbols_fts_insert AFTER INSERT ON symbols BEGIN
    INSERT INTO symbols_fts(rowid, name, signature, documentation)
    VALUES (new.id, new.name, coalesce(new.signature, ''), coalesce(new.documentation, ''));
END;

CREATE TRIGGER IF NOT EXISTS symbols_fts_delete AFTER DELETE ON symbols BEGIN
    INSERT INTO symbols_fts(symbols_fts, rowid, name, signature, documentation)
    VALUES ('delete', old.id, old.name, coalesce(old.signature, ''), coalesce(old.documentation, ''));
END;

CREATE TRIGGER IF NOT EXISTS symbols_fts_update AFTER UPDATE ON symbols BEGIN
    INSERT INTO symbols_fts(symbols_fts, rowid, name, signature, documentation)
    VALUES ('delete', old.id, old.name, coalesce(old.signature, ''), coalesce(old.documentation, ''));
    INSERT INTO symbols_fts(rowid, name, signature, documentation)
    VALUES (new.id, new.name, coalesce(new.signature, ''), coalesce(new.documentation, ''));
END;
"#;

/// Apply the schema and stamp the version row.
pub fn apply(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT INTO meta (id, schema_version) VALUES (1, ?1)
         ON CONFLICT(id) DO NOTHING",
        [SCHEMA_VERSION],
    )?;
    Ok(())
}

/// Read the recorded schema version.
pub fn version(conn: &Connection) -> rusqlite::Result<i64> {
    conn.query_row("SELECT schema_version FROM meta WHERE id = 1", [], |row| {
        row.get(0)
    })
}
