use std::path::Path;

use rusqlite::types::ValueRef;
use rusqlite::{Connection, OpenFlags};
use snapreport_collab::{QueryEngine, QueryableResource};
use snapreport_core::{render, Cell, OpenError, QueryError, RenderOptions, ResultSet};
use tracing::debug;

/// Opens snapshots as SQLite databases.
#[derive(Clone, Copy, Debug, Default)]
pub struct SqliteEngine;

impl QueryEngine for SqliteEngine {
    fn open(&self, path: &Path) -> Result<Box<dyn QueryableResource>, OpenError> {
        Ok(Box::new(SqliteSnapshot::open(path)?))
    }
}

/// A read-only connection to one fetched snapshot.
pub struct SqliteSnapshot {
    conn: Connection,
}

impl SqliteSnapshot {
    pub fn open(path: &Path) -> Result<Self, OpenError> {
        let corrupt = |reason: String| OpenError::Corrupt {
            path: path.to_path_buf(),
            reason,
        };
        if !path.is_file() {
            return Err(corrupt("no such file".to_string()));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| corrupt(e.to_string()))?;

        // Opening is lazy; reading the schema header is what rejects files
        // that are not databases.
        let schema_version: i64 = conn
            .query_row("PRAGMA schema_version", [], |r| r.get(0))
            .map_err(|e| corrupt(e.to_string()))?;
        debug!(path = %path.display(), schema_version, "opened snapshot read-only");

        Ok(Self { conn })
    }

    /// Execute a single read-only statement and collect every row.
    pub fn query(&self, sql: &str) -> Result<ResultSet, QueryError> {
        let mut stmt = self.conn.prepare(sql).map_err(engine_error)?;
        if !stmt.readonly() {
            return Err(QueryError::NotReadOnly);
        }

        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
        let width = columns.len();
        let mut rs = ResultSet::new(columns);

        let mut rows = stmt.query([]).map_err(engine_error)?;
        while let Some(row) = rows.next().map_err(engine_error)? {
            let mut cells = Vec::with_capacity(width);
            for i in 0..width {
                cells.push(to_cell(row.get_ref(i).map_err(engine_error)?));
            }
            rs.push_row(cells);
        }
        Ok(rs)
    }
}

impl QueryableResource for SqliteSnapshot {
    fn run(&self, sql: &str, opts: RenderOptions) -> Result<String, QueryError> {
        let rs = self.query(sql)?;
        debug!(rows = rs.rows.len(), columns = rs.columns.len(), "query returned");
        Ok(render(&rs, opts))
    }
}

fn engine_error(e: rusqlite::Error) -> QueryError {
    QueryError::Engine(e.to_string())
}

fn to_cell(v: ValueRef<'_>) -> Cell {
    match v {
        ValueRef::Null => Cell::Null,
        ValueRef::Integer(i) => Cell::Integer(i),
        ValueRef::Real(r) => Cell::Real(r),
        ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
    }
}
