//! SQLite implementation of the driver seam, over rusqlite.

use crate::driver::{Driver, RawConnection, RawCursor};
use crate::error::{DbError, Result};
use crate::value::Value;
use rusqlite::types::{ToSqlOutput, ValueRef};
use rusqlite::{params_from_iter, Connection};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

/// Connection parameters for the SQLite driver.
///
/// Caller-supplied pragmas override the defaults; anything not overridden
/// is applied as-is when a connection opens.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    path: PathBuf,
    pragmas: Vec<(String, String)>,
}

impl SqliteConfig {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            pragmas: vec![
                ("journal_mode".to_string(), "WAL".to_string()),
                ("foreign_keys".to_string(), "ON".to_string()),
                ("busy_timeout".to_string(), "5000".to_string()),
                ("synchronous".to_string(), "NORMAL".to_string()),
            ],
        }
    }

    /// Override a default pragma or add a new one.
    pub fn pragma(mut self, name: &str, value: &str) -> Self {
        if let Some(entry) = self.pragmas.iter_mut().find(|(n, _)| n == name) {
            entry.1 = value.to_string();
        } else {
            self.pragmas.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Driver producing rusqlite-backed connections.
pub struct SqliteDriver {
    config: SqliteConfig,
}

impl SqliteDriver {
    pub fn new(config: SqliteConfig) -> Self {
        Self { config }
    }
}

impl Driver for SqliteDriver {
    fn connect(&self) -> Result<Box<dyn RawConnection>> {
        let conn = Connection::open(&self.config.path)
            .map_err(|e| DbError::Connection(e.to_string()))?;
        for (name, value) in &self.config.pragmas {
            conn.execute_batch(&format!("PRAGMA {name} = {value};"))
                .map_err(|e| DbError::Connection(e.to_string()))?;
        }
        Ok(Box::new(SqliteConnection {
            conn,
            in_txn: false,
        }))
    }

    fn placeholder(&self, index: usize) -> String {
        format!("?{index}")
    }
}

/// A raw SQLite session.
///
/// SQLite commits implicitly after every bare statement, so a transaction
/// is opened lazily before the first statement and ended only by an
/// explicit commit or rollback. This keeps the autocommit decision in the
/// layer above, the way a DB-API driver with autocommit disabled behaves.
struct SqliteConnection {
    conn: Connection,
    in_txn: bool,
}

impl RawConnection for SqliteConnection {
    fn cursor(&mut self) -> Result<Box<dyn RawCursor + '_>> {
        if !self.in_txn {
            self.conn.execute_batch("BEGIN")?;
            self.in_txn = true;
        }
        Ok(Box::new(SqliteCursor {
            conn: &self.conn,
            columns: None,
            rows: VecDeque::new(),
            rowcount: -1,
        }))
    }

    fn commit(&mut self) -> Result<()> {
        if self.in_txn {
            self.conn.execute_batch("COMMIT")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        if self.in_txn {
            self.conn.execute_batch("ROLLBACK")?;
            self.in_txn = false;
        }
        Ok(())
    }

    fn close(self: Box<Self>) -> Result<()> {
        let this = *self;
        this.conn.close().map_err(|(_, e)| DbError::from(e))
    }
}

/// A cursor over one statement execution.
///
/// Result rows are buffered eagerly at execute time, so fetching never
/// touches the engine again.
struct SqliteCursor<'c> {
    conn: &'c Connection,
    columns: Option<Vec<String>>,
    rows: VecDeque<Vec<Value>>,
    rowcount: i64,
}

impl RawCursor for SqliteCursor<'_> {
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()> {
        let mut stmt = self.conn.prepare(sql)?;
        let ncols = stmt.column_count();
        if ncols == 0 {
            let affected = stmt.execute(params_from_iter(params.iter()))?;
            self.columns = None;
            self.rows.clear();
            self.rowcount = affected as i64;
        } else {
            let names: Vec<String> = stmt
                .column_names()
                .iter()
                .map(|n| n.to_string())
                .collect();
            let mut rows = stmt.query(params_from_iter(params.iter()))?;
            let mut buffered = VecDeque::new();
            while let Some(row) = rows.next()? {
                let mut values = Vec::with_capacity(ncols);
                for i in 0..ncols {
                    values.push(Value::from(row.get_ref(i)?));
                }
                buffered.push_back(values);
            }
            self.rowcount = buffered.len() as i64;
            self.columns = Some(names);
            self.rows = buffered;
        }
        Ok(())
    }

    fn description(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    fn rowcount(&self) -> i64 {
        self.rowcount
    }

    fn fetchone(&mut self) -> Result<Option<Vec<Value>>> {
        Ok(self.rows.pop_front())
    }

    fn fetchall(&mut self) -> Result<Vec<Vec<Value>>> {
        Ok(self.rows.drain(..).collect())
    }
}

impl rusqlite::types::ToSql for Value {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            Value::Null => ToSqlOutput::Borrowed(ValueRef::Null),
            Value::Integer(i) => ToSqlOutput::Borrowed(ValueRef::Integer(*i)),
            Value::Real(f) => ToSqlOutput::Borrowed(ValueRef::Real(*f)),
            Value::Text(s) => ToSqlOutput::Borrowed(ValueRef::Text(s.as_bytes())),
            Value::Blob(b) => ToSqlOutput::Borrowed(ValueRef::Blob(b)),
        })
    }
}

impl From<ValueRef<'_>> for Value {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(i) => Value::Integer(i),
            ValueRef::Real(f) => Value::Real(f),
            ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Value::Blob(b.to_vec()),
        }
    }
}
