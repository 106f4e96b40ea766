//! Statement execution: reads, writes and the parameterized insert helper.
//!
//! Every public entry point wraps itself in a connection scope, so bare
//! calls work and calls inside an existing scope reuse its connection.
//! Callers write the neutral `?` placeholder; it is translated to the
//! driver's native marker before execution.

use crate::context::with_ctx;
use crate::driver::Driver;
use crate::engine;
use crate::error::{DbError, Result};
use crate::scope::with_connection;
use crate::value::{ColumnInfo, Row, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};

const SLOW_STATEMENT: Duration = Duration::from_millis(100);

/// Substitute the neutral `?` marker with the driver's native positional
/// placeholder, skipping `'…'` string literals and `"…"` quoted
/// identifiers. Returns the translated SQL and the placeholder count.
fn translate(sql: &str, driver: &dyn Driver) -> (String, usize) {
    let mut out = String::with_capacity(sql.len() + 8);
    let mut count = 0;
    let mut in_string = false;
    let mut in_ident = false;
    for ch in sql.chars() {
        match ch {
            '\'' if !in_ident => {
                in_string = !in_string;
                out.push(ch);
            }
            '"' if !in_string => {
                in_ident = !in_ident;
                out.push(ch);
            }
            '?' if !in_string && !in_ident => {
                count += 1;
                out.push_str(&driver.placeholder(count));
            }
            _ => out.push(ch),
        }
    }
    (out, count)
}

fn prepare_sql(sql: &str, params: &[Value]) -> Result<String> {
    let driver = engine::engine()?.driver();
    let (native_sql, expected) = translate(sql, driver);
    if expected != params.len() {
        return Err(DbError::ParameterMismatch {
            expected,
            actual: params.len(),
        });
    }
    Ok(native_sql)
}

fn profile(started: Instant, sql: &str) {
    let elapsed = started.elapsed();
    if elapsed > SLOW_STATEMENT {
        tracing::warn!(?elapsed, sql, "slow statement");
    } else {
        tracing::trace!(?elapsed, sql, "statement finished");
    }
}

fn query_rows(sql: &str, params: &[Value], first_only: bool) -> Result<Vec<Row>> {
    let native_sql = prepare_sql(sql, params)?;
    tracing::debug!(sql = %native_sql, params = ?params, "select");
    let started = Instant::now();
    let rows = with_ctx(|ctx| {
        // The cursor lives only inside this closure; it is dropped before
        // the call returns on success and error paths alike.
        let mut cursor = ctx.cursor()?;
        cursor.execute(&native_sql, params)?;
        let columns = Arc::new(ColumnInfo::new(
            cursor
                .description()
                .map(<[String]>::to_vec)
                .unwrap_or_default(),
        ));
        let fetched = if first_only {
            cursor.fetchone()?.into_iter().collect()
        } else {
            cursor.fetchall()?
        };
        Ok(fetched
            .into_iter()
            .map(|values| Row::new(Arc::clone(&columns), values))
            .collect())
    });
    profile(started, sql);
    rows
}

/// Execute a query and return the first matching row, or `None` when
/// nothing matched.
pub fn select_one(sql: &str, params: &[Value]) -> Result<Option<Row>> {
    with_connection(|| Ok(query_rows(sql, params, true)?.into_iter().next()))
}

/// Execute a query and return all matching rows (empty when nothing
/// matched).
pub fn select_all(sql: &str, params: &[Value]) -> Result<Vec<Row>> {
    with_connection(|| query_rows(sql, params, false))
}

/// Execute a query whose result has exactly one column and return the
/// first row's value, or `None` when nothing matched.
///
/// Fails with [`DbError::MultiColumns`] when the result has more than one
/// column.
pub fn select_scalar(sql: &str, params: &[Value]) -> Result<Option<Value>> {
    with_connection(|| {
        let native_sql = prepare_sql(sql, params)?;
        tracing::debug!(sql = %native_sql, params = ?params, "select scalar");
        let started = Instant::now();
        let value = with_ctx(|ctx| {
            let mut cursor = ctx.cursor()?;
            cursor.execute(&native_sql, params)?;
            match cursor.fetchone()? {
                None => Ok(None),
                Some(values) if values.len() == 1 => Ok(values.into_iter().next()),
                Some(values) => Err(DbError::MultiColumns(values.len())),
            }
        });
        profile(started, sql);
        value
    })
}

/// Execute a mutating statement and return the affected-row count.
///
/// When no transaction scope is active the statement is committed
/// immediately; inside a transaction scope the commit is deferred to the
/// outermost scope's exit.
pub fn update(sql: &str, params: &[Value]) -> Result<usize> {
    with_connection(|| {
        let native_sql = prepare_sql(sql, params)?;
        tracing::debug!(sql = %native_sql, params = ?params, "update");
        let started = Instant::now();
        let affected = with_ctx(|ctx| {
            let affected = {
                let mut cursor = ctx.cursor()?;
                cursor.execute(&native_sql, params)?;
                cursor.rowcount()
            };
            if ctx.transaction_depth() == 0 {
                tracing::debug!("auto commit");
                ctx.commit()?;
            }
            Ok(usize::try_from(affected).unwrap_or(0))
        });
        profile(started, sql);
        affected
    })
}

/// Insert one row given a table name and ordered `(column, value)` pairs.
/// Returns the affected-row count.
///
/// Table and column names are double-quoted and interpolated verbatim, with
/// no validation or escaping; sanitizing identifiers that come from
/// untrusted input is the caller's responsibility.
pub fn insert(table: &str, values: &[(&str, Value)]) -> Result<usize> {
    let columns = values
        .iter()
        .map(|(name, _)| format!("\"{name}\""))
        .collect::<Vec<_>>()
        .join(", ");
    let markers = vec!["?"; values.len()].join(", ");
    let sql = format!("insert into \"{table}\" ({columns}) values ({markers})");
    let params: Vec<Value> = values.iter().map(|(_, value)| value.clone()).collect();
    update(&sql, &params)
}
