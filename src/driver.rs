//! The narrow seam between this layer and the SQL engine underneath it.
//!
//! The core never names a concrete database library; it talks to
//! [`Driver`], [`RawConnection`] and [`RawCursor`] only. The default
//! implementation lives in [`crate::sqlite`]; tests install their own.

use crate::error::Result;
use crate::value::Value;

/// Factory for raw connections, installed once per process via
/// [`crate::engine::configure_with_driver`].
///
/// Implementations must be shareable across threads; the connections they
/// produce are confined to the thread that opened them.
pub trait Driver: Send + Sync {
    /// Open a new raw connection.
    ///
    /// Fails with [`crate::DbError::Connection`] when the session cannot be
    /// established.
    fn connect(&self) -> Result<Box<dyn RawConnection>>;

    /// The engine's native positional placeholder for the 1-based
    /// parameter `index`. Callers write the neutral `?` marker; the
    /// execution layer substitutes this before handing SQL to the driver.
    fn placeholder(&self, index: usize) -> String;
}

/// A live session with the database engine.
///
/// Owned exclusively by one thread. Commit and rollback must only be called
/// after at least one cursor has been obtained.
pub trait RawConnection {
    /// Produce a cursor for one statement execution.
    fn cursor(&mut self) -> Result<Box<dyn RawCursor + '_>>;

    fn commit(&mut self) -> Result<()>;

    fn rollback(&mut self) -> Result<()>;

    /// Close the session. The connection is consumed; an open transaction
    /// is discarded by the engine.
    fn close(self: Box<Self>) -> Result<()>;
}

/// A short-lived handle bound to one statement execution.
///
/// Dropping the cursor releases it; the execution layer drops every cursor
/// before its own call returns.
pub trait RawCursor {
    /// Execute `sql` (already in the driver's native placeholder syntax)
    /// with the given arguments.
    fn execute(&mut self, sql: &str, params: &[Value]) -> Result<()>;

    /// Column names of the result set, `None` for statements that return
    /// no rows.
    fn description(&self) -> Option<&[String]>;

    /// Affected-row count for mutating statements, row count for reads.
    fn rowcount(&self) -> i64;

    /// Next result row, if any.
    fn fetchone(&mut self) -> Result<Option<Vec<Value>>>;

    /// All remaining result rows.
    fn fetchall(&mut self) -> Result<Vec<Vec<Value>>>;
}
