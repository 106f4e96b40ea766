//! Per-thread connection context.
//!
//! Every thread owns at most one lazily-opened connection, held in a
//! thread-local [`DbContext`] together with the transaction-nesting count.
//! Nothing here is ever shared across threads.

use crate::driver::{RawConnection, RawCursor};
use crate::engine;
use crate::error::{DbError, Result};
use std::cell::RefCell;

/// Holds at most one raw connection, opened on the first cursor request.
pub struct LazyConnection {
    raw: Option<Box<dyn RawConnection>>,
}

impl LazyConnection {
    fn new() -> Self {
        Self { raw: None }
    }

    /// Produce a cursor, opening the raw connection first if needed.
    pub fn cursor(&mut self) -> Result<Box<dyn RawCursor + '_>> {
        if self.raw.is_none() {
            let conn = engine::engine()?.connect()?;
            tracing::info!("open connection");
            self.raw = Some(conn);
        }
        match self.raw {
            Some(ref mut raw) => raw.cursor(),
            None => Err(DbError::NotInitialized),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        match self.raw {
            Some(ref mut raw) => raw.commit(),
            None => Err(DbError::Driver(
                "commit before any statement was executed".to_string(),
            )),
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        match self.raw {
            Some(ref mut raw) => raw.rollback(),
            None => Err(DbError::Driver(
                "rollback before any statement was executed".to_string(),
            )),
        }
    }

    /// Close the raw connection if one was opened. No-op otherwise.
    pub fn cleanup(&mut self) -> Result<()> {
        if let Some(raw) = self.raw.take() {
            raw.close()?;
            tracing::info!("close connection");
        }
        Ok(())
    }
}

/// Thread-local object holding the current connection and transaction
/// nesting depth.
pub struct DbContext {
    connection: Option<LazyConnection>,
    transactions: u32,
}

impl DbContext {
    fn new() -> Self {
        Self {
            connection: None,
            transactions: 0,
        }
    }

    pub fn is_init(&self) -> bool {
        self.connection.is_some()
    }

    /// Install a fresh lazy connection. Callers check [`Self::is_init`]
    /// first; initializing twice is a contract violation.
    pub fn init(&mut self) -> Result<()> {
        if self.is_init() {
            return Err(DbError::AlreadyInitialized);
        }
        tracing::info!("open lazy connection");
        self.connection = Some(LazyConnection::new());
        self.transactions = 0;
        Ok(())
    }

    /// Drop the held connection, closing its raw handle.
    ///
    /// The reference is cleared before the close runs, so the context never
    /// retains a closed connection even when closing fails.
    pub fn cleanup(&mut self) -> Result<()> {
        let mut connection = self.connection.take().ok_or(DbError::NotInitialized)?;
        connection.cleanup()
    }

    pub fn cursor(&mut self) -> Result<Box<dyn RawCursor + '_>> {
        match self.connection {
            Some(ref mut connection) => connection.cursor(),
            None => Err(DbError::NotInitialized),
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        match self.connection {
            Some(ref mut connection) => connection.commit(),
            None => Err(DbError::NotInitialized),
        }
    }

    pub fn rollback(&mut self) -> Result<()> {
        match self.connection {
            Some(ref mut connection) => connection.rollback(),
            None => Err(DbError::NotInitialized),
        }
    }

    pub fn transaction_depth(&self) -> u32 {
        self.transactions
    }

    pub(crate) fn push_transaction(&mut self) {
        self.transactions += 1;
    }

    pub(crate) fn pop_transaction(&mut self) -> u32 {
        self.transactions = self.transactions.saturating_sub(1);
        self.transactions
    }
}

thread_local! {
    static DB_CTX: RefCell<DbContext> = RefCell::new(DbContext::new());
}

/// Run `f` with this thread's context.
///
/// The borrow is held only for the duration of `f`; caller-supplied bodies
/// (scope closures) run outside of it.
pub(crate) fn with_ctx<T>(f: impl FnOnce(&mut DbContext) -> Result<T>) -> Result<T> {
    DB_CTX.with(|ctx| f(&mut ctx.borrow_mut()))
}

/// Transaction nesting depth of the current thread.
pub fn transaction_depth() -> u32 {
    DB_CTX.with(|ctx| ctx.borrow().transaction_depth())
}

/// Whether the current thread holds a connection context.
pub fn is_initialized() -> bool {
    DB_CTX.with(|ctx| ctx.borrow().is_init())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_and_cleanup_cycle() {
        let mut ctx = DbContext::new();
        assert!(!ctx.is_init());
        ctx.init().unwrap();
        assert!(ctx.is_init());
        assert_eq!(ctx.transaction_depth(), 0);
        ctx.cleanup().unwrap();
        assert!(!ctx.is_init());
    }

    #[test]
    fn double_init_is_rejected() {
        let mut ctx = DbContext::new();
        ctx.init().unwrap();
        assert!(matches!(ctx.init(), Err(DbError::AlreadyInitialized)));
    }

    #[test]
    fn cleanup_requires_init() {
        let mut ctx = DbContext::new();
        assert!(matches!(ctx.cleanup(), Err(DbError::NotInitialized)));
    }

    #[test]
    fn cursor_requires_init() {
        let mut ctx = DbContext::new();
        assert!(matches!(ctx.cursor(), Err(DbError::NotInitialized)));
    }

    #[test]
    fn commit_requires_an_opened_handle() {
        let mut ctx = DbContext::new();
        ctx.init().unwrap();
        // No cursor was ever requested, so there is nothing to commit.
        assert!(matches!(ctx.commit(), Err(DbError::Driver(_))));
        assert!(matches!(ctx.rollback(), Err(DbError::Driver(_))));
    }

    #[test]
    fn transaction_depth_accounting() {
        let mut ctx = DbContext::new();
        ctx.init().unwrap();
        ctx.push_transaction();
        ctx.push_transaction();
        assert_eq!(ctx.transaction_depth(), 2);
        assert_eq!(ctx.pop_transaction(), 1);
        assert_eq!(ctx.pop_transaction(), 0);
        assert_eq!(ctx.pop_transaction(), 0);
    }

    #[test]
    fn init_resets_transaction_depth() {
        let mut ctx = DbContext::new();
        ctx.init().unwrap();
        ctx.push_transaction();
        ctx.cleanup().unwrap();
        ctx.init().unwrap();
        assert_eq!(ctx.transaction_depth(), 0);
    }
}
