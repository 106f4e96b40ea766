//! Connection and transaction scopes.
//!
//! Both wrappers nest freely: only the outermost connection scope on a
//! thread opens and closes the connection, and only the outermost
//! transaction scope performs the physical commit or rollback. Inner
//! scopes are pure accounting.

use crate::context::{with_ctx, DbContext};
use crate::error::Result;

/// Entry token for a scope. `should_cleanup` is true only for the scope
/// that transitioned the thread context from uninitialized to initialized;
/// that scope alone tears the context down on exit.
struct ScopeGuard {
    should_cleanup: bool,
}

fn enter(ctx: &mut DbContext) -> Result<ScopeGuard> {
    if ctx.is_init() {
        Ok(ScopeGuard {
            should_cleanup: false,
        })
    } else {
        ctx.init()?;
        Ok(ScopeGuard {
            should_cleanup: true,
        })
    }
}

/// Tear the context down if this scope owns it, preserving an in-flight
/// error over a cleanup failure.
fn finish_cleanup<T>(guard: ScopeGuard, result: Result<T>) -> Result<T> {
    if !guard.should_cleanup {
        return result;
    }
    let cleanup = with_ctx(|ctx| ctx.cleanup());
    match (result, cleanup) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(cleanup_err)) => Err(cleanup_err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(cleanup_err)) => {
            tracing::error!("cleanup failed while an error was propagating: {cleanup_err}");
            Err(err)
        }
    }
}

/// Run `body` inside a connection scope.
///
/// The thread's connection context is initialized on entry if this is the
/// outermost scope, and torn down on exit by the same scope on every path.
/// Nested calls are free.
pub fn with_connection<T>(body: impl FnOnce() -> Result<T>) -> Result<T> {
    let guard = with_ctx(enter)?;
    let result = body();
    finish_cleanup(guard, result)
}

/// Run `body` inside a transaction scope.
///
/// Nested scopes share one physical transaction. The outermost scope
/// commits when `body` returned `Ok`, and rolls back otherwise; a commit
/// failure is answered with a compensating rollback before the commit
/// error surfaces. Context teardown runs last, even when the commit or
/// rollback failed.
pub fn with_transaction<T>(body: impl FnOnce() -> Result<T>) -> Result<T> {
    let guard = with_ctx(|ctx| {
        let guard = enter(ctx)?;
        ctx.push_transaction();
        Ok(guard)
    })?;
    let result = body();
    let result = finish_transaction(result);
    finish_cleanup(guard, result)
}

fn finish_transaction<T>(result: Result<T>) -> Result<T> {
    with_ctx(|ctx| {
        if ctx.pop_transaction() > 0 {
            return result;
        }
        match result {
            Ok(value) => {
                tracing::info!("commit transaction");
                match ctx.commit() {
                    Ok(()) => Ok(value),
                    Err(commit_err) => {
                        tracing::warn!("commit failed, trying rollback: {commit_err}");
                        if let Err(rollback_err) = ctx.rollback() {
                            tracing::error!(
                                "rollback after failed commit also failed: {rollback_err}"
                            );
                        }
                        Err(commit_err)
                    }
                }
            }
            Err(err) => {
                tracing::warn!("rollback transaction");
                if let Err(rollback_err) = ctx.rollback() {
                    tracing::error!("rollback failed: {rollback_err}");
                }
                Err(err)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context;
    use crate::error::DbError;

    #[test]
    fn connection_scope_initializes_and_tears_down() {
        assert!(!context::is_initialized());
        let result = with_connection(|| {
            assert!(context::is_initialized());
            Ok(42)
        });
        assert_eq!(result.unwrap(), 42);
        assert!(!context::is_initialized());
    }

    #[test]
    fn inner_connection_scope_leaves_outer_context_alone() {
        with_connection(|| {
            with_connection(|| Ok(()))?;
            // The inner scope exited without tearing the context down.
            assert!(context::is_initialized());
            Ok(())
        })
        .unwrap();
        assert!(!context::is_initialized());
    }

    #[test]
    fn connection_scope_cleans_up_on_error() {
        let result: Result<()> =
            with_connection(|| Err(DbError::Driver("boom".to_string())));
        assert!(matches!(result, Err(DbError::Driver(_))));
        assert!(!context::is_initialized());
    }

    #[test]
    fn transaction_depth_tracks_nesting() {
        with_connection(|| {
            assert_eq!(context::transaction_depth(), 0);
            let _ = with_transaction(|| {
                assert_eq!(context::transaction_depth(), 1);
                let _ = with_transaction(|| -> Result<()> {
                    assert_eq!(context::transaction_depth(), 2);
                    Err(DbError::Driver("inner".to_string()))
                });
                assert_eq!(context::transaction_depth(), 1);
                Ok(())
            });
            assert_eq!(context::transaction_depth(), 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn empty_transaction_fails_at_commit_time() {
        // No statement ever ran, so there is no handle to commit on.
        let result = with_transaction(|| Ok(()));
        assert!(matches!(result, Err(DbError::Driver(_))));
        assert!(!context::is_initialized());
    }

    #[test]
    fn body_error_wins_over_rollback_failure() {
        let result: Result<()> = with_transaction(|| {
            Err(DbError::MultiColumns(3))
        });
        // Rollback also fails (no handle), but the body error surfaces.
        assert!(matches!(result, Err(DbError::MultiColumns(3))));
        assert!(!context::is_initialized());
    }
}
