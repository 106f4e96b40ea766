//! Thread-confined database access layer.
//!
//! Each thread owns at most one lazily-opened connection, acquired
//! transparently by [`with_connection`] / [`with_transaction`] scopes.
//! Scopes nest freely: the connection is opened at most once and closed
//! exactly once per top-level call, and nested transaction scopes share
//! one physical transaction that commits or rolls back only at the
//! outermost exit.
//!
//! ```no_run
//! use dbkit::{args, configure, insert, select_one, with_transaction, SqliteConfig, Value};
//!
//! configure(SqliteConfig::new("app.db"))?;
//!
//! with_transaction(|| {
//!     insert("user", &[("id", Value::from(1)), ("name", Value::from("alice"))])?;
//!     insert("user", &[("id", Value::from(2)), ("name", Value::from("bob"))])?;
//!     Ok(())
//! })?;
//!
//! let user = select_one("select * from user where id = ?", &args![1])?;
//! assert!(user.is_some());
//! # Ok::<(), dbkit::DbError>(())
//! ```

pub mod context;
pub mod driver;
pub mod engine;
pub mod error;
pub mod ids;
pub mod query;
pub mod scope;
pub mod sqlite;
pub mod value;

pub use context::{is_initialized, transaction_depth};
pub use engine::{configure, configure_with_driver, is_configured};
pub use error::{DbError, Result};
pub use ids::next_id;
pub use query::{insert, select_all, select_one, select_scalar, update};
pub use scope::{with_connection, with_transaction};
pub use sqlite::{SqliteConfig, SqliteDriver};
pub use value::{ColumnInfo, Row, Value};
