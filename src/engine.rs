//! Process-wide engine configuration.

use crate::driver::{Driver, RawConnection};
use crate::error::{DbError, Result};
use crate::sqlite::{SqliteConfig, SqliteDriver};
use std::sync::OnceLock;

/// The installed connection factory. Configured once per process.
pub struct Engine {
    driver: Box<dyn Driver>,
}

impl Engine {
    pub(crate) fn connect(&self) -> Result<Box<dyn RawConnection>> {
        self.driver.connect()
    }

    pub(crate) fn driver(&self) -> &dyn Driver {
        &*self.driver
    }
}

static ENGINE: OnceLock<Engine> = OnceLock::new();

/// Configure the engine with the default SQLite driver.
///
/// Fails with [`DbError::AlreadyConfigured`] on a second call.
pub fn configure(config: SqliteConfig) -> Result<()> {
    configure_with_driver(Box::new(SqliteDriver::new(config)))
}

/// Configure the engine with a caller-supplied driver.
///
/// Fails with [`DbError::AlreadyConfigured`] on a second call.
pub fn configure_with_driver(driver: Box<dyn Driver>) -> Result<()> {
    ENGINE
        .set(Engine { driver })
        .map_err(|_| DbError::AlreadyConfigured)?;
    tracing::info!("database engine configured");
    Ok(())
}

pub(crate) fn engine() -> Result<&'static Engine> {
    ENGINE.get().ok_or(DbError::NotConfigured)
}

/// Whether the engine has been configured.
pub fn is_configured() -> bool {
    ENGINE.get().is_some()
}
