//! Statistics source abstraction.
//!
//! See [`StatsSource`] for details.

use std::time::Duration;

use async_trait::async_trait;

use crate::stats::StatsRow;

pub mod mariadb;

pub use mariadb::{MariaDbOptions, MariaDbSource};

/// Failure of a [`StatsSource`] fetch.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    /// Connecting to or querying the database failed.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    /// A column is absent or holds a non-numeric value.
    #[error("column {column}: {reason}")]
    Column {
        /// Column name.
        column: &'static str,
        /// Why it could not be read.
        reason: String,
    },
    /// The queried value does not exist on this server.
    #[error("{0} is not available")]
    Missing(&'static str),
    /// A textual value could not be parsed as a number.
    #[error("unparsable value: {0}")]
    Parse(String),
    /// The fetch did not complete in time.
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    /// Recent fetches failed; the source is not queried until the cooldown ends.
    #[error("circuit open, skipping fetch")]
    CircuitOpen,
}

/// Provides the current per-user statistics on each scrape.
///
/// Implementations must not hold resources across calls: whatever a fetch
/// acquires is released before the returned future completes, or when it is
/// dropped.
#[async_trait]
pub trait StatsSource: std::fmt::Debug + Send + Sync + 'static {
    /// Fetches one row per database user.
    async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError>;

    /// Fetches the total memory used by the server, in bytes.
    async fn fetch_memory_used(&self) -> Result<f64, SourceError>;
}

#[async_trait]
impl<S: StatsSource + ?Sized> StatsSource for Box<S> {
    async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError> {
        (**self).fetch_rows().await
    }

    async fn fetch_memory_used(&self) -> Result<f64, SourceError> {
        (**self).fetch_memory_used().await
    }
}
