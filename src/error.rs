//! Top level error type of the exporter.

use crate::catalog::CatalogError;
use crate::config::ConfigError;

/// Errors ending the exporter process.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),
    /// Invalid metric catalog.
    #[error("invalid metric catalog: {0}")]
    Catalog(#[from] CatalogError),
    /// Binding or serving the HTTP listener failed.
    #[error("http server: {0}")]
    Io(#[from] std::io::Error),
    /// Writing the exposition failed.
    #[error("encoding metrics failed")]
    Encode(#[from] std::fmt::Error),
}
