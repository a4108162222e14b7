#![deny(dead_code)]
#![deny(missing_docs)]
#![deny(unused)]
#![forbid(unsafe_code)]
#![warn(missing_debug_implementations)]

//! Prometheus exporter for the per-user counters MariaDB keeps in
//! `information_schema.USER_STATISTICS`.
//!
//! On every scrape the exporter reads the current statistics from the
//! database and translates them into counters labeled by `user` and `node`,
//! exposed in the [Prometheus text
//! format](https://prometheus.io/docs/instrumenting/exposition_formats/).
//!
//! # Examples
//!
//! ```
//! use async_trait::async_trait;
//! use mariadb_stats_exporter::collector::StatsCollector;
//! use mariadb_stats_exporter::encoding::text::encode;
//! use mariadb_stats_exporter::registry::Registry;
//! use mariadb_stats_exporter::source::{SourceError, StatsSource};
//! use mariadb_stats_exporter::StatsRow;
//!
//! // A source serving fixed statistics instead of querying MariaDB.
//! #[derive(Debug)]
//! struct Fixed;
//!
//! #[async_trait]
//! impl StatsSource for Fixed {
//!     async fn fetch_rows(&self) -> Result<Vec<StatsRow>, SourceError> {
//!         Ok(vec![StatsRow {
//!             user: "alice".to_string(),
//!             total_connections: 5.0,
//!             ..Default::default()
//!         }])
//!     }
//!
//!     async fn fetch_memory_used(&self) -> Result<f64, SourceError> {
//!         Ok(1048576.0)
//!     }
//! }
//!
//! # tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(async {
//! let mut registry = Registry::default();
//! registry
//!     .register_collector(Box::new(StatsCollector::new(Fixed, "db1")))
//!     .unwrap();
//!
//! let mut buffer = String::new();
//! encode(&mut buffer, &registry.collect().await).unwrap();
//!
//! assert!(buffer.starts_with(
//!     "# HELP mariadb_stats_memory_used Total Memory used by MariaDB.\n\
//!      ## TYPE mariadb_stats_memory_used counter\n\
//!      mariadb_stats_memory_used{node=\"db1\"} 1048576\n"
//! ));
//! assert!(buffer.contains(
//!     "mariadb_stats_total_connections{user=\"alice\",node=\"db1\"} 5\n"
//! ));
//! # });
//! ```

pub mod auth;
pub mod breaker;
pub mod catalog;
pub mod collector;
pub mod config;
pub mod encoding;
pub mod error;
pub mod metrics;
pub mod registry;
pub mod server;
pub mod source;
pub mod stats;

pub use error::Error;
pub use stats::StatsRow;
